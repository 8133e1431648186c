//! Process-group layer: point-to-point messaging plus the handful of collectives the
//! compositing core needs.

pub(crate) mod devices;
pub(crate) mod local;
pub(crate) mod topology;

use crate::foundation::error::{SortlastError, SortlastResult};

/// Identifies one logical message stream between two ranks.
///
/// Both sides of a transfer must agree on the tag. A receiver that finds a different tag
/// at the head of its queue reports a [`SortlastError::Collective`] error, which is how
/// ranks that diverged on collective call order are detected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageTag {
    /// Which protocol the message belongs to.
    pub channel: u32,
    /// Position within that protocol (frame, tile, round...).
    pub sequence: u64,
}

impl MessageTag {
    /// Host topology discovery.
    pub const TOPOLOGY: u32 = 1;
    /// Per-tile partial image reduction.
    pub const COMPOSITE: u32 = 2;
    /// Application-defined traffic.
    pub const USER: u32 = 1 << 16;

    /// Create a tag.
    pub const fn new(channel: u32, sequence: u64) -> Self {
        Self { channel, sequence }
    }
}

/// Ranked process group.
///
/// Implementations provide ordered, reliable point-to-point delivery per `(source,
/// destination)` pair. The collectives are built on top of it and must be called by
/// every rank of the group, in the same order, with the same tag and root.
pub trait Communicator {
    /// This process's rank, `0..size()`.
    fn rank(&self) -> usize;

    /// Number of ranks in the group.
    fn size(&self) -> usize;

    /// Queue `payload` for `dest`. Does not wait for the receiver.
    fn send(&self, dest: usize, tag: MessageTag, payload: Vec<u8>) -> SortlastResult<()>;

    /// Next message from `src`; fails when its tag is not `tag`.
    fn recv(&self, src: usize, tag: MessageTag) -> SortlastResult<Vec<u8>>;

    /// Collect one payload per rank at `root`, in rank order. Non-root ranks get `None`.
    fn gather(
        &self,
        root: usize,
        tag: MessageTag,
        payload: Vec<u8>,
    ) -> SortlastResult<Option<Vec<Vec<u8>>>> {
        check_rank(self.size(), root, "gather root")?;
        if self.rank() != root {
            self.send(root, tag, payload)?;
            return Ok(None);
        }
        let mut own = Some(payload);
        let mut out = Vec::with_capacity(self.size());
        for src in 0..self.size() {
            if src == root {
                out.push(own.take().unwrap_or_default());
            } else {
                out.push(self.recv(src, tag)?);
            }
        }
        Ok(Some(out))
    }

    /// Hand payload `r` of `payloads` to rank `r`. Only `root` supplies `payloads`.
    fn scatter(
        &self,
        root: usize,
        tag: MessageTag,
        payloads: Option<Vec<Vec<u8>>>,
    ) -> SortlastResult<Vec<u8>> {
        check_rank(self.size(), root, "scatter root")?;
        if self.rank() != root {
            return self.recv(root, tag);
        }
        let payloads = payloads.ok_or_else(|| {
            SortlastError::configuration("scatter root must supply one payload per rank")
        })?;
        if payloads.len() != self.size() {
            return Err(SortlastError::configuration(format!(
                "scatter root supplied {} payloads for {} ranks",
                payloads.len(),
                self.size()
            )));
        }
        let mut own = Vec::new();
        for (dest, payload) in payloads.into_iter().enumerate() {
            if dest == root {
                own = payload;
            } else {
                self.send(dest, tag, payload)?;
            }
        }
        Ok(own)
    }

    /// Copy `root`'s payload to every rank.
    fn broadcast(
        &self,
        root: usize,
        tag: MessageTag,
        payload: Option<Vec<u8>>,
    ) -> SortlastResult<Vec<u8>> {
        check_rank(self.size(), root, "broadcast root")?;
        if self.rank() != root {
            return self.recv(root, tag);
        }
        let payload = payload.ok_or_else(|| {
            SortlastError::configuration("broadcast root must supply a payload")
        })?;
        for dest in (0..self.size()).filter(|&d| d != root) {
            self.send(dest, tag, payload.clone())?;
        }
        Ok(payload)
    }

    /// Every rank ends up with every rank's payload, in rank order.
    fn all_gather(&self, tag: MessageTag, payload: Vec<u8>) -> SortlastResult<Vec<Vec<u8>>> {
        let me = self.rank();
        for dest in (0..self.size()).filter(|&d| d != me) {
            self.send(dest, tag, payload.clone())?;
        }
        let mut own = Some(payload);
        let mut out = Vec::with_capacity(self.size());
        for src in 0..self.size() {
            if src == me {
                out.push(own.take().unwrap_or_default());
            } else {
                out.push(self.recv(src, tag)?);
            }
        }
        Ok(out)
    }
}

pub(crate) fn check_rank(size: usize, rank: usize, what: &str) -> SortlastResult<()> {
    if rank >= size {
        return Err(SortlastError::collective(format!(
            "{what} {rank} is outside a group of {size}"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/comm/mod.rs"]
mod tests;
