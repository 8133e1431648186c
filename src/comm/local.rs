use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::comm::{Communicator, MessageTag, check_rank};
use crate::foundation::error::{SortlastError, SortlastResult};

/// Options for an in-process group.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LocalGroupOpts {
    /// How long a receive waits before the group is declared diverged.
    pub recv_timeout_ms: u64,
}

impl Default for LocalGroupOpts {
    fn default() -> Self {
        Self {
            recv_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug)]
struct Envelope {
    tag: MessageTag,
    payload: Vec<u8>,
}

/// A process group whose ranks are threads of the current process.
///
/// Every ordered pair of ranks gets its own FIFO channel, so messages between two ranks
/// arrive in send order regardless of traffic from others.
pub struct LocalGroup {
    endpoints: Vec<LocalComm>,
}

impl LocalGroup {
    /// Group of `size` ranks with default options.
    pub fn new(size: usize) -> SortlastResult<Self> {
        Self::with_opts(size, &LocalGroupOpts::default())
    }

    /// Group of `size` ranks.
    pub fn with_opts(size: usize, opts: &LocalGroupOpts) -> SortlastResult<Self> {
        if size == 0 {
            return Err(SortlastError::configuration(
                "a process group needs at least one rank",
            ));
        }
        let timeout = Duration::from_millis(opts.recv_timeout_ms.max(1));

        // outgoing[src][dest] pairs with incoming[dest][src].
        let mut outgoing: Vec<Vec<Sender<Envelope>>> = (0..size).map(|_| Vec::new()).collect();
        let mut incoming: Vec<Vec<Option<Receiver<Envelope>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
        for (src, senders) in outgoing.iter_mut().enumerate() {
            for dest_inbox in incoming.iter_mut() {
                let (tx, rx) = crossbeam_channel::unbounded();
                senders.push(tx);
                dest_inbox[src] = Some(rx);
            }
        }

        let endpoints = outgoing
            .into_iter()
            .zip(incoming)
            .enumerate()
            .map(|(rank, (senders, receivers))| LocalComm {
                rank,
                senders,
                receivers: receivers.into_iter().flatten().collect(),
                timeout,
            })
            .collect();
        Ok(Self { endpoints })
    }

    /// Number of ranks.
    pub fn size(&self) -> usize {
        self.endpoints.len()
    }

    /// Take the per-rank endpoints, in rank order.
    pub fn into_endpoints(self) -> Vec<LocalComm> {
        self.endpoints
    }

    /// Run `f` once per rank, each on its own scoped thread, and collect the results in
    /// rank order. A panic on any rank is resumed on the caller.
    pub fn run<R, F>(self, f: F) -> Vec<R>
    where
        F: Fn(LocalComm) -> R + Sync,
        R: Send,
    {
        let f = &f;
        std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .endpoints
                .into_iter()
                .map(|comm| scope.spawn(move || f(comm)))
                .collect();
            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(r) => r,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        })
    }
}

/// One rank's endpoint of a [`LocalGroup`].
#[derive(Debug)]
pub struct LocalComm {
    rank: usize,
    senders: Vec<Sender<Envelope>>,
    receivers: Vec<Receiver<Envelope>>,
    timeout: Duration,
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.senders.len()
    }

    fn send(&self, dest: usize, tag: MessageTag, payload: Vec<u8>) -> SortlastResult<()> {
        check_rank(self.size(), dest, "send destination")?;
        self.senders[dest]
            .send(Envelope { tag, payload })
            .map_err(|_| {
                SortlastError::collective(format!(
                    "rank {dest} left the group before rank {} could send {tag:?}",
                    self.rank
                ))
            })
    }

    fn recv(&self, src: usize, tag: MessageTag) -> SortlastResult<Vec<u8>> {
        check_rank(self.size(), src, "receive source")?;
        let envelope = match self.receivers[src].recv_timeout(self.timeout) {
            Ok(envelope) => envelope,
            Err(RecvTimeoutError::Timeout) => {
                return Err(SortlastError::collective(format!(
                    "rank {} timed out after {:?} waiting for {tag:?} from rank {src}",
                    self.rank, self.timeout
                )));
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(SortlastError::collective(format!(
                    "rank {src} left the group while rank {} waited for {tag:?}",
                    self.rank
                )));
            }
        };
        if envelope.tag != tag {
            return Err(SortlastError::collective(format!(
                "rank {} expected {tag:?} from rank {src} but received {:?}",
                self.rank, envelope.tag
            )));
        }
        Ok(envelope.payload)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/comm/local.rs"]
mod tests;
