use crate::comm::{Communicator, MessageTag};
use crate::foundation::error::{SortlastError, SortlastResult};
use crate::image::wire::{WireReader, WireWriter};

const TOPOLOGY_MAGIC: [u8; 4] = *b"SLTP";

/// Name of the machine a rank runs on. Two ranks share a host iff their identities are
/// equal as whole strings.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct HostIdentity(String);

impl HostIdentity {
    /// Wrap an explicit host name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Identity of the current machine: `$HOSTNAME`, then `/etc/hostname`, then
    /// `"localhost"`.
    pub fn detect() -> Self {
        let from_env = std::env::var("HOSTNAME")
            .ok()
            .map(|s| s.trim().to_owned());
        let from_file = || {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|s| s.trim().to_owned())
        };
        from_env
            .filter(|s| !s.is_empty())
            .or_else(from_file)
            .filter(|s| !s.is_empty())
            .map(Self)
            .unwrap_or_else(|| Self("localhost".to_owned()))
    }

    /// Host name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Where a rank sits in the world group and on its host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ProcessTopology {
    /// Rank in the world group.
    pub world_rank: usize,
    /// Size of the world group.
    pub world_size: usize,
    /// Number of world ranks with a lower rank on the same host.
    pub host_rank: usize,
    /// Number of world ranks on this host.
    pub host_size: usize,
}

impl ProcessTopology {
    /// Topology of a group with a single rank.
    pub const SOLO: ProcessTopology = ProcessTopology {
        world_rank: 0,
        world_size: 1,
        host_rank: 0,
        host_size: 1,
    };

    /// Discover the host layout of `comm`'s group.
    ///
    /// Collective: rank 0 gathers every host identity, numbers the ranks per host and
    /// scatters `(host_rank, host_size)` back. Every rank must call this.
    #[tracing::instrument(skip(comm, host), fields(rank = comm.rank(), host = host.as_str()))]
    pub fn discover<C: Communicator + ?Sized>(
        comm: &C,
        host: &HostIdentity,
    ) -> SortlastResult<Self> {
        let world_rank = comm.rank();
        let world_size = comm.size();
        if world_size == 1 {
            return Ok(Self::SOLO);
        }

        let gathered = comm.gather(
            0,
            MessageTag::new(MessageTag::TOPOLOGY, 0),
            host.as_str().as_bytes().to_vec(),
        )?;
        let replies = match gathered {
            Some(names) => {
                let hosts = names
                    .into_iter()
                    .map(|bytes| {
                        String::from_utf8(bytes).map_err(|e| {
                            SortlastError::transfer(format!("host name is not utf-8: {e}"))
                        })
                    })
                    .collect::<SortlastResult<Vec<_>>>()?;
                Some(
                    number_ranks_per_host(&hosts)
                        .into_iter()
                        .map(|(host_rank, host_size)| encode_slot(host_rank, host_size))
                        .collect(),
                )
            }
            None => None,
        };
        let mine = comm.scatter(0, MessageTag::new(MessageTag::TOPOLOGY, 1), replies)?;
        let (host_rank, host_size) = decode_slot(&mine)?;

        let topology = Self {
            world_rank,
            world_size,
            host_rank,
            host_size,
        };
        tracing::debug!(?topology, "topology discovered");
        Ok(topology)
    }
}

/// `(host_rank, host_size)` for each entry of `hosts`, indexed by world rank.
pub(crate) fn number_ranks_per_host(hosts: &[String]) -> Vec<(usize, usize)> {
    hosts
        .iter()
        .enumerate()
        .map(|(rank, host)| {
            let host_rank = hosts[..rank].iter().filter(|h| *h == host).count();
            let host_size = hosts.iter().filter(|h| *h == host).count();
            (host_rank, host_size)
        })
        .collect()
}

fn encode_slot(host_rank: usize, host_size: usize) -> Vec<u8> {
    let mut w = WireWriter::with_capacity(20);
    w.magic(TOPOLOGY_MAGIC);
    w.u64(host_rank as u64);
    w.u64(host_size as u64);
    w.finish()
}

fn decode_slot(bytes: &[u8]) -> SortlastResult<(usize, usize)> {
    let mut r = WireReader::new(bytes);
    r.expect_magic(TOPOLOGY_MAGIC)?;
    let host_rank = r.u64()? as usize;
    let host_size = r.u64()? as usize;
    r.finish()?;
    if host_rank >= host_size {
        return Err(SortlastError::transfer(format!(
            "host rank {host_rank} is not below host size {host_size}"
        )));
    }
    Ok((host_rank, host_size))
}

#[cfg(test)]
#[path = "../../tests/unit/comm/topology.rs"]
mod tests;
