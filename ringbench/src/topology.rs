//! Host discovery: which host each rank runs on, and its index there.

use crate::client::RingClient;
use crate::error::{Result, RingError};
use crate::types::Rank;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// Width of every host field exchanged between ranks, in bytes.
pub const HOST_ID_WIDTH: usize = 64;

/// A host name or decorated host string that fits in [`HOST_ID_WIDTH`]
/// bytes with at least one byte to spare.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HostId(String);

impl HostId {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.len() >= HOST_ID_WIDTH {
            return Err(RingError::HostIdTooLong {
                len: value.len(),
                value,
                max: HOST_ID_WIDTH,
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Zero-padded fixed-width encoding.
    fn to_field(&self) -> [u8; HOST_ID_WIDTH] {
        let mut field = [0u8; HOST_ID_WIDTH];
        field[..self.0.len()].copy_from_slice(self.0.as_bytes());
        field
    }

    fn from_field(field: &[u8]) -> Result<Self> {
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        let s = std::str::from_utf8(&field[..end])
            .map_err(|e| RingError::DecodeFailed(format!("host field: {e}")))?;
        Self::new(s)
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where every rank runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    /// Decorated `rank:host:localrank` strings, in rank order.
    pub hosts: Vec<HostId>,
    /// Distinct raw host names, sorted.
    pub unique_hosts: Vec<HostId>,
    /// This rank's raw host name.
    pub host: HostId,
    /// This rank's index among ranks on the same host.
    pub local_rank: u32,
    /// Ranks sharing this rank's host, this one included.
    pub processes_per_node: u32,
}

/// Exchange host names and derive the topology. Collective: all ranks call
/// it with their own host name.
///
/// Two all-gathers of [`HOST_ID_WIDTH`]-byte fields: raw host names first,
/// then the decorated `rank:host:localrank` strings. If either string does
/// not fit on any rank, every rank fails with [`RingError::HostIdTooLong`].
pub async fn discover(client: &RingClient, hostname: &str) -> Result<Topology> {
    let rank = client.rank();
    let me = agree_host_id(client, hostname.to_owned()).await?;

    let raw = gather_fields(client, &me).await?;
    let unique_hosts: Vec<HostId> = raw
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let local_rank = local_rank_of(&raw, rank);
    let processes_per_node = raw.iter().filter(|h| **h == me).count() as u32;

    let decorated = agree_host_id(client, format!("{rank}:{me}:{local_rank}")).await?;
    let hosts = gather_fields(client, &decorated).await?;

    debug!(
        rank,
        host = %me,
        local_rank,
        processes_per_node,
        unique = unique_hosts.len(),
        "topology discovered"
    );

    Ok(Topology {
        hosts,
        unique_hosts,
        host: me,
        local_rank,
        processes_per_node,
    })
}

/// Number of lower ranks sharing `rank`'s host.
pub fn local_rank_of(raw_hosts: &[HostId], rank: Rank) -> u32 {
    let Some(me) = raw_hosts.get(rank as usize) else {
        return 0;
    };
    raw_hosts[..rank as usize]
        .iter()
        .filter(|h| *h == me)
        .count() as u32
}

/// Build a [`HostId`] after every rank has checked its own length.
///
/// A rank whose value fits still fails when any peer's does not, naming
/// the lowest such rank.
async fn agree_host_id(client: &RingClient, value: String) -> Result<HostId> {
    let lens = client.all_gather(&(value.len() as u64).to_le_bytes()).await?;
    if value.len() >= HOST_ID_WIDTH {
        return HostId::new(value);
    }
    let offender = lens.chunks_exact(8).enumerate().find_map(|(peer, chunk)| {
        let len = u64::from_le_bytes(chunk.try_into().ok()?) as usize;
        (len >= HOST_ID_WIDTH).then_some((peer, len))
    });
    match offender {
        Some((peer, len)) => Err(RingError::HostIdTooLong {
            value: format!("<rank {peer}>"),
            len,
            max: HOST_ID_WIDTH,
        }),
        None => HostId::new(value),
    }
}

async fn gather_fields(client: &RingClient, id: &HostId) -> Result<Vec<HostId>> {
    let all = client.all_gather(&id.to_field()).await?;
    all.chunks_exact(HOST_ID_WIDTH)
        .map(HostId::from_field)
        .collect()
}

/// This worker's host name: `override_name` if given, else the `hostname`
/// command, else the kernel's view, else `localhost`.
pub fn resolve_hostname(override_name: Option<&str>) -> String {
    if let Some(name) = override_name.filter(|n| !n.is_empty()) {
        return name.to_owned();
    }
    if let Ok(out) = std::process::Command::new("hostname").output() {
        if out.status.success() {
            let name = String::from_utf8_lossy(&out.stdout).trim().to_owned();
            if !name.is_empty() {
                return name;
            }
        }
    }
    if let Ok(name) = std::fs::read_to_string("/proc/sys/kernel/hostname") {
        let name = name.trim();
        if !name.is_empty() {
            return name.to_owned();
        }
    }
    "localhost".to_owned()
}
