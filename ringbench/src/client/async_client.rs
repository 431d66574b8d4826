use crate::error::{Result, RingError};
use crate::transport::buffer_pool::BufferPool;
use crate::transport::{Mailbox, PeerConnection, PeerRouter, TransportListener};
use crate::types::{Rank, TagKind, reserved_tag};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// One worker's handle on the ring.
///
/// Holds a send-side connection per peer and one router task per peer that
/// feeds incoming streams into a shared mailbox. Point-to-point requests
/// (`isend`, `irecv`) and the collectives used by the harness are built on
/// top of the mailbox.
///
/// # Example
///
/// ```no_run
/// use ringbench::client::RingClient;
///
/// # async fn example() -> ringbench::error::Result<()> {
/// let clients = RingClient::bootstrap_local(4).await?;
/// assert_eq!(clients[0].rank(), 0);
/// assert_eq!(clients[0].world_size(), 4);
/// # Ok(())
/// # }
/// ```
pub struct RingClient {
    pub(super) rank: Rank,
    pub(super) world_size: u32,
    pub(super) peers: HashMap<Rank, Arc<PeerConnection>>,
    pub(super) mailbox: Arc<Mailbox>,
    pub(super) pool: Arc<BufferPool>,
    router_handles: Vec<tokio::task::JoinHandle<Result<()>>>,
    /// Keeps the QUIC endpoint (and its UDP socket) alive.
    _listener: Option<TransportListener>,
    barrier_epoch: AtomicU64,
    collective_seq: AtomicU64,
}

impl RingClient {
    /// Create a client from established peer connections and spawn a router
    /// for each of them.
    pub fn new(
        rank: Rank,
        world_size: u32,
        listener: Option<TransportListener>,
        peers: HashMap<Rank, PeerConnection>,
    ) -> Self {
        let pool = BufferPool::new();
        let mailbox = Arc::new(Mailbox::new());
        let mut peer_arcs = HashMap::with_capacity(peers.len());
        let mut handles = Vec::with_capacity(peers.len());

        for (peer_rank, peer_conn) in peers {
            handles.push(PeerRouter::spawn(
                peer_rank,
                peer_conn.conn.clone(),
                Arc::clone(&mailbox),
                Arc::clone(&pool),
            ));
            peer_arcs.insert(peer_rank, Arc::new(peer_conn));
        }

        Self {
            rank,
            world_size,
            peers: peer_arcs,
            mailbox,
            pool,
            router_handles: handles,
            _listener: listener,
            barrier_epoch: AtomicU64::new(0),
            collective_seq: AtomicU64::new(0),
        }
    }

    /// This worker's rank (0-indexed).
    pub fn rank(&self) -> Rank {
        self.rank
    }

    /// Number of workers in the ring.
    pub fn world_size(&self) -> u32 {
        self.world_size
    }

    /// Send-side connection to `rank`.
    pub fn peer(&self, rank: Rank) -> Result<&Arc<PeerConnection>> {
        self.peers.get(&rank).ok_or(RingError::UnknownPeer { rank })
    }

    pub(crate) fn check_rank(&self, rank: Rank) -> Result<()> {
        if rank >= self.world_size {
            return Err(RingError::InvalidRank {
                rank,
                world_size: self.world_size,
            });
        }
        Ok(())
    }

    /// Next barrier epoch. All ranks call barriers in the same order, so
    /// their counters stay in lockstep.
    pub(crate) fn next_barrier_epoch(&self) -> u64 {
        self.barrier_epoch.fetch_add(1, Ordering::Relaxed)
    }

    /// Next sequence number for tag-based collectives.
    pub(crate) fn next_collective_seq(&self) -> u64 {
        self.collective_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Tell every peer this rank is done and wait until each of them is
    /// done too, then close the connections.
    ///
    /// A rank only closes a connection after the peer said goodbye, i.e.
    /// after the peer has read everything it needed from this rank. A peer
    /// that already closed its side counts as a goodbye.
    pub async fn shutdown(&self) -> Result<()> {
        let tag = reserved_tag(TagKind::Shutdown, self.next_collective_seq(), 0);

        for peer in self.peers.values() {
            if let Err(e) = peer.send_tagged(tag, &[]).await {
                tracing::debug!(rank = self.rank, peer = peer.rank, "goodbye not sent: {e}");
            }
        }
        for &peer in self.peers.keys() {
            match self.recv_bytes(peer, tag).await {
                Ok(_) | Err(RingError::PeerDisconnected { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        for peer in self.peers.values() {
            peer.close();
        }
        tracing::debug!(rank = self.rank, "connections closed");
        Ok(())
    }
}

impl Drop for RingClient {
    fn drop(&mut self) {
        for handle in &self.router_handles {
            handle.abort();
        }
    }
}
