use crate::error::{Result, RingError};
use crate::protocol::RingMessage;
use crate::transport::{PeerConnection, TransportListener, read_message, write_message};
use crate::types::{PROTOCOL_VERSION, Rank};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

/// A worker that has joined through the seed and knows its rank.
///
/// The same QUIC endpoint is used to reach the seed and for the mesh, so
/// the address the seed observed is the one peers will dial.
pub struct WorkerNode {
    pub rank: Rank,
    pub world_size: u32,
    /// `(rank, mesh address)` for every rank, including this one.
    pub peers: Vec<(Rank, String)>,
    listener: TransportListener,
    formation_timeout: Duration,
}

impl WorkerNode {
    /// Bind a mesh endpoint on `mesh_bind`, say Hello to the seed and wait
    /// for the rank assignment.
    pub async fn connect(seed_addr: SocketAddr, mesh_bind: SocketAddr) -> Result<Self> {
        let listener = TransportListener::bind(mesh_bind)?;
        let conn = listener.connect(seed_addr, 0).await?;

        let (mut send, mut recv) = conn
            .open_bi()
            .await
            .map_err(|e| RingError::transport_with_source("open bi to seed", e))?;

        let hello = RingMessage::Hello {
            protocol_version: PROTOCOL_VERSION,
            mesh_port: listener.local_addr().port(),
        };
        write_message(&mut send, &hello).await?;

        let msg = read_message(&mut recv).await?;

        // Tell the seed the Welcome arrived, and make sure it hears it.
        send.finish()
            .map_err(|e| RingError::transport_with_source("finish seed stream", e))?;
        let _ = send.stopped().await;

        match msg {
            RingMessage::Welcome {
                rank,
                world_size,
                peers,
            } => {
                if rank >= world_size || peers.len() != world_size as usize {
                    return Err(RingError::DecodeFailed(format!(
                        "inconsistent Welcome: rank {rank}, world size {world_size}, {} peers",
                        peers.len()
                    )));
                }
                tracing::debug!(rank, world_size, "received rank assignment");
                Ok(WorkerNode {
                    rank,
                    world_size,
                    peers,
                    listener,
                    formation_timeout: Duration::from_secs(60),
                })
            }
            other => Err(RingError::DecodeFailed(format!(
                "expected Welcome, got {other:?}"
            ))),
        }
    }

    pub fn with_formation_timeout(mut self, timeout: Duration) -> Self {
        self.formation_timeout = timeout;
        self
    }

    /// Connect to every other rank.
    ///
    /// Each rank dials all higher ranks and accepts one connection from
    /// every lower rank. The dialer names itself with `MeshHello` on a
    /// bidirectional stream so the acceptor knows which rank it is talking
    /// to.
    pub async fn form_mesh(
        self,
    ) -> Result<(Rank, u32, TransportListener, HashMap<Rank, PeerConnection>)> {
        let WorkerNode {
            rank,
            world_size,
            peers,
            listener,
            formation_timeout,
        } = self;

        let mesh = async {
            let higher: Vec<(Rank, SocketAddr)> = peers
                .iter()
                .filter(|(r, _)| *r > rank)
                .map(|(r, addr)| {
                    addr.parse::<SocketAddr>()
                        .map(|a| (*r, a))
                        .map_err(|e| RingError::ConnectionFailed {
                            rank: *r,
                            reason: format!("bad mesh address {addr:?}: {e}"),
                        })
                })
                .collect::<Result<_>>()?;

            let dials = higher
                .into_iter()
                .map(|(peer, addr)| dial_peer(&listener, rank, peer, addr));
            let (dialed, accepted) = tokio::try_join!(
                futures::future::try_join_all(dials),
                accept_lower(&listener, rank)
            )?;

            let mut conns: HashMap<Rank, PeerConnection> = HashMap::new();
            for (peer, conn) in dialed.into_iter().chain(accepted) {
                conns.insert(peer, PeerConnection::new(peer, conn));
            }
            Ok::<_, RingError>(conns)
        };

        let conns = tokio::time::timeout(formation_timeout, mesh)
            .await
            .map_err(|_| RingError::ClusterFormationTimeout {
                joined: 0,
                expected: world_size,
            })??;

        tracing::info!(rank, peers = conns.len(), "mesh formed");
        Ok((rank, world_size, listener, conns))
    }
}

async fn dial_peer(
    listener: &TransportListener,
    rank: Rank,
    peer: Rank,
    addr: SocketAddr,
) -> Result<(Rank, quinn::Connection)> {
    let conn = listener.connect(addr, peer).await?;
    let (mut send, _recv) = conn
        .open_bi()
        .await
        .map_err(|e| RingError::transport_with_source("open mesh hello stream", e))?;
    write_message(&mut send, &RingMessage::MeshHello { rank }).await?;
    send.finish()
        .map_err(|e| RingError::transport_with_source("finish mesh hello", e))?;
    send.stopped().await.map_err(|e| RingError::ConnectionFailed {
        rank: peer,
        reason: format!("mesh hello not acknowledged: {e}"),
    })?;
    tracing::debug!(rank, peer, %addr, "dialed peer");
    Ok((peer, conn))
}

async fn accept_lower(
    listener: &TransportListener,
    rank: Rank,
) -> Result<Vec<(Rank, quinn::Connection)>> {
    let mut accepted: Vec<(Rank, quinn::Connection)> = Vec::with_capacity(rank as usize);
    while (accepted.len() as Rank) < rank {
        let conn = listener.accept().await?;
        let (_send, mut recv) = conn
            .accept_bi()
            .await
            .map_err(|e| RingError::transport_with_source("accept mesh hello stream", e))?;
        let peer = match read_message(&mut recv).await? {
            RingMessage::MeshHello { rank: peer } => peer,
            other => {
                return Err(RingError::DecodeFailed(format!(
                    "expected MeshHello, got {other:?}"
                )));
            }
        };
        if peer >= rank || accepted.iter().any(|(r, _)| *r == peer) {
            return Err(RingError::ConnectionFailed {
                rank: peer,
                reason: format!("unexpected mesh connection at rank {rank}"),
            });
        }
        tracing::debug!(rank, peer, "accepted peer");
        accepted.push((peer, conn));
    }
    Ok(accepted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::SeedNode;

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn test_single_worker_join() {
        let seed = SeedNode::bind(loopback(), 1).unwrap();
        let seed_addr = seed.local_addr();

        let (peers, worker) =
            tokio::join!(seed.form_cluster(), WorkerNode::connect(seed_addr, loopback()));

        let peers = peers.unwrap();
        let worker = worker.unwrap();
        assert_eq!(worker.rank, 0);
        assert_eq!(worker.world_size, 1);
        assert_eq!(worker.peers, peers);
    }

    #[tokio::test]
    async fn test_three_workers_form_mesh() {
        let seed = SeedNode::bind(loopback(), 3).unwrap();
        let seed_addr = seed.local_addr();
        let seed_handle = tokio::spawn(async move { seed.form_cluster().await });

        let handles: Vec<_> = (0..3)
            .map(|_| {
                tokio::spawn(async move {
                    let w = WorkerNode::connect(seed_addr, loopback()).await?;
                    w.form_mesh().await
                })
            })
            .collect();

        let peers = seed_handle.await.unwrap().unwrap();
        assert_eq!(peers.len(), 3);

        let mut ranks = Vec::new();
        for h in handles {
            let (rank, world_size, _listener, conns) = h.await.unwrap().unwrap();
            assert_eq!(world_size, 3);
            assert_eq!(conns.len(), 2);
            assert!(!conns.contains_key(&rank));
            ranks.push(rank);
        }
        ranks.sort();
        assert_eq!(ranks, vec![0, 1, 2]);
    }
}
