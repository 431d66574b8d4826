use crate::error::{Result, RingError};
use crate::protocol::RingMessage;
use crate::transport::{TransportListener, read_message, write_message};
use crate::types::{PROTOCOL_VERSION, Rank};
use std::net::SocketAddr;
use std::time::Duration;

/// The seed node orchestrates cluster formation.
///
/// It listens for incoming workers, assigns ranks in join order, and
/// distributes the peer table once every expected worker has joined. The
/// seed does not take part in the benchmark.
pub struct SeedNode {
    listener: TransportListener,
    expected_world_size: u32,
    formation_timeout: Duration,
}

/// A worker that said Hello and is waiting for its Welcome.
struct Joined {
    rank: Rank,
    mesh_addr: SocketAddr,
    conn: quinn::Connection,
    send: quinn::SendStream,
    recv: quinn::RecvStream,
}

impl SeedNode {
    pub fn bind(addr: SocketAddr, expected_world_size: u32) -> Result<Self> {
        if expected_world_size == 0 {
            return Err(RingError::Config("world size must be positive".into()));
        }
        let listener = TransportListener::bind(addr)?;
        Ok(Self {
            listener,
            expected_world_size,
            formation_timeout: Duration::from_secs(60),
        })
    }

    pub fn with_formation_timeout(mut self, timeout: Duration) -> Self {
        self.formation_timeout = timeout;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Wait for all expected workers to join and send each its Welcome.
    ///
    /// Returns the peer table that was distributed: `(rank, mesh address)`
    /// for every rank, in rank order.
    pub async fn form_cluster(&self) -> Result<Vec<(Rank, String)>> {
        let mut joined: Vec<Joined> = Vec::with_capacity(self.expected_world_size as usize);
        let deadline = tokio::time::Instant::now() + self.formation_timeout;

        while (joined.len() as u32) < self.expected_world_size {
            let rank = joined.len() as Rank;
            let worker = tokio::select! {
                result = self.accept_worker(rank) => result?,
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(RingError::ClusterFormationTimeout {
                        joined: rank,
                        expected: self.expected_world_size,
                    });
                }
            };

            tracing::info!(
                rank,
                mesh_addr = %worker.mesh_addr,
                "worker joined: {}/{}",
                rank + 1,
                self.expected_world_size
            );
            joined.push(worker);
        }

        let peers: Vec<(Rank, String)> = joined
            .iter()
            .map(|w| (w.rank, w.mesh_addr.to_string()))
            .collect();

        let welcomes = joined.into_iter().map(|w| {
            let peers = peers.clone();
            let world_size = self.expected_world_size;
            async move {
                let Joined {
                    rank,
                    conn,
                    mut send,
                    mut recv,
                    ..
                } = w;
                let welcome = RingMessage::Welcome {
                    rank,
                    world_size,
                    peers,
                };
                write_message(&mut send, &welcome).await?;
                send.finish()
                    .map_err(|e| RingError::transport_with_source("finish welcome", e))?;
                // The worker finishes its side once it has read the Welcome.
                recv.read_to_end(0)
                    .await
                    .map_err(|e| RingError::ConnectionFailed {
                        rank,
                        reason: format!("welcome not acknowledged: {e}"),
                    })?;
                conn.close(0u32.into(), b"welcome delivered");
                Ok::<_, RingError>(())
            }
        });
        futures::future::try_join_all(welcomes).await?;

        tracing::info!(world_size = self.expected_world_size, "cluster formed");
        Ok(peers)
    }

    async fn accept_worker(&self, rank: Rank) -> Result<Joined> {
        let conn = self.listener.accept().await?;

        let (send, mut recv) = conn
            .accept_bi()
            .await
            .map_err(|e| RingError::transport_with_source("accept bi from new worker", e))?;

        let mesh_port = match read_message(&mut recv).await? {
            RingMessage::Hello {
                protocol_version,
                mesh_port,
            } => {
                if protocol_version != PROTOCOL_VERSION {
                    return Err(RingError::ProtocolMismatch {
                        local: PROTOCOL_VERSION,
                        remote: protocol_version,
                    });
                }
                mesh_port
            }
            other => {
                return Err(RingError::DecodeFailed(format!(
                    "expected Hello, got {other:?}"
                )));
            }
        };

        let mesh_addr = SocketAddr::new(conn.remote_address().ip(), mesh_port);
        Ok(Joined {
            rank,
            mesh_addr,
            conn,
            send,
            recv,
        })
    }
}
