use crate::client::RingClient;
use crate::cluster::{SeedNode, WorkerNode};
use crate::error::{Result, RingError};
use std::net::SocketAddr;
use std::time::Duration;

impl RingClient {
    /// Bootstrap a cluster in this process: a seed plus `world_size`
    /// workers on loopback, each as a tokio task.
    ///
    /// Returns the clients sorted by rank.
    pub async fn bootstrap_local(world_size: u32) -> Result<Vec<RingClient>> {
        let loopback: SocketAddr = "127.0.0.1:0".parse().expect("hardcoded socket addr");
        let seed = SeedNode::bind(loopback, world_size)?;
        let seed_addr = seed.local_addr();

        let seed_handle = tokio::spawn(async move { seed.form_cluster().await });

        let worker_handles: Vec<_> = (0..world_size)
            .map(|_| tokio::spawn(RingClient::join(seed_addr, loopback)))
            .collect();

        seed_handle
            .await
            .map_err(|e| RingError::transport_with_source("seed task failed", e))??;

        let mut clients = Vec::with_capacity(world_size as usize);
        for h in worker_handles {
            clients.push(
                h.await
                    .map_err(|e| RingError::transport_with_source("worker task failed", e))??,
            );
        }
        clients.sort_by_key(|c| c.rank());
        Ok(clients)
    }

    /// Join a cluster through the seed at `seed_addr` and connect to every
    /// peer. The mesh endpoint is bound on `mesh_bind`.
    pub async fn join(seed_addr: SocketAddr, mesh_bind: SocketAddr) -> Result<RingClient> {
        Self::join_with_timeout(seed_addr, mesh_bind, Duration::from_secs(60)).await
    }

    /// Like [`join`](Self::join) with an explicit mesh formation timeout.
    pub async fn join_with_timeout(
        seed_addr: SocketAddr,
        mesh_bind: SocketAddr,
        formation_timeout: Duration,
    ) -> Result<RingClient> {
        let worker = WorkerNode::connect(seed_addr, mesh_bind)
            .await?
            .with_formation_timeout(formation_timeout);
        let (rank, world_size, listener, peers) = worker.form_mesh().await?;
        Ok(RingClient::new(rank, world_size, Some(listener), peers))
    }
}
