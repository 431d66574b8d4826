//! Collective operations exposed on the client.

use crate::collective::{self, CollectiveHandle};
use crate::error::Result;
use crate::types::ReduceOp;
use std::sync::Arc;

use super::RingClient;

impl RingClient {
    /// Block until every rank has called `barrier`.
    pub async fn barrier(&self) -> Result<()> {
        collective::barrier(self).await
    }

    /// Start a barrier in the background and return at once.
    ///
    /// Poll the handle with `is_finished()` to overlap the wait with other
    /// work, as when ranks keep stepping until everyone agrees to stop.
    pub fn barrier_nb(self: &Arc<Self>) -> CollectiveHandle {
        let client = Arc::clone(self);
        let epoch = self.next_barrier_epoch();
        CollectiveHandle::spawn(async move { collective::barrier::barrier_at(&client, epoch).await })
    }

    /// Gather `data` from every rank; the result holds all blocks in rank
    /// order. Every rank must pass the same number of bytes.
    pub async fn all_gather(&self, data: &[u8]) -> Result<Vec<u8>> {
        collective::ring_allgather(self, data).await
    }

    /// Combine one `f64` per rank with `op`; every rank gets the result.
    pub async fn all_reduce_f64(&self, value: f64, op: ReduceOp) -> Result<f64> {
        collective::allreduce_f64(self, value, op).await
    }
}
