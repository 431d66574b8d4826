//! Combine per-rank timing rows into the global matrix.

use crate::bench::timing::SweepTimings;
use crate::client::RingClient;
use crate::collective::gather_ordered;
use crate::config::{AggregationStrategy, BenchConfig};
use crate::error::{Result, RingError};
use crate::types::{Rank, ReduceOp, TIMING_ROW_TAG};
use async_trait::async_trait;
use std::time::Instant;
use tracing::debug;

/// `N x N` average receive-completion times.
///
/// Stored by receiver: `receive_time(j, i)` is how long rank `j` spent, on
/// average, completing receives from rank `i`. Rows must be pushed in
/// ascending receiver order.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingMatrix {
    world_size: u32,
    rows: Vec<Vec<f64>>,
}

impl TimingMatrix {
    pub fn new(world_size: u32) -> Self {
        Self {
            world_size,
            rows: Vec::with_capacity(world_size as usize),
        }
    }

    /// Append the row measured by `receiver`.
    pub fn push_row(&mut self, receiver: Rank, row: Vec<f64>) -> Result<()> {
        let expected = self.rows.len() as Rank;
        if receiver != expected || expected >= self.world_size {
            return Err(RingError::RowOutOfOrder {
                expected,
                got: receiver,
            });
        }
        if row.len() != self.world_size as usize {
            return Err(RingError::BufferSizeMismatch {
                expected: self.world_size as usize,
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn world_size(&self) -> u32 {
        self.world_size
    }

    pub fn is_complete(&self) -> bool {
        self.rows.len() == self.world_size as usize
    }

    /// Average time `receiver` spent completing receives from `sender`.
    pub fn receive_time(&self, receiver: Rank, sender: Rank) -> Option<f64> {
        self.rows
            .get(receiver as usize)?
            .get(sender as usize)
            .copied()
    }

    /// What every rank spent receiving from `sender`, indexed by receiver.
    /// This is the row printed for `sender` in the report.
    pub fn sender_row(&self, sender: Rank) -> Vec<f64> {
        self.rows
            .iter()
            .filter_map(|row| row.get(sender as usize).copied())
            .collect()
    }
}

/// Little-endian `f64` encoding of a timing row.
pub fn encode_row(row: &[f64]) -> Vec<u8> {
    row.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn decode_row(bytes: &[u8]) -> Result<Vec<f64>> {
    if bytes.len() % 8 != 0 {
        return Err(RingError::DecodeFailed(format!(
            "timing row of {} bytes is not a whole number of f64 values",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(8)
        .map(|c| {
            let mut le = [0u8; 8];
            le.copy_from_slice(c);
            f64::from_le_bytes(le)
        })
        .collect())
}

/// Fastest and slowest single repetition across all ranks, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalExtremes {
    pub t_min: f64,
    pub t_max: f64,
}

impl GlobalExtremes {
    /// Reduce every rank's local extremes. Collective: all ranks call it.
    pub async fn reduce(client: &RingClient, timings: &SweepTimings) -> Result<Self> {
        let t_max = client.all_reduce_f64(timings.local_max(), ReduceOp::Max).await?;
        let t_min = client.all_reduce_f64(timings.local_min(), ReduceOp::Min).await?;
        Ok(Self { t_min, t_max })
    }
}

/// The aggregated outcome of a sweep, held by the report rank.
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub matrix: TimingMatrix,
    pub extremes: GlobalExtremes,
    /// Wall time of the gather itself, in seconds.
    pub gather_elapsed: f64,
    pub strategy: AggregationStrategy,
}

/// A way of turning per-rank rows into a [`SweepReport`].
///
/// Every rank calls `aggregate` with its own timings. Ranks that end up
/// holding the full matrix get `Some`.
#[async_trait]
pub trait TimingAggregator: Send + Sync {
    fn strategy(&self) -> AggregationStrategy;

    async fn aggregate(
        &self,
        client: &RingClient,
        timings: &SweepTimings,
    ) -> Result<Option<SweepReport>>;
}

/// One all-gather of every row; every rank builds the whole matrix.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectiveGather;

#[async_trait]
impl TimingAggregator for CollectiveGather {
    fn strategy(&self) -> AggregationStrategy {
        AggregationStrategy::Collective
    }

    async fn aggregate(
        &self,
        client: &RingClient,
        timings: &SweepTimings,
    ) -> Result<Option<SweepReport>> {
        let world_size = client.world_size();
        let row = encode_row(&timings.averaged_row());

        let start = Instant::now();
        let all = client.all_gather(&row).await?;
        let gather_elapsed = start.elapsed().as_secs_f64();

        let mut matrix = TimingMatrix::new(world_size);
        for (receiver, block) in all.chunks_exact(row.len()).enumerate() {
            matrix.push_row(receiver as Rank, decode_row(block)?)?;
        }

        let extremes = GlobalExtremes::reduce(client, timings).await?;
        Ok(Some(SweepReport {
            matrix,
            extremes,
            gather_elapsed,
            strategy: self.strategy(),
        }))
    }
}

/// Point-to-point gather of rows to `root`, received in ascending rank
/// order. Only root builds the matrix.
#[derive(Debug, Clone, Copy)]
pub struct RootGather {
    pub root: Rank,
}

#[async_trait]
impl TimingAggregator for RootGather {
    fn strategy(&self) -> AggregationStrategy {
        AggregationStrategy::Root
    }

    async fn aggregate(
        &self,
        client: &RingClient,
        timings: &SweepTimings,
    ) -> Result<Option<SweepReport>> {
        let world_size = client.world_size();
        let row = encode_row(&timings.averaged_row());
        let mut matrix = TimingMatrix::new(world_size);

        let start = Instant::now();
        let gathered = gather_ordered(client, &row, self.root, TIMING_ROW_TAG, |src, block| {
            debug!(root = self.root, row = src, "timing row received");
            matrix.push_row(src, decode_row(block)?)
        })
        .await?;
        let gather_elapsed = start.elapsed().as_secs_f64();

        let extremes = GlobalExtremes::reduce(client, timings).await?;
        Ok(gathered.map(|_| SweepReport {
            matrix,
            extremes,
            gather_elapsed,
            strategy: self.strategy(),
        }))
    }
}

/// Pick the aggregator named by the configuration.
pub fn aggregator_for(config: &BenchConfig) -> Box<dyn TimingAggregator> {
    match config.aggregation {
        AggregationStrategy::Collective => Box::new(CollectiveGather),
        AggregationStrategy::Root => Box::new(RootGather { root: config.root }),
    }
}
