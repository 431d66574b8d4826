//! Per-rank timing state for one sweep.

use crate::bench::schedule::RingPair;
use crate::error::{Result, RingError};
use crate::types::Rank;
use std::time::Duration;

/// Average repetition time at one ring distance, as seen by this rank.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceSummary {
    pub pair: RingPair,
    /// Mean over `nrep` repetitions, in seconds.
    pub avg_elapsed: f64,
}

/// Everything one rank measures during a sweep.
///
/// Created once per sweep, updated only by this rank's transfer rounds,
/// and read by the aggregator afterwards.
#[derive(Debug, Clone)]
pub struct SweepTimings {
    nrep: usize,
    /// Accumulated receive-completion time per source rank, in seconds.
    totals: Vec<f64>,
    attributions: Vec<usize>,
    local_min: f64,
    local_max: f64,
    distance_total: f64,
    distances: Vec<DistanceSummary>,
}

impl SweepTimings {
    pub fn new(world_size: u32, nrep: usize) -> Self {
        Self {
            nrep,
            totals: vec![0.0; world_size as usize],
            attributions: vec![0; world_size as usize],
            local_min: f64::INFINITY,
            local_max: 0.0,
            distance_total: 0.0,
            distances: Vec::with_capacity(world_size as usize),
        }
    }

    /// Charge `elapsed` to the rank a receive actually completed from.
    pub fn attribute(&mut self, source: Rank, elapsed: Duration) -> Result<()> {
        let world_size = self.totals.len() as u32;
        let idx = source as usize;
        let (Some(total), Some(count)) = (self.totals.get_mut(idx), self.attributions.get_mut(idx))
        else {
            return Err(RingError::InvalidRank {
                rank: source,
                world_size,
            });
        };
        *total += elapsed.as_secs_f64();
        *count += 1;
        Ok(())
    }

    /// Record one full repetition (both receives and both sends done).
    pub fn record_repetition(&mut self, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        self.local_min = self.local_min.min(secs);
        self.local_max = self.local_max.max(secs);
        self.distance_total += secs;
    }

    /// Close the current distance: average its repetitions and start the
    /// next one from zero.
    pub fn finish_distance(&mut self, pair: RingPair) -> DistanceSummary {
        let summary = DistanceSummary {
            pair,
            avg_elapsed: self.distance_total / self.nrep as f64,
        };
        self.distances.push(summary);
        self.distance_total = 0.0;
        summary
    }

    /// Per-source averages: every neighbor is charged twice per repetition
    /// over the sweep, so totals are divided by `2 * nrep`.
    pub fn averaged_row(&self) -> Vec<f64> {
        let denom = (2 * self.nrep) as f64;
        self.totals.iter().map(|t| t / denom).collect()
    }

    /// How many receive completions were charged to each source.
    pub fn attribution_counts(&self) -> &[usize] {
        &self.attributions
    }

    /// Fastest single repetition, in seconds.
    pub fn local_min(&self) -> f64 {
        self.local_min
    }

    /// Slowest single repetition, in seconds.
    pub fn local_max(&self) -> f64 {
        self.local_max
    }

    pub fn distances(&self) -> &[DistanceSummary] {
        &self.distances
    }

    pub fn world_size(&self) -> u32 {
        self.totals.len() as u32
    }
}
