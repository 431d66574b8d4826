//! Benchmark parameters.
//!
//! All values have defaults matching the reference run. Override via
//! environment variables (prefixed `RINGBENCH_`) or by constructing a custom
//! `BenchConfig`.

use crate::error::{Result, RingError};
use crate::transport::router::MAX_MESSAGE_SIZE;
use crate::types::Rank;
use std::str::FromStr;
use std::time::Duration;

/// How per-rank timing rows are combined into the global matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregationStrategy {
    /// One all-gather; every rank ends up with the full matrix.
    Collective,
    /// Non-root ranks send their row to the root, which collects them in
    /// ascending rank order.
    Root,
}

impl AggregationStrategy {
    pub const fn name(self) -> &'static str {
        match self {
            AggregationStrategy::Collective => "collective",
            AggregationStrategy::Root => "root",
        }
    }
}

impl std::fmt::Display for AggregationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AggregationStrategy {
    type Err = RingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "collective" | "allgather" => Ok(AggregationStrategy::Collective),
            "root" | "gather" | "p2p" => Ok(AggregationStrategy::Root),
            other => Err(RingError::Config(format!(
                "unknown aggregation strategy {other:?} (expected \"collective\" or \"root\")"
            ))),
        }
    }
}

/// Parameters of one benchmark run.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Elements per transfer.
    pub bufcnt: usize,

    /// Bytes per element. One of 1, 2, 4 or 8.
    pub itemsize: usize,

    /// Timed repetitions per ring distance.
    pub nrep: usize,

    /// How the timing matrix is assembled.
    pub aggregation: AggregationStrategy,

    /// The rank that prints the report (and collects rows for
    /// [`AggregationStrategy::Root`]).
    pub root: Rank,

    /// How long the seed waits for all workers to join.
    pub formation_timeout: Duration,

    /// Overrides the host name reported by this worker.
    pub hostname: Option<String>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            bufcnt: 1000 * 1000,
            itemsize: 4,
            nrep: 10,
            aggregation: AggregationStrategy::Collective,
            root: 0,
            formation_timeout: Duration::from_secs(60),
            hostname: None,
        }
    }
}

impl BenchConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Recognized variables:
    /// - `RINGBENCH_BUFCNT`
    /// - `RINGBENCH_ITEMSIZE`
    /// - `RINGBENCH_NREP`
    /// - `RINGBENCH_AGGREGATION` (`collective` or `root`)
    /// - `RINGBENCH_ROOT`
    /// - `RINGBENCH_FORMATION_TIMEOUT_SECS`
    /// - `RINGBENCH_HOSTNAME`
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("RINGBENCH_BUFCNT") {
            if let Ok(n) = v.parse::<usize>() {
                cfg.bufcnt = n;
            }
        }
        if let Ok(v) = std::env::var("RINGBENCH_ITEMSIZE") {
            if let Ok(n) = v.parse::<usize>() {
                cfg.itemsize = n;
            }
        }
        if let Ok(v) = std::env::var("RINGBENCH_NREP") {
            if let Ok(n) = v.parse::<usize>() {
                cfg.nrep = n;
            }
        }
        if let Ok(v) = std::env::var("RINGBENCH_AGGREGATION") {
            match v.parse::<AggregationStrategy>() {
                Ok(s) => cfg.aggregation = s,
                Err(e) => tracing::warn!("ignoring RINGBENCH_AGGREGATION: {e}"),
            }
        }
        if let Ok(v) = std::env::var("RINGBENCH_ROOT") {
            if let Ok(r) = v.parse::<Rank>() {
                cfg.root = r;
            }
        }
        if let Ok(v) = std::env::var("RINGBENCH_FORMATION_TIMEOUT_SECS") {
            if let Ok(s) = v.parse::<u64>() {
                cfg.formation_timeout = Duration::from_secs(s);
            }
        }
        if let Ok(v) = std::env::var("RINGBENCH_HOSTNAME") {
            if !v.is_empty() {
                cfg.hostname = Some(v);
            }
        }

        cfg
    }

    /// Bytes per transfer: `bufcnt * itemsize`.
    pub fn bufsize(&self) -> usize {
        self.bufcnt * self.itemsize
    }

    /// Reject parameter combinations the engine cannot run with.
    pub fn validate(&self, world_size: u32) -> Result<()> {
        if self.bufcnt == 0 {
            return Err(RingError::Config("bufcnt must be positive".into()));
        }
        if self.nrep == 0 {
            return Err(RingError::Config("nrep must be positive".into()));
        }
        if !matches!(self.itemsize, 1 | 2 | 4 | 8) {
            return Err(RingError::Config(format!(
                "itemsize must be 1, 2, 4 or 8 bytes, got {}",
                self.itemsize
            )));
        }
        match self.bufcnt.checked_mul(self.itemsize) {
            None => {
                return Err(RingError::Config(format!(
                    "bufcnt {} x itemsize {} overflows",
                    self.bufcnt, self.itemsize
                )));
            }
            Some(bufsize) if bufsize as u64 > MAX_MESSAGE_SIZE => {
                return Err(RingError::Config(format!(
                    "bufsize {bufsize} exceeds the {MAX_MESSAGE_SIZE}-byte message limit"
                )));
            }
            Some(_) => {}
        }
        if self.root >= world_size {
            return Err(RingError::InvalidRank {
                rank: self.root,
                world_size,
            });
        }
        Ok(())
    }
}
