//! The ring benchmark: schedule, timed transfers, aggregation.

pub mod aggregate;
pub mod buffer;
pub mod round;
pub mod schedule;
pub mod sweep;
pub mod timing;

pub use aggregate::{
    CollectiveGather, GlobalExtremes, RootGather, SweepReport, TimingAggregator, TimingMatrix,
    aggregator_for,
};
pub use buffer::{ElementType, TransferBuffer};
pub use round::{RoundBuffers, TransferRound};
pub use schedule::{RingPair, ring_schedule, transfer_tag};
pub use sweep::run_sweep;
pub use timing::{DistanceSummary, SweepTimings};

use crate::client::RingClient;
use crate::config::BenchConfig;
use crate::error::Result;
use crate::report::{self, ReportInput};
use crate::topology::{self, Topology};
use tracing::info;

/// What one rank holds after a run.
#[derive(Debug)]
pub struct BenchOutcome {
    pub topology: Topology,
    pub timings: SweepTimings,
    /// Present on every rank holding the full matrix.
    pub sweep: Option<SweepReport>,
    /// The rendered report, on the report rank only.
    pub report: Option<String>,
}

/// Run discovery, the full sweep and aggregation on this rank.
/// Collective: every rank calls it with the same configuration.
pub async fn run_benchmark(
    client: &RingClient,
    config: &BenchConfig,
    hostname: &str,
) -> Result<BenchOutcome> {
    let rank = client.rank();
    let world_size = client.world_size();
    config.validate(world_size)?;

    let topology = topology::discover(client, hostname).await?;
    let started_at = chrono::Local::now();
    let is_root = rank == config.root;
    if is_root {
        info!(
            world_size,
            unique_hosts = topology.unique_hosts.len(),
            bufsize = config.bufsize(),
            nrep = config.nrep,
            aggregation = %config.aggregation,
            "starting ring sweep"
        );
    }

    let timings = run_sweep(client, config).await?;
    let sweep = aggregator_for(config).aggregate(client, &timings).await?;

    let report = match (&sweep, is_root) {
        (Some(sweep), true) => {
            info!(
                t_min = sweep.extremes.t_min,
                t_max = sweep.extremes.t_max,
                "sweep complete"
            );
            Some(report::render(&ReportInput {
                started_at,
                program: &report::program_name(),
                rank,
                world_size,
                timer_resolution: report::timer_resolution(),
                topology: &topology,
                bufcnt: config.bufcnt,
                bufsize: config.bufsize(),
                distances: timings.distances(),
                sweep,
            }))
        }
        _ => None,
    };

    Ok(BenchOutcome {
        topology,
        timings,
        sweep,
        report,
    })
}
