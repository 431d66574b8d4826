//! The distance sweep: every rank walks the ring schedule in lockstep.

use crate::bench::buffer::{ElementType, TransferBuffer};
use crate::bench::round::{RoundBuffers, TransferRound};
use crate::bench::schedule::ring_schedule;
use crate::bench::timing::SweepTimings;
use crate::client::RingClient;
use crate::config::BenchConfig;
use crate::error::Result;
use tracing::debug;

/// Measure every ring distance `0..N` and return this rank's timings.
///
/// All ranks enter a barrier before each distance, so no rank starts
/// distance `d + 1` while another is still sending at distance `d`.
pub async fn run_sweep(client: &RingClient, config: &BenchConfig) -> Result<SweepTimings> {
    let world_size = client.world_size();
    let rank = client.rank();
    let element = ElementType::from_itemsize(config.itemsize)?;
    let mut buffers = RoundBuffers::new(TransferBuffer::for_rank(rank, element, config.bufcnt));
    let mut timings = SweepTimings::new(world_size, config.nrep);

    debug!(
        rank,
        world_size,
        bytes = buffers.send().len_bytes(),
        %element,
        nrep = config.nrep,
        "starting sweep"
    );

    for pair in ring_schedule(world_size, rank) {
        let pair = pair?;
        client.barrier().await?;

        TransferRound::new(client, pair)
            .run(config.nrep, &mut buffers, &mut timings)
            .await?;

        let summary = timings.finish_distance(pair);
        debug!(
            rank,
            distance = pair.distance,
            up = pair.up,
            down = pair.down,
            avg_secs = summary.avg_elapsed,
            "distance done"
        );
    }

    Ok(timings)
}
