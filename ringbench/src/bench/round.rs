//! One ring distance: `nrep` timed bidirectional exchanges.

use crate::bench::buffer::{TransferBuffer, first_mismatch};
use crate::bench::schedule::{RingPair, transfer_tag};
use crate::bench::timing::SweepTimings;
use crate::client::{Completion, RingClient, wait_any};
use crate::error::{Result, RingError};
use std::time::Instant;
use tracing::trace;

/// Send payload plus the two receive buffers reused across repetitions.
#[derive(Debug)]
pub struct RoundBuffers {
    send: TransferBuffer,
    recv: [Vec<u8>; 2],
}

impl RoundBuffers {
    pub fn new(send: TransferBuffer) -> Self {
        let recv = [send.receive_buffer(), send.receive_buffer()];
        Self { send, recv }
    }

    pub fn send(&self) -> &TransferBuffer {
        &self.send
    }
}

/// The exchange this rank performs with its two neighbors at one distance.
pub struct TransferRound<'a> {
    client: &'a RingClient,
    pair: RingPair,
}

impl<'a> TransferRound<'a> {
    pub fn new(client: &'a RingClient, pair: RingPair) -> Self {
        Self { client, pair }
    }

    /// Run `nrep` repetitions.
    ///
    /// Each repetition sends to both neighbors, receives from both, and
    /// charges the elapsed time at each receive completion to the rank the
    /// message actually came from. The full repetition time (both sends
    /// included) feeds the local extremes and the distance average.
    pub async fn run(
        &self,
        nrep: usize,
        buffers: &mut RoundBuffers,
        timings: &mut SweepTimings,
    ) -> Result<()> {
        let world_size = self.client.world_size();
        let RingPair { distance, up, down } = self.pair;

        for rep in 0..nrep {
            let tag = transfer_tag(rep, world_size, distance)?;
            let buf_down = std::mem::take(&mut buffers.recv[0]);
            let buf_up = std::mem::take(&mut buffers.recv[1]);

            let start = Instant::now();

            let send_up = self.client.isend(up, tag, buffers.send.payload())?;
            let send_down = self.client.isend(down, tag, buffers.send.payload())?;
            let recv_down = self.client.irecv(down, tag, buf_down)?;
            let recv_up = self.client.irecv(up, tag, buf_up)?;

            let (_, first, mut rest) = wait_any(vec![recv_down, recv_up]).await?;
            self.check_source(&first)?;
            timings.attribute(first.source, start.elapsed())?;

            let remaining = rest.pop().ok_or(RingError::NoPendingRequests)?;
            let second = remaining.await?;
            self.check_source(&second)?;
            timings.attribute(second.source, start.elapsed())?;

            send_up.wait().await?;
            send_down.wait().await?;
            let elapsed = start.elapsed();
            timings.record_repetition(elapsed);

            trace!(
                rank = self.client.rank(),
                distance,
                rep,
                first = first.source,
                elapsed_us = elapsed.as_micros() as u64,
                "repetition done"
            );

            self.validate(&buffers.send, &first, rep)?;
            self.validate(&buffers.send, &second, rep)?;

            // Both buffers have the same size, so slot order does not matter.
            buffers.recv = [first.buf, second.buf];
        }
        Ok(())
    }

    fn check_source(&self, done: &Completion) -> Result<()> {
        if self.pair.contains(done.source) {
            Ok(())
        } else {
            Err(RingError::UnexpectedSource {
                source_rank: done.source,
                up: self.pair.up,
                down: self.pair.down,
            })
        }
    }

    fn validate(&self, send: &TransferBuffer, done: &Completion, rep: usize) -> Result<()> {
        match first_mismatch(send.element(), &done.buf, done.source, send.count()) {
            None => Ok(()),
            Some(m) => Err(RingError::PayloadMismatch {
                sender: done.source,
                receiver: self.client.rank(),
                distance: self.pair.distance,
                repetition: rep,
                position: m.position,
                expected: m.expected,
                actual: m.actual,
            }),
        }
    }
}
