//! Rotating partner schedule.

use crate::error::{Result, RingError};
use crate::types::{RESERVED_TAG_BIT, Rank, Tag};

/// The two neighbors a rank exchanges with at one ring distance.
///
/// `up = (N + rank + distance) mod N`, `down = (N + rank - distance) mod N`.
/// At distance 0 both are the rank itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RingPair {
    pub distance: u32,
    pub up: Rank,
    pub down: Rank,
}

impl RingPair {
    /// Compute and range-check the pair for `rank` at `distance`.
    pub fn compute(world_size: u32, rank: Rank, distance: u32) -> Result<Self> {
        if rank >= world_size {
            return Err(RingError::InvalidRank { rank, world_size });
        }
        let n = i64::from(world_size);
        let r = i64::from(rank);
        let d = i64::from(distance);

        let up = check_partner((n + r + d) % n, world_size, rank, distance)?;
        let down = check_partner((n + r - d) % n, world_size, rank, distance)?;
        Ok(Self { distance, up, down })
    }

    /// Both neighbors are `rank` itself: the exchange is a loopback.
    pub fn is_self_pair(&self, rank: Rank) -> bool {
        self.up == rank && self.down == rank
    }

    /// Whether `source` is one of this pair's neighbors.
    pub fn contains(&self, source: Rank) -> bool {
        source == self.up || source == self.down
    }
}

fn check_partner(partner: i64, world_size: u32, rank: Rank, distance: u32) -> Result<Rank> {
    if (0..i64::from(world_size)).contains(&partner) {
        Ok(partner as Rank)
    } else {
        Err(RingError::ScheduleOutOfRange {
            rank,
            distance,
            partner,
            world_size,
        })
    }
}

/// Pairs for `distance = 0 .. N-1`, in order. Every rank iterates the same
/// distances in the same order, so all ranks agree on who talks to whom.
pub fn ring_schedule(world_size: u32, rank: Rank) -> impl Iterator<Item = Result<RingPair>> {
    (0..world_size).map(move |d| RingPair::compute(world_size, rank, d))
}

/// Tag for one transfer: `repetition * N + distance`.
///
/// Unique per (repetition, distance) and always below the reserved range.
pub fn transfer_tag(repetition: usize, world_size: u32, distance: u32) -> Result<Tag> {
    (repetition as u64)
        .checked_mul(u64::from(world_size))
        .and_then(|t| t.checked_add(u64::from(distance)))
        .filter(|&t| t < RESERVED_TAG_BIT)
        .ok_or(RingError::TagOverflow {
            repetition,
            distance,
            world_size,
        })
}
