use crate::client::RingClient;
use crate::error::{Result, RingError};
use crate::protocol::RingMessage;
use crate::types::{Rank, TagKind, reserved_tag};

/// Threshold: use two-phase barrier for small worlds, dissemination for larger.
const DISSEMINATION_THRESHOLD: u32 = 5;

/// Barrier: returns once every rank has reached this point.
///
/// - `two_phase_barrier` for world_size <= 4 (lower constant overhead)
/// - `dissemination_barrier` for world_size >= 5 (O(log N) rounds, no coordinator)
///
/// There is no timeout: a rank that never arrives blocks everyone.
pub async fn barrier(client: &RingClient) -> Result<()> {
    barrier_at(client, client.next_barrier_epoch()).await
}

/// Barrier for an epoch the caller already reserved.
pub(crate) async fn barrier_at(client: &RingClient, epoch: u64) -> Result<()> {
    let world = client.world_size();
    if world <= 1 {
        return Ok(());
    }

    if world < DISSEMINATION_THRESHOLD {
        two_phase_barrier(client, epoch).await
    } else {
        dissemination_barrier(client, epoch).await
    }
}

fn failed(rank: Rank, e: RingError) -> RingError {
    RingError::CollectiveFailed {
        operation: "barrier",
        rank,
        reason: e.to_string(),
    }
}

async fn send_token(client: &RingClient, to: Rank, epoch: u64, round: u16) -> Result<()> {
    client
        .peer(to)?
        .send_message(&RingMessage::Barrier { epoch, round })
        .await
        .map_err(|e| failed(to, e))
}

async fn recv_token(client: &RingClient, from: Rank, epoch: u64, round: u16) -> Result<()> {
    client
        .recv_bytes(from, reserved_tag(TagKind::Barrier, epoch, round))
        .await
        .map(drop)
        .map_err(|e| failed(from, e))
}

/// Two-phase barrier: every rank reports to rank 0 (round 0), rank 0
/// releases everyone (round 1).
async fn two_phase_barrier(client: &RingClient, epoch: u64) -> Result<()> {
    let world = client.world_size();

    if client.rank() == 0 {
        for r in 1..world {
            recv_token(client, r, epoch, 0).await?;
        }
        for r in 1..world {
            send_token(client, r, epoch, 1).await?;
        }
    } else {
        send_token(client, 0, epoch, 0).await?;
        recv_token(client, 0, epoch, 1).await?;
    }
    Ok(())
}

/// Dissemination barrier: O(log N) rounds, no single coordinator.
///
/// In round r, rank i sends to rank `(i + 2^r) % N` and receives from
/// rank `(i - 2^r + N) % N`. After `ceil(log2(N))` rounds, every rank
/// has transitively heard from every other rank.
async fn dissemination_barrier(client: &RingClient, epoch: u64) -> Result<()> {
    let rank = client.rank();
    let world = client.world_size();

    let mut round: u16 = 0;
    let mut distance: u32 = 1;
    while distance < world {
        let send_to = (rank + distance) % world;
        let recv_from = (rank + world - distance) % world;

        let (sent, received) = tokio::join!(
            send_token(client, send_to, epoch, round),
            recv_token(client, recv_from, epoch, round)
        );
        sent?;
        received?;

        round += 1;
        distance <<= 1;
    }
    Ok(())
}
