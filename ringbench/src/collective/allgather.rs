use crate::client::RingClient;
use crate::error::{Result, RingError};
use crate::types::{TagKind, reserved_tag};

/// Ring all-gather of equal-sized byte blocks.
///
/// Every rank contributes `data`; on return every rank holds all blocks
/// concatenated in rank order. Runs `N - 1` steps: in step `s`, rank `i`
/// forwards block `(i - s) mod N` to its right neighbor and receives block
/// `(i - s - 1) mod N` from its left neighbor.
pub async fn ring_allgather(client: &RingClient, data: &[u8]) -> Result<Vec<u8>> {
    let world = client.world_size() as usize;
    let rank = client.rank() as usize;
    let block = data.len();

    let mut out = vec![0u8; block * world];
    out[rank * block..(rank + 1) * block].copy_from_slice(data);
    if world == 1 {
        return Ok(out);
    }

    let seq = client.next_collective_seq();
    let right = ((rank + 1) % world) as u32;
    let left = ((rank + world - 1) % world) as u32;

    for step in 0..world - 1 {
        let tag = reserved_tag(TagKind::AllGather, seq, step as u16);
        let send_idx = (rank + world - step) % world;
        let recv_idx = (rank + world - step - 1) % world;

        let outgoing = &out[send_idx * block..(send_idx + 1) * block];
        let (sent, received) = tokio::join!(
            client.send_bytes(right, tag, outgoing),
            client.recv_bytes(left, tag)
        );
        sent.map_err(|e| failed(right, e))?;
        let received = received.map_err(|e| failed(left, e))?;

        if received.len() != block {
            return Err(RingError::BufferSizeMismatch {
                expected: block,
                actual: received.len(),
            });
        }
        out[recv_idx * block..(recv_idx + 1) * block].copy_from_slice(&received);
    }

    Ok(out)
}

fn failed(rank: u32, e: RingError) -> RingError {
    RingError::CollectiveFailed {
        operation: "allgather",
        rank,
        reason: e.to_string(),
    }
}
