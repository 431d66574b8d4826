use crate::client::RingClient;
use crate::collective::allgather::ring_allgather;
use crate::error::{Result, RingError};
use crate::types::ReduceOp;

/// All-reduce of a single `f64`.
///
/// Gathers every rank's value and folds them in rank order, so every rank
/// computes the bit-identical result.
pub async fn allreduce_f64(client: &RingClient, value: f64, op: ReduceOp) -> Result<f64> {
    let gathered = ring_allgather(client, &value.to_le_bytes()).await?;
    fold_le_f64(&gathered, op)
}

fn fold_le_f64(bytes: &[u8], op: ReduceOp) -> Result<f64> {
    bytes
        .chunks_exact(8)
        .map(|c| {
            let arr: [u8; 8] = c
                .try_into()
                .map_err(|_| RingError::DecodeFailed("f64 chunk".into()))?;
            Ok(f64::from_le_bytes(arr))
        })
        .reduce(|acc, v| Ok(op.apply(acc?, v?)))
        .unwrap_or_else(|| Err(RingError::DecodeFailed("empty all-reduce input".into())))
}
