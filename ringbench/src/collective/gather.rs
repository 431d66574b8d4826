use crate::client::RingClient;
use crate::error::{Result, RingError};
use crate::types::{Rank, Tag};

/// Gather one block per rank at `root`, strictly in ascending rank order.
///
/// Non-root ranks send `data` to root under `tag` and get `None`. Root walks
/// ranks `0..N`: it takes its own block locally and does a blocking receive
/// for every other rank before moving on, so `on_block` sees ranks in order.
/// Blocks may differ in size.
pub async fn gather_ordered<F>(
    client: &RingClient,
    data: &[u8],
    root: Rank,
    tag: Tag,
    mut on_block: F,
) -> Result<Option<Vec<Vec<u8>>>>
where
    F: FnMut(Rank, &[u8]) -> Result<()>,
{
    client.check_rank(root)?;
    let rank = client.rank();

    if rank != root {
        client
            .send_bytes(root, tag, data)
            .await
            .map_err(|e| failed(root, e))?;
        return Ok(None);
    }

    let world = client.world_size();
    let mut blocks = Vec::with_capacity(world as usize);
    for src in 0..world {
        let block = if src == root {
            data.to_vec()
        } else {
            client
                .recv_bytes(src, tag)
                .await
                .map_err(|e| failed(src, e))?
                .to_vec()
        };
        on_block(src, &block)?;
        blocks.push(block);
    }
    Ok(Some(blocks))
}

fn failed(rank: Rank, e: RingError) -> RingError {
    RingError::CollectiveFailed {
        operation: "gather",
        rank,
        reason: e.to_string(),
    }
}
