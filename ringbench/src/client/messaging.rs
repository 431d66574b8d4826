//! Tagged point-to-point messaging.

use crate::client::request::{RecvRequest, SendRequest};
use crate::error::{Result, RingError};
use crate::transport::buffer_pool::PooledBuf;
use crate::types::{Rank, Tag};
use std::sync::Arc;

use super::RingClient;

impl RingClient {
    /// Start sending `payload` to `dest` under `tag`.
    ///
    /// A send to this client's own rank is delivered straight into the
    /// local mailbox and is complete on return. A send to a peer runs in
    /// the background on its own QUIC stream.
    pub fn isend(&self, dest: Rank, tag: Tag, payload: Arc<[u8]>) -> Result<SendRequest> {
        self.check_rank(dest)?;

        if dest == self.rank {
            let buf = PooledBuf::from_vec(payload.to_vec(), Arc::clone(&self.pool));
            self.mailbox.deliver(self.rank, tag, buf)?;
            return Ok(SendRequest::completed(dest, tag));
        }

        let peer = Arc::clone(self.peer(dest)?);
        let task = tokio::spawn(async move { peer.send_tagged(tag, &payload).await });
        Ok(SendRequest::pending(dest, tag, task))
    }

    /// Post a receive for the next message from `src` with `tag`.
    ///
    /// `buf` must be exactly the size of the expected message; it is handed
    /// back, filled, in the [`Completion`](crate::client::Completion).
    pub fn irecv(&self, src: Rank, tag: Tag, buf: Vec<u8>) -> Result<RecvRequest> {
        self.check_rank(src)?;
        let rx = self.mailbox.post(src, tag)?;
        Ok(RecvRequest::new(src, tag, rx, buf))
    }

    /// Send `data` to `dest` and wait for the send to complete.
    pub async fn send_bytes(&self, dest: Rank, tag: Tag, data: &[u8]) -> Result<()> {
        self.isend(dest, tag, Arc::from(data))?.wait().await
    }

    /// Receive the next message from `src` with `tag`, whatever its size.
    pub async fn recv_bytes(&self, src: Rank, tag: Tag) -> Result<PooledBuf> {
        self.check_rank(src)?;
        let rx = self.mailbox.post(src, tag)?;
        let delivery = rx
            .await
            .map_err(|_| RingError::PeerDisconnected { rank: src })?;
        Ok(delivery.payload)
    }
}
