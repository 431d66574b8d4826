use crate::error::Result;
use crate::protocol::RingMessage;
use crate::protocol::codec::decode_message;
use crate::transport::buffer_pool::{BufferPool, PooledBuf};
use crate::transport::connection::{STREAM_KIND_FRAMED, STREAM_KIND_TAGGED};
use crate::transport::mailbox::Mailbox;
use crate::types::{Rank, TagKind, reserved_tag};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Maximum number of concurrent in-flight stream handler tasks per peer.
const MAX_CONCURRENT_STREAMS: usize = 512;

/// Largest payload the router accepts on a single stream (4 GiB).
pub(crate) const MAX_MESSAGE_SIZE: u64 = 4 * 1024 * 1024 * 1024;

/// Receive side of one peer connection.
///
/// Runs a single `accept_uni` loop and spawns a task per stream. Tagged
/// streams land in the mailbox under their tag; framed barrier tokens are
/// translated into reserved barrier tags so collectives can wait on them
/// the same way. When the connection ends, or a tagged payload cannot be
/// read in full, the peer is marked disconnected in the mailbox.
pub struct PeerRouter {
    rank: Rank,
    mailbox: Arc<Mailbox>,
    pool: Arc<BufferPool>,
}

impl PeerRouter {
    /// Spawn the receive loop for `conn`, which belongs to peer `rank`.
    pub fn spawn(
        rank: Rank,
        conn: quinn::Connection,
        mailbox: Arc<Mailbox>,
        pool: Arc<BufferPool>,
    ) -> tokio::task::JoinHandle<Result<()>> {
        let router = Arc::new(Self {
            rank,
            mailbox,
            pool,
        });
        tokio::spawn(router.accept_loop(conn))
    }

    async fn accept_loop(self: Arc<Self>, conn: quinn::Connection) -> Result<()> {
        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_STREAMS));

        loop {
            let stream = match conn.accept_uni().await {
                Ok(s) => s,
                Err(e) => {
                    tracing::debug!(rank = self.rank, "router: connection ended: {e}");
                    return self.mailbox.disconnect(self.rank);
                }
            };

            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                return Ok(());
            };

            let router = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = router.handle_stream(stream).await {
                    tracing::error!(rank = router.rank, "router: delivery failed: {e}");
                }
                drop(permit);
            });
        }
    }

    /// Read one stream and hand its content to the mailbox.
    async fn handle_stream(&self, mut stream: quinn::RecvStream) -> Result<()> {
        let mut kind = [0u8; 1];
        if stream.read_exact(&mut kind).await.is_err() {
            tracing::warn!(rank = self.rank, "router: failed to read stream kind");
            return Ok(());
        }

        match kind[0] {
            STREAM_KIND_FRAMED => {
                let Some(buf) = self.read_length_prefixed(&mut stream, "framed").await else {
                    return Ok(());
                };
                match decode_message(&buf) {
                    Ok((_, msg)) => self.dispatch_framed(msg),
                    Err(e) => {
                        tracing::warn!(rank = self.rank, "router: framed decode failed: {e}");
                        Ok(())
                    }
                }
            }
            STREAM_KIND_TAGGED => {
                let mut tag_bytes = [0u8; 8];
                if stream.read_exact(&mut tag_bytes).await.is_err() {
                    tracing::warn!(rank = self.rank, "router: failed to read tag");
                    return self.mailbox.disconnect(self.rank);
                }
                let tag = u64::from_le_bytes(tag_bytes);
                // A lost tagged payload would leave its receive pending forever.
                let Some(buf) = self.read_length_prefixed(&mut stream, "tagged").await else {
                    return self.mailbox.disconnect(self.rank);
                };
                tracing::trace!(rank = self.rank, tag, len = buf.len(), "router: tagged payload");
                self.mailbox.deliver(self.rank, tag, buf)
            }
            other => {
                tracing::warn!(
                    rank = self.rank,
                    "router: unknown stream kind 0x{:02x}, skipping stream",
                    other
                );
                Ok(())
            }
        }
    }

    fn dispatch_framed(&self, msg: RingMessage) -> Result<()> {
        match msg {
            RingMessage::Barrier { epoch, round } => {
                let tag = reserved_tag(TagKind::Barrier, epoch, round);
                self.mailbox.deliver(self.rank, tag, self.pool.checkout(0))
            }
            other => {
                tracing::warn!(
                    rank = self.rank,
                    "router: unexpected {other:?} on mesh connection, discarding"
                );
                Ok(())
            }
        }
    }

    /// `None` if the stream ends early or announces more than
    /// [`MAX_MESSAGE_SIZE`] bytes.
    async fn read_length_prefixed(
        &self,
        stream: &mut quinn::RecvStream,
        label: &str,
    ) -> Option<PooledBuf> {
        let mut len_buf = [0u8; 8];
        if let Err(e) = stream.read_exact(&mut len_buf).await {
            tracing::warn!(rank = self.rank, "router: {label} length read failed: {e}");
            return None;
        }
        let len = u64::from_le_bytes(len_buf);
        if len > MAX_MESSAGE_SIZE {
            tracing::warn!(
                rank = self.rank,
                "router: {label} message too large ({len} bytes), skipping"
            );
            return None;
        }
        let mut buf = self.pool.checkout(len as usize);
        if let Err(e) = stream.read_exact(&mut buf).await {
            tracing::warn!(rank = self.rank, "router: {label} payload read failed: {e}");
            return None;
        }
        Some(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportListener;
    use std::time::Duration;

    async fn write_tagged_header(stream: &mut quinn::SendStream, tag: u64, len: u64) {
        stream.write_all(&[STREAM_KIND_TAGGED]).await.unwrap();
        stream.write_all(&tag.to_le_bytes()).await.unwrap();
        stream.write_all(&len.to_le_bytes()).await.unwrap();
    }

    #[tokio::test]
    async fn test_oversized_tagged_payload_disconnects_peer() {
        let a = TransportListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let b = TransportListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let (dialed, accepted) = tokio::join!(a.connect(b.local_addr(), 1), b.accept());
        let (dialed, accepted) = (dialed.unwrap(), accepted.unwrap());

        let mailbox = Arc::new(Mailbox::new());
        let small = mailbox.post(1, 7).unwrap();
        let large = mailbox.post(1, 8).unwrap();
        let _router = PeerRouter::spawn(1, accepted, Arc::clone(&mailbox), BufferPool::new());

        let mut stream = dialed.open_uni().await.unwrap();
        write_tagged_header(&mut stream, 7, 3).await;
        stream.write_all(b"abc").await.unwrap();
        stream.finish().unwrap();
        let delivered = tokio::time::timeout(Duration::from_secs(5), small)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&*delivered.payload, b"abc");

        let mut stream = dialed.open_uni().await.unwrap();
        write_tagged_header(&mut stream, 8, MAX_MESSAGE_SIZE + 1).await;
        stream.finish().unwrap();
        let dropped = tokio::time::timeout(Duration::from_secs(5), large)
            .await
            .unwrap();
        assert!(dropped.is_err());
        assert!(matches!(
            mailbox.post(1, 9),
            Err(crate::error::RingError::PeerDisconnected { rank: 1 })
        ));

        // The connection itself stays open; only the mailbox gave up on it.
        assert!(dialed.close_reason().is_none());
    }
}
