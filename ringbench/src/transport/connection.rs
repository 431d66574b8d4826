use crate::error::{Result, RingError};
use crate::protocol::RingMessage;
use crate::protocol::codec::{decode_message, encode_message};
use crate::protocol::header::HEADER_SIZE;
use crate::types::{Rank, Tag};

/// First byte on every uni stream: tells the router how to read the rest.
pub(crate) const STREAM_KIND_FRAMED: u8 = 0x01;
pub(crate) const STREAM_KIND_TAGGED: u8 = 0x02;

/// The send side of a connection to one peer.
///
/// Every message goes out on its own QUIC uni stream. The peer's router
/// runs the matching `accept_uni` loop and feeds the mailbox.
///
/// ```text
/// framed: [0x01][len: u64 LE][header + rkyv payload]
/// tagged: [0x02][tag: u64 LE][len: u64 LE][payload]
/// ```
pub struct PeerConnection {
    pub rank: Rank,
    pub(crate) conn: quinn::Connection,
}

impl PeerConnection {
    pub fn new(rank: Rank, conn: quinn::Connection) -> Self {
        Self { rank, conn }
    }

    /// Send a control message on a framed uni stream.
    pub async fn send_message(&self, msg: &RingMessage) -> Result<()> {
        let buf = encode_message(msg)?;
        let mut stream = self.open().await?;
        write_all(&mut stream, &[STREAM_KIND_FRAMED], "stream kind").await?;
        write_all(&mut stream, &(buf.len() as u64).to_le_bytes(), "length").await?;
        write_all(&mut stream, &buf, "payload").await?;
        finish(stream)
    }

    /// Send a tagged payload on its own uni stream.
    pub async fn send_tagged(&self, tag: Tag, data: &[u8]) -> Result<()> {
        let mut stream = self.open().await?;
        write_all(&mut stream, &[STREAM_KIND_TAGGED], "stream kind").await?;
        write_all(&mut stream, &tag.to_le_bytes(), "tag").await?;
        write_all(&mut stream, &(data.len() as u64).to_le_bytes(), "length").await?;
        write_all(&mut stream, data, "payload").await?;
        finish(stream)
    }

    /// Close the QUIC connection. Pending streams are abandoned.
    pub fn close(&self) {
        self.conn.close(0u32.into(), b"shutdown");
    }

    async fn open(&self) -> Result<quinn::SendStream> {
        self.conn.open_uni().await.map_err(|e| RingError::ConnectionFailed {
            rank: self.rank,
            reason: format!("open uni stream: {e}"),
        })
    }
}

async fn write_all(stream: &mut quinn::SendStream, data: &[u8], what: &str) -> Result<()> {
    stream
        .write_all(data)
        .await
        .map_err(|e| RingError::transport_with_source(format!("write {what}"), e))
}

fn finish(mut stream: quinn::SendStream) -> Result<()> {
    stream
        .finish()
        .map_err(|e| RingError::transport_with_source("finish stream", e))
}

/// Write one framed message to a bootstrap stream (bi or uni).
pub(crate) async fn write_message(stream: &mut quinn::SendStream, msg: &RingMessage) -> Result<()> {
    let buf = encode_message(msg)?;
    write_all(stream, &buf, "framed message").await
}

/// Read one framed message from a bootstrap stream.
pub(crate) async fn read_message(stream: &mut quinn::RecvStream) -> Result<RingMessage> {
    let mut header_buf = [0u8; HEADER_SIZE];
    stream
        .read_exact(&mut header_buf)
        .await
        .map_err(|e| RingError::transport_with_source("read message header", e))?;
    let payload_len =
        u32::from_le_bytes([header_buf[0], header_buf[1], header_buf[2], header_buf[3]]) as usize;

    let mut full_buf = vec![0u8; HEADER_SIZE + payload_len];
    full_buf[..HEADER_SIZE].copy_from_slice(&header_buf);
    stream
        .read_exact(&mut full_buf[HEADER_SIZE..])
        .await
        .map_err(|e| RingError::transport_with_source("read message payload", e))?;

    let (_, msg) = decode_message(&full_buf)?;
    Ok(msg)
}
