use crate::error::{Result, RingError};
use crate::protocol::header::{HEADER_SIZE, Header};
use crate::protocol::message::RingMessage;

/// Encode a `RingMessage` into a framed byte buffer: `[header][rkyv payload]`.
pub fn encode_message(msg: &RingMessage) -> Result<Vec<u8>> {
    let payload = rkyv::to_bytes::<rkyv::rancor::Error>(msg)
        .map_err(|e| RingError::EncodeFailed(e.to_string()))?;

    let payload_length = u32::try_from(payload.len()).map_err(|_| {
        RingError::EncodeFailed(format!(
            "payload too large for framed header: {} bytes",
            payload.len()
        ))
    })?;

    let header = Header {
        payload_length,
        kind: msg.kind(),
    };

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Decode a framed byte buffer back into a `(Header, RingMessage)`.
pub fn decode_message(buf: &[u8]) -> Result<(Header, RingMessage)> {
    if buf.len() < HEADER_SIZE {
        return Err(RingError::DecodeFailed(format!(
            "buffer too short: {} < {HEADER_SIZE}",
            buf.len()
        )));
    }

    let header_bytes: &[u8; HEADER_SIZE] = buf[..HEADER_SIZE]
        .try_into()
        .map_err(|_| RingError::DecodeFailed("header slice length mismatch".into()))?;

    let header = Header::decode(header_bytes)
        .ok_or_else(|| RingError::DecodeFailed("invalid header: unknown message kind".into()))?;

    let payload_end = HEADER_SIZE + header.payload_length as usize;
    if buf.len() < payload_end {
        return Err(RingError::DecodeFailed(format!(
            "buffer too short for payload: {} < {payload_end}",
            buf.len()
        )));
    }

    let msg = rkyv::from_bytes::<RingMessage, rkyv::rancor::Error>(&buf[HEADER_SIZE..payload_end])
        .map_err(|e| RingError::DecodeFailed(e.to_string()))?;

    if msg.kind() != header.kind {
        return Err(RingError::DecodeFailed(format!(
            "header kind {:?} does not match message {msg:?}",
            header.kind
        )));
    }

    Ok((header, msg))
}
