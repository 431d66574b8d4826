/// Size of the wire header in bytes.
pub const HEADER_SIZE: usize = 8;

/// What the payload after the header is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    /// Cluster formation: Hello, Welcome, MeshHello.
    Bootstrap = 0,
    /// Messages exchanged on the formed mesh (barrier tokens).
    Control = 1,
}

impl MessageKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(MessageKind::Bootstrap),
            1 => Some(MessageKind::Control),
            _ => None,
        }
    }
}

/// 8-byte wire header prepended to every framed message.
///
/// ```text
/// [0..4] payload_length: u32 LE
/// [4]    kind: u8
/// [5..8] reserved (zero)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub payload_length: u32,
    pub kind: MessageKind,
}

impl Header {
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.payload_length.to_le_bytes());
        buf[4] = self.kind as u8;
        buf
    }

    /// Returns `None` if the kind byte is unknown.
    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Option<Self> {
        let payload_length = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let kind = MessageKind::from_u8(buf[4])?;
        Some(Header {
            payload_length,
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let h = Header {
            payload_length: 12345,
            kind: MessageKind::Control,
        };
        assert_eq!(Header::decode(&h.encode()), Some(h));
    }

    #[test]
    fn test_header_reserved_bytes_zeroed() {
        let enc = Header {
            payload_length: u32::MAX,
            kind: MessageKind::Bootstrap,
        }
        .encode();
        assert_eq!(&enc[5..], &[0, 0, 0]);
        assert_eq!(u32::from_le_bytes([enc[0], enc[1], enc[2], enc[3]]), u32::MAX);
    }

    #[test]
    fn test_header_invalid_kind() {
        let mut buf = [0u8; HEADER_SIZE];
        buf[4] = 9;
        assert!(Header::decode(&buf).is_none());
    }
}
