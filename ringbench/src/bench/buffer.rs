//! Transfer payloads and their correctness pattern.

use crate::error::{Result, RingError};
use crate::types::Rank;
use std::sync::Arc;

/// Number of leading elements checked on every received buffer.
pub const VALIDATED_PREFIX: usize = 10;

/// Width of one payload element. Elements are little-endian unsigned
/// integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    U8,
    U16,
    U32,
    U64,
}

impl ElementType {
    pub fn from_itemsize(itemsize: usize) -> Result<Self> {
        match itemsize {
            1 => Ok(ElementType::U8),
            2 => Ok(ElementType::U16),
            4 => Ok(ElementType::U32),
            8 => Ok(ElementType::U64),
            other => Err(RingError::Config(format!(
                "itemsize must be 1, 2, 4 or 8 bytes, got {other}"
            ))),
        }
    }

    pub const fn size_in_bytes(self) -> usize {
        match self {
            ElementType::U8 => 1,
            ElementType::U16 => 2,
            ElementType::U32 => 4,
            ElementType::U64 => 8,
        }
    }

    /// All-ones mask for the element width.
    pub const fn mask(self) -> u64 {
        match self {
            ElementType::U64 => u64::MAX,
            other => (1u64 << (other.size_in_bytes() * 8)) - 1,
        }
    }

    /// The value rank `rank` puts at element `index`: `rank + index`,
    /// wrapping at the element width.
    pub fn pattern_value(self, rank: Rank, index: usize) -> u64 {
        u64::from(rank).wrapping_add(index as u64) & self.mask()
    }

    /// Read element `index` out of a byte buffer.
    pub fn read(self, bytes: &[u8], index: usize) -> Option<u64> {
        let width = self.size_in_bytes();
        let start = index.checked_mul(width)?;
        let raw = bytes.get(start..start + width)?;
        let mut le = [0u8; 8];
        le[..width].copy_from_slice(raw);
        Some(u64::from_le_bytes(le))
    }

    fn write(self, dst: &mut [u8], value: u64) {
        dst.copy_from_slice(&value.to_le_bytes()[..self.size_in_bytes()]);
    }
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "u{}", self.size_in_bytes() * 8)
    }
}

/// A rank's send payload, built once and shared by every send.
#[derive(Debug, Clone)]
pub struct TransferBuffer {
    element: ElementType,
    count: usize,
    payload: Arc<[u8]>,
}

impl TransferBuffer {
    /// Fill `count` elements with the pattern of `rank`.
    pub fn for_rank(rank: Rank, element: ElementType, count: usize) -> Self {
        let width = element.size_in_bytes();
        let mut bytes = vec![0u8; count * width];
        for (i, chunk) in bytes.chunks_exact_mut(width).enumerate() {
            element.write(chunk, element.pattern_value(rank, i));
        }
        Self {
            element,
            count,
            payload: bytes.into(),
        }
    }

    /// Shared handle on the payload for one send.
    pub fn payload(&self) -> Arc<[u8]> {
        Arc::clone(&self.payload)
    }

    pub fn element(&self) -> ElementType {
        self.element
    }

    /// Number of elements.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Payload size in bytes.
    pub fn len_bytes(&self) -> usize {
        self.payload.len()
    }

    /// A zeroed receive buffer of the same size.
    pub fn receive_buffer(&self) -> Vec<u8> {
        vec![0u8; self.payload.len()]
    }
}

/// A checked element that does not match the sender's pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    pub position: usize,
    pub expected: u64,
    pub actual: u64,
}

/// Compare the first `min(count, VALIDATED_PREFIX)` elements of `received`
/// against the pattern of `sender`.
pub fn first_mismatch(
    element: ElementType,
    received: &[u8],
    sender: Rank,
    count: usize,
) -> Option<Mismatch> {
    (0..count.min(VALIDATED_PREFIX)).find_map(|position| {
        let expected = element.pattern_value(sender, position);
        // A short buffer reads as a mismatch with value 0.
        let actual = element.read(received, position).unwrap_or(0);
        (actual != expected).then_some(Mismatch {
            position,
            expected,
            actual,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_itemsize() {
        assert_eq!(ElementType::from_itemsize(4).unwrap(), ElementType::U32);
        assert_eq!(ElementType::from_itemsize(8).unwrap(), ElementType::U64);
        assert!(ElementType::from_itemsize(3).is_err());
        assert!(ElementType::from_itemsize(0).is_err());
    }

    #[test]
    fn test_masks() {
        assert_eq!(ElementType::U8.mask(), 0xFF);
        assert_eq!(ElementType::U16.mask(), 0xFFFF);
        assert_eq!(ElementType::U32.mask(), 0xFFFF_FFFF);
        assert_eq!(ElementType::U64.mask(), u64::MAX);
    }

    #[test]
    fn test_pattern_wraps_at_width() {
        assert_eq!(ElementType::U8.pattern_value(250, 10), 4);
        assert_eq!(ElementType::U16.pattern_value(3, 65535), 2);
        assert_eq!(ElementType::U32.pattern_value(7, 5), 12);
    }

    #[test]
    fn test_buffer_holds_pattern() {
        let buf = TransferBuffer::for_rank(3, ElementType::U32, 16);
        assert_eq!(buf.len_bytes(), 64);
        let payload = buf.payload();
        for i in 0..16 {
            assert_eq!(ElementType::U32.read(&payload, i), Some(3 + i as u64));
        }
        assert_eq!(ElementType::U32.read(&payload, 16), None);
    }

    #[test]
    fn test_u8_pattern_wraps_in_buffer() {
        let buf = TransferBuffer::for_rank(255, ElementType::U8, 3);
        assert_eq!(&*buf.payload(), &[255, 0, 1]);
    }

    #[test]
    fn test_validation_accepts_sender_pattern() {
        for element in [
            ElementType::U8,
            ElementType::U16,
            ElementType::U32,
            ElementType::U64,
        ] {
            let buf = TransferBuffer::for_rank(5, element, 100);
            assert_eq!(first_mismatch(element, &buf.payload(), 5, 100), None);
        }
    }

    #[test]
    fn test_validation_reports_wrong_sender() {
        let buf = TransferBuffer::for_rank(2, ElementType::U32, 4);
        let m = first_mismatch(ElementType::U32, &buf.payload(), 1, 4).unwrap();
        assert_eq!(
            m,
            Mismatch {
                position: 0,
                expected: 1,
                actual: 2
            }
        );
    }

    #[test]
    fn test_validation_checks_prefix_only() {
        let buf = TransferBuffer::for_rank(0, ElementType::U16, 20);
        let mut bytes = buf.payload().to_vec();
        // Corrupt element 15, outside the checked prefix.
        bytes[30] ^= 0xFF;
        assert_eq!(first_mismatch(ElementType::U16, &bytes, 0, 20), None);
        // Corrupt element 9, the last checked one.
        bytes[18] ^= 0xFF;
        let m = first_mismatch(ElementType::U16, &bytes, 0, 20).unwrap();
        assert_eq!(m.position, 9);
    }

    #[test]
    fn test_validation_short_count() {
        let buf = TransferBuffer::for_rank(1, ElementType::U64, 3);
        assert_eq!(first_mismatch(ElementType::U64, &buf.payload(), 1, 3), None);
    }
}
