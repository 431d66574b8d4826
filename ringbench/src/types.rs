/// Rank of a worker in the ring (0-indexed).
pub type Rank = u32;

/// Message tag used to match sends with posted receives.
///
/// Tags below [`RESERVED_TAG_BIT`] belong to the transfer engine. Tags with
/// the top bit set are reserved for collectives and carry a [`TagKind`], a
/// sequence number and a round:
///
/// ```text
/// [63]     reserved flag
/// [56..63] kind
/// [16..56] sequence (epoch or collective counter)
/// [0..16]  round
/// ```
pub type Tag = u64;

/// Top bit marks a tag as reserved for internal collectives.
pub const RESERVED_TAG_BIT: Tag = 1 << 63;

const SEQUENCE_MASK: u64 = (1 << 40) - 1;

/// The internal operation a reserved tag belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TagKind {
    Barrier = 1,
    AllGather = 2,
    TimingRow = 3,
    Shutdown = 4,
}

/// Build a reserved tag. The sequence is truncated to 40 bits.
pub const fn reserved_tag(kind: TagKind, sequence: u64, round: u16) -> Tag {
    RESERVED_TAG_BIT | ((kind as u64) << 56) | ((sequence & SEQUENCE_MASK) << 16) | round as u64
}

/// Whether a tag lives in the reserved namespace.
pub const fn is_reserved(tag: Tag) -> bool {
    tag & RESERVED_TAG_BIT != 0
}

/// Well-known tag for timing rows sent to the root during centralized gather.
pub const TIMING_ROW_TAG: Tag = reserved_tag(TagKind::TimingRow, 0, 0);

/// Reduction operations for scalar all-reduce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReduceOp {
    /// Sum across ranks.
    Sum,
    /// Minimum across ranks.
    Min,
    /// Maximum across ranks.
    Max,
}

impl ReduceOp {
    /// Fold two values with this operation.
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            ReduceOp::Sum => a + b,
            ReduceOp::Min => a.min(b),
            ReduceOp::Max => a.max(b),
        }
    }
}

impl std::fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReduceOp::Sum => f.write_str("sum"),
            ReduceOp::Min => f.write_str("min"),
            ReduceOp::Max => f.write_str("max"),
        }
    }
}

/// Current wire protocol version.
pub const PROTOCOL_VERSION: u16 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_tags_are_reserved() {
        assert!(is_reserved(TIMING_ROW_TAG));
        assert!(is_reserved(reserved_tag(TagKind::Barrier, 0, 0)));
        assert!(!is_reserved(0));
        assert!(!is_reserved(RESERVED_TAG_BIT - 1));
    }

    #[test]
    fn test_reserved_tags_distinct_per_kind_sequence_round() {
        let a = reserved_tag(TagKind::Barrier, 3, 1);
        let b = reserved_tag(TagKind::Barrier, 3, 2);
        let c = reserved_tag(TagKind::Barrier, 4, 1);
        let d = reserved_tag(TagKind::AllGather, 3, 1);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_ne!(d, TIMING_ROW_TAG);
    }

    #[test]
    fn test_reserved_tag_layout() {
        let tag = reserved_tag(TagKind::AllGather, 0xAB, 0x0102);
        assert_eq!((tag >> 56) & 0x7F, TagKind::AllGather as u64);
        assert_eq!((tag >> 16) & SEQUENCE_MASK, 0xAB);
        assert_eq!(tag & 0xFFFF, 0x0102);
    }

    #[test]
    fn test_reduce_op_apply() {
        assert_eq!(ReduceOp::Sum.apply(1.5, 2.0), 3.5);
        assert_eq!(ReduceOp::Min.apply(1.5, 2.0), 1.5);
        assert_eq!(ReduceOp::Max.apply(1.5, 2.0), 2.0);
    }

    #[test]
    fn test_reduce_op_display() {
        assert_eq!(ReduceOp::Sum.to_string(), "sum");
        assert_eq!(ReduceOp::Min.to_string(), "min");
        assert_eq!(ReduceOp::Max.to_string(), "max");
    }
}
