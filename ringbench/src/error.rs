use crate::types::{Rank, Tag};

pub type Result<T> = std::result::Result<T, RingError>;

#[derive(Debug, thiserror::Error)]
pub enum RingError {
    #[error("connection to rank {rank} failed: {reason}")]
    ConnectionFailed { rank: Rank, reason: String },

    #[error("peer {rank} disconnected unexpectedly")]
    PeerDisconnected { rank: Rank },

    #[error("rank {rank} not found in cluster")]
    UnknownPeer { rank: Rank },

    #[error("protocol version mismatch: local={local}, remote={remote}")]
    ProtocolMismatch { local: u16, remote: u16 },

    #[error("message decode failed: {0}")]
    DecodeFailed(String),

    #[error("message encode failed: {0}")]
    EncodeFailed(String),

    #[error("cluster formation timed out: {joined}/{expected} nodes joined")]
    ClusterFormationTimeout { joined: u32, expected: u32 },

    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("invalid rank {rank}: world size is {world_size}")]
    InvalidRank { rank: Rank, world_size: u32 },

    #[error("QUIC transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("TLS configuration error: {0}")]
    Tls(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{operation} failed at rank {rank}: {reason}")]
    CollectiveFailed {
        operation: &'static str,
        rank: Rank,
        reason: String,
    },

    #[error("internal lock poisoned: {0}")]
    LockPoisoned(&'static str),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("host identifier {value:?} is {len} bytes, must be shorter than {max}")]
    HostIdTooLong {
        value: String,
        len: usize,
        max: usize,
    },

    #[error(
        "payload mismatch on rank {receiver} from rank {sender} \
         (distance {distance}, repetition {repetition}): \
         element {position} is {actual}, expected {expected}"
    )]
    PayloadMismatch {
        sender: Rank,
        receiver: Rank,
        distance: u32,
        repetition: usize,
        position: usize,
        expected: u64,
        actual: u64,
    },

    #[error(
        "ring schedule produced partner {partner} for rank {rank} at distance {distance}, \
         outside world size {world_size}"
    )]
    ScheduleOutOfRange {
        rank: Rank,
        distance: u32,
        partner: i64,
        world_size: u32,
    },

    #[error("receive completed from rank {source_rank}, expected {up} or {down}")]
    UnexpectedSource {
        source_rank: Rank,
        up: Rank,
        down: Rank,
    },

    #[error(
        "transfer tag for repetition {repetition} at distance {distance} \
         overflows the tag space (world size {world_size})"
    )]
    TagOverflow {
        repetition: usize,
        distance: u32,
        world_size: u32,
    },

    #[error("timing row out of order: expected rank {expected}, got rank {got}")]
    RowOutOfOrder { expected: Rank, got: Rank },

    #[error("wait-any called with no pending requests")]
    NoPendingRequests,

    #[error("receive request for tag {tag:#x} from rank {rank} already completed")]
    RequestConsumed { rank: Rank, tag: Tag },
}

impl RingError {
    /// Create a `Transport` error with just a message.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a `Transport` error with a message and a source error.
    pub fn transport_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }
}
