pub mod bench;
pub mod client;
pub mod cluster;
pub mod collective;
pub mod config;
pub mod error;
pub mod protocol;
pub mod report;
pub mod topology;
pub mod transport;
pub mod types;

pub use bench::{BenchOutcome, TimingAggregator, run_benchmark};
pub use client::{Completion, RecvRequest, RingClient, SendRequest, wait_any};
pub use cluster::{SeedNode, WorkerNode};
pub use collective::CollectiveHandle;
pub use config::{AggregationStrategy, BenchConfig};
pub use error::{Result, RingError};
pub use protocol::RingMessage;
pub use transport::{PeerConnection, TransportListener};
pub use types::{Rank, ReduceOp, Tag};
