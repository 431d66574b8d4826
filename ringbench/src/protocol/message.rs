use crate::protocol::header::MessageKind;
use crate::types::Rank;

/// Control messages exchanged between ringbench nodes.
///
/// Benchmark payloads never go through this enum; they travel on tagged
/// raw streams (see `PeerConnection::send_tagged`).
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, PartialEq)]
pub enum RingMessage {
    /// Worker to seed: first message after connecting.
    Hello {
        protocol_version: u16,
        /// Port of the worker's mesh listener. The seed pairs it with the
        /// address it observed the worker connecting from.
        mesh_port: u16,
    },

    /// Seed to worker: rank assignment and the full peer table.
    Welcome {
        rank: Rank,
        world_size: u32,
        /// `(rank, socket_addr_string)` for every rank, including the receiver.
        peers: Vec<(Rank, String)>,
    },

    /// Lower rank to higher rank: identifies a freshly dialed mesh connection.
    MeshHello { rank: Rank },

    /// Barrier token for `epoch`, sent in `round` of the barrier algorithm.
    Barrier { epoch: u64, round: u16 },
}

impl RingMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            RingMessage::Hello { .. }
            | RingMessage::Welcome { .. }
            | RingMessage::MeshHello { .. } => MessageKind::Bootstrap,
            RingMessage::Barrier { .. } => MessageKind::Control,
        }
    }
}
