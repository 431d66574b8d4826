pub mod buffer_pool;
mod connection;
mod listener;
pub mod mailbox;
pub mod router;
pub(crate) mod tls;

pub use connection::PeerConnection;
pub(crate) use connection::{read_message, write_message};
pub use listener::TransportListener;
pub use mailbox::{Delivery, Mailbox};
pub use router::PeerRouter;
