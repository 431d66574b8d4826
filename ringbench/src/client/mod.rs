mod async_client;
mod bootstrap;
mod collectives;
mod messaging;
pub mod request;

pub use async_client::RingClient;
pub use request::{Completion, RecvRequest, SendRequest, wait_any};
