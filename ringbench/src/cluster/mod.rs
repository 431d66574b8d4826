mod seed;
mod worker;

pub use seed::SeedNode;
pub use worker::WorkerNode;
