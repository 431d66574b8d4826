pub mod allgather;
pub mod barrier;
pub mod gather;
mod handle;
pub mod reduce;

pub use allgather::ring_allgather;
pub use barrier::barrier;
pub use gather::gather_ordered;
pub use handle::CollectiveHandle;
pub use reduce::allreduce_f64;
