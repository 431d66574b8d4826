use crate::error::{Result, RingError};
use std::future::Future;
use tokio::task::JoinHandle;

/// A handle to a non-blocking collective operation.
///
/// The collective runs in a spawned task. Call `wait()` to block until it
/// completes, or `is_finished()` to check without blocking.
///
/// If dropped without calling `wait()`, the background task is aborted.
pub struct CollectiveHandle {
    inner: Option<JoinHandle<Result<()>>>,
}

impl CollectiveHandle {
    pub(crate) fn spawn(fut: impl Future<Output = Result<()>> + Send + 'static) -> Self {
        Self {
            inner: Some(tokio::spawn(fut)),
        }
    }

    /// Wait for the collective to complete and propagate any error.
    pub async fn wait(mut self) -> Result<()> {
        let Some(handle) = self.inner.take() else {
            return Ok(());
        };
        handle
            .await
            .map_err(|e| RingError::transport_with_source("collective task failed", e))?
    }

    /// Poll once: has the collective finished?
    pub fn is_finished(&self) -> bool {
        self.inner.as_ref().is_none_or(|h| h.is_finished())
    }
}

impl Drop for CollectiveHandle {
    fn drop(&mut self) {
        if let Some(handle) = &self.inner {
            handle.abort();
        }
    }
}
