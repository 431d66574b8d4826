//! Handles for outstanding point-to-point operations.

use crate::error::{Result, RingError};
use crate::transport::Delivery;
use crate::types::{Rank, Tag};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// An outstanding send.
///
/// Sends to peers run in a spawned task that owns the payload. Dropping the
/// request without waiting lets the send finish in the background.
pub struct SendRequest {
    dest: Rank,
    tag: Tag,
    task: Option<JoinHandle<Result<()>>>,
}

impl SendRequest {
    /// A send that completed while it was issued (loopback).
    pub(crate) fn completed(dest: Rank, tag: Tag) -> Self {
        Self {
            dest,
            tag,
            task: None,
        }
    }

    pub(crate) fn pending(dest: Rank, tag: Tag, task: JoinHandle<Result<()>>) -> Self {
        Self {
            dest,
            tag,
            task: Some(task),
        }
    }

    pub fn dest(&self) -> Rank {
        self.dest
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Wait until the payload has been handed to the transport.
    pub async fn wait(self) -> Result<()> {
        match self.task {
            None => Ok(()),
            Some(task) => task
                .await
                .map_err(|e| RingError::transport_with_source("send task failed", e))?,
        }
    }

    /// Non-blocking completion check.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|t| t.is_finished())
    }
}

/// A completed receive: who actually sent it, with which tag, and the
/// destination buffer handed back to the caller.
#[derive(Debug)]
pub struct Completion {
    pub source: Rank,
    pub tag: Tag,
    pub buf: Vec<u8>,
}

/// An outstanding receive that owns its destination buffer.
///
/// Resolves to a [`Completion`] once a message from `source` with `tag` has
/// been copied into the buffer. The buffer cannot be touched until then.
pub struct RecvRequest {
    source: Rank,
    tag: Tag,
    rx: oneshot::Receiver<Delivery>,
    buf: Option<Vec<u8>>,
}

impl RecvRequest {
    pub(crate) fn new(source: Rank, tag: Tag, rx: oneshot::Receiver<Delivery>, buf: Vec<u8>) -> Self {
        Self {
            source,
            tag,
            rx,
            buf: Some(buf),
        }
    }

    /// The rank this receive was posted for.
    pub fn source(&self) -> Rank {
        self.source
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    fn complete(&mut self, delivery: Delivery) -> Result<Completion> {
        let mut buf = self.buf.take().ok_or(RingError::RequestConsumed {
            rank: self.source,
            tag: self.tag,
        })?;
        if delivery.payload.len() != buf.len() {
            return Err(RingError::BufferSizeMismatch {
                expected: buf.len(),
                actual: delivery.payload.len(),
            });
        }
        buf.copy_from_slice(&delivery.payload);
        Ok(Completion {
            source: delivery.source,
            tag: delivery.tag,
            buf,
        })
    }
}

impl Future for RecvRequest {
    type Output = Result<Completion>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.buf.is_none() {
            return Poll::Ready(Err(RingError::RequestConsumed {
                rank: self.source,
                tag: self.tag,
            }));
        }
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(delivery)) => Poll::Ready(self.complete(delivery)),
            Poll::Ready(Err(_)) => Poll::Ready(Err(RingError::PeerDisconnected {
                rank: self.source,
            })),
        }
    }
}

/// Wait for whichever receive completes first.
///
/// Returns the index of the completed request in `requests`, its
/// completion, and the requests still outstanding (in unspecified order).
pub async fn wait_any(
    requests: Vec<RecvRequest>,
) -> Result<(usize, Completion, Vec<RecvRequest>)> {
    if requests.is_empty() {
        return Err(RingError::NoPendingRequests);
    }
    let (result, index, rest) = futures::future::select_all(requests).await;
    Ok((index, result?, rest))
}
