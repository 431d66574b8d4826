use crate::error::{Result, RingError};
use crate::transport::buffer_pool::PooledBuf;
use crate::types::{Rank, Tag};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use tokio::sync::oneshot;

/// A message handed from the router (or a loopback send) to a receiver.
#[derive(Debug)]
pub struct Delivery {
    pub source: Rank,
    pub tag: Tag,
    pub payload: PooledBuf,
}

/// Per-(source, tag) matching state. At most one of the two queues is
/// non-empty at any time.
#[derive(Default)]
struct Slot {
    arrived: VecDeque<PooledBuf>,
    posted: VecDeque<oneshot::Sender<Delivery>>,
}

impl Slot {
    fn is_empty(&self) -> bool {
        self.arrived.is_empty() && self.posted.is_empty()
    }
}

#[derive(Default)]
struct MailboxState {
    slots: HashMap<(Rank, Tag), Slot>,
    closed: HashSet<Rank>,
}

/// Matches incoming messages with posted receives by `(source, tag)`.
///
/// Messages may arrive before or after the matching receive is posted.
/// Within one `(source, tag)` pair, messages and receives are matched in
/// FIFO order. When a peer disconnects, pending receives for it fail with
/// `PeerDisconnected`; messages that already arrived stay claimable.
pub struct Mailbox {
    state: Mutex<MailboxState>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MailboxState::default()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MailboxState>> {
        self.state
            .lock()
            .map_err(|_| RingError::LockPoisoned("mailbox"))
    }

    /// Hand an incoming message to the oldest live waiter, or queue it.
    pub fn deliver(&self, source: Rank, tag: Tag, payload: PooledBuf) -> Result<()> {
        let mut state = self.lock()?;
        let slot = state.slots.entry((source, tag)).or_default();

        let mut delivery = Delivery {
            source,
            tag,
            payload,
        };
        while let Some(waiter) = slot.posted.pop_front() {
            match waiter.send(delivery) {
                Ok(()) => {
                    if slot.is_empty() {
                        state.slots.remove(&(source, tag));
                    }
                    return Ok(());
                }
                // Receiver was dropped (cancelled request); try the next one.
                Err(returned) => delivery = returned,
            }
        }

        slot.arrived.push_back(delivery.payload);
        Ok(())
    }

    /// Post a receive for the next message from `source` with `tag`.
    ///
    /// The returned channel resolves immediately if a matching message
    /// already arrived. It is closed without a value if `source`
    /// disconnects first.
    pub fn post(&self, source: Rank, tag: Tag) -> Result<oneshot::Receiver<Delivery>> {
        let mut state = self.lock()?;
        let (tx, rx) = oneshot::channel();

        if let Some(slot) = state.slots.get_mut(&(source, tag))
            && let Some(payload) = slot.arrived.pop_front()
        {
            if slot.is_empty() {
                state.slots.remove(&(source, tag));
            }
            // The receiver is still in hand, so this cannot fail.
            let _ = tx.send(Delivery {
                source,
                tag,
                payload,
            });
            return Ok(rx);
        }

        if state.closed.contains(&source) {
            return Err(RingError::PeerDisconnected { rank: source });
        }

        state
            .slots
            .entry((source, tag))
            .or_default()
            .posted
            .push_back(tx);
        Ok(rx)
    }

    /// Mark `source` as gone and fail every receive still waiting on it.
    pub fn disconnect(&self, source: Rank) -> Result<()> {
        let mut state = self.lock()?;
        state.closed.insert(source);
        state.slots.retain(|&(src, _), slot| {
            if src == source {
                slot.posted.clear();
            }
            !slot.is_empty()
        });
        Ok(())
    }

    /// Messages that arrived but have not been claimed yet.
    #[cfg(test)]
    fn unclaimed(&self) -> Result<usize> {
        Ok(self.lock()?.slots.values().map(|s| s.arrived.len()).sum())
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}
