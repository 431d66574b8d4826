use crossbeam_queue::ArrayQueue;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Small tier: timing rows, host-id exchanges, small transfers.
const SMALL_POOL_SIZE: usize = 64;
const SMALL_BUF_CAPACITY: usize = 64 * 1024;

/// Large tier: benchmark payloads up to 8 MiB (the default run moves 4 MB).
const LARGE_POOL_SIZE: usize = 8;
const LARGE_BUF_CAPACITY: usize = 8 * 1024 * 1024;

/// A two-tier lock-free pool of receive buffers.
///
/// The router checks a buffer out for every incoming tagged stream; the
/// buffer goes back to its tier when the receiver drops it. Buffers that
/// have grown beyond 4x their tier's capacity are dropped instead of
/// returned, and requests larger than the large tier are allocated fresh.
///
/// Tiers start empty and fill as buffers are returned, so an idle pool
/// costs nothing.
pub struct BufferPool {
    small: ArrayQueue<Vec<u8>>,
    large: ArrayQueue<Vec<u8>>,
}

impl BufferPool {
    pub fn new() -> Arc<Self> {
        Self::with_config(SMALL_POOL_SIZE, LARGE_POOL_SIZE)
    }

    /// Create a pool holding at most `small_count` small and `large_count`
    /// large buffers.
    pub fn with_config(small_count: usize, large_count: usize) -> Arc<Self> {
        Arc::new(Self {
            small: ArrayQueue::new(small_count.max(1)),
            large: ArrayQueue::new(large_count.max(1)),
        })
    }

    /// Check out a buffer resized to `len` bytes (zeroed).
    pub fn checkout(self: &Arc<Self>, len: usize) -> PooledBuf {
        let tier = PoolTier::for_size(len);
        let mut buf = match self.queue(tier) {
            Some(q) => q
                .pop()
                .unwrap_or_else(|| Vec::with_capacity(tier.capacity().max(len))),
            None => Vec::with_capacity(len),
        };
        buf.resize(len, 0);
        PooledBuf {
            buf: Some(buf),
            pool: Arc::clone(self),
            tier,
        }
    }

    /// Number of idle buffers currently held across both tiers.
    pub fn idle(&self) -> usize {
        self.small.len() + self.large.len()
    }

    fn queue(&self, tier: PoolTier) -> Option<&ArrayQueue<Vec<u8>>> {
        match tier {
            PoolTier::Small => Some(&self.small),
            PoolTier::Large => Some(&self.large),
            PoolTier::Unpooled => None,
        }
    }

    fn return_buf(&self, mut buf: Vec<u8>, tier: PoolTier) {
        if let Some(q) = self.queue(tier)
            && buf.capacity() <= tier.capacity() * 4
        {
            buf.clear();
            let _ = q.push(buf);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PoolTier {
    Small,
    Large,
    Unpooled,
}

impl PoolTier {
    fn for_size(len: usize) -> Self {
        if len <= SMALL_BUF_CAPACITY {
            PoolTier::Small
        } else if len <= LARGE_BUF_CAPACITY {
            PoolTier::Large
        } else {
            PoolTier::Unpooled
        }
    }

    fn capacity(self) -> usize {
        match self {
            PoolTier::Small => SMALL_BUF_CAPACITY,
            PoolTier::Large => LARGE_BUF_CAPACITY,
            PoolTier::Unpooled => 0,
        }
    }
}

/// A buffer checked out from a `BufferPool`. Derefs to `[u8]`.
/// On drop, the underlying `Vec` is cleared and returned to its tier.
pub struct PooledBuf {
    buf: Option<Vec<u8>>,
    pool: Arc<BufferPool>,
    tier: PoolTier,
}

impl PooledBuf {
    /// Wrap a `Vec<u8>` produced outside the pool (loopback sends).
    pub fn from_vec(v: Vec<u8>, pool: Arc<BufferPool>) -> Self {
        let tier = PoolTier::for_size(v.len());
        Self {
            buf: Some(v),
            pool,
            tier,
        }
    }
}

impl Deref for PooledBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or_default()
    }
}

impl DerefMut for PooledBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or_default()
    }
}

impl Drop for PooledBuf {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.return_buf(buf, self.tier);
        }
    }
}

impl AsRef<[u8]> for PooledBuf {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl std::fmt::Debug for PooledBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuf")
            .field("len", &self.len())
            .field("tier", &self.tier)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_zeroed() {
        let pool = BufferPool::with_config(4, 1);
        let buf = pool.checkout(100);
        assert_eq!(buf.len(), 100);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_drop_returns_to_pool() {
        let pool = BufferPool::with_config(2, 1);
        assert_eq!(pool.idle(), 0);
        let buf = pool.checkout(10);
        drop(buf);
        assert_eq!(pool.idle(), 1);
        let reused = pool.checkout(20);
        assert_eq!(reused.len(), 20);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_pool_full_on_return() {
        let pool = BufferPool::with_config(1, 1);
        let b1 = pool.checkout(10);
        let b2 = pool.checkout(10);
        drop(b1);
        drop(b2);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_reused_buffer_is_rezeroed() {
        let pool = BufferPool::with_config(1, 1);
        let mut buf = pool.checkout(4);
        buf.copy_from_slice(&[1, 2, 3, 4]);
        drop(buf);
        let buf = pool.checkout(4);
        assert_eq!(&*buf, &[0, 0, 0, 0]);
    }

    #[test]
    fn test_large_and_unpooled() {
        let pool = BufferPool::with_config(1, 1);
        let large = pool.checkout(4 * 1000 * 1000);
        assert_eq!(large.len(), 4_000_000);
        drop(large);
        assert_eq!(pool.idle(), 1);

        let huge = pool.checkout(LARGE_BUF_CAPACITY + 1);
        drop(huge);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_from_vec_returns_to_matching_tier() {
        let pool = BufferPool::with_config(1, 1);
        let buf = PooledBuf::from_vec(vec![7u8; 16], Arc::clone(&pool));
        assert_eq!(&buf[..2], &[7, 7]);
        drop(buf);
        assert_eq!(pool.idle(), 1);
    }
}
