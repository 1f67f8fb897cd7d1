//! Size-classed buffer pool shared by generated encoders.
//!
//! Buffers live in a bounded lock-free queue. Acquiring pops a buffer or
//! allocates a fresh one; releasing pushes it back unless it grew past the
//! configured ceiling or the queue is already full, in which case it is
//! dropped. Neither side ever blocks.
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::queue::ArrayQueue;

pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;

/// How many idle buffers the pool keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolCapacity {
    Fixed(usize),
    /// Multiplier applied to the number of available CPUs.
    PerProc(usize),
    /// Every acquire allocates.
    Disabled,
}

impl PoolCapacity {
    pub fn slots(self) -> usize {
        match self {
            PoolCapacity::Fixed(n) => n,
            PoolCapacity::PerProc(m) => num_cpus::get().saturating_mul(m),
            PoolCapacity::Disabled => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Initial capacity of freshly allocated buffers.
    pub buffer_size: usize,
    /// Buffers whose capacity grew past this are discarded on release.
    pub max_buffer_size: usize,
    pub capacity: PoolCapacity,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_buffer_size: DEFAULT_BUFFER_SIZE,
            capacity: PoolCapacity::PerProc(1),
        }
    }
}

/// Point-in-time counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub allocated: u64,
    pub reused: u64,
    /// Released buffers that were dropped (oversized or pool full).
    pub discarded: u64,
    pub idle: usize,
}

pub struct BufferPool {
    config: PoolConfig,
    free: Option<ArrayQueue<Vec<u8>>>,
    metrics: PoolMetrics,
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl BufferPool {
    pub fn new(config: PoolConfig) -> Self {
        // ArrayQueue rejects a zero capacity
        let free = match config.capacity.slots() {
            0 => None,
            slots => Some(ArrayQueue::new(slots)),
        };
        Self {
            config,
            free,
            metrics: PoolMetrics::default(),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Hands out an empty buffer owned by the caller until the guard drops.
    pub fn acquire(&self) -> PooledBuffer<'_> {
        PooledBuffer {
            buf: Some(self.take()),
            pool: self,
        }
    }

    /// Takes an empty buffer without a guard. Pair with [`BufferPool::release`].
    pub fn take(&self) -> Vec<u8> {
        if let Some(buf) = self.free.as_ref().and_then(ArrayQueue::pop) {
            self.metrics.reused.fetch_add(1, Ordering::Relaxed);
            return buf;
        }
        self.metrics.allocated.fetch_add(1, Ordering::Relaxed);
        Vec::with_capacity(self.config.buffer_size)
    }

    pub fn release(&self, mut buf: Vec<u8>) {
        if buf.capacity() > self.config.max_buffer_size {
            self.metrics.discarded.fetch_add(1, Ordering::Relaxed);
            return;
        }
        buf.clear();
        let Some(free) = self.free.as_ref() else {
            self.metrics.discarded.fetch_add(1, Ordering::Relaxed);
            return;
        };
        if free.push(buf).is_err() {
            self.metrics.discarded.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            allocated: self.metrics.allocated.load(Ordering::Relaxed),
            reused: self.metrics.reused.load(Ordering::Relaxed),
            discarded: self.metrics.discarded.load(Ordering::Relaxed),
            idle: self.free.as_ref().map_or(0, ArrayQueue::len),
        }
    }
}

#[derive(Default)]
struct PoolMetrics {
    allocated: AtomicU64,
    reused: AtomicU64,
    discarded: AtomicU64,
}

/// Exclusive lease on a pooled buffer; returned to the pool on drop.
pub struct PooledBuffer<'a> {
    buf: Option<Vec<u8>>,
    pool: &'a BufferPool,
}

impl PooledBuffer<'_> {
    /// Detaches the buffer from the pool.
    pub fn into_inner(mut self) -> Vec<u8> {
        self.buf.take().unwrap_or_default()
    }
}

impl Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        // only `into_inner` and `drop` empty the slot, and both consume the guard
        self.buf.as_ref().unwrap_or(&EMPTY)
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        self.buf.get_or_insert_with(Vec::new)
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}

static EMPTY: Vec<u8> = Vec::new();

#[cfg(test)]
mod tests {
    use super::*;

    fn small_pool(slots: usize) -> BufferPool {
        BufferPool::new(PoolConfig {
            buffer_size: 64,
            max_buffer_size: 128,
            capacity: PoolCapacity::Fixed(slots),
        })
    }

    #[test]
    fn released_buffer_is_reused_empty() {
        let pool = small_pool(2);
        {
            let mut buf = pool.acquire();
            buf.extend_from_slice(b"{\"a\":1}");
            assert!(buf.capacity() >= 64);
        }
        assert_eq!(pool.stats().idle, 1);
        let buf = pool.acquire();
        assert!(buf.is_empty());
        assert_eq!(pool.stats().reused, 1);
        assert_eq!(pool.stats().allocated, 1);
    }

    #[test]
    fn oversized_buffer_is_discarded() {
        let pool = small_pool(2);
        {
            let mut buf = pool.acquire();
            buf.extend_from_slice(&[b'x'; 4096]);
        }
        let stats = pool.stats();
        assert_eq!(stats.idle, 0);
        assert_eq!(stats.discarded, 1);

        let buf = pool.acquire();
        assert!(buf.capacity() < 4096);
        assert_eq!(pool.stats().allocated, 2);
    }

    #[test]
    fn full_pool_drops_instead_of_blocking() {
        let pool = small_pool(1);
        let a = pool.take();
        let b = pool.take();
        pool.release(a);
        pool.release(b);
        let stats = pool.stats();
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.discarded, 1);
    }

    #[test]
    fn disabled_pool_always_allocates() {
        let pool = BufferPool::new(PoolConfig {
            capacity: PoolCapacity::Disabled,
            ..PoolConfig::default()
        });
        drop(pool.acquire());
        drop(pool.acquire());
        let stats = pool.stats();
        assert_eq!(stats.allocated, 2);
        assert_eq!(stats.reused, 0);
        assert_eq!(stats.idle, 0);
    }

    #[test]
    fn per_proc_capacity_scales_with_cpus() {
        assert_eq!(PoolCapacity::PerProc(3).slots(), num_cpus::get() * 3);
        assert_eq!(PoolCapacity::Fixed(0).slots(), 0);
        // a zero-slot fixed pool behaves like a disabled one
        let pool = small_pool(0);
        drop(pool.acquire());
        assert_eq!(pool.stats().discarded, 1);
    }

    #[test]
    fn into_inner_detaches() {
        let pool = small_pool(1);
        let mut buf = pool.acquire();
        buf.push(b'1');
        let owned = buf.into_inner();
        assert_eq!(owned, b"1");
        assert_eq!(pool.stats().idle, 0);
    }
}
