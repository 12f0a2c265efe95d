//! Process-wide free-list pool for the byte buffers the hot path (signing,
//! URL encoding, part upload staging) rents and returns instead of
//! allocating. Modeled on a bucketed `ArrayPool<byte>`: one free list per
//! power-of-two size class, each guarded by its own lock so renting a small
//! scratch buffer never contends with a 5 MiB part buffer's free list.

use std::sync::OnceLock;

use parking_lot::Mutex;

const MIN_BUCKET_SHIFT: u32 = 6; // 64 bytes
const MAX_BUCKET_SHIFT: u32 = 23; // 8 MiB
const BUCKET_COUNT: usize = (MAX_BUCKET_SHIFT - MIN_BUCKET_SHIFT + 1) as usize;

fn bucket_for(len: usize) -> usize {
    let shift = len
        .max(1)
        .next_power_of_two()
        .trailing_zeros()
        .clamp(MIN_BUCKET_SHIFT, MAX_BUCKET_SHIFT);
    (shift - MIN_BUCKET_SHIFT) as usize
}

fn bucket_capacity(bucket: usize) -> usize {
    1usize << (bucket as u32 + MIN_BUCKET_SHIFT)
}

/// A pool of reusable `Vec<u8>` buffers. The default implementation
/// ([`shared`]) is a process-wide bucketed free list; a test or benchmark
/// harness can swap in its own implementation without touching any caller,
/// since every caller goes through this trait.
pub trait BufferPool: Send + Sync {
    /// Returns a buffer with capacity at least `min_len` and length 0.
    fn rent(&self, min_len: usize) -> Vec<u8>;
    /// Returns a buffer to the pool. Implementations may drop buffers that
    /// don't fit a known size class instead of growing the pool unbounded.
    fn return_buf(&self, buf: Vec<u8>);
}

pub struct BucketedPool {
    buckets: [Mutex<Vec<Vec<u8>>>; BUCKET_COUNT],
}

impl Default for BucketedPool {
    fn default() -> Self {
        BucketedPool {
            buckets: std::array::from_fn(|_| Mutex::new(Vec::new())),
        }
    }
}

impl BufferPool for BucketedPool {
    fn rent(&self, min_len: usize) -> Vec<u8> {
        if min_len == 0 {
            return Vec::new();
        }
        let idx = bucket_for(min_len);
        if let Some(mut buf) = self.buckets[idx].lock().pop() {
            buf.clear();
            return buf;
        }
        Vec::with_capacity(bucket_capacity(idx))
    }

    fn return_buf(&self, mut buf: Vec<u8>) {
        if buf.capacity() < (1 << MIN_BUCKET_SHIFT) || buf.capacity() > (1 << MAX_BUCKET_SHIFT) {
            return;
        }
        buf.clear();
        let idx = bucket_for(buf.capacity());
        let mut bucket = self.buckets[idx].lock();
        if bucket.len() < 64 {
            bucket.push(buf);
        }
    }
}

static SHARED: OnceLock<BucketedPool> = OnceLock::new();

/// The process-wide default pool.
pub fn shared() -> &'static BucketedPool {
    SHARED.get_or_init(BucketedPool::default)
}

/// RAII guard around a rented buffer: returns it to its pool on drop unless
/// [`Guard::take`] has already extracted the buffer. Using this instead of
/// a bare `rent`/`return_buf` pair means an early `?` return on any path
/// still gives the buffer back.
pub struct Guard<'p> {
    pool: &'p dyn BufferPool,
    buf: Option<Vec<u8>>,
}

impl<'p> Guard<'p> {
    pub fn new(pool: &'p dyn BufferPool, min_len: usize) -> Self {
        Guard {
            pool,
            buf: Some(pool.rent(min_len)),
        }
    }

    pub fn as_mut(&mut self) -> &mut Vec<u8> {
        self.buf.as_mut().expect("guard buffer already taken")
    }

    pub fn as_slice(&self) -> &[u8] {
        self.buf.as_deref().expect("guard buffer already taken")
    }

    /// Extract the buffer without returning it to the pool.
    pub fn take(mut self) -> Vec<u8> {
        self.buf.take().expect("guard buffer already taken")
    }
}

impl Drop for Guard<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.return_buf(buf);
        }
    }
}
