//! Reusable body-capture buffers.
//!
//! Capturing request bodies on every request would otherwise allocate per
//! request; the pool amortizes that. A buffer is exclusively owned by one
//! request from [`acquire`](BufferPool::acquire) until the [`PooledBuf`]
//! guard drops, which clears the buffer (keeping its capacity) and returns
//! it. Callers must not assume an acquired buffer is freshly allocated.

use bytes::BytesMut;
use parking_lot::Mutex;

/// Process-wide pool used by the access-log stage for body capture.
static BODY_POOL: BufferPool = BufferPool::new(32);

/// Returns the process-wide body-capture pool.
#[must_use]
pub fn shared() -> &'static BufferPool {
    &BODY_POOL
}

/// A pool of reusable byte buffers.
pub struct BufferPool {
    buffers: Mutex<Vec<BytesMut>>,
    max_idle: usize,
}

impl BufferPool {
    /// Creates a pool keeping at most `max_idle` buffers between requests.
    #[must_use]
    pub const fn new(max_idle: usize) -> Self {
        Self {
            buffers: Mutex::new(Vec::new()),
            max_idle,
        }
    }

    /// Borrows a buffer, recycled if one is idle.
    ///
    /// The returned guard dereferences to [`BytesMut`] and releases the
    /// buffer on drop, on every exit path.
    pub fn acquire(&self) -> PooledBuf<'_> {
        let buf = self.buffers.lock().pop().unwrap_or_default();
        PooledBuf {
            pool: self,
            buf: Some(buf),
        }
    }

    fn release(&self, buf: BytesMut) {
        let mut buffers = self.buffers.lock();
        if buffers.len() < self.max_idle {
            buffers.push(buf);
        }
    }

    /// Number of buffers currently idle in the pool.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.buffers.lock().len()
    }
}

/// Exclusive borrow of one pooled buffer.
pub struct PooledBuf<'a> {
    pool: &'a BufferPool,
    buf: Option<BytesMut>,
}

impl std::ops::Deref for PooledBuf<'_> {
    type Target = BytesMut;

    fn deref(&self) -> &BytesMut {
        self.buf.as_ref().expect("buffer present until drop")
    }
}

impl std::ops::DerefMut for PooledBuf<'_> {
    fn deref_mut(&mut self) -> &mut BytesMut {
        self.buf.as_mut().expect("buffer present until drop")
    }
}

impl Drop for PooledBuf<'_> {
    fn drop(&mut self) {
        if let Some(mut buf) = self.buf.take() {
            buf.clear();
            self.pool.release(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffers_are_recycled_cleared() {
        let pool = BufferPool::new(4);

        let mut buf = pool.acquire();
        buf.extend_from_slice(b"payload");
        let capacity = buf.capacity();
        drop(buf);
        assert_eq!(pool.idle(), 1);

        // The recycled buffer arrives empty but with its capacity intact;
        // callers still must not depend on emptiness without clearing.
        let reused = pool.acquire();
        assert!(reused.is_empty());
        assert!(reused.capacity() >= capacity);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_idle_count_is_bounded() {
        let pool = BufferPool::new(1);

        let a = pool.acquire();
        let b = pool.acquire();
        drop(a);
        drop(b);

        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_concurrent_acquire_release() {
        static POOL: BufferPool = BufferPool::new(8);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let mut buf = POOL.acquire();
                        buf.extend_from_slice(&[i; 32]);
                        assert_eq!(buf.len(), 32);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(POOL.idle() <= 8);
    }
}
