//! Packet buffer pool seam
//!
//! The engine draws buffers from a fixed-capacity pool while packets sit on
//! its rings; user code holds them through [`Mbuf`]. A buffer belongs to
//! exactly one of pool, engine, or holder at any moment.

use std::fmt;
use std::sync::Arc;

/// A named, fixed-capacity source of packet buffer backing storage.
///
/// `acquire` must hand out buffers of exactly `data_room` bytes; `reclaim`
/// takes them back. Implementations are free to recycle the storage.
pub trait BufferPool: Send + Sync {
    fn name(&self) -> &str;

    /// Total number of buffers the pool can have outstanding.
    fn capacity(&self) -> usize;

    /// Size of each buffer's backing storage.
    fn data_room(&self) -> usize;

    /// Buffers currently outside the pool.
    fn in_use(&self) -> usize;

    /// Draws one backing buffer, or `None` when the pool is exhausted.
    fn acquire(&self) -> Option<Vec<u8>>;

    /// Returns a backing buffer drawn earlier by `acquire`.
    fn reclaim(&self, backing: Vec<u8>);
}

/// Creates named buffer pools on behalf of devices.
pub trait PoolAllocator {
    /// Creates a pool, or `None` when the underlying allocator fails
    /// (duplicate name, memory exhaustion).
    fn create(
        &self,
        name: &str,
        size: usize,
        cache_size: usize,
        data_room: usize,
        socket_id: i32,
    ) -> Option<Arc<dyn BufferPool>>;
}

/// Engine-native packet buffer: pool-backed storage plus a payload length.
///
/// Dropping an `Mbuf` returns its backing storage to the pool, so holding
/// one is holding the exclusive right to free it.
pub struct Mbuf {
    backing: Vec<u8>,
    len: usize,
    pool: Option<Arc<dyn BufferPool>>,
}

impl Mbuf {
    /// Draws a buffer from `pool` and copies `payload` into it.
    ///
    /// Fails when the payload exceeds the pool's data room or the pool is
    /// exhausted.
    pub fn from_payload(pool: &Arc<dyn BufferPool>, payload: &[u8]) -> Option<Mbuf> {
        if payload.len() > pool.data_room() {
            return None;
        }
        let mut backing = pool.acquire()?;
        backing[..payload.len()].copy_from_slice(payload);
        Some(Mbuf {
            backing,
            len: payload.len(),
            pool: Some(Arc::clone(pool)),
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.backing[..self.len]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.backing[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for Mbuf {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.reclaim(std::mem::take(&mut self.backing));
        }
    }
}

impl fmt::Debug for Mbuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mbuf")
            .field("len", &self.len)
            .field("pool", &self.pool.as_ref().map(|p| p.name().to_string()))
            .finish()
    }
}
