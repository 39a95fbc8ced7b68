//! Bounded packet pool with owning handles.
//!
//! Every copy handed out by [`PacketPool::alloc_copy`] is a [`PooledPacket`]
//! that returns its slot when dropped. Ownership moves from holder to holder
//! (transmit queue, retransmission table) and the slot is released exactly
//! once, when the last holder lets go.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use meshflood_core::MeshPacket;

use crate::error::PoolError;

/// Default number of packet copies that may be alive at once.
pub const DEFAULT_POOL_CAPACITY: usize = 64;

#[derive(Debug)]
struct PoolInner {
    capacity: usize,
    in_use: AtomicUsize,
    released: AtomicU64,
}

/// Shared handle to a bounded packet arena. Cloning the handle does not
/// clone the pool.
#[derive(Clone)]
pub struct PacketPool {
    inner: Arc<PoolInner>,
}

impl PacketPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                capacity,
                in_use: AtomicUsize::new(0),
                released: AtomicU64::new(0),
            }),
        }
    }

    /// Take a slot and fill it with a copy of `packet`.
    pub fn alloc_copy(&self, packet: &MeshPacket) -> Result<PooledPacket, PoolError> {
        let capacity = self.inner.capacity;
        self.inner
            .in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < capacity).then_some(n + 1)
            })
            .map_err(|_| PoolError::Exhausted { capacity })?;

        Ok(PooledPacket {
            packet: Box::new(packet.clone()),
            pool: Arc::clone(&self.inner),
        })
    }

    /// Copies currently held by someone.
    pub fn in_use(&self) -> usize {
        self.inner.in_use.load(Ordering::Acquire)
    }

    /// Copies returned over the pool's lifetime.
    pub fn released(&self) -> u64 {
        self.inner.released.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }
}

impl Default for PacketPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}

impl fmt::Debug for PacketPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketPool")
            .field("capacity", &self.inner.capacity)
            .field("in_use", &self.in_use())
            .finish()
    }
}

/// A packet copy owned by exactly one holder.
///
/// Not `Clone`: a second copy has to come from the pool.
pub struct PooledPacket {
    packet: Box<MeshPacket>,
    pool: Arc<PoolInner>,
}

impl PooledPacket {
    /// Return the slot to the pool now.
    pub fn release(self) {
        drop(self);
    }
}

impl Deref for PooledPacket {
    type Target = MeshPacket;

    fn deref(&self) -> &MeshPacket {
        &self.packet
    }
}

impl DerefMut for PooledPacket {
    fn deref_mut(&mut self) -> &mut MeshPacket {
        &mut self.packet
    }
}

impl Drop for PooledPacket {
    fn drop(&mut self) {
        self.pool.in_use.fetch_sub(1, Ordering::AcqRel);
        self.pool.released.fetch_add(1, Ordering::AcqRel);
    }
}

impl fmt::Debug for PooledPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PooledPacket").field(&*self.packet).finish()
    }
}
