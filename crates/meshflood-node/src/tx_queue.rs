//! Bounded transmit queue in front of the radio.
//!
//! Packets wait here until their contention delay has passed. Nothing in the
//! queue blocks: a full queue rejects the packet, which drops the pooled
//! copy back to its pool.

use meshflood_core::{GlobalPacketId, NodeNum, PacketId, SendError};
use meshflood_transport::PooledPacket;

/// A packet waiting for its transmit slot.
#[derive(Debug)]
pub struct QueuedPacket {
    pub packet: PooledPacket,
    /// Earliest time (ms) this packet may go out.
    pub tx_at_ms: u64,
    /// Held back by the late-router window.
    pub late: bool,
}

#[derive(Debug)]
pub struct TxQueue {
    entries: Vec<QueuedPacket>,
    capacity: usize,
}

impl TxQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn enqueue(&mut self, packet: PooledPacket, tx_at_ms: u64, late: bool) -> Result<(), SendError> {
        if self.entries.len() >= self.capacity {
            tracing::warn!(
                origin = %packet.origin,
                id = %packet.id,
                capacity = self.capacity,
                "transmit queue full"
            );
            return Err(SendError::QueueFull);
        }
        self.entries.push(QueuedPacket {
            packet,
            tx_at_ms,
            late,
        });
        Ok(())
    }

    fn position(&self, origin: NodeNum, id: PacketId) -> Option<usize> {
        let key = GlobalPacketId::new(origin, id);
        self.entries.iter().position(|e| e.packet.global_id() == key)
    }

    /// Drop the first queued packet matching `(origin, id)`.
    pub fn cancel(&mut self, origin: NodeNum, id: PacketId) -> bool {
        match self.position(origin, id) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, origin: NodeNum, id: PacketId) -> bool {
        self.position(origin, id).is_some()
    }

    /// Pull a late packet for `(origin, id)` forward to `latest_tx_ms` at
    /// the latest. Returns whether a late packet was found.
    pub fn clamp(&mut self, origin: NodeNum, id: PacketId, latest_tx_ms: u64) -> bool {
        let Some(index) = self.position(origin, id) else {
            return false;
        };
        let entry = &mut self.entries[index];
        if !entry.late {
            return false;
        }
        entry.tx_at_ms = entry.tx_at_ms.min(latest_tx_ms);
        entry.late = false;
        true
    }

    /// Remove and return the packet whose slot came up first, if any is due.
    /// Ties go to the packet queued first.
    pub fn pop_ready(&mut self, now: u64) -> Option<PooledPacket> {
        let index = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.tx_at_ms <= now)
            .min_by_key(|(i, e)| (e.tx_at_ms, *i))
            .map(|(i, _)| i)?;
        Some(self.entries.remove(index).packet)
    }

    /// Earliest transmit time across the queue.
    pub fn next_ready_at(&self) -> Option<u64> {
        self.entries.iter().map(|e| e.tx_at_ms).min()
    }

    pub fn get(&self, origin: NodeNum, id: PacketId) -> Option<&QueuedPacket> {
        self.position(origin, id).map(|i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
