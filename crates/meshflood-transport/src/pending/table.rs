//! The pending retransmission table.

use std::collections::HashMap;

use meshflood_core::GlobalPacketId;

use crate::pool::PooledPacket;

/// A packet queued for retransmission.
#[derive(Debug)]
pub struct PendingPacket {
    /// The copy this entry owns. Released when the entry is dropped.
    pub packet: PooledPacket,
    /// Absolute time (ms) of the next retry.
    pub next_tx_ms: u64,
    /// Counts down on every retry; at zero the next deadline gives up.
    pub retries_remaining: u8,
}

impl PendingPacket {
    pub fn new(packet: PooledPacket, retries_remaining: u8) -> Self {
        Self {
            packet,
            next_tx_ms: 0,
            retries_remaining,
        }
    }

    #[must_use]
    pub fn is_due(&self, now: u64) -> bool {
        self.next_tx_ms <= now
    }
}

/// Owning table from message identity to pending entry.
///
/// Removing an entry is the only way its packet copy goes back to the pool.
#[derive(Debug, Default)]
pub struct PendingTable {
    entries: HashMap<GlobalPacketId, PendingPacket>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Insert an entry. The caller must have removed any previous entry for
    /// `key` first.
    pub fn insert(&mut self, key: GlobalPacketId, entry: PendingPacket) {
        let replaced = self.entries.insert(key, entry);
        debug_assert!(replaced.is_none(), "pending entry for {key} replaced");
    }

    #[must_use]
    pub fn get(&self, key: &GlobalPacketId) -> Option<&PendingPacket> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &GlobalPacketId) -> Option<&mut PendingPacket> {
        self.entries.get_mut(key)
    }

    #[must_use]
    pub fn contains(&self, key: &GlobalPacketId) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove an entry the caller has just looked up.
    ///
    /// # Panics
    ///
    /// If the entry is gone or the table did not shrink by exactly one. Both
    /// mean ownership bookkeeping has diverged, and carrying on would risk
    /// releasing a packet copy twice.
    pub fn remove_present(&mut self, key: &GlobalPacketId) -> PendingPacket {
        let before = self.entries.len();
        let Some(entry) = self.entries.remove(key) else {
            panic!("pending retransmission table corrupted: {key} vanished during removal");
        };
        if self.entries.len() + 1 != before {
            panic!(
                "pending retransmission table corrupted: removing {key} took {before} entries to {}",
                self.entries.len()
            );
        }
        entry
    }

    /// Keys whose deadline has passed, in key order.
    pub fn due(&self, now: u64) -> Vec<GlobalPacketId> {
        let mut keys: Vec<GlobalPacketId> = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_due(now))
            .map(|(k, _)| *k)
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Earliest deadline across all entries.
    #[must_use]
    pub fn next_deadline(&self) -> Option<u64> {
        self.entries.values().map(|e| e.next_tx_ms).min()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
