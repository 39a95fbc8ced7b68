//! Seen-message cache using two-generation rotation.
//!
//! Keeps a current and a previous set of [`GlobalPacketId`]s. The current
//! set becomes the previous one once it is older than the retention window
//! or holds `capacity` entries, so a record survives at least one window
//! and at most two. Both sets are checked for duplicates.

use std::collections::HashSet;

use meshflood_core::GlobalPacketId;

/// How long a flood can plausibly keep echoing around the mesh (10 minutes).
pub const SEEN_WINDOW_MS: u64 = 10 * 60 * 1000;

/// Entries per generation before an early rotation.
pub const SEEN_CAPACITY: usize = 256;

/// Bounded-time record of messages this node has already handled.
#[derive(Debug)]
pub struct SeenCache {
    current: HashSet<GlobalPacketId>,
    prev: HashSet<GlobalPacketId>,
    generation_start: u64,
    window_ms: u64,
    capacity: usize,
}

impl SeenCache {
    pub fn new(window_ms: u64, capacity: usize) -> Self {
        Self {
            current: HashSet::new(),
            prev: HashSet::new(),
            generation_start: 0,
            window_ms,
            capacity: capacity.max(1),
        }
    }

    /// Check membership without recording anything.
    #[must_use]
    pub fn contains(&self, key: &GlobalPacketId) -> bool {
        self.current.contains(key) || self.prev.contains(key)
    }

    /// Return `true` if `key` was already recorded. The key is recorded
    /// either way, so the first sighting opens its dedup window and later
    /// ones report a duplicate.
    pub fn was_seen_recently(&mut self, key: GlobalPacketId, now: u64) -> bool {
        self.maybe_rotate(now);
        if self.contains(&key) {
            return true;
        }
        self.current.insert(key);
        false
    }

    fn maybe_rotate(&mut self, now: u64) {
        let expired = now.saturating_sub(self.generation_start) >= self.window_ms;
        if expired || self.current.len() >= self.capacity {
            self.prev = std::mem::take(&mut self.current);
            self.generation_start = now;
        }
    }

    /// Total number of tracked messages across both generations.
    pub fn len(&self) -> usize {
        self.current.len() + self.prev.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty() && self.prev.is_empty()
    }
}

impl Default for SeenCache {
    fn default() -> Self {
        Self::new(SEEN_WINDOW_MS, SEEN_CAPACITY)
    }
}
