//! Clocks for driving a node from tokio or from a simulation.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use meshflood_transport::Clock;

/// Milliseconds since construction, measured on tokio's clock so paused
/// test time applies.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    start: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            start: tokio::time::Instant::now(),
        }
    }

    /// The tokio instant corresponding to `ms` on this clock.
    pub fn instant_at(&self, ms: u64) -> tokio::time::Instant {
        self.start + std::time::Duration::from_millis(ms)
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Discrete simulation time shared by every node in a [`crate::Simulation`].
#[derive(Debug, Clone, Default)]
pub struct SimClock(Arc<AtomicU64>);

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, ms: u64) {
        self.0.store(ms, Ordering::Release);
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }
}
