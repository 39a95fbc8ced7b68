//! Flooding router configuration and statistics.

use meshflood_core::DeviceConfig;

use crate::dedup::{SEEN_CAPACITY, SEEN_WINDOW_MS};
use crate::pending::{DEFAULT_MAX_REXMIT, intermediate_retransmissions};
use crate::pool::PacketPool;

/// Whether reliable floods are tracked and retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retransmission {
    /// Relay once and rely on redundancy.
    Disabled,
    /// Track reliable floods. Relays retry `max_rexmit + 1` times; relay
    /// tracking is off when `max_rexmit` is zero.
    Enabled { max_rexmit: u8 },
}

impl Retransmission {
    /// Map a configured `max_rexmit` to a mode; zero disables tracking.
    pub const fn from_max_rexmit(max_rexmit: u8) -> Self {
        if max_rexmit == 0 {
            Retransmission::Disabled
        } else {
            Retransmission::Enabled { max_rexmit }
        }
    }

    #[must_use]
    pub const fn is_enabled(self) -> bool {
        matches!(self, Retransmission::Enabled { .. })
    }

    /// Retry budget for a relayed flood, if relays are tracked at all.
    pub const fn intermediate_budget(self) -> Option<u8> {
        match self {
            Retransmission::Enabled { max_rexmit } if max_rexmit > 0 => {
                Some(intermediate_retransmissions(max_rexmit))
            }
            _ => None,
        }
    }
}

impl Default for Retransmission {
    fn default() -> Self {
        Retransmission::Enabled {
            max_rexmit: DEFAULT_MAX_REXMIT,
        }
    }
}

/// Runtime configuration of a [`super::FloodingRouter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloodingConfig {
    pub device: DeviceConfig,
    pub retransmission: Retransmission,
    /// Retention window of the seen-message cache.
    pub seen_window_ms: u64,
    /// Entries per seen-cache generation.
    pub seen_capacity: usize,
}

impl Default for FloodingConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            retransmission: Retransmission::default(),
            seen_window_ms: SEEN_WINDOW_MS,
            seen_capacity: SEEN_CAPACITY,
        }
    }
}

/// The collaborators a [`super::FloodingRouter`] is built from.
pub struct Collaborators<R, L, I, C> {
    pub router: R,
    pub link: L,
    pub identity: I,
    pub clock: C,
    pub pool: PacketPool,
}

/// Counters kept for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FloodStats {
    /// Duplicate receptions dropped by the ingress filter.
    pub rx_dupe: u32,
    /// Queued relays cancelled because a peer relayed first.
    pub tx_relay_canceled: u32,
    /// Relayed copies handed to the send path.
    pub relayed: u32,
    /// Retransmissions handed to the send path.
    pub retransmitted: u32,
    /// Pending entries dropped after running out of retries.
    pub retransmissions_expired: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_max_rexmit() {
        assert_eq!(Retransmission::from_max_rexmit(0), Retransmission::Disabled);
        assert_eq!(
            Retransmission::from_max_rexmit(2),
            Retransmission::Enabled { max_rexmit: 2 }
        );
    }

    #[test]
    fn test_intermediate_budget() {
        assert_eq!(Retransmission::Disabled.intermediate_budget(), None);
        assert_eq!(
            Retransmission::Enabled { max_rexmit: 0 }.intermediate_budget(),
            None
        );
        assert_eq!(
            Retransmission::Enabled { max_rexmit: 2 }.intermediate_budget(),
            Some(3)
        );
    }

    #[test]
    fn test_default_config_tracks_retransmissions() {
        let config = FloodingConfig::default();
        assert!(config.retransmission.is_enabled());
        assert!(config.device.is_rebroadcaster());
        assert_eq!(config.seen_window_ms, SEEN_WINDOW_MS);
    }
}
