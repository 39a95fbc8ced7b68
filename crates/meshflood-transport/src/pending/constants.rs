//! Retransmission budgets.

/// Retransmissions the original sender of a reliable packet performs.
pub const RELIABLE_RETRANSMISSIONS: u8 = 3;

/// Default `max_rexmit` for relayed reliable floods.
pub const DEFAULT_MAX_REXMIT: u8 = 2;

/// Retransmissions a relay performs for a flood it forwarded.
pub const fn intermediate_retransmissions(max_rexmit: u8) -> u8 {
    max_rexmit.saturating_add(1)
}
