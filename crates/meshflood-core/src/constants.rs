//! Protocol constants.

/// Destination address meaning "every node".
pub const BROADCAST_ADDR: u32 = 0xFFFF_FFFF;

/// `next_hop` value carried by flood relays (no routing hint).
pub const NO_NEXT_HOP_PREFERENCE: u8 = 0;

/// `relay_node` value for a packet nobody has relayed yet.
pub const NO_RELAY_NODE: u8 = 0;

/// Largest hop budget an originator may set.
pub const HOP_MAX: u8 = 7;

/// Hop budget used when the originator does not choose one.
pub const HOP_RELIABLE: u8 = 3;
