//! Pending retransmissions of reliable floods.
//!
//! Each entry owns one pooled copy of the packet it will resend. Entries are
//! keyed by [`meshflood_core::GlobalPacketId`], so a message has at most one
//! live entry.

pub mod constants;
pub mod table;

pub use constants::*;
pub use table::{PendingPacket, PendingTable};
