//! Flood routing layer for the meshflood network stack.
//!
//! This crate decides whether a received broadcast is a duplicate, whether
//! and how to relay it, when a queued relay has become redundant, and when a
//! reliable flood should be sent again. Transmission itself, queue
//! admission and the packet codec belong to the collaborators described in
//! [`traits`].

pub mod dedup;
pub mod error;
pub mod pending;
pub mod pool;
pub mod router;
pub mod traits;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use dedup::SeenCache;
pub use error::{FloodError, PoolError};
pub use pending::{PendingPacket, PendingTable};
pub use pool::{PacketPool, PooledPacket};
pub use router::{Collaborators, FloodStats, FloodingConfig, FloodingRouter, Retransmission};
pub use traits::{BaseRouter, Clock, LinkInterface, NodeIdentity};
