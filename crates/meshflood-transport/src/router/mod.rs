//! The flooding router.
//!
//! [`FloodingRouter`] wraps a [`crate::traits::BaseRouter`] and hooks its
//! receive, sniff and send paths: duplicates are filtered, novel broadcasts
//! are relayed with one hop less, queued relays are cancelled once a peer is
//! heard relaying the same message, and reliable floods are retried on a
//! timer until acknowledged or out of budget.

pub mod flooding;
pub mod rebroadcast;
pub mod retransmit;
pub mod types;

pub use flooding::FloodingRouter;
pub use types::{Collaborators, FloodStats, FloodingConfig, Retransmission};
