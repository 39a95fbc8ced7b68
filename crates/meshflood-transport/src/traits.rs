//! Collaborator contracts consumed by the flood router.
//!
//! The flood router never transmits, queues or times anything itself. It is
//! handed these collaborators at construction and calls them synchronously;
//! none of the methods may block.

use meshflood_core::{MeshPacket, NodeNum, PacketId, Routing, SendError};

use crate::pool::PooledPacket;

/// The general packet router underneath the flood layer.
///
/// `should_filter_received` and `sniff_received` are the base-case
/// extension points; their defaults accept everything and do nothing.
pub trait BaseRouter {
    /// Queue a packet for transmission. Ownership of the copy passes to the
    /// send path whether or not queuing succeeds.
    fn send(&mut self, packet: PooledPacket) -> Result<(), SendError>;

    /// Remove a not-yet-transmitted packet matching `(origin, id)` from the
    /// outbound queue. Returns whether one was found.
    fn cancel_sending(&mut self, origin: NodeNum, id: PacketId) -> bool;

    /// Whether a packet matching `(origin, id)` is still waiting to go out.
    fn find_in_tx_queue(&self, origin: NodeNum, id: PacketId) -> bool;

    /// Base-case receive filter, consulted for packets that are not
    /// duplicates. Return `true` to drop the packet.
    fn should_filter_received(&mut self, _packet: &MeshPacket) -> bool {
        false
    }

    /// Base-case handling of an accepted packet (local delivery).
    fn sniff_received(&mut self, _packet: &MeshPacket, _routing: Option<&Routing>) {}

    /// Ask the enclosing loop to run again soon so a new deadline is seen.
    fn request_wakeup(&mut self) {}
}

/// The radio (or other link) interface's timing policy.
pub trait LinkInterface {
    /// How long to wait before retransmitting `packet` on this link.
    fn retransmission_delay_ms(&self, packet: &MeshPacket) -> u64;

    /// Shrink the late-rebroadcast window for a queued relay of
    /// `(origin, id)`; only the late-router role calls this.
    fn clamp_to_late_rebroadcast_window(&mut self, origin: NodeNum, id: PacketId);
}

/// Node identity service.
pub trait NodeIdentity {
    fn node_num(&self) -> NodeNum;

    /// Compact relay stamp for `num`.
    fn last_byte_of_node_num(&self, num: NodeNum) -> u8 {
        num.last_byte()
    }
}

impl NodeIdentity for NodeNum {
    fn node_num(&self) -> NodeNum {
        *self
    }
}

/// Monotonic millisecond clock.
pub trait Clock {
    fn now_ms(&self) -> u64;
}
