//! Router state, the egress hook and the ingress duplicate filter.

use meshflood_core::{DeviceConfig, DeviceRole, MeshPacket, NodeNum, PacketId, SendError};

use crate::dedup::SeenCache;
use crate::error::FloodError;
use crate::pending::{PendingTable, RELIABLE_RETRANSMISSIONS};
use crate::pool::{PacketPool, PooledPacket};
use crate::router::types::{Collaborators, FloodStats, FloodingConfig, Retransmission};
use crate::traits::{BaseRouter, Clock, LinkInterface, NodeIdentity};

/// Naive-flooding router layered over a [`BaseRouter`].
///
/// All hooks run to completion on the caller's thread and never block. The
/// router is not re-entrant: collaborators must not call back into it.
pub struct FloodingRouter<R, L, I, C> {
    pub(crate) router: R,
    pub(crate) link: L,
    pub(crate) identity: I,
    pub(crate) clock: C,
    pub(crate) pool: PacketPool,
    pub(crate) seen: SeenCache,
    pub(crate) device: DeviceConfig,
    pub(crate) retransmission: Retransmission,
    pub(crate) pending: PendingTable,
    pub(crate) stats: FloodStats,
}

impl<R, L, I, C> FloodingRouter<R, L, I, C>
where
    R: BaseRouter,
    L: LinkInterface,
    I: NodeIdentity,
    C: Clock,
{
    pub fn new(config: FloodingConfig, parts: Collaborators<R, L, I, C>) -> Self {
        Self {
            router: parts.router,
            link: parts.link,
            identity: parts.identity,
            clock: parts.clock,
            pool: parts.pool,
            seen: SeenCache::new(config.seen_window_ms, config.seen_capacity),
            device: config.device,
            retransmission: config.retransmission,
            pending: PendingTable::new(),
            stats: FloodStats::default(),
        }
    }

    pub fn router(&self) -> &R {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut R {
        &mut self.router
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn pool(&self) -> &PacketPool {
        &self.pool
    }

    pub fn seen(&self) -> &SeenCache {
        &self.seen
    }

    pub fn pending(&self) -> &PendingTable {
        &self.pending
    }

    pub fn stats(&self) -> FloodStats {
        self.stats
    }

    pub fn device(&self) -> DeviceConfig {
        self.device
    }

    pub fn node_num(&self) -> NodeNum {
        self.identity.node_num()
    }

    pub(crate) fn is_to_us(&self, packet: &MeshPacket) -> bool {
        packet.destination == self.identity.node_num()
    }

    pub(crate) fn is_from_us(&self, packet: &MeshPacket) -> bool {
        packet.origin == self.identity.node_num()
    }

    /// Send a locally originated packet.
    ///
    /// Stamps this node as the relayer and records the message as seen, so
    /// any later echo of it is suppressed as a duplicate. A queue-full error
    /// from the send path is returned as is and leaves nothing tracked.
    pub fn send(&mut self, mut packet: PooledPacket) -> Result<(), SendError> {
        let me = self.identity.node_num();
        packet.relay_node = self.identity.last_byte_of_node_num(me);
        let now = self.clock.now_ms();
        self.seen.was_seen_recently(packet.global_id(), now);

        let tracked = self.retransmission.is_enabled()
            && packet.want_ack
            && !packet.id.is_zero()
            && self.start_retransmission(&packet, RELIABLE_RETRANSMISSIONS);
        let id = packet.id;

        let result = self.router.send(packet);
        if result.is_err() && tracked {
            self.stop_retransmission(me, id);
        }
        result
    }

    /// Copy `packet` out of the pool and [`send`](Self::send) it.
    pub fn send_copy(&mut self, packet: &MeshPacket) -> Result<(), FloodError> {
        let copy = self.pool.alloc_copy(packet)?;
        self.send(copy)?;
        Ok(())
    }

    /// Ingress filter, called once per received packet before anything else.
    ///
    /// Returns `true` to drop the packet. Duplicates are always dropped, but
    /// first either get a corrective relay (the originator is repeating a
    /// reliable send) or cancel our own queued relay.
    pub fn should_filter_received(&mut self, packet: &MeshPacket) -> bool {
        let now = self.clock.now_ms();
        if !self.seen.was_seen_recently(packet.global_id(), now) {
            return self.router.should_filter_received(packet);
        }

        self.stats.rx_dupe += 1;
        tracing::debug!(
            origin = %packet.origin,
            id = %packet.id,
            hop_limit = packet.hop_limit,
            "ignoring duplicate"
        );

        if packet.is_repeated_reliable() {
            tracing::debug!(origin = %packet.origin, id = %packet.id, "repeated reliable tx");
            if !self.router.find_in_tx_queue(packet.origin, packet.id) {
                self.perhaps_rebroadcast(packet);
            }
        } else {
            self.perhaps_cancel_dupe(packet);
        }
        true
    }

    /// Whether hearing a duplicate should cancel our own queued relay.
    /// Dedicated routers relay regardless; only primary-radio duplicates
    /// count as evidence of a peer relay.
    pub fn role_allows_canceling_dupe(&self, packet: &MeshPacket) -> bool {
        !self.device.role.is_dedicated_router() && packet.transport_mechanism.is_primary_radio()
    }

    /// Handle an ordinary duplicate: some other node already relayed it.
    pub fn perhaps_cancel_dupe(&mut self, packet: &MeshPacket) {
        if self.role_allows_canceling_dupe(packet)
            && self.router.cancel_sending(packet.origin, packet.id)
        {
            self.stats.tx_relay_canceled += 1;
            tracing::debug!(origin = %packet.origin, id = %packet.id, "cancelled queued relay");
        }

        if self.device.role == DeviceRole::RouterLate {
            self.link
                .clamp_to_late_rebroadcast_window(packet.origin, packet.id);
        }

        // Overhearing the relay is an implicit acknowledgement
        if self.retransmission.is_enabled() {
            self.stop_retransmission(packet.origin, packet.id);
        }
    }

    /// Ask the send path to forget a queued packet. Thin pass-through used by
    /// the enclosing stack.
    pub fn cancel_sending(&mut self, origin: NodeNum, id: PacketId) -> bool {
        self.router.cancel_sending(origin, id)
    }
}
