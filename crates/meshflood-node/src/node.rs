//! A mesh node: the flood router wired to its queue, radio and clock.

use meshflood_core::{DecodedPayload, MeshPacket, NodeNum, PacketId, TransportMechanism};
use meshflood_transport::{
    Clock, Collaborators, FloodStats, FloodingRouter, PacketPool, PooledPacket,
};

use crate::config::NodeSettings;
use crate::error::NodeError;
use crate::radio::RadioLink;
use crate::router::MeshRouter;

/// Port number used for plain text messages.
pub const TEXT_MESSAGE_PORT: u32 = 1;

/// How long an idle node may sleep before polling again.
pub const IDLE_POLL_MS: u64 = 60_000;

pub type NodeFloodRouter<C> = FloodingRouter<MeshRouter<C>, RadioLink, NodeNum, C>;

/// One node on the mesh.
pub struct MeshNode<C: Clock> {
    flood: NodeFloodRouter<C>,
    hop_limit: u8,
    next_id: u32,
    transmitted: u32,
}

impl<C: Clock + Clone> MeshNode<C> {
    /// Build a node. `seed` drives the contention RNG.
    pub fn new(settings: &NodeSettings, clock: C, seed: u64) -> Self {
        let role = settings.flooding.device.role;
        let router = MeshRouter::new(
            settings.node_num,
            role,
            settings.timing,
            settings.tx_queue_capacity,
            clock.clone(),
            seed,
        );
        let flood = FloodingRouter::new(
            settings.flooding,
            Collaborators {
                router,
                link: RadioLink::new(settings.timing),
                identity: settings.node_num,
                clock,
                pool: PacketPool::new(settings.pool_capacity),
            },
        );
        tracing::info!(
            node = %settings.node_num,
            role = %role,
            "node created"
        );
        Self {
            flood,
            hop_limit: settings.hop_limit,
            // Id 0 means "no id"; start from the node number so different
            // nodes do not share ids in a small simulation
            next_id: settings.node_num.0.wrapping_shl(8).max(1),
            transmitted: 0,
        }
    }
}

impl<C: Clock> MeshNode<C> {
    pub fn node_num(&self) -> NodeNum {
        self.flood.node_num()
    }

    pub fn flood(&self) -> &NodeFloodRouter<C> {
        &self.flood
    }

    pub fn stats(&self) -> FloodStats {
        self.flood.stats()
    }

    /// Packets delivered to this node.
    pub fn delivered(&self) -> &[MeshPacket] {
        self.flood.router().delivered()
    }

    /// Packets this node put on the air.
    pub fn transmitted(&self) -> u32 {
        self.transmitted
    }

    /// Handle a packet heard on the radio. Returns `false` if the ingress
    /// filter dropped it.
    pub fn receive(&mut self, packet: &MeshPacket) -> bool {
        let accepted = if self.flood.should_filter_received(packet) {
            false
        } else {
            self.flood.sniff_received(packet, None);
            true
        };
        self.apply_clamps();
        accepted
    }

    fn apply_clamps(&mut self) {
        for key in self.flood.link_mut().take_clamps() {
            self.flood.router_mut().clamp_late(key.node, key.id);
        }
    }

    /// Originate a text message. `None` broadcasts it.
    pub fn send_text(
        &mut self,
        destination: Option<NodeNum>,
        text: &str,
        want_ack: bool,
    ) -> Result<PacketId, NodeError> {
        let payload = DecodedPayload {
            portnum: TEXT_MESSAGE_PORT,
            data: text.as_bytes().to_vec(),
            ..Default::default()
        };
        self.send_local(destination, payload, want_ack)
    }

    /// Originate a packet from this node.
    pub fn send_local(
        &mut self,
        destination: Option<NodeNum>,
        payload: DecodedPayload,
        want_ack: bool,
    ) -> Result<PacketId, NodeError> {
        let id = self.allocate_id();
        let me = self.node_num();
        let packet = MeshPacket::direct(
            me,
            destination.unwrap_or(NodeNum::BROADCAST),
            id,
            self.hop_limit,
        )
        .with_want_ack(want_ack)
        .with_decoded(payload);

        self.flood.send_copy(&packet)?;
        tracing::info!(
            node = %me,
            to = %packet.destination,
            id = %id,
            want_ack,
            "sent local packet"
        );
        Ok(id)
    }

    fn allocate_id(&mut self) -> PacketId {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        PacketId(id)
    }

    /// Run due retransmissions. Returns how long the node may sleep before
    /// anything else is due.
    pub fn tick(&mut self) -> u64 {
        let retransmit_in = self.flood.run_once(IDLE_POLL_MS);
        let now = self.flood.clock().now_ms();
        match self.flood.router().queue().next_ready_at() {
            Some(at) => retransmit_in.min(at.saturating_sub(now)),
            None => retransmit_in,
        }
    }

    /// Absolute time (ms) of the next queued transmission or retransmission.
    pub fn next_event_at(&self) -> Option<u64> {
        let tx = self.flood.router().queue().next_ready_at();
        let rexmit = self.flood.pending().next_deadline();
        match (tx, rexmit) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Take every packet whose transmit slot has come up. Returned packets
    /// are what goes on the air; their pool slots are freed.
    pub fn transmit_ready(&mut self) -> Vec<MeshPacket> {
        let now = self.flood.clock().now_ms();
        let mut out = Vec::new();
        while let Some(copy) = self.flood.router_mut().queue_mut().pop_ready(now) {
            out.push(Self::on_air(copy));
        }
        self.transmitted += out.len() as u32;
        out
    }

    fn on_air(copy: PooledPacket) -> MeshPacket {
        let mut packet = (*copy).clone();
        packet.transport_mechanism = TransportMechanism::Lora;
        tracing::trace!(origin = %packet.origin, id = %packet.id, hop_limit = packet.hop_limit, "transmit");
        packet
    }
}
