//! The in-memory mesh packet.
//!
//! Only the header fields the flood router reasons about are modelled, plus
//! the decoded ACK/reply correlation ids. Encoding and encryption are done
//! upstream.

use alloc::vec::Vec;

use crate::constants::{HOP_MAX, NO_NEXT_HOP_PREFERENCE, NO_RELAY_NODE};
use crate::types::{GlobalPacketId, NodeNum, PacketId};

/// How a packet reached (or will leave) this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportMechanism {
    /// Generated on this node.
    #[default]
    Internal,
    /// The primary radio.
    Lora,
    /// Secondary radios.
    LoraAlt1,
    LoraAlt2,
    LoraAlt3,
    /// Internet backhaul.
    Mqtt,
    /// LAN multicast backhaul.
    MulticastUdp,
    /// A connected client application.
    Api,
}

impl TransportMechanism {
    /// Whether this is the primary radio transport.
    #[must_use]
    pub const fn is_primary_radio(self) -> bool {
        matches!(self, TransportMechanism::Lora)
    }
}

/// Decoded application payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedPayload {
    /// Application port number.
    pub portnum: u32,
    pub data: Vec<u8>,
    /// Id of the request this packet answers (ACK or NAK), 0 if none.
    pub request_id: u32,
    /// Id of the message this packet replies to, 0 if none.
    pub reply_id: u32,
}

/// Packet body as seen by the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Decoded(DecodedPayload),
    /// Still encrypted for a channel this node cannot read.
    Encrypted(Vec<u8>),
}

impl Default for Payload {
    fn default() -> Self {
        Payload::Encrypted(Vec::new())
    }
}

/// Outcome carried by a routing control message (ACK or NAK).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RoutingError {
    /// Delivered; this is a plain ACK.
    #[default]
    None,
    NoRoute,
    MaxRetransmit,
}

/// Decoded routing control message that may accompany a received packet.
/// The flood layer only passes it through to the base router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Routing {
    pub error_reason: RoutingError,
}

/// A mesh packet header plus payload.
///
/// `hop_limit <= hop_start` holds for every packet built through the
/// constructors; relays only ever decrement `hop_limit`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MeshPacket {
    /// Original sender.
    pub origin: NodeNum,
    /// Final destination or [`NodeNum::BROADCAST`].
    pub destination: NodeNum,
    pub id: PacketId,
    /// Remaining rebroadcast budget.
    pub hop_limit: u8,
    /// Budget the originator started with.
    pub hop_start: u8,
    /// Last byte of the most recent relayer's node number.
    pub relay_node: u8,
    /// Routing hint for directed relays.
    pub next_hop: u8,
    pub transport_mechanism: TransportMechanism,
    pub want_ack: bool,
    pub payload: Payload,
}

impl MeshPacket {
    /// A flood broadcast with a fresh hop budget.
    pub fn broadcast(origin: NodeNum, id: PacketId, hop_limit: u8) -> Self {
        Self::direct(origin, NodeNum::BROADCAST, id, hop_limit)
    }

    /// A packet addressed to a single node.
    pub fn direct(origin: NodeNum, destination: NodeNum, id: PacketId, hop_limit: u8) -> Self {
        let hops = hop_limit.min(HOP_MAX);
        Self {
            origin,
            destination,
            id,
            hop_limit: hops,
            hop_start: hops,
            relay_node: NO_RELAY_NODE,
            next_hop: NO_NEXT_HOP_PREFERENCE,
            transport_mechanism: TransportMechanism::Internal,
            want_ack: false,
            payload: Payload::default(),
        }
    }

    #[must_use]
    pub fn with_want_ack(mut self, want_ack: bool) -> Self {
        self.want_ack = want_ack;
        self
    }

    #[must_use]
    pub fn with_transport(mut self, transport: TransportMechanism) -> Self {
        self.transport_mechanism = transport;
        self
    }

    #[must_use]
    pub fn with_decoded(mut self, decoded: DecodedPayload) -> Self {
        self.payload = Payload::Decoded(decoded);
        self
    }

    /// Simulate the packet having travelled `hops` relays.
    #[must_use]
    pub fn with_hops_taken(mut self, hops: u8) -> Self {
        self.hop_limit = self.hop_limit.saturating_sub(hops);
        self
    }

    /// The network-wide identity of this message.
    pub fn global_id(&self) -> GlobalPacketId {
        GlobalPacketId::new(self.origin, self.id)
    }

    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self.destination.is_broadcast()
    }

    /// The originator is resending because it believes its first copy was
    /// lost: nobody has relayed this copy yet.
    #[must_use]
    pub fn is_repeated_reliable(&self) -> bool {
        self.hop_start > 0 && self.hop_start == self.hop_limit
    }

    /// Decoded payload, if this node could decode it.
    pub fn decoded(&self) -> Option<&DecodedPayload> {
        match &self.payload {
            Payload::Decoded(d) => Some(d),
            Payload::Encrypted(_) => None,
        }
    }

    /// Whether the packet answers an earlier request (ACK, NAK or reply).
    #[must_use]
    pub fn is_ack_or_reply(&self) -> bool {
        self.decoded()
            .is_some_and(|d| d.request_id != 0 || d.reply_id != 0)
    }

    /// Number of relays this copy has been through.
    #[must_use]
    pub fn hops_away(&self) -> u8 {
        self.hop_start.saturating_sub(self.hop_limit)
    }
}
