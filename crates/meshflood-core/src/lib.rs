//! Core types and constants for the meshflood broadcast routing layer.
//!
//! This crate defines the node and packet identifiers, the in-memory mesh
//! packet model, and the read-only device configuration consumed by the
//! flood router. Packet encoding happens upstream; nothing here touches the
//! wire.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod config;
pub mod constants;
pub mod error;
pub mod packet;
pub mod types;

pub use config::{DeviceConfig, DeviceRole, RebroadcastMode};
pub use error::SendError;
pub use packet::{
    DecodedPayload, MeshPacket, Payload, Routing, RoutingError, TransportMechanism,
};
pub use types::{GlobalPacketId, NodeNum, PacketId};
