//! Newtype wrappers for node and packet identifiers.
//!
//! Node numbers and packet ids are both 32-bit on the air; the wrappers keep
//! them from being mixed up when they travel together as a
//! [`GlobalPacketId`].

use core::fmt;

use crate::constants::BROADCAST_ADDR;

/// A node number, unique per device in the mesh.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodeNum(pub u32);

impl NodeNum {
    /// The broadcast marker used as a destination.
    pub const BROADCAST: NodeNum = NodeNum(BROADCAST_ADDR);

    pub const fn new(num: u32) -> Self {
        Self(num)
    }

    #[must_use]
    pub const fn is_broadcast(self) -> bool {
        self.0 == BROADCAST_ADDR
    }

    /// Compact one-byte identity stamped into `relay_node`.
    #[must_use]
    pub const fn last_byte(self) -> u8 {
        (self.0 & 0xFF) as u8
    }
}

impl fmt::Display for NodeNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_broadcast() {
            write!(f, "^all")
        } else {
            write!(f, "!{:08x}", self.0)
        }
    }
}

impl fmt::Debug for NodeNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeNum({self})")
    }
}

impl From<u32> for NodeNum {
    fn from(num: u32) -> Self {
        Self(num)
    }
}

/// A packet identifier assigned by the originator.
///
/// Zero is reserved for fire-and-forget broadcasts that are never relayed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PacketId(pub u32);

impl PacketId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl fmt::Debug for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PacketId({self})")
    }
}

impl From<u32> for PacketId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Names one logical message across the network: the originating node plus
/// the id that node assigned. Relays never change either half.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlobalPacketId {
    pub node: NodeNum,
    pub id: PacketId,
}

impl GlobalPacketId {
    pub const fn new(node: NodeNum, id: PacketId) -> Self {
        Self { node, id }
    }
}

impl fmt::Display for GlobalPacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.node, self.id)
    }
}

impl fmt::Debug for GlobalPacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GlobalPacketId({self})")
    }
}
