//! Read-only device configuration consulted by the flood router.

use core::fmt;

/// The device role, which decides how aggressively a node relays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceRole {
    /// Ordinary messaging node. Relays, but yields to other relayers.
    #[default]
    Client,
    /// Never relays.
    ClientMute,
    /// Relays, hidden from node lists.
    ClientHidden,
    /// Position beacon.
    Tracker,
    /// Telemetry beacon.
    Sensor,
    /// Infrastructure node that always relays.
    Router,
    /// Router that relays after ordinary nodes had their chance.
    RouterLate,
    /// Relay-only infrastructure node.
    Repeater,
}

impl DeviceRole {
    /// Dedicated infrastructure roles rebroadcast unconditionally, even when
    /// another node was heard relaying the same message.
    #[must_use]
    pub const fn is_dedicated_router(self) -> bool {
        matches!(
            self,
            DeviceRole::Router | DeviceRole::RouterLate | DeviceRole::Repeater
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            DeviceRole::Client => "client",
            DeviceRole::ClientMute => "client_mute",
            DeviceRole::ClientHidden => "client_hidden",
            DeviceRole::Tracker => "tracker",
            DeviceRole::Sensor => "sensor",
            DeviceRole::Router => "router",
            DeviceRole::RouterLate => "router_late",
            DeviceRole::Repeater => "repeater",
        }
    }
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether this node relays packets it did not originate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RebroadcastMode {
    #[default]
    All,
    None,
}

impl fmt::Display for RebroadcastMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebroadcastMode::All => f.write_str("all"),
            RebroadcastMode::None => f.write_str("none"),
        }
    }
}

/// Device settings the router reads but never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceConfig {
    pub role: DeviceRole,
    pub rebroadcast_mode: RebroadcastMode,
}

impl DeviceConfig {
    pub const fn new(role: DeviceRole, rebroadcast_mode: RebroadcastMode) -> Self {
        Self {
            role,
            rebroadcast_mode,
        }
    }

    /// False only for the muted-client role or when rebroadcasting is
    /// switched off.
    #[must_use]
    pub const fn is_rebroadcaster(&self) -> bool {
        !matches!(self.role, DeviceRole::ClientMute)
            && !matches!(self.rebroadcast_mode, RebroadcastMode::None)
    }
}
