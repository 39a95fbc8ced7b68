//! TOML-based configuration for mesh nodes and simulations.

use std::path::Path;

use serde::Deserialize;

use meshflood_core::constants::HOP_RELIABLE;
use meshflood_core::{DeviceConfig, DeviceRole, NodeNum, RebroadcastMode};
use meshflood_transport::{FloodingConfig, Retransmission};

use crate::error::NodeError;
use crate::radio::RadioTiming;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub node: NodeSection,
    #[serde(default)]
    pub flooding: FloodingSection,
    #[serde(default)]
    pub radio: RadioSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub sim: SimSection,
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("failed to read config file: {e}")))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(format!("failed to parse config: {e}")))
    }

    /// Settings for the node described by the `[node]` section.
    pub fn local_settings(&self) -> Result<NodeSettings, NodeError> {
        let device = DeviceConfig::new(
            parse_role(&self.node.role)?,
            parse_rebroadcast_mode(&self.node.rebroadcast_mode)?,
        );
        self.settings_for(NodeNum(self.node.node_num), device)
    }

    /// Settings for a `[[sim.nodes]]` entry. Unset fields fall back to the
    /// `[node]` section.
    pub fn sim_node_settings(&self, entry: &SimNodeEntry) -> Result<NodeSettings, NodeError> {
        let role = entry.role.as_deref().unwrap_or(&self.node.role);
        let mode = entry
            .rebroadcast_mode
            .as_deref()
            .unwrap_or(&self.node.rebroadcast_mode);
        let device = DeviceConfig::new(parse_role(role)?, parse_rebroadcast_mode(mode)?);
        self.settings_for(NodeNum(entry.node_num), device)
    }

    fn settings_for(&self, node_num: NodeNum, device: DeviceConfig) -> Result<NodeSettings, NodeError> {
        if node_num.is_broadcast() || node_num.0 == 0 {
            return Err(NodeError::Config(format!(
                "node_num {node_num} is reserved"
            )));
        }
        if self.radio.bitrate_bps == 0 {
            return Err(NodeError::Config("bitrate_bps must be positive".into()));
        }
        Ok(NodeSettings {
            node_num,
            hop_limit: self.node.hop_limit,
            flooding: FloodingConfig {
                device,
                retransmission: Retransmission::from_max_rexmit(self.flooding.max_rexmit),
                seen_window_ms: self.flooding.seen_window_secs.saturating_mul(1000),
                seen_capacity: self.flooding.seen_capacity,
            },
            timing: RadioTiming::from(&self.radio),
            tx_queue_capacity: self.radio.tx_queue_capacity,
            pool_capacity: self.radio.pool_capacity,
        })
    }
}

/// Everything needed to build one [`crate::MeshNode`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeSettings {
    pub node_num: NodeNum,
    /// Hop budget for locally originated packets.
    pub hop_limit: u8,
    pub flooding: FloodingConfig,
    pub timing: RadioTiming,
    pub tx_queue_capacity: usize,
    pub pool_capacity: usize,
}

/// The `[node]` section.
#[derive(Debug, Deserialize)]
pub struct NodeSection {
    #[serde(default = "default_node_num")]
    pub node_num: u32,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default = "default_rebroadcast_mode")]
    pub rebroadcast_mode: String,
    #[serde(default = "default_hop_limit")]
    pub hop_limit: u8,
}

fn default_node_num() -> u32 {
    1
}

fn default_role() -> String {
    "client".to_string()
}

fn default_rebroadcast_mode() -> String {
    "all".to_string()
}

fn default_hop_limit() -> u8 {
    HOP_RELIABLE
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            node_num: default_node_num(),
            role: default_role(),
            rebroadcast_mode: default_rebroadcast_mode(),
            hop_limit: default_hop_limit(),
        }
    }
}

/// The `[flooding]` section.
#[derive(Debug, Deserialize)]
pub struct FloodingSection {
    /// Extra retries for relayed reliable floods. 0 disables retransmission.
    #[serde(default = "default_max_rexmit")]
    pub max_rexmit: u8,
    #[serde(default = "default_seen_window_secs")]
    pub seen_window_secs: u64,
    #[serde(default = "default_seen_capacity")]
    pub seen_capacity: usize,
}

fn default_max_rexmit() -> u8 {
    meshflood_transport::pending::DEFAULT_MAX_REXMIT
}

fn default_seen_window_secs() -> u64 {
    meshflood_transport::dedup::SEEN_WINDOW_MS / 1000
}

fn default_seen_capacity() -> usize {
    meshflood_transport::dedup::SEEN_CAPACITY
}

impl Default for FloodingSection {
    fn default() -> Self {
        Self {
            max_rexmit: default_max_rexmit(),
            seen_window_secs: default_seen_window_secs(),
            seen_capacity: default_seen_capacity(),
        }
    }
}

/// The `[radio]` section. Timing values describe the simulated channel.
#[derive(Debug, Deserialize)]
pub struct RadioSection {
    #[serde(default = "default_tx_queue_capacity")]
    pub tx_queue_capacity: usize,
    #[serde(default = "default_pool_capacity")]
    pub pool_capacity: usize,
    #[serde(default = "default_bitrate_bps")]
    pub bitrate_bps: u32,
    #[serde(default = "default_slot_time_ms")]
    pub slot_time_ms: u64,
    #[serde(default = "default_cw_min")]
    pub cw_min: u8,
    #[serde(default = "default_cw_max")]
    pub cw_max: u8,
    #[serde(default = "default_processing_time_ms")]
    pub processing_time_ms: u64,
    /// Extra hold time for relays queued by a late router.
    #[serde(default = "default_late_window_ms")]
    pub late_window_ms: u64,
}

fn default_tx_queue_capacity() -> usize {
    16
}

fn default_pool_capacity() -> usize {
    meshflood_transport::pool::DEFAULT_POOL_CAPACITY
}

fn default_bitrate_bps() -> u32 {
    1_000
}

fn default_slot_time_ms() -> u64 {
    10
}

fn default_cw_min() -> u8 {
    3
}

fn default_cw_max() -> u8 {
    8
}

fn default_processing_time_ms() -> u64 {
    4_500
}

fn default_late_window_ms() -> u64 {
    10_000
}

impl Default for RadioSection {
    fn default() -> Self {
        Self {
            tx_queue_capacity: default_tx_queue_capacity(),
            pool_capacity: default_pool_capacity(),
            bitrate_bps: default_bitrate_bps(),
            slot_time_ms: default_slot_time_ms(),
            cw_min: default_cw_min(),
            cw_max: default_cw_max(),
            processing_time_ms: default_processing_time_ms(),
            late_window_ms: default_late_window_ms(),
        }
    }
}

/// The `[logging]` section.
#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// The `[sim]` section: an in-memory mesh to run instead of a single node.
#[derive(Debug, Deserialize)]
pub struct SimSection {
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,
    #[serde(default)]
    pub nodes: Vec<SimNodeEntry>,
    #[serde(default)]
    pub links: Vec<SimLinkEntry>,
    #[serde(default)]
    pub messages: Vec<SimMessageEntry>,
}

fn default_duration_secs() -> u64 {
    120
}

impl Default for SimSection {
    fn default() -> Self {
        Self {
            seed: 0,
            duration_secs: default_duration_secs(),
            nodes: Vec::new(),
            links: Vec::new(),
            messages: Vec::new(),
        }
    }
}

/// A `[[sim.nodes]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct SimNodeEntry {
    pub node_num: u32,
    pub role: Option<String>,
    pub rebroadcast_mode: Option<String>,
}

/// A `[[sim.links]]` entry: a bidirectional radio link.
#[derive(Debug, Clone, Deserialize)]
pub struct SimLinkEntry {
    pub a: u32,
    pub b: u32,
    /// Probability that a single transmission is lost on this link.
    #[serde(default)]
    pub loss: f64,
}

/// A `[[sim.messages]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct SimMessageEntry {
    pub from: u32,
    /// Destination node; omitted means broadcast.
    pub to: Option<u32>,
    #[serde(default)]
    pub at_ms: u64,
    #[serde(default)]
    pub want_ack: bool,
    #[serde(default)]
    pub text: String,
}

/// Parse a role name to a `DeviceRole`.
pub fn parse_role(s: &str) -> Result<DeviceRole, NodeError> {
    match s.to_lowercase().as_str() {
        "client" => Ok(DeviceRole::Client),
        "client_mute" | "clientmute" => Ok(DeviceRole::ClientMute),
        "client_hidden" | "clienthidden" => Ok(DeviceRole::ClientHidden),
        "tracker" => Ok(DeviceRole::Tracker),
        "sensor" => Ok(DeviceRole::Sensor),
        "router" => Ok(DeviceRole::Router),
        "router_late" | "routerlate" => Ok(DeviceRole::RouterLate),
        "repeater" => Ok(DeviceRole::Repeater),
        other => Err(NodeError::Config(format!("unknown device role: {other}"))),
    }
}

/// Parse a rebroadcast mode name.
pub fn parse_rebroadcast_mode(s: &str) -> Result<RebroadcastMode, NodeError> {
    match s.to_lowercase().as_str() {
        "all" => Ok(RebroadcastMode::All),
        "none" => Ok(RebroadcastMode::None),
        other => Err(NodeError::Config(format!(
            "unknown rebroadcast mode: {other}"
        ))),
    }
}
