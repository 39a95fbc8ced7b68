//! Simulated radio channel timing and the link collaborator.

use meshflood_core::{GlobalPacketId, MeshPacket, NodeNum, PacketId, Payload};
use meshflood_transport::LinkInterface;

use crate::config::RadioSection;

/// On-air header bytes added to every payload.
pub const HEADER_LEN: usize = 16;

/// Largest contention-window exponent honoured.
const MAX_CW: u8 = 15;

/// Channel timing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioTiming {
    pub bitrate_bps: u32,
    pub slot_time_ms: u64,
    pub cw_min: u8,
    pub cw_max: u8,
    pub processing_time_ms: u64,
    pub late_window_ms: u64,
}

impl RadioTiming {
    /// Time on air for `packet`, rounded up to the next millisecond.
    pub fn airtime_ms(&self, packet: &MeshPacket) -> u64 {
        let payload_len = match &packet.payload {
            Payload::Decoded(d) => d.data.len(),
            Payload::Encrypted(bytes) => bytes.len(),
        };
        let bits = ((HEADER_LEN + payload_len) as u64) * 8;
        let bitrate = u64::from(self.bitrate_bps.max(1));
        bits.saturating_mul(1000).div_ceil(bitrate)
    }

    /// Number of contention slots a sender picks from. Dedicated routers
    /// use the short window so they win the channel over clients.
    pub fn contention_slots(&self, dedicated_router: bool) -> u64 {
        let cw = if dedicated_router { self.cw_min } else { self.cw_max };
        1u64 << cw.min(MAX_CW)
    }

    /// Wait before retrying a packet: two airtimes for the relay round trip,
    /// both contention windows, and the receiver's processing time.
    /// Saturates instead of overflowing on extreme configured values.
    pub fn retransmission_delay_ms(&self, packet: &MeshPacket) -> u64 {
        let slots = self.contention_slots(false) + self.contention_slots(true);
        self.airtime_ms(packet)
            .saturating_mul(2)
            .saturating_add(slots.saturating_mul(self.slot_time_ms))
            .saturating_add(self.processing_time_ms)
    }
}

impl From<&RadioSection> for RadioTiming {
    fn from(section: &RadioSection) -> Self {
        Self {
            bitrate_bps: section.bitrate_bps,
            slot_time_ms: section.slot_time_ms,
            cw_min: section.cw_min,
            cw_max: section.cw_max,
            processing_time_ms: section.processing_time_ms,
            late_window_ms: section.late_window_ms,
        }
    }
}

impl Default for RadioTiming {
    fn default() -> Self {
        Self::from(&RadioSection::default())
    }
}

/// The radio interface as seen by the flood router.
///
/// Clamp requests are recorded and applied to the transmit queue by the
/// owning node, which holds both collaborators.
#[derive(Debug, Default)]
pub struct RadioLink {
    timing: RadioTiming,
    clamps: Vec<GlobalPacketId>,
}

impl RadioLink {
    pub fn new(timing: RadioTiming) -> Self {
        Self {
            timing,
            clamps: Vec::new(),
        }
    }

    pub fn timing(&self) -> &RadioTiming {
        &self.timing
    }

    /// Drain clamp requests recorded since the last call.
    pub fn take_clamps(&mut self) -> Vec<GlobalPacketId> {
        std::mem::take(&mut self.clamps)
    }
}

impl LinkInterface for RadioLink {
    fn retransmission_delay_ms(&self, packet: &MeshPacket) -> u64 {
        self.timing.retransmission_delay_ms(packet)
    }

    fn clamp_to_late_rebroadcast_window(&mut self, origin: NodeNum, id: PacketId) {
        tracing::trace!(origin = %origin, id = %id, "late rebroadcast clamp requested");
        self.clamps.push(GlobalPacketId::new(origin, id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshflood_core::DecodedPayload;

    fn timing() -> RadioTiming {
        RadioTiming {
            bitrate_bps: 1_000,
            slot_time_ms: 10,
            cw_min: 3,
            cw_max: 8,
            processing_time_ms: 4_500,
            late_window_ms: 10_000,
        }
    }

    #[test]
    fn test_airtime_counts_header_and_payload() {
        let empty = MeshPacket::broadcast(NodeNum(1), PacketId(1), 3);
        // 16 bytes at 1 kbit/s
        assert_eq!(timing().airtime_ms(&empty), 128);

        let with_data = empty.with_decoded(DecodedPayload {
            data: vec![0; 9],
            ..Default::default()
        });
        assert_eq!(timing().airtime_ms(&with_data), 200);
    }

    #[test]
    fn test_airtime_rounds_up() {
        let mut t = timing();
        t.bitrate_bps = 3;
        let packet = MeshPacket::broadcast(NodeNum(1), PacketId(1), 3);
        // 128 bits / 3 bps = 42666.67 ms
        assert_eq!(t.airtime_ms(&packet), 42_667);
    }

    #[test]
    fn test_retransmission_delay() {
        let packet = MeshPacket::broadcast(NodeNum(1), PacketId(1), 3);
        // 2 * 128 + (256 + 8) * 10 + 4500
        assert_eq!(timing().retransmission_delay_ms(&packet), 7_396);
    }

    #[test]
    fn test_retransmission_delay_saturates() {
        let mut t = timing();
        t.slot_time_ms = u64::MAX / 2;
        t.processing_time_ms = u64::MAX;
        let packet = MeshPacket::broadcast(NodeNum(1), PacketId(1), 3);
        assert_eq!(t.retransmission_delay_ms(&packet), u64::MAX);
    }

    #[test]
    fn test_extreme_config_values_do_not_overflow() {
        let config = crate::config::NodeConfig::parse(
            r#"
[node]
node_num = 1

[radio]
slot_time_ms = 9223372036854775807
processing_time_ms = 9223372036854775807
"#,
        )
        .unwrap();
        let settings = config.local_settings().unwrap();
        let packet = MeshPacket::broadcast(NodeNum(1), PacketId(1), 3);
        assert_eq!(settings.timing.retransmission_delay_ms(&packet), u64::MAX);
    }

    #[test]
    fn test_router_window_is_shorter() {
        assert_eq!(timing().contention_slots(true), 8);
        assert_eq!(timing().contention_slots(false), 256);
    }

    #[test]
    fn test_contention_window_is_capped() {
        let mut t = timing();
        t.cw_max = 60;
        assert_eq!(t.contention_slots(false), 1 << 15);
    }

    #[test]
    fn test_link_records_clamps() {
        let mut link = RadioLink::new(timing());
        link.clamp_to_late_rebroadcast_window(NodeNum(1), PacketId(5));
        assert_eq!(
            link.take_clamps(),
            vec![GlobalPacketId::new(NodeNum(1), PacketId(5))]
        );
        assert!(link.take_clamps().is_empty());
    }
}
