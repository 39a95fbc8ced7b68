//! Rebroadcast decision and the sniff hook.

use meshflood_core::constants::NO_NEXT_HOP_PREFERENCE;
use meshflood_core::{MeshPacket, PacketId, Routing};

use crate::router::flooding::FloodingRouter;
use crate::traits::{BaseRouter, Clock, LinkInterface, NodeIdentity};

impl<R, L, I, C> FloodingRouter<R, L, I, C>
where
    R: BaseRouter,
    L: LinkInterface,
    I: NodeIdentity,
    C: Clock,
{
    /// False only for the muted-client role or with rebroadcasting disabled.
    pub fn is_rebroadcaster(&self) -> bool {
        self.device.is_rebroadcaster()
    }

    /// Relay a received packet if it is eligible. Returns whether a relayed
    /// copy was handed to the send path.
    pub fn perhaps_rebroadcast(&mut self, packet: &MeshPacket) -> bool {
        if self.is_to_us(packet) || packet.hop_limit == 0 || self.is_from_us(packet) {
            return false;
        }
        if packet.id.is_zero() {
            tracing::debug!(origin = %packet.origin, "ignoring zero-id broadcast");
            return false;
        }
        if !self.is_rebroadcaster() {
            tracing::debug!(
                role = %self.device.role,
                mode = %self.device.rebroadcast_mode,
                "not relaying: muted role or rebroadcast disabled"
            );
            return false;
        }

        let mut relay = match self.pool.alloc_copy(packet) {
            Ok(copy) => copy,
            Err(err) => {
                tracing::warn!(origin = %packet.origin, id = %packet.id, "cannot relay: {err}");
                return false;
            }
        };
        relay.hop_limit -= 1;
        relay.next_hop = NO_NEXT_HOP_PREFERENCE;

        if self.should_track_relay(packet) {
            if let Some(budget) = self.retransmission.intermediate_budget() {
                self.start_retransmission(&relay, budget);
            }
        }

        tracing::info!(
            origin = %relay.origin,
            id = %relay.id,
            hop_limit = relay.hop_limit,
            "rebroadcasting received flood"
        );
        // The plain send path keeps the originator's identity and skips the
        // seen-cache bookkeeping of our own egress hook
        match self.router.send(relay) {
            Ok(()) => {
                self.stats.relayed += 1;
                true
            }
            Err(err) => {
                tracing::warn!(origin = %packet.origin, id = %packet.id, "relay dropped: {err}");
                false
            }
        }
    }

    /// A copy still carrying its full hop budget is either heard straight
    /// from the originator or is the originator repeating a reliable send.
    /// Neither is tracked; the originator's own retries cover it.
    fn should_track_relay(&self, packet: &MeshPacket) -> bool {
        !packet.is_repeated_reliable()
            && (!self.is_from_us(packet) || !packet.want_ack)
            && (packet.hop_limit > 0 || packet.want_ack)
    }

    /// Sniff hook for every packet that passed the ingress filter.
    ///
    /// A direct ACK or reply overheard on its way to someone else resolves
    /// the conversation, so our queued relay of the original request is
    /// dropped. The packet itself is then considered for relay and finally
    /// handed to the base router for local delivery.
    pub fn sniff_received(&mut self, packet: &MeshPacket, routing: Option<&Routing>) {
        if let Some(decoded) = packet.decoded() {
            let request_id = PacketId(decoded.request_id);
            if packet.is_ack_or_reply() && !self.is_to_us(packet) && !packet.is_broadcast() {
                tracing::debug!(
                    to = %packet.destination,
                    request_id = %request_id,
                    "ACK/reply not for us, cancelling relay"
                );
                self.router.cancel_sending(packet.destination, request_id);
                if self.retransmission.is_enabled() {
                    self.stop_retransmission(packet.destination, request_id);
                }
            } else if self.retransmission.is_enabled()
                && self.is_to_us(packet)
                && !request_id.is_zero()
            {
                // Explicit ACK or NAK for one of our own reliable sends
                let me = self.identity.node_num();
                self.stop_retransmission(me, request_id);
            }
        }

        self.perhaps_rebroadcast(packet);

        self.router.sniff_received(packet, routing);
    }
}

#[cfg(test)]
mod tests {
    use crate::router::{FloodingConfig, Retransmission};
    use crate::testing::{MockFloodingRouter, mock_flooding_router};
    use crate::traits::BaseRouter;
    use meshflood_core::{
        DecodedPayload, DeviceConfig, DeviceRole, GlobalPacketId, MeshPacket, NodeNum, PacketId,
        RebroadcastMode, Routing, RoutingError, TransportMechanism,
    };

    const ME: NodeNum = NodeNum(0x0000_00C0);
    const A: NodeNum = NodeNum(0x0000_00A0);
    const B: NodeNum = NodeNum(0x0000_00B0);

    fn config(role: DeviceRole, mode: RebroadcastMode) -> FloodingConfig {
        FloodingConfig {
            device: DeviceConfig::new(role, mode),
            retransmission: Retransmission::Disabled,
            ..FloodingConfig::default()
        }
    }

    fn router(role: DeviceRole) -> MockFloodingRouter {
        mock_flooding_router(ME, config(role, RebroadcastMode::All)).0
    }

    fn flood(id: u32, hop_limit: u8) -> MeshPacket {
        MeshPacket::broadcast(A, PacketId(id), hop_limit).with_transport(TransportMechanism::Lora)
    }

    #[test]
    fn test_relay_decrements_hop_and_clears_next_hop() {
        let mut r = router(DeviceRole::Client);
        let mut received = flood(7, 3);
        received.next_hop = 0x42;

        assert!(r.perhaps_rebroadcast(&received));
        let sent = &r.router().sent;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].origin, A);
        assert_eq!(sent[0].id, PacketId(7));
        assert_eq!(sent[0].hop_limit, 2);
        assert_eq!(sent[0].hop_start, 3);
        assert_eq!(sent[0].next_hop, 0);
        assert_eq!(r.stats().relayed, 1);
    }

    #[test]
    fn test_relay_does_not_touch_seen_cache() {
        let mut r = router(DeviceRole::Client);
        r.perhaps_rebroadcast(&flood(7, 3));
        assert!(!r.seen().contains(&GlobalPacketId::new(A, PacketId(7))));
    }

    #[test]
    fn test_zero_id_never_relayed() {
        for role in [DeviceRole::Client, DeviceRole::Router, DeviceRole::Repeater] {
            let mut r = router(role);
            assert!(!r.perhaps_rebroadcast(&flood(0, 7)));
            assert!(r.router().sent.is_empty());
        }
    }

    #[test]
    fn test_exhausted_hop_limit_not_relayed() {
        let mut r = router(DeviceRole::Client);
        assert!(!r.perhaps_rebroadcast(&flood(7, 3).with_hops_taken(3)));
        assert!(r.router().sent.is_empty());
    }

    #[test]
    fn test_packet_for_us_not_relayed() {
        let mut r = router(DeviceRole::Client);
        let direct = MeshPacket::direct(A, ME, PacketId(7), 3);
        assert!(!r.perhaps_rebroadcast(&direct));
    }

    #[test]
    fn test_own_packet_not_relayed() {
        let mut r = router(DeviceRole::Client);
        let own = MeshPacket::broadcast(ME, PacketId(7), 3).with_hops_taken(1);
        assert!(!r.perhaps_rebroadcast(&own));
    }

    #[test]
    fn test_muted_roles_never_send() {
        let mut muted = router(DeviceRole::ClientMute);
        assert!(!muted.perhaps_rebroadcast(&flood(7, 3)));
        assert!(muted.router().sent.is_empty());

        let (mut disabled, _) =
            mock_flooding_router(ME, config(DeviceRole::Router, RebroadcastMode::None));
        assert!(!disabled.perhaps_rebroadcast(&flood(7, 3)));
        assert!(disabled.router().sent.is_empty());
        assert_eq!(disabled.pool().in_use(), 0);
    }

    #[test]
    fn test_queue_full_drops_relay_and_releases_copy() {
        let mut r = router(DeviceRole::Client);
        r.router_mut().queue_capacity = Some(0);
        assert!(!r.perhaps_rebroadcast(&flood(7, 3)));
        assert_eq!(r.pool().in_use(), 0);
        assert_eq!(r.stats().relayed, 0);
    }

    #[test]
    fn test_sniff_ack_for_other_node_cancels_request_relay() {
        let mut r = router(DeviceRole::Client);

        // A's direct request to B, which we queue for relay
        let request =
            MeshPacket::direct(A, B, PacketId(42), 3).with_transport(TransportMechanism::Lora);
        r.sniff_received(&request, None);
        assert!(r.router().find_in_tx_queue(A, PacketId(42)));

        // B answers A
        let ack = MeshPacket::direct(B, A, PacketId(43), 3)
            .with_transport(TransportMechanism::Lora)
            .with_decoded(DecodedPayload {
                request_id: 42,
                ..Default::default()
            });
        r.sniff_received(&ack, None);

        assert_eq!(
            r.router().cancel_attempts[0],
            GlobalPacketId::new(A, PacketId(42))
        );
        assert!(!r.router().find_in_tx_queue(A, PacketId(42)));
        // The ACK itself is still relayed and delivered to the base router
        assert!(r.router().find_in_tx_queue(B, PacketId(43)));
        assert_eq!(r.router().sniffed.len(), 2);
    }

    #[test]
    fn test_sniff_ack_cancel_uses_destination_and_request_id() {
        let mut r = router(DeviceRole::Client);
        let reply = MeshPacket::direct(NodeNum(0xC3), B, PacketId(100), 3).with_decoded(
            DecodedPayload {
                request_id: 42,
                ..Default::default()
            },
        );
        r.sniff_received(&reply, None);
        assert_eq!(
            r.router().cancel_attempts,
            vec![GlobalPacketId::new(B, PacketId(42))]
        );
    }

    #[test]
    fn test_sniff_broadcast_ack_does_not_cancel() {
        let mut r = router(DeviceRole::Client);
        let ack = flood(9, 3).with_decoded(DecodedPayload {
            request_id: 42,
            ..Default::default()
        });
        r.sniff_received(&ack, None);
        assert!(r.router().cancel_attempts.is_empty());
    }

    #[test]
    fn test_sniff_passes_routing_to_base_router() {
        let mut r = router(DeviceRole::Client);
        let nak = Routing {
            error_reason: RoutingError::MaxRetransmit,
        };
        r.sniff_received(&MeshPacket::direct(A, ME, PacketId(9), 3), Some(&nak));
        assert_eq!(r.router().sniffed[0].1, Some(nak));
    }

    #[test]
    fn test_sniff_ack_for_us_does_not_cancel() {
        let mut r = router(DeviceRole::Client);
        let ack = MeshPacket::direct(A, ME, PacketId(9), 3).with_decoded(DecodedPayload {
            request_id: 42,
            ..Default::default()
        });
        r.sniff_received(&ack, None);
        assert!(r.router().cancel_attempts.is_empty());
        assert!(r.router().sent.is_empty());
        assert_eq!(r.router().sniffed.len(), 1);
    }
}
