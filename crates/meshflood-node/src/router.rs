//! The general packet router underneath the flood layer.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use meshflood_core::{DeviceRole, MeshPacket, NodeNum, PacketId, Routing, SendError};
use meshflood_transport::{BaseRouter, Clock, PooledPacket};

use crate::radio::RadioTiming;
use crate::tx_queue::TxQueue;

/// Queues outbound packets behind a random contention delay and collects
/// packets delivered to this node.
#[derive(Debug)]
pub struct MeshRouter<C> {
    me: NodeNum,
    role: DeviceRole,
    timing: RadioTiming,
    queue: TxQueue,
    clock: C,
    rng: StdRng,
    delivered: Vec<MeshPacket>,
}

impl<C: Clock> MeshRouter<C> {
    /// The contention RNG is seeded from `seed` so simulations replay.
    pub fn new(
        me: NodeNum,
        role: DeviceRole,
        timing: RadioTiming,
        queue_capacity: usize,
        clock: C,
        seed: u64,
    ) -> Self {
        Self {
            me,
            role,
            timing,
            queue: TxQueue::new(queue_capacity),
            clock,
            rng: StdRng::seed_from_u64(seed),
            delivered: Vec::new(),
        }
    }

    pub fn queue(&self) -> &TxQueue {
        &self.queue
    }

    pub fn queue_mut(&mut self) -> &mut TxQueue {
        &mut self.queue
    }

    /// Packets addressed to this node (or broadcast) in arrival order.
    pub fn delivered(&self) -> &[MeshPacket] {
        &self.delivered
    }

    /// Shrink the late window of a queued relay to the end of the router
    /// contention window.
    pub fn clamp_late(&mut self, origin: NodeNum, id: PacketId) -> bool {
        let window = self
            .timing
            .contention_slots(true)
            .saturating_mul(self.timing.slot_time_ms);
        let latest = self.clock.now_ms().saturating_add(window);
        let clamped = self.queue.clamp(origin, id, latest);
        if clamped {
            tracing::debug!(origin = %origin, id = %id, latest_tx_ms = latest, "late relay clamped");
        }
        clamped
    }

    fn contention_delay_ms(&mut self, own: bool) -> u64 {
        let short = own || self.role.is_dedicated_router();
        let slots = self.rng.gen_range(0..self.timing.contention_slots(short));
        slots.saturating_mul(self.timing.slot_time_ms)
    }
}

impl<C: Clock> BaseRouter for MeshRouter<C> {
    fn send(&mut self, packet: PooledPacket) -> Result<(), SendError> {
        let own = packet.origin == self.me;
        let late = !own && self.role == DeviceRole::RouterLate;
        let mut delay = self.contention_delay_ms(own);
        if late {
            delay = delay.saturating_add(self.timing.late_window_ms);
        }
        let tx_at = self.clock.now_ms().saturating_add(delay);
        tracing::trace!(
            origin = %packet.origin,
            id = %packet.id,
            delay_ms = delay,
            late,
            "queued for transmit"
        );
        self.queue.enqueue(packet, tx_at, late)
    }

    fn cancel_sending(&mut self, origin: NodeNum, id: PacketId) -> bool {
        self.queue.cancel(origin, id)
    }

    fn find_in_tx_queue(&self, origin: NodeNum, id: PacketId) -> bool {
        self.queue.contains(origin, id)
    }

    fn should_filter_received(&mut self, packet: &MeshPacket) -> bool {
        // Our own message outliving the seen window
        if packet.origin == self.me {
            tracing::debug!(id = %packet.id, "dropping echo of own packet");
            return true;
        }
        false
    }

    fn sniff_received(&mut self, packet: &MeshPacket, _routing: Option<&Routing>) {
        if packet.destination == self.me || packet.is_broadcast() {
            tracing::trace!(origin = %packet.origin, id = %packet.id, "delivered");
            self.delivered.push(packet.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimClock;
    use meshflood_transport::PacketPool;

    const ME: NodeNum = NodeNum(0xC0);
    const A: NodeNum = NodeNum(0xA0);

    fn router(role: DeviceRole) -> (MeshRouter<SimClock>, SimClock) {
        let clock = SimClock::new();
        let router = MeshRouter::new(ME, role, RadioTiming::default(), 4, clock.clone(), 1);
        (router, clock)
    }

    #[test]
    fn test_relay_delay_within_window() {
        let pool = PacketPool::new(8);
        let timing = RadioTiming::default();
        let (mut r, clock) = router(DeviceRole::Client);
        clock.set(1_000);
        r.send(pool.alloc_copy(&MeshPacket::broadcast(A, PacketId(1), 3)).unwrap())
            .unwrap();

        let queued = r.queue().get(A, PacketId(1)).unwrap();
        let window = timing.contention_slots(false) * timing.slot_time_ms;
        assert!(queued.tx_at_ms >= 1_000 && queued.tx_at_ms < 1_000 + window);
        assert!(!queued.late);
    }

    #[test]
    fn test_late_router_holds_relays() {
        let pool = PacketPool::new(8);
        let timing = RadioTiming::default();
        let (mut r, _) = router(DeviceRole::RouterLate);
        r.send(pool.alloc_copy(&MeshPacket::broadcast(A, PacketId(1), 3)).unwrap())
            .unwrap();
        r.send(pool.alloc_copy(&MeshPacket::broadcast(ME, PacketId(2), 3)).unwrap())
            .unwrap();

        let relay = r.queue().get(A, PacketId(1)).unwrap();
        assert!(relay.late);
        assert!(relay.tx_at_ms >= timing.late_window_ms);
        assert!(!r.queue().get(ME, PacketId(2)).unwrap().late);

        assert!(r.clamp_late(A, PacketId(1)));
        let window = timing.contention_slots(true) * timing.slot_time_ms;
        assert!(r.queue().get(A, PacketId(1)).unwrap().tx_at_ms <= window);
    }

    #[test]
    fn test_queue_full_propagates() {
        let pool = PacketPool::new(8);
        let (mut r, _) = router(DeviceRole::Client);
        for id in 1..=4 {
            r.send(pool.alloc_copy(&MeshPacket::broadcast(A, PacketId(id), 3)).unwrap())
                .unwrap();
        }
        let fifth = pool.alloc_copy(&MeshPacket::broadcast(A, PacketId(5), 3)).unwrap();
        assert_eq!(r.send(fifth), Err(SendError::QueueFull));
        assert_eq!(pool.in_use(), 4);
    }

    #[test]
    fn test_delivery_to_us_and_broadcast() {
        let (mut r, _) = router(DeviceRole::Client);
        r.sniff_received(&MeshPacket::broadcast(A, PacketId(1), 3), None);
        r.sniff_received(&MeshPacket::direct(A, ME, PacketId(2), 3), None);
        r.sniff_received(&MeshPacket::direct(A, NodeNum(0xB0), PacketId(3), 3), None);
        assert_eq!(r.delivered().len(), 2);
    }

    #[test]
    fn test_own_echo_filtered() {
        let (mut r, _) = router(DeviceRole::Client);
        assert!(r.should_filter_received(&MeshPacket::broadcast(ME, PacketId(1), 3)));
        assert!(!r.should_filter_received(&MeshPacket::broadcast(A, PacketId(1), 3)));
    }
}
