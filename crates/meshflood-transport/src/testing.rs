//! Mock collaborators for exercising the flood router without a radio.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use meshflood_core::{GlobalPacketId, MeshPacket, NodeNum, PacketId, Routing, SendError};

use crate::pool::{PacketPool, PooledPacket};
use crate::router::{Collaborators, FloodingConfig, FloodingRouter};
use crate::traits::{BaseRouter, Clock, LinkInterface};

/// Retransmission delay reported by [`MockLink::default`].
pub const MOCK_RETRANSMISSION_DELAY_MS: u64 = 1_000;

/// A base router with an inspectable outbound queue.
#[derive(Debug, Default)]
pub struct MockRouter {
    /// Copies accepted by `send` and not yet transmitted or cancelled.
    pub queue: Vec<PooledPacket>,
    /// Every packet accepted by `send`, in order.
    pub sent: Vec<MeshPacket>,
    /// Keys removed from the queue by `cancel_sending`.
    pub canceled: Vec<GlobalPacketId>,
    /// Every `cancel_sending` call, found or not.
    pub cancel_attempts: Vec<GlobalPacketId>,
    /// Packets passed to the base sniff handler.
    pub sniffed: Vec<(MeshPacket, Option<Routing>)>,
    /// Result of the base receive filter.
    pub filter_all: bool,
    /// Queue slots; `None` is unbounded.
    pub queue_capacity: Option<usize>,
    pub wakeups: usize,
}

impl MockRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue_capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Pretend the radio sent everything queued.
    pub fn transmit_all(&mut self) {
        self.queue.clear();
    }
}

impl BaseRouter for MockRouter {
    fn send(&mut self, packet: PooledPacket) -> Result<(), SendError> {
        if self.queue_capacity.is_some_and(|cap| self.queue.len() >= cap) {
            return Err(SendError::QueueFull);
        }
        self.sent.push((*packet).clone());
        self.queue.push(packet);
        Ok(())
    }

    fn cancel_sending(&mut self, origin: NodeNum, id: PacketId) -> bool {
        let key = GlobalPacketId::new(origin, id);
        self.cancel_attempts.push(key);
        let before = self.queue.len();
        self.queue.retain(|p| p.global_id() != key);
        let found = self.queue.len() != before;
        if found {
            self.canceled.push(key);
        }
        found
    }

    fn find_in_tx_queue(&self, origin: NodeNum, id: PacketId) -> bool {
        let key = GlobalPacketId::new(origin, id);
        self.queue.iter().any(|p| p.global_id() == key)
    }

    fn should_filter_received(&mut self, _packet: &MeshPacket) -> bool {
        self.filter_all
    }

    fn sniff_received(&mut self, packet: &MeshPacket, routing: Option<&Routing>) {
        self.sniffed.push((packet.clone(), routing.copied()));
    }

    fn request_wakeup(&mut self) {
        self.wakeups += 1;
    }
}

/// A link with a fixed retransmission delay.
#[derive(Debug)]
pub struct MockLink {
    pub delay_ms: u64,
    /// Keys passed to `clamp_to_late_rebroadcast_window`.
    pub clamped: Vec<GlobalPacketId>,
}

impl Default for MockLink {
    fn default() -> Self {
        Self {
            delay_ms: MOCK_RETRANSMISSION_DELAY_MS,
            clamped: Vec::new(),
        }
    }
}

impl LinkInterface for MockLink {
    fn retransmission_delay_ms(&self, _packet: &MeshPacket) -> u64 {
        self.delay_ms
    }

    fn clamp_to_late_rebroadcast_window(&mut self, origin: NodeNum, id: PacketId) {
        self.clamped.push(GlobalPacketId::new(origin, id));
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self(Arc::new(AtomicU64::new(start_ms)))
    }

    pub fn set(&self, ms: u64) {
        self.0.store(ms, Ordering::Release);
    }

    pub fn advance(&self, ms: u64) {
        self.0.fetch_add(ms, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }
}

pub type MockFloodingRouter = FloodingRouter<MockRouter, MockLink, NodeNum, ManualClock>;

/// Build a router for node `me` over mock collaborators. The returned clock
/// drives it.
pub fn mock_flooding_router(
    me: NodeNum,
    config: FloodingConfig,
) -> (MockFloodingRouter, ManualClock) {
    let clock = ManualClock::new(0);
    let router = FloodingRouter::new(
        config,
        Collaborators {
            router: MockRouter::new(),
            link: MockLink::default(),
            identity: me,
            clock: clock.clone(),
            pool: PacketPool::new(64),
        },
    );
    (router, clock)
}
