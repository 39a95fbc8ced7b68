//! Retransmission scheduler for reliable floods.
//!
//! Each pending entry moves scheduled -> fired -> rescheduled until its
//! budget runs out, and the next deadline after that removes it. Removal is
//! the single place an entry's packet copy goes back to the pool.

use meshflood_core::{GlobalPacketId, MeshPacket, NodeNum, PacketId};

use crate::pending::{PendingPacket, RELIABLE_RETRANSMISSIONS};
use crate::router::flooding::FloodingRouter;
use crate::traits::{BaseRouter, Clock, LinkInterface, NodeIdentity};

impl<R, L, I, C> FloodingRouter<R, L, I, C>
where
    R: BaseRouter,
    L: LinkInterface,
    I: NodeIdentity,
    C: Clock,
{
    /// Start retrying `packet` up to `retries` times. Any entry already
    /// tracking the same message is stopped first.
    ///
    /// Returns `false` if tracking is disabled or the pool is exhausted.
    pub fn start_retransmission(&mut self, packet: &MeshPacket, retries: u8) -> bool {
        if !self.retransmission.is_enabled() {
            return false;
        }
        let key = packet.global_id();
        self.stop_retransmission(key.node, key.id);

        let copy = match self.pool.alloc_copy(packet) {
            Ok(copy) => copy,
            Err(err) => {
                tracing::warn!(origin = %key.node, id = %key.id, "cannot track retransmission: {err}");
                return false;
            }
        };

        tracing::debug!(
            origin = %packet.origin,
            to = %packet.destination,
            id = %packet.id,
            tries_left = retries,
            "starting retransmission"
        );
        let mut entry = PendingPacket::new(copy, retries);
        let now = self.clock.now_ms();
        Self::set_next_tx(&mut entry, &self.link, &mut self.router, now);
        self.pending.insert(key, entry);
        true
    }

    /// Stop retrying `(origin, id)`. Returns whether an entry was found.
    ///
    /// The queued copy is cancelled only once a retransmission has already
    /// gone out, and only if we originated the message or are not a
    /// dedicated router. The entry and its packet copy are always dropped.
    pub fn stop_retransmission(&mut self, origin: NodeNum, id: PacketId) -> bool {
        let key = GlobalPacketId::new(origin, id);
        let Some(entry) = self.pending.get(&key) else {
            return false;
        };

        if entry.retries_remaining < RELIABLE_RETRANSMISSIONS - 1 {
            let from_us = entry.packet.origin == self.identity.node_num();
            if from_us || !self.device.role.is_dedicated_router() {
                self.router.cancel_sending(origin, id);
            }
        }

        let entry = self.pending.remove_present(&key);
        entry.packet.release();
        tracing::debug!(origin = %origin, id = %id, "stopped retransmission");
        true
    }

    /// Resend every entry whose deadline has passed.
    ///
    /// Returns the time in ms until the next deadline, or `None` when
    /// nothing is pending. Running out of retries is not reported as a
    /// failure; the originator's own retries or a NAK take over.
    pub fn do_retransmissions(&mut self) -> Option<u64> {
        let now = self.clock.now_ms();

        for key in self.pending.due(now) {
            let Some(entry) = self.pending.get_mut(&key) else {
                continue;
            };

            if entry.retries_remaining == 0 {
                tracing::debug!(origin = %key.node, id = %key.id, "retransmissions exhausted");
                self.stop_retransmission(key.node, key.id);
                self.stats.retransmissions_expired += 1;
                continue;
            }

            match self.pool.alloc_copy(&entry.packet) {
                Ok(copy) => {
                    tracing::debug!(
                        origin = %key.node,
                        to = %copy.destination,
                        id = %key.id,
                        tries_left = entry.retries_remaining,
                        "sending retransmission"
                    );
                    match self.router.send(copy) {
                        Ok(()) => self.stats.retransmitted += 1,
                        Err(err) => {
                            tracing::warn!(origin = %key.node, id = %key.id, "retransmission dropped: {err}");
                        }
                    }
                    entry.retries_remaining -= 1;
                }
                Err(err) => {
                    tracing::warn!(origin = %key.node, id = %key.id, "retransmission deferred: {err}");
                }
            }
            Self::set_next_tx(entry, &self.link, &mut self.router, now);
        }

        self.pending
            .next_deadline()
            .map(|deadline| deadline.saturating_sub(now))
    }

    /// One scheduler pass. Returns how long the caller may sleep: the
    /// shorter of `idle_ms` and the time to the next retransmission.
    pub fn run_once(&mut self, idle_ms: u64) -> u64 {
        self.do_retransmissions()
            .map_or(idle_ms, |next| next.min(idle_ms))
    }

    fn set_next_tx(entry: &mut PendingPacket, link: &L, router: &mut R, now: u64) {
        let delay = link.retransmission_delay_ms(&entry.packet);
        entry.next_tx_ms = now.saturating_add(delay);
        tracing::debug!(delay_ms = delay, "next retransmission scheduled");
        router.request_wakeup();
    }
}
