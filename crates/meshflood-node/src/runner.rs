//! Async event loop driving a single node on tokio.

use tokio::sync::{mpsc, watch};

use meshflood_core::MeshPacket;
use meshflood_transport::Clock;

use crate::clock::TokioClock;
use crate::node::{IDLE_POLL_MS, MeshNode};

/// Signals a running node to stop.
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

/// A shutdown handle and the receiver [`run_node`] waits on.
pub fn shutdown_channel() -> (ShutdownHandle, watch::Receiver<bool>) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, rx)
}

/// Run `node` until shutdown is signalled or the inbound channel closes.
///
/// Packets heard on the radio arrive on `inbound`; everything the node
/// transmits is sent on `outbound`. Between events the loop sleeps until the
/// next queued transmission or retransmission. The node is handed back so
/// callers can inspect its final state.
pub async fn run_node(
    mut node: MeshNode<TokioClock>,
    clock: TokioClock,
    mut inbound: mpsc::Receiver<MeshPacket>,
    outbound: mpsc::Sender<MeshPacket>,
    mut shutdown: watch::Receiver<bool>,
) -> MeshNode<TokioClock> {
    tracing::info!(node = %node.node_num(), "entering event loop");

    loop {
        node.tick();
        for packet in node.transmit_ready() {
            if outbound.send(packet).await.is_err() {
                tracing::warn!(node = %node.node_num(), "outbound channel closed, dropping transmission");
            }
        }

        let wake_at = node
            .next_event_at()
            .unwrap_or_else(|| clock.now_ms().saturating_add(IDLE_POLL_MS));

        tokio::select! {
            biased;

            _ = shutdown.changed() => {
                tracing::info!(node = %node.node_num(), "shutdown signal received");
                break;
            }

            packet = inbound.recv() => {
                match packet {
                    Some(packet) => {
                        node.receive(&packet);
                    }
                    None => {
                        tracing::info!(node = %node.node_num(), "inbound channel closed, exiting");
                        break;
                    }
                }
            }

            _ = tokio::time::sleep_until(clock.instant_at(wake_at)) => {}
        }
    }

    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;
    use meshflood_core::{NodeNum, PacketId, TransportMechanism};
    use std::time::Duration;

    fn spawn_node() -> (
        mpsc::Sender<MeshPacket>,
        mpsc::Receiver<MeshPacket>,
        ShutdownHandle,
        tokio::task::JoinHandle<MeshNode<TokioClock>>,
    ) {
        let settings = NodeConfig::parse("[node]\nnode_num = 0xC0\n")
            .unwrap()
            .local_settings()
            .unwrap();
        let clock = TokioClock::new();
        let node = MeshNode::new(&settings, clock, 1);
        let (in_tx, in_rx) = mpsc::channel(16);
        let (out_tx, out_rx) = mpsc::channel(16);
        let (handle, shutdown) = shutdown_channel();
        let task = tokio::spawn(run_node(node, clock, in_rx, out_tx, shutdown));
        (in_tx, out_rx, handle, task)
    }

    #[tokio::test(start_paused = true)]
    async fn relays_received_flood() {
        let (in_tx, mut out_rx, handle, task) = spawn_node();
        let packet = MeshPacket::broadcast(NodeNum(0xA0), PacketId(7), 3)
            .with_transport(TransportMechanism::Lora);
        in_tx.send(packet).await.unwrap();

        let relayed = tokio::time::timeout(Duration::from_secs(10), out_rx.recv())
            .await
            .expect("relay should go out within the contention window")
            .unwrap();
        assert_eq!(relayed.id, PacketId(7));
        assert_eq!(relayed.hop_limit, 2);

        handle.shutdown();
        let node = task.await.unwrap();
        assert_eq!(node.stats().relayed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exits_when_inbound_closes() {
        let (in_tx, _out_rx, _handle, task) = spawn_node();
        drop(in_tx);
        let node = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("run_node should exit")
            .unwrap();
        assert_eq!(node.transmitted(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_loop() {
        let (_in_tx, _out_rx, handle, task) = spawn_node();
        handle.shutdown();
        tokio::time::timeout(Duration::from_millis(100), task)
            .await
            .expect("run_node should exit after shutdown")
            .unwrap();
    }
}
