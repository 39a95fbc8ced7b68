//! Timer-driven node behaviour under `tokio::test(start_paused = true)`.
//!
//! With paused time the runtime auto-advances whenever every task is waiting
//! on a timer, so retransmission backoffs of several seconds complete
//! instantly and land on exact, repeatable instants.

use std::time::Duration;

use tokio::sync::mpsc;

use meshflood_core::{MeshPacket, NodeNum, PacketId, TransportMechanism};
use meshflood_node::{
    MeshNode, NodeConfig, RadioTiming, TokioClock, logging, run_node, shutdown_channel,
};
use meshflood_transport::Clock;

const ORIGIN: NodeNum = NodeNum(0xA0);

fn spawn(
    toml: &str,
) -> (
    mpsc::Sender<MeshPacket>,
    mpsc::Receiver<MeshPacket>,
    meshflood_node::ShutdownHandle,
    tokio::task::JoinHandle<MeshNode<TokioClock>>,
    TokioClock,
) {
    logging::init_for_tests();
    let settings = NodeConfig::parse(toml).unwrap().local_settings().unwrap();
    let clock = TokioClock::new();
    let node = MeshNode::new(&settings, clock, 7);
    let (in_tx, in_rx) = mpsc::channel(16);
    let (out_tx, out_rx) = mpsc::channel(16);
    let (handle, shutdown) = shutdown_channel();
    let task = tokio::spawn(run_node(node, clock, in_rx, out_tx, shutdown));
    (in_tx, out_rx, handle, task, clock)
}

/// A flood one hop away from its originator. First-hop copies are relayed
/// but never tracked.
fn flood(id: u32) -> MeshPacket {
    MeshPacket::broadcast(ORIGIN, PacketId(id), 4)
        .with_hops_taken(1)
        .with_transport(TransportMechanism::Lora)
}

/// A relayed flood that nobody echoes is resent `max_rexmit + 1` times, one
/// retransmission delay apart, then dropped.
#[tokio::test(start_paused = true)]
async fn unacknowledged_relay_is_retried_on_schedule() {
    let (in_tx, mut out_rx, handle, task, clock) = spawn("[node]\nnode_num = 0xC0\n");
    in_tx.send(flood(7)).await.unwrap();

    let first = out_rx.recv().await.unwrap();
    assert_eq!(first.hop_limit, 2);

    let delay = RadioTiming::default().retransmission_delay_ms(&first);
    let mut times = Vec::new();
    for _ in 0..3 {
        let again = out_rx.recv().await.unwrap();
        assert_eq!(again.id, PacketId(7));
        assert_eq!(again.hop_limit, 2);
        times.push(clock.now_ms());
    }
    for pair in times.windows(2) {
        // Each retry is rescheduled one delay after the previous deadline,
        // then waits out its own contention slot in the queue
        assert!(pair[1] - pair[0] >= delay - RadioTiming::default().contention_slots(false) * 10);
    }

    // Budget spent: nothing more within a long wait
    let extra = tokio::time::timeout(Duration::from_secs(120), out_rx.recv()).await;
    assert!(extra.is_err(), "no transmissions after the budget runs out");

    handle.shutdown();
    let node = task.await.unwrap();
    assert_eq!(node.stats().retransmitted, 3);
    assert_eq!(node.stats().retransmissions_expired, 1);
    assert!(node.flood().pending().is_empty());
    assert_eq!(node.flood().pool().in_use(), 0);
}

/// Hearing a peer relay the same flood stops our retransmissions.
#[tokio::test(start_paused = true)]
async fn overheard_relay_stops_retries() {
    let (in_tx, mut out_rx, handle, task, _) = spawn("[node]\nnode_num = 0xC0\n");
    in_tx.send(flood(7)).await.unwrap();
    let _relay = out_rx.recv().await.unwrap();

    in_tx.send(flood(7).with_hops_taken(1)).await.unwrap();

    let extra = tokio::time::timeout(Duration::from_secs(120), out_rx.recv()).await;
    assert!(extra.is_err(), "implicit acknowledgement should stop retries");

    handle.shutdown();
    let node = task.await.unwrap();
    assert_eq!(node.stats().rx_dupe, 1);
    assert_eq!(node.stats().retransmitted, 0);
    assert!(node.flood().pending().is_empty());
}

/// With retransmission disabled a relay goes out exactly once.
#[tokio::test(start_paused = true)]
async fn disabled_retransmission_relays_once() {
    let (in_tx, mut out_rx, handle, task, _) =
        spawn("[node]\nnode_num = 0xC0\n\n[flooding]\nmax_rexmit = 0\n");
    in_tx.send(flood(9)).await.unwrap();
    assert_eq!(out_rx.recv().await.unwrap().id, PacketId(9));

    let extra = tokio::time::timeout(Duration::from_secs(120), out_rx.recv()).await;
    assert!(extra.is_err());

    handle.shutdown();
    let node = task.await.unwrap();
    assert_eq!(node.stats().relayed, 1);
    assert!(node.flood().pending().is_empty());
}

/// A late router holds its relay for the late window unless a duplicate
/// pulls it forward.
#[tokio::test(start_paused = true)]
async fn late_router_waits_out_late_window() {
    let (in_tx, mut out_rx, handle, task, clock) =
        spawn("[node]\nnode_num = 0xC0\nrole = \"router_late\"\n\n[flooding]\nmax_rexmit = 0\n");
    in_tx.send(flood(3)).await.unwrap();
    let _ = out_rx.recv().await.unwrap();
    assert!(clock.now_ms() >= RadioTiming::default().late_window_ms);

    in_tx.send(flood(4)).await.unwrap();
    let heard_at = clock.now_ms();
    in_tx.send(flood(4).with_hops_taken(1)).await.unwrap();
    let _ = out_rx.recv().await.unwrap();
    let window = RadioTiming::default().contention_slots(true) * 10;
    assert!(clock.now_ms() <= heard_at + window);

    handle.shutdown();
    task.await.unwrap();
}
