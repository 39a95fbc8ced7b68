use std::path::PathBuf;

use clap::Parser;
use tokio::sync::mpsc;

use meshflood_node::{MeshNode, NodeConfig, Simulation, TokioClock, run_node, shutdown_channel};

#[derive(Parser)]
#[command(name = "meshflood-node", about = "Flood-routing mesh node and simulator")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/meshflood/config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match NodeConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load config from {}: {e}", cli.config.display());
            std::process::exit(1);
        }
    };

    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        meshflood_node::logging::init_json(&config.logging.level);
    } else {
        meshflood_node::logging::init(&config.logging.level);
    }

    if config.sim.nodes.is_empty() {
        run_single(&config).await;
    } else {
        run_simulation(&config);
    }
}

fn run_simulation(config: &NodeConfig) {
    let mut sim = match Simulation::from_config(config) {
        Ok(sim) => sim,
        Err(e) => {
            tracing::error!("invalid simulation: {e}");
            std::process::exit(1);
        }
    };

    let report = sim.run();
    for node in &report.nodes {
        tracing::info!(
            node = %node.node,
            role = %node.role,
            delivered = node.delivered,
            transmitted = node.transmitted,
            relayed = node.stats.relayed,
            rx_dupe = node.stats.rx_dupe,
            tx_relay_canceled = node.stats.tx_relay_canceled,
            retransmitted = node.stats.retransmitted,
            "node summary"
        );
    }
    for key in &report.originated {
        let reached = sim.delivered_to(key.node, key.id);
        tracing::info!(message = %key, reached = reached.len(), "message reach");
    }
}

async fn run_single(config: &NodeConfig) {
    let settings = match config.local_settings() {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("invalid node settings: {e}");
            std::process::exit(1);
        }
    };

    let clock = TokioClock::new();
    let node = MeshNode::new(&settings, clock, u64::from(settings.node_num.0));

    // No radio driver: nothing arrives, and transmissions are only logged
    let (_inbound_tx, inbound_rx) = mpsc::channel(64);
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<meshflood_core::MeshPacket>(64);
    let (handle, shutdown) = shutdown_channel();

    tokio::spawn(async move {
        while let Some(packet) = outbound_rx.recv().await {
            tracing::info!(origin = %packet.origin, id = %packet.id, "transmitted");
        }
    });

    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received SIGINT, shutting down");
        handle.shutdown();
    });

    let node = run_node(node, clock, inbound_rx, outbound_tx, shutdown).await;
    tracing::info!(node = %node.node_num(), transmitted = node.transmitted(), "node stopped");
}
