//! Host for the meshflood routing layer.
//!
//! Provides the collaborators the flood router needs (a bounded transmit
//! queue, a simulated radio link and clocks), TOML configuration, a tokio
//! event loop for a single node, and an in-memory multi-node simulation.

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod node;
pub mod radio;
pub mod router;
pub mod runner;
pub mod sim;
pub mod tx_queue;

pub use clock::{SimClock, TokioClock};
pub use config::{NodeConfig, NodeSettings};
pub use error::NodeError;
pub use node::MeshNode;
pub use radio::{RadioLink, RadioTiming};
pub use router::MeshRouter;
pub use runner::{ShutdownHandle, run_node, shutdown_channel};
pub use sim::{ScheduledMessage, SimReport, Simulation};
pub use tx_queue::TxQueue;
