//! In-memory mesh simulation.
//!
//! Nodes share one [`SimClock`] and hear each other through bidirectional
//! links, each with its own loss probability. Time jumps straight to the
//! next event: a scheduled message, a packet landing, or a node's next
//! transmission or retransmission.

use std::collections::{BTreeMap, HashMap};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use meshflood_core::{DeviceRole, GlobalPacketId, MeshPacket, NodeNum, PacketId};
use meshflood_transport::{Clock, FloodStats};

use crate::clock::SimClock;
use crate::config::{NodeConfig, NodeSettings, SimMessageEntry};
use crate::error::NodeError;
use crate::node::MeshNode;

/// A message a node originates at a given time.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledMessage {
    pub at_ms: u64,
    pub from: NodeNum,
    /// `None` broadcasts.
    pub to: Option<NodeNum>,
    pub want_ack: bool,
    pub text: String,
}

impl From<&SimMessageEntry> for ScheduledMessage {
    fn from(entry: &SimMessageEntry) -> Self {
        Self {
            at_ms: entry.at_ms,
            from: NodeNum(entry.from),
            to: entry.to.map(NodeNum),
            want_ack: entry.want_ack,
            text: entry.text.clone(),
        }
    }
}

#[derive(Debug)]
struct InFlight {
    arrive_at: u64,
    to: NodeNum,
    packet: MeshPacket,
}

/// Per-node outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReport {
    pub node: NodeNum,
    pub role: DeviceRole,
    pub stats: FloodStats,
    pub delivered: usize,
    pub transmitted: u32,
}

/// Outcome of [`Simulation::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimReport {
    pub elapsed_ms: u64,
    /// Messages originated, as `(origin, id)`.
    pub originated: Vec<GlobalPacketId>,
    /// Per-link receptions that made it through.
    pub receptions: u64,
    /// Per-link receptions lost to the channel.
    pub lost: u64,
    pub nodes: Vec<NodeReport>,
}

impl SimReport {
    pub fn node(&self, node: NodeNum) -> Option<&NodeReport> {
        self.nodes.iter().find(|r| r.node == node)
    }

    /// Total packets put on the air.
    pub fn transmissions(&self) -> u64 {
        self.nodes.iter().map(|r| u64::from(r.transmitted)).sum()
    }
}

pub struct Simulation {
    clock: SimClock,
    seed: u64,
    rng: StdRng,
    duration_ms: u64,
    nodes: BTreeMap<NodeNum, MeshNode<SimClock>>,
    neighbors: HashMap<NodeNum, Vec<(NodeNum, f64)>>,
    messages: Vec<ScheduledMessage>,
    in_flight: Vec<InFlight>,
    originated: Vec<GlobalPacketId>,
    receptions: u64,
    lost: u64,
}

impl Simulation {
    pub fn new(seed: u64, duration_ms: u64) -> Self {
        Self {
            clock: SimClock::new(),
            seed,
            rng: StdRng::seed_from_u64(seed),
            duration_ms,
            nodes: BTreeMap::new(),
            neighbors: HashMap::new(),
            messages: Vec::new(),
            in_flight: Vec::new(),
            originated: Vec::new(),
            receptions: 0,
            lost: 0,
        }
    }

    /// Build the simulation described by the `[sim]` section.
    pub fn from_config(config: &NodeConfig) -> Result<Self, NodeError> {
        let sim = &config.sim;
        let mut simulation = Self::new(sim.seed, sim.duration_secs.saturating_mul(1000));
        for entry in &sim.nodes {
            simulation.add_node(&config.sim_node_settings(entry)?)?;
        }
        for link in &sim.links {
            simulation.link(NodeNum(link.a), NodeNum(link.b), link.loss)?;
        }
        for message in &sim.messages {
            simulation.schedule(ScheduledMessage::from(message))?;
        }
        Ok(simulation)
    }

    pub fn add_node(&mut self, settings: &NodeSettings) -> Result<(), NodeError> {
        let num = settings.node_num;
        if self.nodes.contains_key(&num) {
            return Err(NodeError::Config(format!("duplicate sim node {num}")));
        }
        let node = MeshNode::new(settings, self.clock.clone(), self.seed ^ u64::from(num.0));
        self.nodes.insert(num, node);
        Ok(())
    }

    /// Connect `a` and `b` in both directions.
    pub fn link(&mut self, a: NodeNum, b: NodeNum, loss: f64) -> Result<(), NodeError> {
        for n in [a, b] {
            if !self.nodes.contains_key(&n) {
                return Err(NodeError::UnknownNode(n));
            }
        }
        if a == b {
            return Err(NodeError::Config(format!("link from {a} to itself")));
        }
        if !(0.0..=1.0).contains(&loss) {
            return Err(NodeError::Config(format!(
                "link {a} <-> {b}: loss {loss} outside 0..=1"
            )));
        }
        self.neighbors.entry(a).or_default().push((b, loss));
        self.neighbors.entry(b).or_default().push((a, loss));
        Ok(())
    }

    pub fn schedule(&mut self, message: ScheduledMessage) -> Result<(), NodeError> {
        if !self.nodes.contains_key(&message.from) {
            return Err(NodeError::UnknownNode(message.from));
        }
        let index = self.messages.partition_point(|m| m.at_ms <= message.at_ms);
        self.messages.insert(index, message);
        Ok(())
    }

    pub fn node(&self, num: NodeNum) -> Option<&MeshNode<SimClock>> {
        self.nodes.get(&num)
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Nodes that had `(origin, id)` delivered to them.
    pub fn delivered_to(&self, origin: NodeNum, id: PacketId) -> Vec<NodeNum> {
        let key = GlobalPacketId::new(origin, id);
        self.nodes
            .iter()
            .filter(|(_, node)| node.delivered().iter().any(|p| p.global_id() == key))
            .map(|(num, _)| *num)
            .collect()
    }

    /// Run until nothing is left to do or the configured duration passes.
    pub fn run(&mut self) -> SimReport {
        tracing::info!(
            nodes = self.nodes.len(),
            messages = self.messages.len(),
            seed = self.seed,
            "simulation starting"
        );

        loop {
            let now = self.clock.now_ms();
            self.inject_messages(now);
            self.deliver_arrivals(now);
            self.step_nodes(now);

            let Some(next) = self.next_event_at() else {
                break;
            };
            if next > self.duration_ms {
                tracing::info!(at_ms = next, "simulation duration reached");
                break;
            }
            self.clock.set(next.max(now + 1));
        }

        let report = self.report();
        tracing::info!(
            elapsed_ms = report.elapsed_ms,
            transmissions = report.transmissions(),
            receptions = report.receptions,
            lost = report.lost,
            "simulation finished"
        );
        report
    }

    fn inject_messages(&mut self, now: u64) {
        let due = self.messages.partition_point(|m| m.at_ms <= now);
        for message in self.messages.drain(..due).collect::<Vec<_>>() {
            let Some(node) = self.nodes.get_mut(&message.from) else {
                continue;
            };
            match node.send_text(message.to, &message.text, message.want_ack) {
                Ok(id) => self.originated.push(GlobalPacketId::new(message.from, id)),
                Err(err) => {
                    tracing::warn!(node = %message.from, "scheduled message not sent: {err}");
                }
            }
        }
    }

    fn deliver_arrivals(&mut self, now: u64) {
        let (arrived, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.in_flight)
            .into_iter()
            .partition(|f| f.arrive_at <= now);
        self.in_flight = pending;

        for flight in arrived {
            if let Some(node) = self.nodes.get_mut(&flight.to) {
                node.receive(&flight.packet);
            }
        }
    }

    fn step_nodes(&mut self, now: u64) {
        for (num, node) in &mut self.nodes {
            node.tick();
            let sent = node.transmit_ready();
            if sent.is_empty() {
                continue;
            }
            let neighbors = self.neighbors.get(num).map(Vec::as_slice).unwrap_or(&[]);
            for packet in sent {
                let airtime = node.flood().link().timing().airtime_ms(&packet);
                for &(to, loss) in neighbors {
                    if self.rng.gen_bool(loss) {
                        self.lost += 1;
                        tracing::trace!(from = %num, to = %to, id = %packet.id, "lost on link");
                        continue;
                    }
                    self.receptions += 1;
                    self.in_flight.push(InFlight {
                        arrive_at: now + airtime,
                        to,
                        packet: packet.clone(),
                    });
                }
            }
        }
    }

    fn next_event_at(&self) -> Option<u64> {
        let message = self.messages.first().map(|m| m.at_ms);
        let arrival = self.in_flight.iter().map(|f| f.arrive_at).min();
        let node = self.nodes.values().filter_map(MeshNode::next_event_at).min();
        [message, arrival, node].into_iter().flatten().min()
    }

    fn report(&self) -> SimReport {
        SimReport {
            elapsed_ms: self.clock.now_ms(),
            originated: self.originated.clone(),
            receptions: self.receptions,
            lost: self.lost,
            nodes: self
                .nodes
                .iter()
                .map(|(num, node)| NodeReport {
                    node: *num,
                    role: node.flood().device().role,
                    stats: node.stats(),
                    delivered: node.delivered().len(),
                    transmitted: node.transmitted(),
                })
                .collect(),
        }
    }
}
