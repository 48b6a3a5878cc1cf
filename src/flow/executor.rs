//! Flow executor — node slots, wiring and the event loop.
//!
//! A `Flow` delivers one event at a time:
//! 1. An injected message (or a due timer) is handed to its node.
//! 2. Everything the node emitted is routed along the wires of that output
//!    port into a FIFO work queue; outputs with no wire become
//!    `FlowEvent::Output`.
//! 3. The work queue is drained before the next timer or injection.
//!
//! Time is a `Duration` since the flow started and only moves when the owner
//! calls `advance_to`. Timers fire in deadline order with `now` set to their
//! deadline, so a flow driven by hand behaves exactly like one driven by the
//! real-time runner.

use crate::config::FlowConfig;
use crate::error::{FlowError, Result};
use crate::flow::bridge::{FlowEvent, NodeStatus};
use crate::flow::context::{ContextStore, SharedStore};
use crate::flow::id::{NodeId, TimerHandle};
use crate::flow::message::Message;
use crate::flow::node::{AnyNode, NodeContext};
use crate::flow::port::{output_count, output_port};
use crate::flow::timer::TimerQueue;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

/// Upper bound on deliveries caused by a single injection or timer.
///
/// Only reachable with a wiring loop.
const MAX_DELIVERIES_PER_EVENT: usize = 100_000;

/// A slot holding a node, its label and its outgoing wires.
pub struct NodeSlot {
    pub node: AnyNode,
    pub label: String,
    /// `wires[port]` lists the nodes fed by output `port`.
    pub wires: Vec<Vec<NodeId>>,
    logged_once: HashSet<String>,
    status: Option<NodeStatus>,
}

impl NodeSlot {
    fn new(label: String, node: AnyNode) -> Self {
        let outputs = output_count(node.ports());
        Self {
            node,
            label,
            wires: vec![Vec::new(); outputs],
            logged_once: HashSet::new(),
            status: None,
        }
    }
}

/// Counters for the lifetime of a flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowStats {
    /// Messages handed to a node.
    pub delivered: u64,
    /// Timers that fired.
    pub timers_fired: u64,
    /// Messages that left the flow through an unwired output.
    pub outputs: u64,
}

enum Hook {
    Start,
    Message(Message),
    Timer(TimerHandle),
    Close,
}

/// A graph of nodes sharing one timer queue and one flow context.
pub struct Flow {
    name: String,
    nodes: Vec<NodeSlot>,
    labels: HashMap<String, NodeId>,
    timers: TimerQueue,
    context: ContextStore,
    global: SharedStore,
    now: Duration,
    events: Vec<FlowEvent>,
    stats: FlowStats,
    closed: bool,
}

impl Flow {
    /// Create an empty flow with its own global store.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_global(name, crate::flow::context::shared_store())
    }

    /// Create an empty flow sharing `global` with other flows.
    pub fn with_global(name: impl Into<String>, global: SharedStore) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            labels: HashMap::new(),
            timers: TimerQueue::new(),
            context: ContextStore::new(),
            global,
            now: Duration::ZERO,
            events: Vec::new(),
            stats: FlowStats::default(),
            closed: false,
        }
    }

    /// Build a flow from a parsed flow file.
    pub fn from_config(config: &FlowConfig, global: SharedStore) -> Result<Self> {
        let mut flow = Self::with_global(config.name.clone(), global);

        for node in &config.nodes {
            flow.add_node(node.id.clone(), node.settings.build())?;
        }
        for node in &config.nodes {
            let from = flow.require(&node.id)?;
            for (port, targets) in node.wires.iter().enumerate() {
                for target in targets {
                    let to = flow.require(target)?;
                    flow.connect(from, port as u16, to)?;
                }
            }
        }

        tracing::info!(flow = %flow.name, nodes = flow.nodes.len(), "flow built");
        Ok(flow)
    }

    // ── Graph building ──

    /// Add a node under a unique `label` and start it. Returns its NodeId.
    pub fn add_node(&mut self, label: impl Into<String>, node: impl Into<AnyNode>) -> Result<NodeId> {
        let label = label.into();
        if self.labels.contains_key(&label) {
            return Err(FlowError::Config(format!("duplicate node id '{label}'")));
        }

        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeSlot::new(label.clone(), node.into()));
        self.labels.insert(label, id);

        let outputs = self.dispatch(id, Hook::Start);
        self.route(id, outputs, &mut VecDeque::new());
        Ok(id)
    }

    /// Wire output `port` of `from` to the input of `to`.
    pub fn connect(&mut self, from: NodeId, port: u16, to: NodeId) -> Result<()> {
        if to.index() >= self.nodes.len() {
            return Err(FlowError::UnknownNode(to.to_string()));
        }
        let slot = self
            .nodes
            .get_mut(from.index())
            .ok_or_else(|| FlowError::UnknownNode(from.to_string()))?;
        if output_port(slot.node.ports(), port).is_none() {
            return Err(FlowError::InvalidWire(format!(
                "'{}' has no output {port}",
                slot.label
            )));
        }

        let wires = &mut slot.wires[port as usize];
        if !wires.contains(&to) {
            wires.push(to);
        }
        Ok(())
    }

    // ── Accessors ──

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node_id(&self, label: &str) -> Option<NodeId> {
        self.labels.get(label).copied()
    }

    pub fn node(&self, id: NodeId) -> Option<&AnyNode> {
        self.nodes.get(id.index()).map(|slot| &slot.node)
    }

    pub fn label(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(id.index()).map(|slot| slot.label.as_str())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Current flow time.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Last status reported by a node.
    pub fn status(&self, id: NodeId) -> Option<&NodeStatus> {
        self.nodes.get(id.index()).and_then(|slot| slot.status.as_ref())
    }

    pub fn flow_context(&self) -> &ContextStore {
        &self.context
    }

    pub fn global_context(&self) -> &SharedStore {
        &self.global
    }

    pub fn stats(&self) -> FlowStats {
        self.stats
    }

    /// Number of live timers owned by `id`.
    pub fn pending_timers(&self, id: NodeId) -> usize {
        self.timers.pending_for(id)
    }

    /// Earliest pending timer deadline.
    pub fn next_deadline(&mut self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    /// Take every event produced since the last call.
    pub fn take_events(&mut self) -> Vec<FlowEvent> {
        std::mem::take(&mut self.events)
    }

    // ── Event delivery ──

    /// Deliver `msg` to node `id` and run the flow until it settles.
    pub fn inject(&mut self, id: NodeId, msg: Message) -> Result<()> {
        if self.closed {
            return Err(FlowError::Closed);
        }
        if id.index() >= self.nodes.len() {
            return Err(FlowError::UnknownNode(id.to_string()));
        }

        let mut work = VecDeque::from([(id, msg)]);
        self.drain(&mut work);
        Ok(())
    }

    /// Deliver `msg` to the node labelled `label`.
    pub fn inject_to(&mut self, label: &str, msg: Message) -> Result<()> {
        let id = self.require(label)?;
        self.inject(id, msg)
    }

    /// Move flow time forward to `now`, firing every timer due on the way.
    ///
    /// Time never goes backwards; an earlier `now` is ignored.
    pub fn advance_to(&mut self, now: Duration) {
        if self.closed || now < self.now {
            return;
        }

        while let Some(due) = self.timers.pop_due(now) {
            self.now = self.now.max(due.deadline);
            self.stats.timers_fired += 1;
            tracing::trace!(flow = %self.name, node = %due.node, at = ?due.deadline, "timer fired");

            let outputs = self.dispatch(due.node, Hook::Timer(due.handle));
            let mut work = VecDeque::new();
            self.route(due.node, outputs, &mut work);
            self.drain(&mut work);
        }
        self.now = now;
    }

    /// Move flow time forward by `delta`.
    pub fn advance_by(&mut self, delta: Duration) {
        self.advance_to(self.now + delta);
    }

    /// Shut every node down. Anything emitted while closing is discarded
    /// and every pending timer is cancelled.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        for index in 0..self.nodes.len() {
            let discarded = self.dispatch(NodeId(index as u32), Hook::Close);
            if !discarded.is_empty() {
                tracing::debug!(
                    flow = %self.name,
                    node = %self.nodes[index].label,
                    count = discarded.len(),
                    "discarding output emitted during close"
                );
            }
        }
        self.timers.clear();
        self.closed = true;
        tracing::info!(flow = %self.name, "flow closed");
    }

    fn require(&self, label: &str) -> Result<NodeId> {
        self.node_id(label)
            .ok_or_else(|| FlowError::UnknownNode(label.to_string()))
    }

    fn drain(&mut self, work: &mut VecDeque<(NodeId, Message)>) {
        let mut deliveries = 0usize;
        while let Some((target, msg)) = work.pop_front() {
            deliveries += 1;
            if deliveries > MAX_DELIVERIES_PER_EVENT {
                tracing::warn!(
                    flow = %self.name,
                    dropped = work.len() + 1,
                    "delivery limit reached, the flow probably contains a loop"
                );
                work.clear();
                return;
            }
            self.stats.delivered += 1;
            let outputs = self.dispatch(target, Hook::Message(msg));
            self.route(target, outputs, work);
        }
    }

    /// Run one hook on one node and collect what it emitted.
    fn dispatch(&mut self, id: NodeId, hook: Hook) -> Vec<(u16, Message)> {
        let mut outputs = Vec::new();
        let Some(slot) = self.nodes.get_mut(id.index()) else {
            return outputs;
        };

        let mut ctx = NodeContext::new(
            id,
            &slot.label,
            self.now,
            &mut outputs,
            &mut self.timers,
            &mut self.context,
            &self.global,
            &mut slot.logged_once,
            &mut slot.status,
            &mut self.events,
        );
        match hook {
            Hook::Start => slot.node.on_start(&mut ctx),
            Hook::Message(msg) => slot.node.on_message(msg, &mut ctx),
            Hook::Timer(handle) => slot.node.on_timer(handle, &mut ctx),
            Hook::Close => slot.node.on_close(&mut ctx),
        }
        outputs
    }

    fn route(&mut self, from: NodeId, outputs: Vec<(u16, Message)>, work: &mut VecDeque<(NodeId, Message)>) {
        let Some(slot) = self.nodes.get(from.index()) else {
            return;
        };

        for (port, msg) in outputs {
            match slot.wires.get(port as usize).map(Vec::as_slice) {
                Some([]) | None => {
                    self.stats.outputs += 1;
                    self.events.push(FlowEvent::Output {
                        node: from,
                        label: slot.label.clone(),
                        port,
                        msg,
                        at: self.now,
                    });
                }
                Some([targets @ .., last]) => {
                    for target in targets {
                        work.push_back((*target, msg.clone()));
                    }
                    work.push_back((*last, msg));
                }
            }
        }
    }
}
