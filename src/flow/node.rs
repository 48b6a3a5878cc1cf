//! Node abstraction for the flow.
//!
//! Two-layer design:
//! - **`NodePlugin` trait** — for third-party nodes.
//! - **`BuiltinNode` enum** — for all built-in nodes, dispatched with a plain
//!   `match` instead of a vtable.
//!
//! `AnyNode` wraps either variant so the flow can handle both uniformly.
//!
//! Every hook receives a `NodeContext`, which is the node's only window onto
//! the host: emitting, timers, context stores, diagnostics and status.

use crate::flow::bridge::{FlowEvent, Level, NodeStatus};
use crate::flow::context::{ContextStore, Scope, Scopes, SharedStore, ValueSource};
use crate::flow::error::NodeResult;
use crate::flow::id::{NodeId, TimerHandle};
use crate::flow::message::Message;
use crate::flow::path::PropertyPath;
use crate::flow::port::PortDescriptor;
use crate::flow::timer::TimerQueue;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

/// Context passed to node hooks for a single event.
pub struct NodeContext<'a> {
    node_id: NodeId,
    label: &'a str,
    now: Duration,
    outputs: &'a mut Vec<(u16, Message)>,
    timers: &'a mut TimerQueue,
    scopes: Scopes<'a>,
    logged_once: &'a mut HashSet<String>,
    status: &'a mut Option<NodeStatus>,
    events: &'a mut Vec<FlowEvent>,
}

impl<'a> NodeContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        node_id: NodeId,
        label: &'a str,
        now: Duration,
        outputs: &'a mut Vec<(u16, Message)>,
        timers: &'a mut TimerQueue,
        flow: &'a mut ContextStore,
        global: &'a SharedStore,
        logged_once: &'a mut HashSet<String>,
        status: &'a mut Option<NodeStatus>,
        events: &'a mut Vec<FlowEvent>,
    ) -> Self {
        Self {
            node_id,
            label,
            now,
            outputs,
            timers,
            scopes: Scopes { flow, global },
            logged_once,
            status,
            events,
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn label(&self) -> &str {
        self.label
    }

    /// Current flow time.
    pub fn now(&self) -> Duration {
        self.now
    }

    // ── Output ──

    /// Send `msg` out of output `port`.
    pub fn emit(&mut self, port: u16, msg: Message) {
        self.outputs.push((port, msg));
    }

    // ── Timers ──

    /// Schedule a timer `delay` from now. The node's `on_timer` receives the handle.
    pub fn schedule(&mut self, delay: Duration) -> TimerHandle {
        self.timers.schedule(self.node_id, self.now + delay)
    }

    /// Cancel a timer. A cancelled timer never fires.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.timers.cancel(handle)
    }

    /// Cancel whatever is in `slot` and arm a fresh timer in its place.
    pub fn rearm(&mut self, slot: &mut Option<TimerHandle>, delay: Duration) -> TimerHandle {
        if let Some(previous) = slot.take() {
            self.cancel(previous);
        }
        let handle = self.schedule(delay);
        *slot = Some(handle);
        handle
    }

    // ── Context ──

    /// Resolve `expr` against a literal, the message, or a context store.
    pub fn resolve(&self, source: ValueSource, expr: &str, msg: &Message) -> NodeResult<Option<Value>> {
        self.scopes.resolve(source, expr, msg)
    }

    /// Write `value` at `path` in `scope` (`Scope::Msg` writes into `msg`).
    pub fn store(
        &mut self,
        scope: Scope,
        path: &PropertyPath,
        value: Value,
        msg: &mut Message,
    ) -> NodeResult<()> {
        self.scopes.store(scope, path, value, msg)
    }

    // ── Diagnostics ──

    /// Report a warning. Best-effort: never fails the caller.
    pub fn warn(&mut self, text: impl Into<String>) {
        let text = text.into();
        tracing::warn!(node = %self.label, "{}", text);
        self.events.push(FlowEvent::Diagnostic {
            node: self.node_id,
            label: self.label.to_string(),
            level: Level::Warn,
            text,
        });
    }

    /// Report an error-level diagnostic.
    pub fn error(&mut self, text: impl Into<String>) {
        let text = text.into();
        tracing::error!(node = %self.label, "{}", text);
        self.events.push(FlowEvent::Diagnostic {
            node: self.node_id,
            label: self.label.to_string(),
            level: Level::Error,
            text,
        });
    }

    /// Report a warning only the first time this exact text is seen by this node.
    pub fn log_once(&mut self, text: impl Into<String>) {
        let text = text.into();
        if self.logged_once.insert(text.clone()) {
            self.warn(text);
        }
    }

    /// Publish a value on the debug channel.
    pub fn debug(&mut self, value: Value) {
        self.events.push(FlowEvent::Debug {
            node: self.node_id,
            label: self.label.to_string(),
            value,
            at: Utc::now(),
        });
    }

    /// Update the node status. Repeating the current status is a no-op.
    pub fn set_status(&mut self, status: NodeStatus) {
        if self.status.as_ref() == Some(&status) {
            return;
        }
        *self.status = Some(status.clone());
        self.events.push(FlowEvent::Status {
            node: self.node_id,
            label: self.label.to_string(),
            status,
        });
    }
}

/// Trait for pluggable/user-defined nodes.
pub trait NodePlugin: Send {
    /// Human-readable name of this node type.
    fn name(&self) -> &str;

    /// Port descriptors for this node.
    fn ports(&self) -> &[PortDescriptor];

    /// Called once when the node joins a flow.
    fn on_start(&mut self, _ctx: &mut NodeContext) {}

    /// Called for every message delivered to the node.
    fn on_message(&mut self, msg: Message, ctx: &mut NodeContext);

    /// Called when a timer scheduled by this node fires.
    fn on_timer(&mut self, _handle: TimerHandle, _ctx: &mut NodeContext) {}

    /// Called when the flow shuts down. Outputs emitted here are discarded.
    fn on_close(&mut self, _ctx: &mut NodeContext) {}
}

use crate::flow::nodes::{
    ArraySelectNode, CleanDebugNode, OrderedCollectorNode, PositionTaggerNode, RateQueueNode,
    SaveFileNode,
};

/// Enum dispatch for built-in nodes.
pub enum BuiltinNode {
    PositionTagger(PositionTaggerNode),
    OrderedCollector(OrderedCollectorNode),
    RateQueue(RateQueueNode),
    ArraySelect(ArraySelectNode),
    CleanDebug(CleanDebugNode),
    SaveFile(SaveFileNode),
}

impl BuiltinNode {
    pub fn name(&self) -> &str {
        match self {
            BuiltinNode::PositionTagger(n) => n.name(),
            BuiltinNode::OrderedCollector(n) => n.name(),
            BuiltinNode::RateQueue(n) => n.name(),
            BuiltinNode::ArraySelect(n) => n.name(),
            BuiltinNode::CleanDebug(n) => n.name(),
            BuiltinNode::SaveFile(n) => n.name(),
        }
    }

    pub fn ports(&self) -> &[PortDescriptor] {
        match self {
            BuiltinNode::PositionTagger(n) => n.ports(),
            BuiltinNode::OrderedCollector(n) => n.ports(),
            BuiltinNode::RateQueue(n) => n.ports(),
            BuiltinNode::ArraySelect(n) => n.ports(),
            BuiltinNode::CleanDebug(n) => n.ports(),
            BuiltinNode::SaveFile(n) => n.ports(),
        }
    }

    pub fn on_start(&mut self, ctx: &mut NodeContext) {
        match self {
            BuiltinNode::PositionTagger(n) => n.on_start(ctx),
            BuiltinNode::OrderedCollector(n) => n.on_start(ctx),
            BuiltinNode::RateQueue(n) => n.on_start(ctx),
            BuiltinNode::ArraySelect(n) => n.on_start(ctx),
            BuiltinNode::CleanDebug(n) => n.on_start(ctx),
            BuiltinNode::SaveFile(n) => n.on_start(ctx),
        }
    }

    pub fn on_message(&mut self, msg: Message, ctx: &mut NodeContext) {
        match self {
            BuiltinNode::PositionTagger(n) => n.on_message(msg, ctx),
            BuiltinNode::OrderedCollector(n) => n.on_message(msg, ctx),
            BuiltinNode::RateQueue(n) => n.on_message(msg, ctx),
            BuiltinNode::ArraySelect(n) => n.on_message(msg, ctx),
            BuiltinNode::CleanDebug(n) => n.on_message(msg, ctx),
            BuiltinNode::SaveFile(n) => n.on_message(msg, ctx),
        }
    }

    pub fn on_timer(&mut self, handle: TimerHandle, ctx: &mut NodeContext) {
        match self {
            BuiltinNode::OrderedCollector(n) => n.on_timer(handle, ctx),
            BuiltinNode::RateQueue(n) => n.on_timer(handle, ctx),
            // Stateless nodes never schedule timers.
            BuiltinNode::PositionTagger(_)
            | BuiltinNode::ArraySelect(_)
            | BuiltinNode::CleanDebug(_)
            | BuiltinNode::SaveFile(_) => {}
        }
    }

    pub fn on_close(&mut self, ctx: &mut NodeContext) {
        match self {
            BuiltinNode::OrderedCollector(n) => n.on_close(ctx),
            BuiltinNode::RateQueue(n) => n.on_close(ctx),
            BuiltinNode::PositionTagger(_)
            | BuiltinNode::ArraySelect(_)
            | BuiltinNode::CleanDebug(_)
            | BuiltinNode::SaveFile(_) => {}
        }
    }
}

/// Wrapper that holds either a built-in node (enum dispatch) or a plugin (trait object).
pub enum AnyNode {
    Builtin(BuiltinNode),
    Plugin(Box<dyn NodePlugin>),
}

impl AnyNode {
    pub fn name(&self) -> &str {
        match self {
            AnyNode::Builtin(n) => n.name(),
            AnyNode::Plugin(n) => n.name(),
        }
    }

    pub fn ports(&self) -> &[PortDescriptor] {
        match self {
            AnyNode::Builtin(n) => n.ports(),
            AnyNode::Plugin(n) => n.ports(),
        }
    }

    pub fn on_start(&mut self, ctx: &mut NodeContext) {
        match self {
            AnyNode::Builtin(n) => n.on_start(ctx),
            AnyNode::Plugin(n) => n.on_start(ctx),
        }
    }

    pub fn on_message(&mut self, msg: Message, ctx: &mut NodeContext) {
        match self {
            AnyNode::Builtin(n) => n.on_message(msg, ctx),
            AnyNode::Plugin(n) => n.on_message(msg, ctx),
        }
    }

    pub fn on_timer(&mut self, handle: TimerHandle, ctx: &mut NodeContext) {
        match self {
            AnyNode::Builtin(n) => n.on_timer(handle, ctx),
            AnyNode::Plugin(n) => n.on_timer(handle, ctx),
        }
    }

    pub fn on_close(&mut self, ctx: &mut NodeContext) {
        match self {
            AnyNode::Builtin(n) => n.on_close(ctx),
            AnyNode::Plugin(n) => n.on_close(ctx),
        }
    }
}

impl From<BuiltinNode> for AnyNode {
    fn from(node: BuiltinNode) -> Self {
        AnyNode::Builtin(node)
    }
}
