//! Thread boundary between a running flow and its host.
//!
//! The host injects messages through `FlowBridge`; the flow thread reports
//! outputs, diagnostics and status changes back as `FlowEvent`s.

use crate::error::{FlowError, Result};
use crate::flow::id::NodeId;
use crate::flow::message::Message;
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use serde_json::Value;
use std::time::Duration;

/// Severity of a diagnostic or status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

/// Operator-facing node status (purely observational).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatus {
    pub level: Level,
    pub text: String,
}

impl NodeStatus {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: Level::Info,
            text: text.into(),
        }
    }

    pub fn warn(text: impl Into<String>) -> Self {
        Self {
            level: Level::Warn,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            text: text.into(),
        }
    }
}

/// Everything a flow reports to its host.
#[derive(Debug, Clone)]
pub enum FlowEvent {
    /// A message left the flow through an unwired output.
    Output {
        node: NodeId,
        label: String,
        port: u16,
        msg: Message,
        /// Flow time of the emission.
        at: Duration,
    },

    /// A node reported a diagnostic.
    Diagnostic {
        node: NodeId,
        label: String,
        level: Level,
        text: String,
    },

    /// A node changed its status.
    Status {
        node: NodeId,
        label: String,
        status: NodeStatus,
    },

    /// A debug node published a sanitised value.
    Debug {
        node: NodeId,
        label: String,
        value: Value,
        at: DateTime<Utc>,
    },

    /// The flow thread is shutting down.
    Shutdown,
}

impl FlowEvent {
    /// The output port and message, if this is an `Output` event.
    pub fn as_output(&self) -> Option<(u16, &Message)> {
        match self {
            FlowEvent::Output { port, msg, .. } => Some((*port, msg)),
            _ => None,
        }
    }
}

/// Commands sent from the host to the flow thread.
#[derive(Debug, Clone)]
pub enum FlowCommand {
    /// Deliver a message to the node with this label.
    Inject { node: String, msg: Message },
    /// Close every node and stop the flow thread.
    Shutdown,
}

/// Channel capacity for commands (host → flow).
const CMD_CHANNEL_CAPACITY: usize = 256;
/// Channel capacity for events (flow → host).
const EVENT_CHANNEL_CAPACITY: usize = 10_000;

/// Host-side handle for communicating with the flow thread.
pub struct FlowBridge {
    pub cmd_tx: Sender<FlowCommand>,
    pub event_rx: Receiver<FlowEvent>,
}

impl FlowBridge {
    /// Create a new bridge pair: `(bridge_for_host, cmd_rx, event_tx)`.
    ///
    /// The flow thread owns `cmd_rx` and `event_tx`.
    pub fn new() -> (Self, Receiver<FlowCommand>, Sender<FlowEvent>) {
        let (cmd_tx, cmd_rx) = bounded(CMD_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = bounded(EVENT_CHANNEL_CAPACITY);
        (Self { cmd_tx, event_rx }, cmd_rx, event_tx)
    }

    /// Deliver `msg` to the node labelled `node`.
    pub fn inject(&self, node: impl Into<String>, msg: Message) -> Result<()> {
        self.cmd_tx
            .send(FlowCommand::Inject {
                node: node.into(),
                msg,
            })
            .map_err(|_| FlowError::Channel("flow thread is gone".to_string()))
    }

    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(FlowCommand::Shutdown);
    }

    /// Drain all pending events.
    pub fn drain(&self) -> Vec<FlowEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Try to receive a single event without blocking.
    pub fn try_recv(&self) -> Option<FlowEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Wait up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<FlowEvent> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}
