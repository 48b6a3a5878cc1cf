//! Flow runtime and built-in nodes.
//!
//! Messages travel between small stateful nodes along wires. Every node is
//! an event handler invoked one event at a time; timers and messages for the
//! same node are never handled concurrently.
//!
//! # Architecture
//!
//! ```text
//! [PositionTagger] ─┐
//! [PositionTagger] ─┼──► [OrderedCollector] ──► complete / timeout
//! [PositionTagger] ─┘
//!
//! [anything] ──► [RateQueue] ──► out / dropped
//! ```
//!
//! # Design
//!
//! - **Enum dispatch** — `BuiltinNode` enum for all built-in nodes, `NodePlugin`
//!   trait objects for everything else.
//! - **Explicit time** — `Flow` time only moves through `advance_to`, which
//!   makes every timing rule testable without sleeping.
//! - **Dedicated thread** — `FlowRunner` drives a flow in real time and talks
//!   to the host via crossbeam channels.

pub mod bridge;
pub mod context;
pub mod error;
pub mod executor;
pub mod id;
pub mod message;
pub mod node;
pub mod node_type;
pub mod nodes;
pub mod path;
pub mod port;
pub mod runner;
pub mod timer;

pub use bridge::{FlowBridge, FlowCommand, FlowEvent, Level, NodeStatus};
pub use context::{shared_store, ContextStore, Scope, SharedStore, ValueSource};
pub use error::{NodeError, NodeResult};
pub use executor::{Flow, FlowStats, NodeSlot};
pub use id::{NodeId, TimerHandle};
pub use message::{into_message, message, Message, PAYLOAD};
pub use node::{AnyNode, BuiltinNode, NodeContext, NodePlugin};
pub use node_type::{NodeSettings, NodeType};
pub use path::PropertyPath;
pub use port::{PortDescriptor, PortDirection, PortKind, PRIMARY, SECONDARY};
pub use runner::FlowRunner;
pub use timer::TimerQueue;
