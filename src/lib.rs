//! # flow-nodes: Stateful Nodes for Flow-Based Runtimes
//!
//! A set of small plugin nodes and the runtime that hosts them. Each node is
//! a stateful event handler invoked one message or timer at a time.
//!
//! ## Nodes
//!
//! - **Position Tagger** + **Ordered Collector**: tag values with their
//!   position, then assemble them into a dense ordered array, emitting the
//!   partial array when a deadline passes.
//! - **Rate-Limited Queue**: FIFO buffer with a minimum gap between
//!   emissions, optional capacity and maximum wait.
//! - **Array Select**, **Clean Debug**, **Save File**: small stateless
//!   helpers.
//!
//! ## Architecture
//!
//! - **Flow**: owns the nodes, wiring, timers and flow context; time is
//!   explicit so every timing rule is deterministic under test.
//! - **Runner**: drives a flow in real time on a dedicated thread.
//! - **Communication**: crossbeam channels between the host and the runner.
//! - **Configuration**: TOML flow files, one `[[nodes]]` table per node.
//!
//! ## Example
//!
//! ```ignore
//! use flow_nodes::config::FlowConfig;
//! use flow_nodes::flow::{message, shared_store, Flow, FlowRunner};
//!
//! let config = FlowConfig::load("flow.toml")?;
//! let flow = Flow::from_config(&config, shared_store())?;
//! let (bridge, handle) = FlowRunner::spawn(flow)?;
//!
//! bridge.inject("tag-a", message(serde_json::json!(21.5)))?;
//! for event in bridge.drain() {
//!     println!("{:?}", event);
//! }
//! bridge.shutdown();
//! handle.join().ok();
//! ```

pub mod config;
pub mod error;
pub mod flow;

pub use config::{FlowConfig, NodeConfig};
pub use error::{FlowError, Result};
