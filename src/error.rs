//! Error handling for flow-nodes
//!
//! This module defines the crate-level error type and a Result alias used by
//! everything outside a node: loading flow files, wiring flows and talking to
//! the flow thread. Errors inside a node are [`NodeError`]s and never escape
//! the node.

use crate::flow::error::NodeError;
use thiserror::Error;

/// Main error type for flow-nodes operations
#[derive(Error, Debug)]
pub enum FlowError {
    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Flow file is not valid TOML or does not match the schema
    #[error("Flow file error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Flow could not be written as TOML
    #[error("Flow serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// Invalid JSON in an injected message
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No node with this label or id
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    /// A wire references a port or node that does not exist
    #[error("Invalid wire: {0}")]
    InvalidWire(String),

    /// The flow was closed and accepts no more events
    #[error("Flow is closed")]
    Closed,

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<FlowError>,
    },
}

impl FlowError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        FlowError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for flow-nodes operations
pub type Result<T> = std::result::Result<T, FlowError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<FlowError>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}
