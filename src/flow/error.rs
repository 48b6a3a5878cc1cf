//! Node-level error types.
//!
//! None of these ever cross the node boundary: a node that hits one drops
//! the offending event, reports a diagnostic and carries on.

use thiserror::Error;

/// Errors that can occur while a node handles a single event.
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid position '{value}': expected an integer >= 0")]
    InvalidPosition { value: String },

    #[error("Lookup of '{path}' failed: {reason}")]
    Lookup { path: String, reason: String },

    #[error("Position {position} is outside 0..{expected}")]
    OutOfRangePosition { position: u64, expected: u64 },

    #[error("Position {0} was already collected in this cycle")]
    DuplicatePosition(u64),

    #[error("Expected an array at '{0}'")]
    NotAnArray(String),

    #[error("Path '{0}' escapes the target directory")]
    PathEscape(String),

    #[error("File '{0}' already exists")]
    FileExists(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl NodeError {
    pub fn lookup(path: impl Into<String>, reason: impl Into<String>) -> Self {
        NodeError::Lookup {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type NodeResult<T> = std::result::Result<T, NodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NodeError::OutOfRangePosition {
            position: 5,
            expected: 3,
        };
        assert_eq!(err.to_string(), "Position 5 is outside 0..3");

        let err = NodeError::lookup("payload.x", "not found");
        assert!(err.to_string().contains("payload.x"));
    }
}
