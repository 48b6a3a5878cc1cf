//! Configuration module for flow-nodes
//!
//! A flow file is TOML with one `[[nodes]]` table per node:
//!
//! ```toml
//! name = "ordered-readings"
//!
//! [[nodes]]
//! id = "tag-a"
//! type = "position-tagger"
//! position = "0"
//! wires = [["collect"]]
//!
//! [[nodes]]
//! id = "collect"
//! type = "ordered-collector"
//! expected_count = 2
//! timeout_ms = 1000
//! ```
//!
//! `type` selects the node; every other key except `id` and `wires` belongs
//! to that node's settings. `wires[n]` lists the nodes fed by output `n`.
//!
//! # Default Location
//!
//! Without an explicit path the CLI looks for `flow.toml` in the
//! platform-appropriate config directory:
//! - **Linux**: `~/.config/flow-nodes/`
//! - **macOS**: `~/Library/Application Support/flow-nodes/`
//! - **Windows**: `%APPDATA%\flow-nodes\`

pub mod settings;

pub use crate::flow::node_type::{NodeSettings, NodeType};
pub use settings::*;

use crate::error::{FlowError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Directory name under the platform config directory
pub const APP_DIR: &str = "flow-nodes";

/// Default flow file name
pub const FLOW_FILE: &str = "flow.toml";

/// Get the default flow file path
pub fn default_flow_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_DIR).join(FLOW_FILE))
}

// ==================== Flow File ====================

/// One node entry of a flow file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Unique label, used for wiring and injection
    pub id: String,

    #[serde(flatten)]
    pub settings: NodeSettings,

    /// `wires[port]` = ids of the nodes fed by that output
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wires: Vec<Vec<String>>,
}

impl NodeConfig {
    pub fn new(id: impl Into<String>, settings: NodeSettings) -> Self {
        Self {
            id: id.into(),
            settings,
            wires: Vec::new(),
        }
    }

    /// Add a wire from output `port` to `target`.
    pub fn wire(mut self, port: usize, target: impl Into<String>) -> Self {
        if self.wires.len() <= port {
            self.wires.resize(port + 1, Vec::new());
        }
        self.wires[port].push(target.into());
        self
    }
}

/// A complete flow file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowConfig {
    #[serde(default = "FlowConfig::default_name")]
    pub name: String,

    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            nodes: Vec::new(),
        }
    }
}

impl FlowConfig {
    fn default_name() -> String {
        "flow".to_string()
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
        }
    }

    /// Append a node entry.
    pub fn with_node(mut self, node: NodeConfig) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn find(&self, id: &str) -> Option<&NodeConfig> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Parse a flow file from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load a flow file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            FlowError::Config(format!("Failed to read flow file {:?}: {}", path, e))
        })?;
        Self::from_toml_str(&content).map_err(|e| e.with_context(format!("{}", path.display())))
    }

    /// Save the flow file to disk as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                FlowError::Config(format!("Failed to create flow directory: {}", e))
            })?;
        }

        let content = self.to_toml_string()?;
        std::fs::write(path, content).map_err(|e| {
            FlowError::Config(format!("Failed to write flow file {:?}: {}", path, e))
        })
    }

    /// Check the structure of the flow and normalize every node's settings.
    ///
    /// Structural problems (duplicate ids, wires to unknown nodes or
    /// non-existent outputs) are errors. Invalid settings are corrected in
    /// place and reported as warnings, one per correction.
    pub fn validate(&mut self) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if node.id.trim().is_empty() {
                return Err(FlowError::Config("node with an empty id".to_string()));
            }
            if !seen.insert(node.id.as_str()) {
                return Err(FlowError::Config(format!("duplicate node id '{}'", node.id)));
            }
        }

        for node in &self.nodes {
            let outputs = crate::flow::port::output_count(node.settings.build().ports());
            if node.wires.len() > outputs {
                return Err(FlowError::InvalidWire(format!(
                    "'{}' has {} output(s) but {} wire list(s)",
                    node.id,
                    outputs,
                    node.wires.len()
                )));
            }
            for target in node.wires.iter().flatten() {
                if !seen.contains(target.as_str()) {
                    return Err(FlowError::InvalidWire(format!(
                        "'{}' is wired to unknown node '{}'",
                        node.id, target
                    )));
                }
            }
        }

        let mut warnings = Vec::new();
        for node in &mut self.nodes {
            for note in node.settings.normalize() {
                warnings.push(format!("{}: {}", node.id, note));
            }
        }
        Ok(warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
name = "sample"

[[nodes]]
id = "tag"
type = "position-tagger"
position = "1"
wires = [["collect"]]

[[nodes]]
id = "collect"
type = "ordered-collector"
expected_count = 2
timeout_ms = 1000
output_scope = "flow"
"#;

    #[test]
    fn test_parse_sample() {
        let config = FlowConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.name, "sample");
        assert_eq!(config.nodes.len(), 2);
        assert_eq!(config.nodes[0].wires, vec![vec!["collect".to_string()]]);

        match &config.find("collect").unwrap().settings {
            NodeSettings::OrderedCollector(s) => {
                assert_eq!(s.expected_count, 2);
                assert_eq!(s.timeout_ms, 1000);
                assert_eq!(s.output_scope, crate::flow::Scope::Flow);
                assert_eq!(s.output_path, "payload");
            }
            other => panic!("unexpected settings: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        let err = FlowConfig::from_toml_str("[[nodes]]\nid = \"x\"\ntype = \"nope\"\n").unwrap_err();
        assert!(matches!(err, FlowError::Toml(_)));
    }

    #[test]
    fn test_validate_structure() {
        let mut dup = FlowConfig::new("dup")
            .with_node(NodeConfig::new("a", NodeSettings::default_for(NodeType::RateQueue)))
            .with_node(NodeConfig::new("a", NodeSettings::default_for(NodeType::RateQueue)));
        assert!(matches!(dup.validate(), Err(FlowError::Config(_))));

        let mut dangling = FlowConfig::new("dangling").with_node(
            NodeConfig::new("a", NodeSettings::default_for(NodeType::RateQueue)).wire(0, "b"),
        );
        assert!(matches!(dangling.validate(), Err(FlowError::InvalidWire(_))));

        let mut extra = FlowConfig::new("extra")
            .with_node(NodeConfig::new("a", NodeSettings::default_for(NodeType::ArraySelect)).wire(1, "a"));
        assert!(matches!(extra.validate(), Err(FlowError::InvalidWire(_))));
    }

    #[test]
    fn test_validate_reports_corrections() {
        let mut config = FlowConfig::new("fix").with_node(NodeConfig::new(
            "c",
            NodeSettings::OrderedCollector(CollectorSettings {
                expected_count: 0,
                ..Default::default()
            }),
        ));
        let warnings = config.validate().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("c: expected_count"));
    }

    #[test]
    fn test_default_flow_path() {
        if let Some(path) = default_flow_path() {
            assert!(path.ends_with("flow-nodes/flow.toml"));
        }
    }
}
