//! Node type enumeration and the factory that turns settings into nodes.
//!
//! Flow files name a node type with the kebab-case `type` key; every type
//! carries its own settings table.

use crate::config::{
    CleanDebugSettings, CollectorSettings, QueueSettings, SaveFileSettings, SelectSettings,
    TaggerSettings,
};
use crate::flow::node::BuiltinNode;
use crate::flow::nodes::{
    ArraySelectNode, CleanDebugNode, OrderedCollectorNode, PositionTaggerNode, RateQueueNode,
    SaveFileNode,
};
use serde::{Deserialize, Serialize};

/// Types of nodes that can be instantiated from a flow file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeType {
    /// Attaches a position tag to a value.
    PositionTagger,
    /// Assembles tagged values into an ordered sequence.
    OrderedCollector,
    /// FIFO queue with rate limiting and eviction.
    RateQueue,
    ArraySelect,
    CleanDebug,
    SaveFile,
}

impl NodeType {
    /// Get the display name for this node type.
    pub fn display_name(&self) -> &'static str {
        match self {
            NodeType::PositionTagger => "Position Tagger",
            NodeType::OrderedCollector => "Ordered Collector",
            NodeType::RateQueue => "Rate-Limited Queue",
            NodeType::ArraySelect => "Array Select",
            NodeType::CleanDebug => "Clean Debug",
            NodeType::SaveFile => "Save File",
        }
    }

    /// The `type` key used in flow files.
    pub fn key(&self) -> &'static str {
        match self {
            NodeType::PositionTagger => "position-tagger",
            NodeType::OrderedCollector => "ordered-collector",
            NodeType::RateQueue => "rate-queue",
            NodeType::ArraySelect => "array-select",
            NodeType::CleanDebug => "clean-debug",
            NodeType::SaveFile => "save-file",
        }
    }

    /// Get all available node types.
    pub fn all() -> &'static [NodeType] {
        &[
            NodeType::PositionTagger,
            NodeType::OrderedCollector,
            NodeType::RateQueue,
            NodeType::ArraySelect,
            NodeType::CleanDebug,
            NodeType::SaveFile,
        ]
    }

    /// Whether this node type keeps state (and timers) between messages.
    pub fn is_stateful(&self) -> bool {
        matches!(self, NodeType::OrderedCollector | NodeType::RateQueue)
    }

    /// Get a detailed description of what this node does.
    pub fn description(&self) -> &'static str {
        match self {
            NodeType::PositionTagger => {
                "Tags a value with its position in a sequence.\n\
                 The position is a literal or looked up in msg/flow/global.\n\
                 Feeds the Ordered Collector."
            }
            NodeType::OrderedCollector => {
                "Collects tagged values into a dense ordered array.\n\
                 Emits on output 1 once every position is filled.\n\
                 Emits the partial array on output 2 at timeout."
            }
            NodeType::RateQueue => {
                "Buffers messages and releases them at a fixed minimum interval.\n\
                 Optional capacity and max-age bounds.\n\
                 Dropped messages leave on output 2."
            }
            NodeType::ArraySelect => {
                "Selects elements of an array property.\n\
                 Indices, slices with negative bounds and steps, and lists."
            }
            NodeType::CleanDebug => {
                "Shows a sanitised copy of a message on the debug channel.\n\
                 Truncates long strings and arrays, hides internal keys."
            }
            NodeType::SaveFile => {
                "Writes a message property to a file.\n\
                 Text, raw bytes or pretty JSON, confined to one directory."
            }
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Settings of one node, tagged by its type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum NodeSettings {
    PositionTagger(TaggerSettings),
    OrderedCollector(CollectorSettings),
    RateQueue(QueueSettings),
    ArraySelect(SelectSettings),
    CleanDebug(CleanDebugSettings),
    SaveFile(SaveFileSettings),
}

impl NodeSettings {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeSettings::PositionTagger(_) => NodeType::PositionTagger,
            NodeSettings::OrderedCollector(_) => NodeType::OrderedCollector,
            NodeSettings::RateQueue(_) => NodeType::RateQueue,
            NodeSettings::ArraySelect(_) => NodeType::ArraySelect,
            NodeSettings::CleanDebug(_) => NodeType::CleanDebug,
            NodeSettings::SaveFile(_) => NodeType::SaveFile,
        }
    }

    /// Correct invalid values in place, returning one note per correction.
    pub fn normalize(&mut self) -> Vec<String> {
        match self {
            NodeSettings::PositionTagger(s) => s.normalize(),
            NodeSettings::OrderedCollector(s) => s.normalize(),
            NodeSettings::RateQueue(s) => s.normalize(),
            NodeSettings::ArraySelect(s) => s.normalize(),
            NodeSettings::CleanDebug(s) => s.normalize(),
            NodeSettings::SaveFile(s) => s.normalize(),
        }
    }

    /// Default settings for `node_type`.
    pub fn default_for(node_type: NodeType) -> Self {
        match node_type {
            NodeType::PositionTagger => NodeSettings::PositionTagger(Default::default()),
            NodeType::OrderedCollector => NodeSettings::OrderedCollector(Default::default()),
            NodeType::RateQueue => NodeSettings::RateQueue(Default::default()),
            NodeType::ArraySelect => NodeSettings::ArraySelect(Default::default()),
            NodeType::CleanDebug => NodeSettings::CleanDebug(Default::default()),
            NodeType::SaveFile => NodeSettings::SaveFile(Default::default()),
        }
    }

    /// Build the node these settings describe.
    pub fn build(&self) -> BuiltinNode {
        match self {
            NodeSettings::PositionTagger(s) => BuiltinNode::PositionTagger(PositionTaggerNode::new(s)),
            NodeSettings::OrderedCollector(s) => {
                BuiltinNode::OrderedCollector(OrderedCollectorNode::new(s))
            }
            NodeSettings::RateQueue(s) => BuiltinNode::RateQueue(RateQueueNode::new(s)),
            NodeSettings::ArraySelect(s) => BuiltinNode::ArraySelect(ArraySelectNode::new(s)),
            NodeSettings::CleanDebug(s) => BuiltinNode::CleanDebug(CleanDebugNode::new(s)),
            NodeSettings::SaveFile(s) => BuiltinNode::SaveFile(SaveFileNode::new(s)),
        }
    }
}
