//! Built-in node implementations.

pub mod array_select;
pub mod clean_debug;
pub mod ordered_collector;
pub mod position_tagger;
pub mod rate_queue;
pub mod save_file;

pub use array_select::{ArraySelectNode, Selection};
pub use clean_debug::{sanitize, CleanDebugNode, SanitizeLimits};
pub use ordered_collector::{
    dense_sequence, CollectorState, CollectorStats, OrderedCollectorNode, TimeoutReport,
};
pub use position_tagger::{parse_position, PositionTaggerNode, TaggedItem, TAG_FIELD};
pub use rate_queue::{DropReason, QueueState, QueueStats, RateQueueNode};
pub use save_file::SaveFileNode;
