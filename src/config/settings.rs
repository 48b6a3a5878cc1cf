//! Per-node settings as they appear in a flow file.
//!
//! Every settings struct deserializes with defaults for omitted keys and
//! exposes `normalize()`, which corrects invalid values in place and returns
//! one human-readable note per correction. Invalid settings are never fatal:
//! the node runs with the corrected values and reports the notes once.
//!
//! # Main Types
//!
//! - [`TaggerSettings`] - Position Tagger
//! - [`CollectorSettings`] - Ordered Collector
//! - [`QueueSettings`] / [`QueueMode`] - Rate-Limited Queue
//! - [`SelectSettings`] - Array Select
//! - [`CleanDebugSettings`] - Clean Debug
//! - [`SaveFileSettings`] - Save File

use crate::flow::context::{Scope, ValueSource};
use crate::flow::message::PAYLOAD;
use crate::flow::nodes::array_select::Selection;
use crate::flow::path::PropertyPath;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default collection timeout in milliseconds
pub const DEFAULT_COLLECT_TIMEOUT_MS: u64 = 5000;

/// Smallest collection timeout accepted
pub const MIN_COLLECT_TIMEOUT_MS: u64 = 100;

/// Largest number of positions one collection cycle may hold
pub const MAX_EXPECTED_COUNT: i64 = 100_000;

fn default_property() -> String {
    PAYLOAD.to_string()
}

fn default_true() -> bool {
    true
}

/// Fall back to `payload` when `path` does not parse.
fn check_path(path: &mut String, field: &str, notes: &mut Vec<String>) {
    if let Err(e) = PropertyPath::parse(path) {
        notes.push(format!("{field}: {e}; using '{PAYLOAD}'"));
        *path = default_property();
    }
}

// ==================== Position Tagger ====================

/// Settings for the Position Tagger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggerSettings {
    /// Property the tagged value is read from
    #[serde(default = "default_property")]
    pub property: String,

    /// Position: a literal integer or a path, depending on `position_source`.
    /// Empty means position 0.
    #[serde(default)]
    pub position: String,

    /// Where `position` is resolved
    #[serde(default)]
    pub position_source: ValueSource,
}

impl Default for TaggerSettings {
    fn default() -> Self {
        Self {
            property: default_property(),
            position: String::new(),
            position_source: ValueSource::Literal,
        }
    }
}

impl TaggerSettings {
    pub fn normalize(&mut self) -> Vec<String> {
        let mut notes = Vec::new();
        check_path(&mut self.property, "property", &mut notes);
        if self.position_source != ValueSource::Literal && !self.position.trim().is_empty() {
            if let Err(e) = PropertyPath::parse(&self.position) {
                notes.push(format!("position: {e}; using position 0"));
                self.position.clear();
            }
        }
        notes
    }
}

// ==================== Ordered Collector ====================

/// Settings for the Ordered Collector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorSettings {
    /// Number of positions per cycle (must be >= 1)
    #[serde(default = "CollectorSettings::default_expected_count")]
    pub expected_count: i64,

    /// Cycle deadline in milliseconds (>= 100)
    #[serde(default = "CollectorSettings::default_timeout_ms")]
    pub timeout_ms: u64,

    /// Where the completed sequence is written
    #[serde(default = "default_property")]
    pub output_path: String,

    /// Scope of `output_path`
    #[serde(default)]
    pub output_scope: Scope,

    /// Reject duplicate positions instead of overwriting
    #[serde(default)]
    pub strict: bool,
}

impl CollectorSettings {
    fn default_expected_count() -> i64 {
        1
    }

    fn default_timeout_ms() -> u64 {
        DEFAULT_COLLECT_TIMEOUT_MS
    }

    pub fn normalize(&mut self) -> Vec<String> {
        let mut notes = Vec::new();
        if self.expected_count < 1 {
            notes.push(format!(
                "expected_count must be a positive integer, got {}; using 1",
                self.expected_count
            ));
            self.expected_count = 1;
        }
        if self.expected_count > MAX_EXPECTED_COUNT {
            notes.push(format!(
                "expected_count must be at most {MAX_EXPECTED_COUNT}, got {}; using {MAX_EXPECTED_COUNT}",
                self.expected_count
            ));
            self.expected_count = MAX_EXPECTED_COUNT;
        }
        if self.timeout_ms < MIN_COLLECT_TIMEOUT_MS {
            notes.push(format!(
                "timeout_ms must be at least {MIN_COLLECT_TIMEOUT_MS}, got {}; using {MIN_COLLECT_TIMEOUT_MS}",
                self.timeout_ms
            ));
            self.timeout_ms = MIN_COLLECT_TIMEOUT_MS;
        }
        check_path(&mut self.output_path, "output_path", &mut notes);
        notes
    }
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            expected_count: Self::default_expected_count(),
            timeout_ms: DEFAULT_COLLECT_TIMEOUT_MS,
            output_path: default_property(),
            output_scope: Scope::Msg,
            strict: false,
        }
    }
}

// ==================== Rate-Limited Queue ====================

/// Which bounds the queue enforces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueMode {
    /// Only `max_entries`
    Capacity,
    /// Only `max_age_ms`
    Age,
    /// Both bounds
    Both,
}

/// Settings for the Rate-Limited Queue
///
/// All bounds use 0 for "unbounded". Without an explicit `mode` every
/// non-zero bound is enforced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<QueueMode>,

    /// Maximum number of buffered messages
    #[serde(default)]
    pub max_entries: u64,

    /// Maximum time a message may wait, in milliseconds
    #[serde(default)]
    pub max_age_ms: u64,

    /// Minimum gap between two emissions, in milliseconds
    #[serde(default)]
    pub min_interval_ms: u64,
}

impl QueueSettings {
    /// Capacity bound in effect (0 = unbounded).
    pub fn effective_capacity(&self) -> u64 {
        match self.mode {
            Some(QueueMode::Capacity) | Some(QueueMode::Both) | None => self.max_entries,
            Some(QueueMode::Age) => 0,
        }
    }

    /// Age bound in effect, in milliseconds (0 = unbounded).
    pub fn effective_max_age_ms(&self) -> u64 {
        match self.mode {
            Some(QueueMode::Age) | Some(QueueMode::Both) | None => self.max_age_ms,
            Some(QueueMode::Capacity) => 0,
        }
    }

    pub fn normalize(&mut self) -> Vec<String> {
        let mut notes = Vec::new();
        match self.mode {
            Some(QueueMode::Capacity) if self.max_entries == 0 => {
                notes.push("capacity mode without max_entries: queue is unbounded".to_string())
            }
            Some(QueueMode::Age) if self.max_age_ms == 0 => {
                notes.push("age mode without max_age_ms: messages never expire".to_string())
            }
            Some(QueueMode::Both) if self.max_entries == 0 && self.max_age_ms == 0 => {
                notes.push("both mode without any bound: queue is unbounded".to_string())
            }
            _ => {}
        }
        notes
    }
}

// ==================== Array Select ====================

/// Settings for Array Select
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectSettings {
    /// Property holding the array
    #[serde(default = "default_property")]
    pub property: String,

    /// Selection such as `0`, `-1`, `1:3`, `::2` or `0,2,4:`
    #[serde(default = "SelectSettings::default_selection")]
    pub selection: String,
}

impl SelectSettings {
    fn default_selection() -> String {
        ":".to_string()
    }

    pub fn normalize(&mut self) -> Vec<String> {
        let mut notes = Vec::new();
        check_path(&mut self.property, "property", &mut notes);
        if let Err(e) = self.selection.parse::<Selection>() {
            notes.push(format!("selection: {e}"));
        }
        notes
    }
}

impl Default for SelectSettings {
    fn default() -> Self {
        Self {
            property: default_property(),
            selection: Self::default_selection(),
        }
    }
}

// ==================== Clean Debug ====================

/// Settings for Clean Debug
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanDebugSettings {
    /// Show the whole message instead of `property`
    #[serde(default)]
    pub complete: bool,

    #[serde(default = "default_property")]
    pub property: String,

    #[serde(default = "CleanDebugSettings::default_max_depth")]
    pub max_depth: usize,

    #[serde(default = "CleanDebugSettings::default_max_string_len")]
    pub max_string_len: usize,

    #[serde(default = "CleanDebugSettings::default_max_array_len")]
    pub max_array_len: usize,

    /// Also write the value to the log
    #[serde(default = "default_true")]
    pub to_log: bool,

    /// Show a short preview as node status
    #[serde(default)]
    pub to_status: bool,
}

impl CleanDebugSettings {
    fn default_max_depth() -> usize {
        5
    }

    fn default_max_string_len() -> usize {
        1000
    }

    fn default_max_array_len() -> usize {
        100
    }

    pub fn normalize(&mut self) -> Vec<String> {
        let mut notes = Vec::new();
        if !self.complete {
            check_path(&mut self.property, "property", &mut notes);
        }
        if self.max_depth == 0 {
            notes.push("max_depth must be at least 1; using 1".to_string());
            self.max_depth = 1;
        }
        if self.max_string_len == 0 {
            notes.push("max_string_len must be at least 1; using 1".to_string());
            self.max_string_len = 1;
        }
        notes
    }
}

impl Default for CleanDebugSettings {
    fn default() -> Self {
        Self {
            complete: false,
            property: default_property(),
            max_depth: Self::default_max_depth(),
            max_string_len: Self::default_max_string_len(),
            max_array_len: Self::default_max_array_len(),
            to_log: true,
            to_status: false,
        }
    }
}

// ==================== Save File ====================

/// Settings for Save File
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveFileSettings {
    /// Directory every file is written under
    #[serde(default = "SaveFileSettings::default_directory")]
    pub directory: PathBuf,

    /// File name relative to `directory`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Let `msg.filename` override `filename`
    #[serde(default = "default_true")]
    pub allow_msg_filename: bool,

    /// Property holding the content
    #[serde(default = "default_property")]
    pub property: String,

    #[serde(default = "default_true")]
    pub create_dirs: bool,

    #[serde(default = "default_true")]
    pub overwrite: bool,
}

impl SaveFileSettings {
    fn default_directory() -> PathBuf {
        PathBuf::from(".")
    }

    pub fn normalize(&mut self) -> Vec<String> {
        let mut notes = Vec::new();
        check_path(&mut self.property, "property", &mut notes);
        if self.filename.is_none() && !self.allow_msg_filename {
            notes.push("no filename configured and msg.filename is disabled".to_string());
        }
        notes
    }
}

impl Default for SaveFileSettings {
    fn default() -> Self {
        Self {
            directory: Self::default_directory(),
            filename: None,
            allow_msg_filename: true,
            property: default_property(),
            create_dirs: true,
            overwrite: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_normalize() {
        let mut settings = CollectorSettings {
            expected_count: 0,
            timeout_ms: 10,
            output_path: "a..b".to_string(),
            ..Default::default()
        };
        let notes = settings.normalize();
        assert_eq!(notes.len(), 3);
        assert_eq!(settings.expected_count, 1);
        assert_eq!(settings.timeout_ms, MIN_COLLECT_TIMEOUT_MS);
        assert_eq!(settings.output_path, "payload");

        let mut ok = CollectorSettings::default();
        assert!(ok.normalize().is_empty());
        assert_eq!(ok.timeout_ms, 5000);
    }

    #[test]
    fn test_collector_expected_count_upper_bound() {
        let mut settings = CollectorSettings {
            expected_count: 1_000_000_000_000,
            ..Default::default()
        };
        let notes = settings.normalize();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].starts_with("expected_count must be at most"));
        assert_eq!(settings.expected_count, MAX_EXPECTED_COUNT);

        let mut at_limit = CollectorSettings {
            expected_count: MAX_EXPECTED_COUNT,
            ..Default::default()
        };
        assert!(at_limit.normalize().is_empty());
    }

    #[test]
    fn test_queue_mode_gating() {
        let legacy = QueueSettings {
            mode: None,
            max_entries: 3,
            max_age_ms: 100,
            min_interval_ms: 0,
        };
        assert_eq!(legacy.effective_capacity(), 3);
        assert_eq!(legacy.effective_max_age_ms(), 100);

        let capacity = QueueSettings {
            mode: Some(QueueMode::Capacity),
            ..legacy.clone()
        };
        assert_eq!(capacity.effective_capacity(), 3);
        assert_eq!(capacity.effective_max_age_ms(), 0);

        let age = QueueSettings {
            mode: Some(QueueMode::Age),
            ..legacy.clone()
        };
        assert_eq!(age.effective_capacity(), 0);
        assert_eq!(age.effective_max_age_ms(), 100);

        let both = QueueSettings {
            mode: Some(QueueMode::Both),
            ..legacy
        };
        assert_eq!(both.effective_capacity(), 3);
        assert_eq!(both.effective_max_age_ms(), 100);
    }

    #[test]
    fn test_select_normalize_reports_bad_selection() {
        let mut settings = SelectSettings {
            selection: "1:2:0".to_string(),
            ..Default::default()
        };
        assert_eq!(settings.normalize().len(), 1);
    }
}
