//! OrderedCollector node — gathers tagged values into a dense, ordered sequence.
//!
//! One collection cycle at a time. The first tagged message of a cycle arms
//! the deadline; the cycle ends either when every position `0..expected_count`
//! has a value (success on output 0) or when the deadline passes (partial
//! sequence plus diagnostics on output 1). Items that arrive after a cycle
//! ended start a fresh one. A complete sequence that cannot be written to
//! its output path also leaves on output 1, carrying `sequence` and `error`.

use crate::config::CollectorSettings;
use crate::flow::bridge::NodeStatus;
use crate::flow::context::Scope;
use crate::flow::error::NodeError;
use crate::flow::id::TimerHandle;
use crate::flow::message::{Message, PAYLOAD};
use crate::flow::node::NodeContext;
use crate::flow::nodes::position_tagger::{TaggedItem, TAG_FIELD};
use crate::flow::path::PropertyPath;
use crate::flow::port::{PortDescriptor, PortKind, PRIMARY, SECONDARY};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

static PORTS: &[PortDescriptor] = &[
    PortDescriptor::input("in"),
    PortDescriptor::output("complete", PortKind::Message),
    PortDescriptor::output("timeout", PortKind::Diagnostic),
];

/// Observable collector state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    Idle,
    Collecting,
}

/// Payload of a timeout emission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutReport {
    pub sequence: Vec<Value>,
    pub missing_positions: Vec<u64>,
    pub collected_positions: Vec<u64>,
    pub expected_count: u64,
    pub collected_count: u64,
    /// Milliseconds since the cycle started.
    pub elapsed: u64,
}

/// Counters for the lifetime of the node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectorStats {
    pub completed: u64,
    pub timed_out: u64,
    pub rejected: u64,
    /// Complete cycles whose sequence could not be written to `output_path`.
    pub failed: u64,
}

struct CollectionCycle {
    slots: BTreeMap<u64, Value>,
    started_at: Duration,
    deadline: TimerHandle,
    /// Most recent message of the cycle; the emitted message is built from it.
    last_msg: Message,
}

pub struct OrderedCollectorNode {
    expected_count: u64,
    timeout: Duration,
    output_path: PropertyPath,
    output_scope: Scope,
    strict: bool,
    cycle: Option<CollectionCycle>,
    stats: CollectorStats,
    notes: Vec<String>,
}

impl OrderedCollectorNode {
    pub fn new(settings: &CollectorSettings) -> Self {
        let mut settings = settings.clone();
        let notes = settings.normalize();
        Self {
            expected_count: settings.expected_count as u64,
            timeout: Duration::from_millis(settings.timeout_ms),
            output_path: PropertyPath::parse(&settings.output_path)
                .unwrap_or_else(|_| PropertyPath::payload()),
            output_scope: settings.output_scope,
            strict: settings.strict,
            cycle: None,
            stats: CollectorStats::default(),
            notes,
        }
    }

    pub fn name(&self) -> &str {
        "OrderedCollector"
    }

    pub fn ports(&self) -> &[PortDescriptor] {
        PORTS
    }

    pub fn state(&self) -> CollectorState {
        if self.cycle.is_some() {
            CollectorState::Collecting
        } else {
            CollectorState::Idle
        }
    }

    pub fn expected_count(&self) -> u64 {
        self.expected_count
    }

    pub fn stats(&self) -> CollectorStats {
        self.stats
    }

    pub fn on_start(&mut self, ctx: &mut NodeContext) {
        for note in self.notes.drain(..) {
            ctx.log_once(format!("invalid configuration: {note}"));
        }
    }

    pub fn on_message(&mut self, msg: Message, ctx: &mut NodeContext) {
        match TaggedItem::from_message(&msg) {
            Some(item) => self.submit(item, msg, ctx),
            None => ctx.warn(format!("ignoring message without a '{TAG_FIELD}' position tag")),
        }
    }

    /// Add one tagged value to the current cycle, starting one if idle.
    pub fn submit(&mut self, item: TaggedItem, msg: Message, ctx: &mut NodeContext) {
        if item.position >= self.expected_count {
            self.stats.rejected += 1;
            ctx.warn(
                NodeError::OutOfRangePosition {
                    position: item.position,
                    expected: self.expected_count,
                }
                .to_string(),
            );
            return;
        }

        if self.strict
            && self
                .cycle
                .as_ref()
                .is_some_and(|c| c.slots.contains_key(&item.position))
        {
            self.stats.rejected += 1;
            ctx.warn(NodeError::DuplicatePosition(item.position).to_string());
            return;
        }

        if self.cycle.is_none() {
            let deadline = ctx.schedule(self.timeout);
            tracing::debug!(node = %ctx.label(), ?deadline, "collection cycle started");
            self.cycle = Some(CollectionCycle {
                slots: BTreeMap::new(),
                started_at: ctx.now(),
                deadline,
                last_msg: Message::new(),
            });
        }
        let Some(cycle) = self.cycle.as_mut() else {
            return;
        };

        cycle.slots.insert(item.position, item.value);
        cycle.last_msg = msg;
        let filled = cycle.slots.len() as u64;

        if filled < self.expected_count {
            ctx.set_status(NodeStatus::info(format!("{filled}/{}", self.expected_count)));
            return;
        }

        if let Some(cycle) = self.cycle.take() {
            ctx.cancel(cycle.deadline);
            self.complete(cycle, ctx);
        }
    }

    pub fn on_timer(&mut self, handle: TimerHandle, ctx: &mut NodeContext) {
        if self.cycle.as_ref().map(|c| c.deadline) != Some(handle) {
            tracing::trace!(node = %ctx.label(), ?handle, "stale collector timer");
            return;
        }
        if let Some(cycle) = self.cycle.take() {
            self.expire(cycle, ctx);
        }
    }

    /// Discard the in-flight cycle without emitting anything.
    pub fn on_close(&mut self, ctx: &mut NodeContext) {
        if let Some(cycle) = self.cycle.take() {
            ctx.cancel(cycle.deadline);
            tracing::debug!(
                node = %ctx.label(),
                collected = cycle.slots.len(),
                "discarding in-flight collection on close"
            );
        }
    }

    fn complete(&mut self, cycle: CollectionCycle, ctx: &mut NodeContext) {
        let sequence = Value::Array(dense_sequence(&cycle.slots, self.expected_count));
        let mut msg = cycle.last_msg;
        msg.remove(TAG_FIELD);

        // Store into a copy so a failed write leaves the message as it was.
        let mut out = msg.clone();
        if let Err(e) = ctx.store(self.output_scope, &self.output_path, sequence.clone(), &mut out) {
            let text = format!("could not store collected sequence: {e}");
            self.stats.failed += 1;
            ctx.warn(text.clone());
            ctx.set_status(NodeStatus::warn("store failed"));
            msg.insert("sequence".to_string(), sequence);
            msg.insert("error".to_string(), Value::String(text));
            ctx.emit(SECONDARY, msg);
            return;
        }
        let msg = out;

        self.stats.completed += 1;
        tracing::debug!(
            node = %ctx.label(),
            count = self.expected_count,
            elapsed_ms = ctx.now().saturating_sub(cycle.started_at).as_millis() as u64,
            "collection complete"
        );
        ctx.set_status(NodeStatus::info("complete"));
        ctx.emit(PRIMARY, msg);
    }

    fn expire(&mut self, cycle: CollectionCycle, ctx: &mut NodeContext) {
        let collected_positions: Vec<u64> = cycle.slots.keys().copied().collect();
        let missing_positions: Vec<u64> = (0..self.expected_count)
            .filter(|p| !cycle.slots.contains_key(p))
            .collect();
        let elapsed = ctx.now().saturating_sub(cycle.started_at);

        let report = TimeoutReport {
            sequence: dense_sequence(&cycle.slots, self.expected_count),
            collected_count: collected_positions.len() as u64,
            missing_positions,
            collected_positions,
            expected_count: self.expected_count,
            elapsed: elapsed.as_millis() as u64,
        };

        let mut msg = cycle.last_msg;
        msg.remove(TAG_FIELD);
        let text = format!(
            "collection timed out after {}ms with {} of {} positions",
            report.elapsed, report.collected_count, report.expected_count
        );
        match serde_json::to_value(&report) {
            Ok(payload) => {
                msg.insert(PAYLOAD.to_string(), payload);
            }
            Err(e) => {
                ctx.warn(format!("could not encode timeout report: {e}"));
                return;
            }
        }
        msg.insert("error".to_string(), Value::String(text.clone()));

        self.stats.timed_out += 1;
        ctx.warn(text);
        ctx.set_status(NodeStatus::warn(format!(
            "timeout {}/{}",
            report.collected_count, report.expected_count
        )));
        ctx.emit(SECONDARY, msg);
    }
}

/// `[slots[0], ..., slots[n-1]]` with null at every unfilled position.
pub fn dense_sequence(slots: &BTreeMap<u64, Value>, n: u64) -> Vec<Value> {
    (0..n)
        .map(|p| slots.get(&p).cloned().unwrap_or(Value::Null))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dense_sequence_fills_gaps() {
        let mut slots = BTreeMap::new();
        slots.insert(0, json!("a"));
        slots.insert(2, json!("c"));
        assert_eq!(dense_sequence(&slots, 4), vec![json!("a"), json!(null), json!("c"), json!(null)]);
        assert!(dense_sequence(&BTreeMap::new(), 0).is_empty());
    }

    #[test]
    fn test_invalid_expected_count_is_corrected() {
        let node = OrderedCollectorNode::new(&CollectorSettings {
            expected_count: -3,
            ..Default::default()
        });
        assert_eq!(node.expected_count(), 1);
        assert_eq!(node.state(), CollectorState::Idle);
        assert_eq!(node.notes.len(), 1);
    }

    #[test]
    fn test_timeout_report_shape() {
        let report = TimeoutReport {
            sequence: vec![json!(1), json!(null)],
            missing_positions: vec![1],
            collected_positions: vec![0],
            expected_count: 2,
            collected_count: 1,
            elapsed: 1000,
        };
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({
                "sequence": [1, null],
                "missingPositions": [1],
                "collectedPositions": [0],
                "expectedCount": 2,
                "collectedCount": 1,
                "elapsed": 1000
            })
        );
    }
}
