//! RateQueue node — FIFO buffer with a minimum gap between emissions.
//!
//! Optional bounds:
//! - `max_entries`: a message arriving at a full queue is dropped (the queue
//!   itself is left alone) and routed to output 1 with `reason = "overflow"`.
//! - `max_age_ms`: messages that waited too long are pruned from the front
//!   and routed to output 1 with `reason = "timeout"`.
//!
//! Pruning runs before every enqueue and every emission pass. Because entries
//! are appended in time order, the expired ones are always at the front.

use crate::config::QueueSettings;
use crate::flow::bridge::NodeStatus;
use crate::flow::id::TimerHandle;
use crate::flow::message::{millis, Message};
use crate::flow::node::NodeContext;
use crate::flow::port::{PortDescriptor, PortKind, PRIMARY, SECONDARY};
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;

static PORTS: &[PortDescriptor] = &[
    PortDescriptor::input("in"),
    PortDescriptor::output("out", PortKind::Message),
    PortDescriptor::output("dropped", PortKind::Diagnostic),
];

/// Why a message left through the drop output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Overflow,
    Timeout,
}

impl DropReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DropReason::Overflow => "overflow",
            DropReason::Timeout => "timeout",
        }
    }
}

/// Observable queue state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// Empty, no timer armed.
    Idle,
    /// Holding messages until the next emission slot.
    Holding,
}

/// Counters for the lifetime of the node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub enqueued: u64,
    pub emitted: u64,
    pub dropped_overflow: u64,
    pub dropped_timeout: u64,
}

#[derive(Debug)]
struct QueueEntry {
    msg: Message,
    enqueued_at: Duration,
}

pub struct RateQueueNode {
    entries: VecDeque<QueueEntry>,
    last_emitted_at: Option<Duration>,
    pending_timer: Option<TimerHandle>,
    /// 0 = unbounded
    capacity: usize,
    /// Zero = no rate limit
    min_interval: Duration,
    /// Zero = messages never expire
    max_age: Duration,
    stats: QueueStats,
    notes: Vec<String>,
}

impl RateQueueNode {
    pub fn new(settings: &QueueSettings) -> Self {
        let mut settings = settings.clone();
        let notes = settings.normalize();
        Self {
            entries: VecDeque::new(),
            last_emitted_at: None,
            pending_timer: None,
            capacity: settings.effective_capacity() as usize,
            min_interval: Duration::from_millis(settings.min_interval_ms),
            max_age: Duration::from_millis(settings.effective_max_age_ms()),
            stats: QueueStats::default(),
            notes,
        }
    }

    pub fn name(&self) -> &str {
        "RateQueue"
    }

    pub fn ports(&self) -> &[PortDescriptor] {
        PORTS
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn state(&self) -> QueueState {
        if self.entries.is_empty() && self.pending_timer.is_none() {
            QueueState::Idle
        } else {
            QueueState::Holding
        }
    }

    pub fn stats(&self) -> QueueStats {
        self.stats
    }

    pub fn on_start(&mut self, ctx: &mut NodeContext) {
        for note in self.notes.drain(..) {
            ctx.log_once(format!("invalid configuration: {note}"));
        }
    }

    pub fn on_message(&mut self, msg: Message, ctx: &mut NodeContext) {
        self.enqueue(msg, ctx);
    }

    pub fn enqueue(&mut self, mut msg: Message, ctx: &mut NodeContext) {
        self.prune_expired(ctx);

        if self.capacity > 0 && self.entries.len() >= self.capacity {
            self.stats.dropped_overflow += 1;
            mark_dropped(&mut msg, DropReason::Overflow);
            msg.insert("queueSizeAtDrop".to_string(), Value::from(self.entries.len() as u64));
            msg.insert("configuredCapacity".to_string(), Value::from(self.capacity as u64));
            tracing::debug!(node = %ctx.label(), size = self.entries.len(), "queue full, dropping incoming message");
            ctx.set_status(NodeStatus::warn(format!("full ({})", self.capacity)));
            ctx.emit(SECONDARY, msg);
            return;
        }

        self.entries.push_back(QueueEntry {
            msg,
            enqueued_at: ctx.now(),
        });
        self.stats.enqueued += 1;
        self.pump(ctx);
    }

    pub fn on_timer(&mut self, handle: TimerHandle, ctx: &mut NodeContext) {
        if self.pending_timer != Some(handle) {
            tracing::trace!(node = %ctx.label(), ?handle, "stale queue timer");
            return;
        }
        self.pending_timer = None;
        self.pump(ctx);
    }

    /// Drop everything without emitting.
    pub fn on_close(&mut self, ctx: &mut NodeContext) {
        if let Some(handle) = self.pending_timer.take() {
            ctx.cancel(handle);
        }
        if !self.entries.is_empty() {
            tracing::debug!(node = %ctx.label(), discarded = self.entries.len(), "discarding queued messages on close");
        }
        self.entries.clear();
    }

    /// Emit as many entries as the interval allows, then schedule the next pass.
    fn pump(&mut self, ctx: &mut NodeContext) {
        loop {
            self.prune_expired(ctx);

            if self.entries.is_empty() {
                if let Some(handle) = self.pending_timer.take() {
                    ctx.cancel(handle);
                }
                ctx.set_status(NodeStatus::info("idle"));
                return;
            }

            if let Some(wait) = self.time_until_next_slot(ctx.now()) {
                ctx.rearm(&mut self.pending_timer, wait);
                ctx.set_status(NodeStatus::info(format!("queued {}", self.entries.len())));
                return;
            }

            let Some(entry) = self.entries.pop_front() else {
                return;
            };
            self.last_emitted_at = Some(ctx.now());
            self.stats.emitted += 1;
            ctx.emit(PRIMARY, entry.msg);
        }
    }

    /// `None` when an emission is allowed right now.
    fn time_until_next_slot(&self, now: Duration) -> Option<Duration> {
        if self.min_interval.is_zero() {
            return None;
        }
        let last = self.last_emitted_at?;
        let elapsed = now.saturating_sub(last);
        if elapsed < self.min_interval {
            Some(self.min_interval - elapsed)
        } else {
            None
        }
    }

    fn prune_expired(&mut self, ctx: &mut NodeContext) {
        if self.max_age.is_zero() {
            return;
        }

        let now = ctx.now();
        let mut pruned = 0usize;
        while let Some(front) = self.entries.front() {
            let waited = now.saturating_sub(front.enqueued_at);
            if waited <= self.max_age {
                break;
            }
            let Some(entry) = self.entries.pop_front() else {
                break;
            };
            let mut msg = entry.msg;
            mark_dropped(&mut msg, DropReason::Timeout);
            msg.insert("queuedDuration".to_string(), millis(waited));
            msg.insert("configuredTimeout".to_string(), millis(self.max_age));
            ctx.emit(SECONDARY, msg);
            pruned += 1;
        }

        if pruned > 0 {
            self.stats.dropped_timeout += pruned as u64;
            ctx.warn(format!(
                "dropped {pruned} message(s) that waited longer than {}ms",
                self.max_age.as_millis()
            ));
        }
    }
}

fn mark_dropped(msg: &mut Message, reason: DropReason) {
    msg.insert("dropped".to_string(), Value::Bool(true));
    msg.insert("reason".to_string(), Value::String(reason.as_str().to_string()));
}
