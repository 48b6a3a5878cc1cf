//! CleanDebug node — sanitises a value and publishes it on the debug channel.
//!
//! Long strings and arrays are truncated, deep nesting is summarised and
//! underscore-prefixed (internal) keys are hidden. Nothing is emitted on any
//! output.

use crate::config::CleanDebugSettings;
use crate::flow::bridge::NodeStatus;
use crate::flow::message::Message;
use crate::flow::node::NodeContext;
use crate::flow::path::PropertyPath;
use crate::flow::port::PortDescriptor;
use serde_json::{Map, Value};

static PORTS: &[PortDescriptor] = &[PortDescriptor::input("in")];

/// Status previews are cut to this many characters.
const STATUS_PREVIEW_LEN: usize = 32;

/// Bounds applied by [`sanitize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SanitizeLimits {
    pub max_depth: usize,
    pub max_string_len: usize,
    pub max_array_len: usize,
}

impl Default for SanitizeLimits {
    fn default() -> Self {
        Self {
            max_depth: 5,
            max_string_len: 1000,
            max_array_len: 100,
        }
    }
}

/// Produce a display-safe copy of `value`.
pub fn sanitize(value: &Value, limits: &SanitizeLimits) -> Value {
    sanitize_at(value, limits, 0)
}

fn sanitize_at(value: &Value, limits: &SanitizeLimits, depth: usize) -> Value {
    match value {
        Value::String(s) => Value::String(truncate(s, limits.max_string_len)),
        Value::Array(_) if depth >= limits.max_depth => Value::String("[Array]".to_string()),
        Value::Object(_) if depth >= limits.max_depth => Value::String("[Object]".to_string()),
        Value::Array(items) => {
            let mut out: Vec<Value> = items
                .iter()
                .take(limits.max_array_len)
                .map(|v| sanitize_at(v, limits, depth + 1))
                .collect();
            if items.len() > limits.max_array_len {
                out.push(Value::String(format!(
                    "... {} more items",
                    items.len() - limits.max_array_len
                )));
            }
            Value::Array(out)
        }
        Value::Object(map) => {
            let out: Map<String, Value> = map
                .iter()
                .filter(|(k, _)| !k.starts_with('_'))
                .map(|(k, v)| (k.clone(), sanitize_at(v, limits, depth + 1)))
                .collect();
            Value::Object(out)
        }
        other => other.clone(),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &s[..cut]),
        None => s.to_string(),
    }
}

pub struct CleanDebugNode {
    /// `None` shows the whole message.
    property: Option<PropertyPath>,
    limits: SanitizeLimits,
    to_log: bool,
    to_status: bool,
    notes: Vec<String>,
}

impl CleanDebugNode {
    pub fn new(settings: &CleanDebugSettings) -> Self {
        let mut settings = settings.clone();
        let notes = settings.normalize();
        let property = if settings.complete {
            None
        } else {
            Some(PropertyPath::parse(&settings.property).unwrap_or_else(|_| PropertyPath::payload()))
        };
        Self {
            property,
            limits: SanitizeLimits {
                max_depth: settings.max_depth,
                max_string_len: settings.max_string_len,
                max_array_len: settings.max_array_len,
            },
            to_log: settings.to_log,
            to_status: settings.to_status,
            notes,
        }
    }

    pub fn name(&self) -> &str {
        "CleanDebug"
    }

    pub fn ports(&self) -> &[PortDescriptor] {
        PORTS
    }

    pub fn on_start(&mut self, ctx: &mut NodeContext) {
        for note in self.notes.drain(..) {
            ctx.log_once(format!("invalid configuration: {note}"));
        }
    }

    pub fn on_message(&mut self, msg: Message, ctx: &mut NodeContext) {
        let clean = match &self.property {
            None => sanitize(&Value::Object(msg), &self.limits),
            Some(path) => match path.get(&msg) {
                Some(value) => sanitize(value, &self.limits),
                None => {
                    ctx.log_once(format!("property '{path}' not found; showing null"));
                    Value::Null
                }
            },
        };

        if self.to_log {
            tracing::info!(node = %ctx.label(), "{}", clean);
        }
        if self.to_status {
            ctx.set_status(NodeStatus::info(truncate(&clean.to_string(), STATUS_PREVIEW_LEN)));
        }
        ctx.debug(clean);
    }
}
