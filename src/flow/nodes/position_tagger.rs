//! PositionTagger node — attaches a position and a value to each message.
//!
//! The position comes from a literal or a lookup (message, flow or global
//! scope); the value is read from a property path. The result travels in
//! the message's `_tag` field, where the Ordered Collector picks it up.

use crate::config::TaggerSettings;
use crate::flow::context::ValueSource;
use crate::flow::error::{NodeError, NodeResult};
use crate::flow::message::{Message, PAYLOAD};
use crate::flow::node::NodeContext;
use crate::flow::path::PropertyPath;
use crate::flow::port::{PortDescriptor, PortKind, PRIMARY};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message field carrying the `TaggedItem`.
pub const TAG_FIELD: &str = "_tag";

static PORTS: &[PortDescriptor] = &[
    PortDescriptor::input("in"),
    PortDescriptor::output("out", PortKind::Message),
];

/// A value together with its position in the collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedItem {
    pub position: u64,
    pub value: Value,
}

impl TaggedItem {
    pub fn new(position: u64, value: Value) -> Self {
        Self { position, value }
    }

    /// Store this item in `msg`.
    pub fn attach(&self, msg: &mut Message) {
        msg.insert(
            TAG_FIELD.to_string(),
            serde_json::json!({ "position": self.position, "value": self.value }),
        );
    }

    /// Read the item a tagger attached to `msg`.
    pub fn from_message(msg: &Message) -> Option<Self> {
        serde_json::from_value(msg.get(TAG_FIELD)?.clone()).ok()
    }
}

/// Interpret a resolved value as a position.
///
/// Accepts non-negative integers, integral floats and strings holding either.
pub fn parse_position(value: &Value) -> NodeResult<u64> {
    let invalid = || NodeError::InvalidPosition {
        value: value.to_string(),
    };
    match value {
        Value::Number(n) => {
            if let Some(p) = n.as_u64() {
                return Ok(p);
            }
            match n.as_f64() {
                Some(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => {
                    Ok(f as u64)
                }
                _ => Err(invalid()),
            }
        }
        Value::String(s) => s.trim().parse::<u64>().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

pub struct PositionTaggerNode {
    property: PropertyPath,
    position: String,
    position_source: ValueSource,
    notes: Vec<String>,
}

impl PositionTaggerNode {
    pub fn new(settings: &TaggerSettings) -> Self {
        let mut settings = settings.clone();
        let notes = settings.normalize();
        Self {
            property: PropertyPath::parse(&settings.property).unwrap_or_else(|_| PropertyPath::payload()),
            position: settings.position.trim().to_string(),
            position_source: settings.position_source,
            notes,
        }
    }

    pub fn name(&self) -> &str {
        "PositionTagger"
    }

    pub fn ports(&self) -> &[PortDescriptor] {
        PORTS
    }

    pub fn on_start(&mut self, ctx: &mut NodeContext) {
        for note in self.notes.drain(..) {
            ctx.log_once(format!("invalid configuration: {note}"));
        }
    }

    pub fn on_message(&mut self, mut msg: Message, ctx: &mut NodeContext) {
        match self.tag(&mut msg, ctx) {
            Ok(item) => {
                tracing::trace!(node = %ctx.label(), position = item.position, "tagged");
                item.attach(&mut msg);
                ctx.emit(PRIMARY, msg);
            }
            Err(e) => ctx.warn(format!("dropping message: {e}")),
        }
    }

    /// Resolve the position and extract the value. On error `msg` is untouched.
    fn tag(&self, msg: &mut Message, ctx: &mut NodeContext) -> NodeResult<TaggedItem> {
        let position = self.resolve_position(msg, ctx)?;

        let value = match self.property.get(msg) {
            Some(value) => value.clone(),
            None => {
                ctx.warn(format!("property '{}' not found; tagging null", self.property));
                Value::Null
            }
        };

        if self.property.is_payload() {
            msg.insert(PAYLOAD.to_string(), value.clone());
        }

        Ok(TaggedItem::new(position, value))
    }

    fn resolve_position(&self, msg: &Message, ctx: &NodeContext) -> NodeResult<u64> {
        if self.position.is_empty() {
            return Ok(0);
        }
        if self.position_source == ValueSource::Literal {
            return parse_position(&Value::String(self.position.clone()));
        }
        match ctx.resolve(self.position_source, &self.position, msg)? {
            Some(value) => parse_position(&value),
            None => Err(NodeError::lookup(&self.position, "no value at this path")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_position() {
        assert_eq!(parse_position(&json!(3)).unwrap(), 3);
        assert_eq!(parse_position(&json!(2.0)).unwrap(), 2);
        assert_eq!(parse_position(&json!(" 7 ")).unwrap(), 7);
        assert!(parse_position(&json!(-1)).is_err());
        assert!(parse_position(&json!(1.5)).is_err());
        assert!(parse_position(&json!("-2")).is_err());
        assert!(parse_position(&json!("two")).is_err());
        assert!(parse_position(&json!(null)).is_err());
        assert!(parse_position(&json!([1])).is_err());
    }

    #[test]
    fn test_tag_round_trips_through_message() {
        let mut msg = Message::new();
        TaggedItem::new(4, json!({"a": 1})).attach(&mut msg);
        assert_eq!(
            TaggedItem::from_message(&msg),
            Some(TaggedItem::new(4, json!({"a": 1})))
        );
        assert_eq!(TaggedItem::from_message(&Message::new()), None);
    }
}
