//! Messages exchanged between nodes.
//!
//! A `Message` is a JSON object. `payload` is the primary field most nodes
//! read from and write to; everything else is metadata that travels along.
//! `Value::Null` is the null-equivalent used for missing values.

use serde_json::{Map, Value};
use std::time::Duration;

/// A message flowing between nodes.
pub type Message = Map<String, Value>;

/// Name of the primary message field.
pub const PAYLOAD: &str = "payload";

/// Build a message carrying `payload`.
pub fn message(payload: Value) -> Message {
    let mut msg = Message::new();
    msg.insert(PAYLOAD.to_string(), payload);
    msg
}

/// Turn an arbitrary JSON value into a message.
///
/// Objects are taken as the message itself; anything else becomes the payload.
pub fn into_message(value: Value) -> Message {
    match value {
        Value::Object(map) => map,
        other => message(other),
    }
}

/// Milliseconds as a JSON number.
pub fn millis(duration: Duration) -> Value {
    Value::from(duration.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_into_message() {
        let msg = into_message(json!({"payload": 1, "topic": "t"}));
        assert_eq!(msg.get("topic"), Some(&json!("t")));

        let msg = into_message(json!([1, 2]));
        assert_eq!(msg.get(PAYLOAD), Some(&json!([1, 2])));
        assert_eq!(msg.len(), 1);
    }

    #[test]
    fn test_millis() {
        assert_eq!(millis(Duration::from_millis(1500)), json!(1500));
    }
}
