//! Property paths into messages and context stores.
//!
//! Paths use the familiar dotted/bracket syntax: `payload.items[2].name`,
//! `payload["key with.dot"]`. The first segment is always a property name.

use crate::flow::error::{NodeError, NodeResult};
use crate::flow::message::PAYLOAD;
use serde_json::{Map, Value};
use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    fn empty_container(&self) -> Value {
        match self {
            Segment::Key(_) => Value::Object(Map::new()),
            Segment::Index(_) => Value::Array(Vec::new()),
        }
    }
}

/// A parsed property path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyPath {
    raw: String,
    segments: Vec<Segment>,
}

impl PropertyPath {
    /// Parse a path such as `payload.items[0]`.
    pub fn parse(input: &str) -> NodeResult<Self> {
        let raw = input.trim();
        let err = |reason: &str| NodeError::lookup(raw, reason);

        if raw.is_empty() {
            return Err(err("empty path"));
        }

        let mut segments = Vec::new();
        let mut current = String::new();
        let mut after_bracket = false;
        let mut chars = raw.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    if !current.is_empty() {
                        segments.push(Segment::Key(std::mem::take(&mut current)));
                    } else if !after_bracket {
                        return Err(err("empty segment"));
                    }
                    if chars.peek().is_none() {
                        return Err(err("trailing '.'"));
                    }
                    after_bracket = false;
                }
                '[' => {
                    if !current.is_empty() {
                        segments.push(Segment::Key(std::mem::take(&mut current)));
                    } else if !after_bracket {
                        return Err(err("expected a property name before '['"));
                    }
                    segments.push(parse_bracket(&mut chars).map_err(err)?);
                    after_bracket = true;
                }
                ']' => return Err(err("unexpected ']'")),
                _ => {
                    if after_bracket {
                        return Err(err("expected '.' or '[' after ']'"));
                    }
                    current.push(c);
                }
            }
        }

        if !current.is_empty() {
            segments.push(Segment::Key(current));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The default `payload` path.
    pub fn payload() -> Self {
        Self {
            raw: PAYLOAD.to_string(),
            segments: vec![Segment::Key(PAYLOAD.to_string())],
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether this path is exactly the primary `payload` field.
    pub fn is_payload(&self) -> bool {
        matches!(self.segments.as_slice(), [Segment::Key(k)] if k == PAYLOAD)
    }

    /// Read the value at this path.
    pub fn get<'a>(&self, root: &'a Map<String, Value>) -> Option<&'a Value> {
        let (first, rest) = self.segments.split_first()?;
        let mut current = match first {
            Segment::Key(key) => root.get(key)?,
            Segment::Index(_) => return None,
        };
        for segment in rest {
            current = match (segment, current) {
                (Segment::Key(key), Value::Object(map)) => map.get(key)?,
                (Segment::Index(i), Value::Array(items)) => items.get(*i)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Write `value` at this path, creating intermediate containers as needed.
    pub fn set(&self, root: &mut Map<String, Value>, value: Value) -> NodeResult<()> {
        let Some((Segment::Key(key), rest)) = self.segments.split_first() else {
            return Err(NodeError::lookup(&self.raw, "path must start with a name"));
        };

        if rest.is_empty() {
            root.insert(key.clone(), value);
            return Ok(());
        }

        let slot = root
            .entry(key.clone())
            .or_insert_with(|| rest[0].empty_container());
        set_in(slot, rest, value).map_err(|reason| NodeError::lookup(&self.raw, reason))
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for PropertyPath {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_bracket(chars: &mut Peekable<Chars<'_>>) -> Result<Segment, &'static str> {
    match chars.peek().copied() {
        Some(quote @ ('"' | '\'')) => {
            chars.next();
            let mut key = String::new();
            loop {
                match chars.next() {
                    Some(c) if c == quote => break,
                    Some(c) => key.push(c),
                    None => return Err("unterminated quoted key"),
                }
            }
            match chars.next() {
                Some(']') => Ok(Segment::Key(key)),
                _ => Err("expected ']' after quoted key"),
            }
        }
        Some(c) if c.is_ascii_digit() => {
            let mut digits = String::new();
            loop {
                match chars.next() {
                    Some(']') => break,
                    Some(d) if d.is_ascii_digit() => digits.push(d),
                    _ => return Err("invalid array index"),
                }
            }
            digits
                .parse::<usize>()
                .map(Segment::Index)
                .map_err(|_| "array index too large")
        }
        _ => Err("expected an index or quoted key after '['"),
    }
}

fn set_in(target: &mut Value, segments: &[Segment], value: Value) -> Result<(), &'static str> {
    let Some((segment, rest)) = segments.split_first() else {
        *target = value;
        return Ok(());
    };

    if target.is_null() {
        *target = segment.empty_container();
    }

    match (segment, target) {
        (Segment::Key(key), Value::Object(map)) => {
            if rest.is_empty() {
                map.insert(key.clone(), value);
                return Ok(());
            }
            let child = map
                .entry(key.clone())
                .or_insert_with(|| rest[0].empty_container());
            set_in(child, rest, value)
        }
        (Segment::Index(i), Value::Array(items)) => {
            if *i > items.len() {
                return Err("array index beyond the end");
            }
            if *i == items.len() {
                items.push(Value::Null);
            }
            set_in(&mut items[*i], rest, value)
        }
        _ => Err("cannot descend into a non-container value"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_parse_and_get() {
        let root = obj(json!({"payload": {"items": [10, {"name": "x"}]}, "a.b": 1}));

        let path = PropertyPath::parse("payload.items[1].name").unwrap();
        assert_eq!(path.get(&root), Some(&json!("x")));

        let path = PropertyPath::parse("payload.items[0]").unwrap();
        assert_eq!(path.get(&root), Some(&json!(10)));

        let path = PropertyPath::parse("payload[\"items\"][5]").unwrap();
        assert_eq!(path.get(&root), None);
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", "a..b", "a.", "[0]", "a[x]", "a[0", "a]", "a[0]b", "a.[0]"] {
            assert!(PropertyPath::parse(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn test_is_payload() {
        assert!(PropertyPath::parse(" payload ").unwrap().is_payload());
        assert!(PropertyPath::payload().is_payload());
        assert!(!PropertyPath::parse("payload.x").unwrap().is_payload());
        assert!(!PropertyPath::parse("topic").unwrap().is_payload());
    }

    #[test]
    fn test_set_creates_containers() {
        let mut root = Map::new();
        PropertyPath::parse("result.values[0].v")
            .unwrap()
            .set(&mut root, json!(3))
            .unwrap();
        assert_eq!(Value::Object(root), json!({"result": {"values": [{"v": 3}]}}));
    }

    #[test]
    fn test_set_rejects_gaps_and_scalars() {
        let mut root = obj(json!({"list": [1], "n": 5}));
        assert!(PropertyPath::parse("list[3]")
            .unwrap()
            .set(&mut root, json!(0))
            .is_err());
        assert!(PropertyPath::parse("n.x")
            .unwrap()
            .set(&mut root, json!(0))
            .is_err());

        PropertyPath::parse("list[1]")
            .unwrap()
            .set(&mut root, json!(2))
            .unwrap();
        assert_eq!(root.get("list"), Some(&json!([1, 2])));
    }
}
