//! ArraySelect node — picks elements out of an array with a slice-like selection.
//!
//! Selections are comma-separated items, each an index (`2`, `-1`) or a slice
//! (`1:4`, `::2`, `-3:`, `::-1`) with the usual half-open, negative-from-end
//! semantics.

use crate::config::SelectSettings;
use crate::flow::error::NodeError;
use crate::flow::message::Message;
use crate::flow::node::NodeContext;
use crate::flow::path::PropertyPath;
use crate::flow::port::{PortDescriptor, PortKind, PRIMARY};
use serde_json::Value;
use std::str::FromStr;

static PORTS: &[PortDescriptor] = &[
    PortDescriptor::input("in"),
    PortDescriptor::output("out", PortKind::Message),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SelectItem {
    Index(i64),
    Slice {
        start: Option<i64>,
        end: Option<i64>,
        step: i64,
    },
}

/// A parsed selection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    items: Vec<SelectItem>,
}

impl Selection {
    /// Whether the selection is exactly one plain index (yields a single element).
    pub fn is_single_index(&self) -> bool {
        matches!(self.items.as_slice(), [SelectItem::Index(_)])
    }

    /// Indices selected from an array of length `len`, in selection order.
    pub fn indices(&self, len: usize) -> Vec<usize> {
        let len = len as i64;
        let mut out = Vec::new();
        for item in &self.items {
            match *item {
                SelectItem::Index(i) => {
                    let i = if i < 0 { i + len } else { i };
                    if (0..len).contains(&i) {
                        out.push(i as usize);
                    }
                }
                SelectItem::Slice { start, end, step } => slice_indices(len, start, end, step, &mut out),
            }
        }
        out
    }

    /// Apply the selection to `items`.
    ///
    /// A single plain index yields the element itself (or null); anything else
    /// yields an array.
    pub fn apply(&self, items: &[Value]) -> Value {
        let picked = self.indices(items.len());
        if self.is_single_index() {
            return picked
                .first()
                .and_then(|&i| items.get(i))
                .cloned()
                .unwrap_or(Value::Null);
        }
        Value::Array(picked.into_iter().filter_map(|i| items.get(i).cloned()).collect())
    }
}

fn slice_indices(len: i64, start: Option<i64>, end: Option<i64>, step: i64, out: &mut Vec<usize>) {
    if step > 0 {
        let clamp = |v: Option<i64>, default: i64| match v {
            None => default,
            Some(i) if i < 0 => (i + len).max(0),
            Some(i) => i.min(len),
        };
        let mut i = clamp(start, 0);
        let stop = clamp(end, len);
        while i < stop {
            out.push(i as usize);
            match i.checked_add(step) {
                Some(next) => i = next,
                None => break,
            }
        }
    } else {
        let clamp = |v: Option<i64>, default: i64| match v {
            None => default,
            Some(i) if i < 0 => (i + len).max(-1),
            Some(i) => i.min(len - 1),
        };
        let mut i = clamp(start, len - 1);
        let stop = clamp(end, -1);
        while i > stop {
            out.push(i as usize);
            match i.checked_add(step) {
                Some(next) => i = next,
                None => break,
            }
        }
    }
}

impl FromStr for Selection {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| NodeError::InvalidConfiguration(format!("selection '{s}': {reason}"));

        if s.trim().is_empty() {
            return Err(invalid("empty selection"));
        }

        let mut items = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(invalid("empty item"));
            }

            if !part.contains(':') {
                let index = part.parse::<i64>().map_err(|_| invalid("index is not an integer"))?;
                items.push(SelectItem::Index(index));
                continue;
            }

            let bounds: Vec<&str> = part.split(':').map(str::trim).collect();
            if bounds.len() > 3 {
                return Err(invalid("too many ':' in slice"));
            }
            let bound = |i: usize| -> Result<Option<i64>, NodeError> {
                match bounds.get(i) {
                    None | Some(&"") => Ok(None),
                    Some(b) => b.parse::<i64>().map(Some).map_err(|_| invalid("slice bound is not an integer")),
                }
            };
            let step = bound(2)?.unwrap_or(1);
            if step == 0 {
                return Err(invalid("slice step cannot be zero"));
            }
            items.push(SelectItem::Slice {
                start: bound(0)?,
                end: bound(1)?,
                step,
            });
        }

        Ok(Self { items })
    }
}

pub struct ArraySelectNode {
    property: PropertyPath,
    selection: Option<Selection>,
    notes: Vec<String>,
}

impl ArraySelectNode {
    pub fn new(settings: &SelectSettings) -> Self {
        let mut settings = settings.clone();
        let notes = settings.normalize();
        Self {
            property: PropertyPath::parse(&settings.property).unwrap_or_else(|_| PropertyPath::payload()),
            selection: settings.selection.parse().ok(),
            notes,
        }
    }

    pub fn name(&self) -> &str {
        "ArraySelect"
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
        let Some(selection) = &self.selection else {
            ctx.warn("dropping message: no valid selection configured");
            return;
        };

        let selected = match self.property.get(&msg) {
            Some(Value::Array(items)) => {
                if selection.is_single_index() && selection.indices(items.len()).is_empty() {
                    ctx.warn(format!("index out of range for array of length {}", items.len()));
                }
                selection.apply(items)
            }
            _ => {
                ctx.warn(NodeError::NotAnArray(self.property.to_string()).to_string());
                return;
            }
        };

        if let Err(e) = self.property.set(&mut msg, selected) {
            ctx.warn(format!("dropping message: {e}"));
            return;
        }
        ctx.emit(PRIMARY, msg);
    }
}
