//! Context stores and dynamic value resolution.
//!
//! Three scopes can be read from: the message itself, the flow-wide store
//! owned by each `Flow`, and the process-wide global store shared between
//! flows. Literals are a fourth source that never looks anything up.

use crate::flow::error::NodeResult;
use crate::flow::message::Message;
use crate::flow::path::PropertyPath;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::{Arc, RwLock};

/// Where a value is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Msg,
    Flow,
    Global,
}

/// Where a value is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSource {
    /// The expression itself is the value.
    #[default]
    Literal,
    Msg,
    Flow,
    Global,
}

/// Key/value store of JSON values, addressed by property path.
#[derive(Debug, Clone, Default)]
pub struct ContextStore {
    values: Map<String, Value>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &PropertyPath) -> Option<&Value> {
        path.get(&self.values)
    }

    pub fn set(&mut self, path: &PropertyPath, value: Value) -> NodeResult<()> {
        path.set(&mut self.values, value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// Process-wide store shared between flows.
pub type SharedStore = Arc<RwLock<ContextStore>>;

/// Create an empty shared store.
pub fn shared_store() -> SharedStore {
    Arc::new(RwLock::new(ContextStore::new()))
}

/// The flow and global stores as seen from inside a node.
pub struct Scopes<'a> {
    pub flow: &'a mut ContextStore,
    pub global: &'a SharedStore,
}

impl Scopes<'_> {
    /// Resolve `expr` against `source`.
    ///
    /// `Ok(None)` means the lookup succeeded but found nothing. Malformed
    /// paths are errors.
    pub fn resolve(&self, source: ValueSource, expr: &str, msg: &Message) -> NodeResult<Option<Value>> {
        if source == ValueSource::Literal {
            return Ok(Some(literal(expr)));
        }

        let path = PropertyPath::parse(expr)?;
        let value = match source {
            ValueSource::Msg => path.get(msg).cloned(),
            ValueSource::Flow => self.flow.get(&path).cloned(),
            ValueSource::Global => {
                let global = self.global.read().unwrap_or_else(|e| e.into_inner());
                global.get(&path).cloned()
            }
            ValueSource::Literal => None,
        };
        Ok(value)
    }

    /// Write `value` at `path` in `scope`.
    pub fn store(
        &mut self,
        scope: Scope,
        path: &PropertyPath,
        value: Value,
        msg: &mut Message,
    ) -> NodeResult<()> {
        match scope {
            Scope::Msg => path.set(msg, value),
            Scope::Flow => self.flow.set(path, value),
            Scope::Global => {
                let mut global = self.global.write().unwrap_or_else(|e| e.into_inner());
                global.set(path, value)
            }
        }
    }
}

/// Literal expressions are read as JSON when they parse as such, otherwise as text.
fn literal(expr: &str) -> Value {
    serde_json::from_str(expr).unwrap_or_else(|_| Value::String(expr.to_string()))
}
