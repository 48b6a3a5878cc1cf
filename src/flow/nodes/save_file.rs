//! SaveFile node — writes a message property to disk.
//!
//! Strings are written as UTF-8, arrays of byte values as raw bytes and
//! anything else as pretty-printed JSON. Target paths are always resolved
//! inside the configured directory.

use crate::config::SaveFileSettings;
use crate::flow::error::{NodeError, NodeResult};
use crate::flow::message::Message;
use crate::flow::node::NodeContext;
use crate::flow::path::PropertyPath;
use crate::flow::port::{PortDescriptor, PortKind, PRIMARY, SECONDARY};
use serde_json::Value;
use std::path::{Component, Path, PathBuf};

static PORTS: &[PortDescriptor] = &[
    PortDescriptor::input("in"),
    PortDescriptor::output("saved", PortKind::Message),
    PortDescriptor::output("failed", PortKind::Diagnostic),
];

/// Bytes to write for `value`.
pub fn encode(value: &Value) -> NodeResult<Vec<u8>> {
    match value {
        Value::String(s) => Ok(s.as_bytes().to_vec()),
        Value::Array(items) if !items.is_empty() => {
            let bytes: Option<Vec<u8>> = items
                .iter()
                .map(|v| v.as_u64().and_then(|b| u8::try_from(b).ok()))
                .collect();
            match bytes {
                Some(bytes) => Ok(bytes),
                None => Ok(serde_json::to_vec_pretty(value)?),
            }
        }
        other => Ok(serde_json::to_vec_pretty(other)?),
    }
}

/// Reject names that could leave the target directory.
fn contained(name: &str) -> NodeResult<&Path> {
    let path = Path::new(name);
    let ok = !name.is_empty() && path.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if ok {
        Ok(path)
    } else {
        Err(NodeError::PathEscape(name.to_string()))
    }
}

pub struct SaveFileNode {
    directory: PathBuf,
    filename: Option<String>,
    allow_msg_filename: bool,
    property: PropertyPath,
    create_dirs: bool,
    overwrite: bool,
    notes: Vec<String>,
}

impl SaveFileNode {
    pub fn new(settings: &SaveFileSettings) -> Self {
        let mut settings = settings.clone();
        let notes = settings.normalize();
        Self {
            directory: settings.directory,
            filename: settings.filename,
            allow_msg_filename: settings.allow_msg_filename,
            property: PropertyPath::parse(&settings.property).unwrap_or_else(|_| PropertyPath::payload()),
            create_dirs: settings.create_dirs,
            overwrite: settings.overwrite,
            notes,
        }
    }

    pub fn name(&self) -> &str {
        "SaveFile"
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
        match self.save(&msg) {
            Ok((path, written)) => {
                tracing::debug!(node = %ctx.label(), path = %path.display(), written, "file saved");
                msg.insert("filename".to_string(), Value::String(path.display().to_string()));
                msg.insert("bytesWritten".to_string(), Value::from(written as u64));
                ctx.emit(PRIMARY, msg);
            }
            Err(e) => {
                ctx.error(format!("save failed: {e}"));
                msg.insert("error".to_string(), Value::String(e.to_string()));
                ctx.emit(SECONDARY, msg);
            }
        }
    }

    fn target(&self, msg: &Message) -> NodeResult<PathBuf> {
        let from_msg = if self.allow_msg_filename {
            msg.get("filename").and_then(Value::as_str)
        } else {
            None
        };
        let name = from_msg.or(self.filename.as_deref()).ok_or_else(|| {
            NodeError::InvalidConfiguration("no filename configured or provided".to_string())
        })?;
        Ok(self.directory.join(contained(name)?))
    }

    fn save(&self, msg: &Message) -> NodeResult<(PathBuf, usize)> {
        let path = self.target(msg)?;
        let value = self.property.get(msg).unwrap_or(&Value::Null);
        let bytes = encode(value)?;

        if !self.overwrite && path.exists() {
            return Err(NodeError::FileExists(path.display().to_string()));
        }
        if self.create_dirs {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&path, &bytes)?;
        Ok((path, bytes.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode() {
        assert_eq!(encode(&json!("hi")).unwrap(), b"hi".to_vec());
        assert_eq!(encode(&json!([104, 105])).unwrap(), b"hi".to_vec());
        assert_eq!(encode(&json!([1, 300])).unwrap(), b"[\n  1,\n  300\n]".to_vec());
        assert_eq!(encode(&json!({"a": 1})).unwrap(), b"{\n  \"a\": 1\n}".to_vec());
    }

    #[test]
    fn test_contained() {
        assert!(contained("out/a.txt").is_ok());
        assert!(contained("./a.txt").is_ok());
        assert!(contained("../a.txt").is_err());
        assert!(contained("/etc/passwd").is_err());
        assert!(contained("").is_err());
    }
}
