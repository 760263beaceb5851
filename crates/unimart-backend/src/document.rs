//! Untyped documents and the write operations applied to them.
//!
//! Documents travel as JSON objects keyed by the backend's camelCase field
//! names. Timestamps are RFC 3339 strings. Field paths are dotted
//! (`unreadCount.abc123`) and address nested maps.

use serde::Serialize;
use serde_json::{Map, Value};
use unimart_shared::types::Record;

use crate::error::{BackendError, Result};

/// A stored document: its id within the collection plus its body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Map<String, Value>) -> Self {
        Self { id: id.into(), data }
    }

    pub fn field(&self, path: &str) -> Option<&Value> {
        get_path(&self.data, path)
    }
}

/// Body of a document being created or overwritten. Fields listed in
/// `server_timestamps` are filled in by the backend at commit time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewDocument {
    pub data: Map<String, Value>,
    pub server_timestamps: Vec<String>,
}

impl NewDocument {
    pub fn new(data: Map<String, Value>) -> Self {
        Self {
            data,
            server_timestamps: Vec::new(),
        }
    }

    pub fn from_record<T: Serialize>(record: &T) -> Result<Self> {
        Ok(Self::new(encode(record)?))
    }

    pub fn server_timestamp(mut self, path: impl Into<String>) -> Self {
        self.server_timestamps.push(path.into());
        self
    }
}

/// How `set` treats an existing document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMode {
    /// Replace the whole document.
    Overwrite,
    /// Replace only the top-level fields present in the new body.
    Merge,
}

/// One change applied by `update`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    Set(String, Value),
    Increment(String, i64),
    ServerTimestamp(String),
}

impl FieldUpdate {
    pub fn set(path: impl Into<String>, value: impl Into<Value>) -> Self {
        FieldUpdate::Set(path.into(), value.into())
    }

    pub fn increment(path: impl Into<String>, by: i64) -> Self {
        FieldUpdate::Increment(path.into(), by)
    }

    pub fn path(&self) -> &str {
        match self {
            FieldUpdate::Set(p, _) | FieldUpdate::Increment(p, _) | FieldUpdate::ServerTimestamp(p) => p,
        }
    }
}

/// Serialize a record into a document body.
pub fn encode<T: Serialize>(record: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(BackendError::Protocol(format!(
            "records must serialize to objects, got {other}"
        ))),
    }
}

/// Deserialize a document into a record and attach its id.
pub fn decode<T: Record>(doc: Document) -> Result<T> {
    let mut record: T = serde_json::from_value(Value::Object(doc.data))?;
    record.assign_id(&doc.id);
    Ok(record)
}

pub fn get_path<'a>(data: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = data.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Set a dotted path, creating intermediate maps and replacing any
/// non-map value standing in the way.
pub fn set_path(data: &mut Map<String, Value>, path: &str, value: Value) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(last) = segments.pop() else {
        return;
    };

    let mut current = data;
    for segment in segments {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(map) = entry else {
            return;
        };
        current = map;
    }
    current.insert(last.to_string(), value);
}

/// Add `by` to the number at `path`; a missing or non-numeric field counts
/// as zero.
pub fn increment_path(data: &mut Map<String, Value>, path: &str, by: i64) {
    let next = match get_path(data, path) {
        Some(Value::Number(n)) if n.is_i64() => Value::from(n.as_i64().unwrap_or(0) + by),
        Some(Value::Number(n)) => Value::from(n.as_f64().unwrap_or(0.0) + by as f64),
        _ => Value::from(by),
    };
    set_path(data, path, next);
}
