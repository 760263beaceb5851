//! Conversion between plain JSON documents and the document database's
//! typed value encoding (`{"stringValue": "..."}` and friends).

use serde_json::{json, Map, Value};

use crate::query::{as_timestamp, is_timestamp_field};

pub fn encode_fields(data: &Map<String, Value>) -> Map<String, Value> {
    data.iter()
        .map(|(k, v)| (k.clone(), encode_field(k, v)))
        .collect()
}

/// Encode the value stored at `path`. Only timestamp fields become
/// `timestampValue`.
pub fn encode_field(path: &str, value: &Value) -> Value {
    match value {
        Value::String(s) if is_timestamp_field(path) && as_timestamp(s).is_some() => {
            json!({ "timestampValue": s })
        }
        other => encode_value(other),
    }
}

pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            // 64-bit integers travel as strings.
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or(0.0) }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

pub fn decode_fields(fields: Option<&Map<String, Value>>) -> Map<String, Value> {
    fields
        .map(|f| f.iter().map(|(k, v)| (k.clone(), decode_value(v))).collect())
        .unwrap_or_default()
}

pub fn decode_value(value: &Value) -> Value {
    let Some((kind, inner)) = value.as_object().and_then(|o| o.iter().next()) else {
        return Value::Null;
    };
    match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => Value::Bool(inner.as_bool().unwrap_or(false)),
        "integerValue" => match inner {
            Value::String(s) => s.parse::<i64>().map(Value::from).unwrap_or(Value::Null),
            other => other.clone(),
        },
        "doubleValue" => match inner {
            Value::String(s) => s.parse::<f64>().map(Value::from).unwrap_or(Value::Null),
            other => other.clone(),
        },
        "timestampValue" | "stringValue" | "referenceValue" | "bytesValue" => inner.clone(),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|items| items.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => Value::Object(decode_fields(inner.get("fields").and_then(Value::as_object))),
        "geoPointValue" => inner.clone(),
        _ => Value::Null,
    }
}

/// Quote a dotted path for use in update masks and field references.
/// Segments that are not plain identifiers are wrapped in backticks.
pub fn quote_path(path: &str) -> String {
    path.split('.')
        .map(|segment| {
            if is_simple_segment(segment) {
                segment.to_string()
            } else {
                let escaped = segment.replace('\\', "\\\\").replace('`', "\\`");
                format!("`{escaped}`")
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn is_simple_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
