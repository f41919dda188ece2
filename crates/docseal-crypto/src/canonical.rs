//! Canonical JSON encoding.
//!
//! Object keys are sorted at every nesting level and no whitespace is
//! emitted, so semantically equal values always produce identical bytes.
//! Arrays keep their order. Dates and binary blobs travel as single-key
//! tagged objects (`{"$date": ...}`, `{"$binary": ...}`) so decoding
//! recovers them.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::base64::{base64_decode, base64_encode};
use crate::error::CryptoError;
use crate::types::{BINARY_TAG, DATE_TAG};

/// Deepest nesting accepted by the encoder. Stays below serde_json's parse
/// recursion limit once the value is wrapped in an envelope mapping.
pub const MAX_DEPTH: usize = 100;

/// Canonical JSON serialization: sorted keys, no whitespace.
pub fn canonical_json(value: &Value) -> Result<String, CryptoError> {
    let mut out = String::new();
    write_canonical(value, 0, &mut out)?;
    Ok(out)
}

/// Check that `value` encodes canonically when stored as one entry of a
/// field mapping, which puts it one level below the top.
pub fn check_field_value(value: &Value) -> Result<(), CryptoError> {
    write_canonical(value, 1, &mut String::new())
}

fn write_canonical(value: &Value, depth: usize, out: &mut String) -> Result<(), CryptoError> {
    if depth > MAX_DEPTH {
        return Err(CryptoError::NonSerializable(format!(
            "nesting exceeds {} levels",
            MAX_DEPTH
        )));
    }
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => out.push_str(&quote(s)?),
        Value::Array(arr) => {
            out.push('[');
            for (i, item) in arr.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, depth + 1, out)?;
            }
            out.push(']');
        }
        Value::Object(obj) => {
            let mut keys: Vec<&String> = obj.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&quote(key)?);
                out.push(':');
                write_canonical(&obj[key.as_str()], depth + 1, out)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

fn quote(s: &str) -> Result<String, CryptoError> {
    serde_json::to_string(s).map_err(|e| CryptoError::NonSerializable(e.to_string()))
}

/// Encode any serializable value canonically.
///
/// Fails with `NonSerializable` when the value has no JSON form (for
/// example a map with non-string keys) or nests deeper than [`MAX_DEPTH`].
pub fn stable_encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CryptoError> {
    let value =
        serde_json::to_value(value).map_err(|e| CryptoError::NonSerializable(e.to_string()))?;
    Ok(canonical_json(&value)?.into_bytes())
}

/// Inverse of [`stable_encode`] for field mappings.
pub fn stable_decode(bytes: &[u8]) -> Result<Map<String, Value>, CryptoError> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(CryptoError::NonSerializable(format!(
            "expected an object, got {}",
            type_name(&other)
        ))),
        Err(e) => Err(CryptoError::NonSerializable(e.to_string())),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Tagged values
// ---------------------------------------------------------------------------

fn single_tag<'a>(value: &'a Value, tag: &str) -> Option<&'a str> {
    let obj = value.as_object()?;
    if obj.len() != 1 {
        return None;
    }
    obj.get(tag)?.as_str()
}

/// Build a tagged date value.
pub fn date_value(date: DateTime<Utc>) -> Value {
    let mut map = Map::new();
    map.insert(
        DATE_TAG.to_string(),
        Value::String(date.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    Value::Object(map)
}

/// Read a tagged date value back.
pub fn as_date(value: &Value) -> Option<DateTime<Utc>> {
    let raw = single_tag(value, DATE_TAG)?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Build a tagged binary value.
pub fn binary_value(bytes: &[u8]) -> Value {
    let mut map = Map::new();
    map.insert(BINARY_TAG.to_string(), Value::String(base64_encode(bytes)));
    Value::Object(map)
}

/// Read a tagged binary value back.
pub fn as_binary(value: &Value) -> Option<Vec<u8>> {
    base64_decode(single_tag(value, BINARY_TAG)?).ok()
}
