//! Sanitizing deserializer for JSON documents pulled from storage.
//!
//! Any object that directly carries a prototype-pollution key is replaced with
//! `null` as a whole, including its sibling fields. Arrays keep their length and
//! order; scalars pass through.

use serde_json::Value;

use super::error::DomainError;

/// Keys that disqualify the object carrying them.
pub const POLLUTION_KEYS: [&str; 2] = ["__proto__", "constructor"];

/// Recursively sanitize a JSON value. Total over arbitrary input.
pub fn sanitize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            if map.keys().any(|key| is_pollution_key(key)) {
                return Value::Null;
            }
            Value::Object(
                map.into_iter()
                    .map(|(key, value)| (key, sanitize(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize).collect()),
        scalar => scalar,
    }
}

/// Decode and sanitize an untrusted document.
///
/// Editor payloads are stored either as embedded JSON or as a JSON-encoded string;
/// the latter is parsed first. A sanitized result of `null` is reported as absent.
pub fn deserialize_untrusted(raw: &Value) -> Result<Option<Value>, DomainError> {
    let decoded = match raw {
        Value::String(encoded) => serde_json::from_str::<Value>(encoded)
            .map_err(|err| DomainError::malformed("untrusted document", err.to_string()))?,
        other => other.clone(),
    };

    match sanitize(decoded) {
        Value::Null => Ok(None),
        value => Ok(Some(value)),
    }
}

fn is_pollution_key(key: &str) -> bool {
    POLLUTION_KEYS.contains(&key)
}
