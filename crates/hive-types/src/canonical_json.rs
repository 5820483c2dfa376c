//! Canonical JSON serialization
//!
//! Every signed round payload is serialized through this module before it is
//! signed, so two nodes that build the same logical payload produce the same
//! bytes.
//!
//! # Canonical Format
//!
//! 1. **Key Ordering**: object keys sorted lexicographically (UTF-8 byte order)
//! 2. **No Whitespace**: compact representation
//! 3. **Integers untouched**: integral numbers keep their exact `u64`/`i64` form
//! 4. **No Null Values**: fields with null values are omitted
//!
//! ```text
//! {"action":"fetch-todo","roundNumber":4,"taskId":"task-1"}
//! ```

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CanonicalJsonError {
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CanonicalJsonError>;

/// Serialize value to a canonical JSON string
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String> {
    let json_value = serde_json::to_value(value)?;
    let canonical = canonicalize_value(json_value);
    Ok(serde_json::to_string(&canonical)?)
}

/// Canonical JSON as raw bytes, the exact form that gets signed
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(to_canonical_json(value)?.into_bytes())
}

fn canonicalize_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, canonicalize_value(v)))
                .collect();

            let mut canonical_map = Map::new();
            for (k, v) in sorted {
                canonical_map.insert(k, v);
            }
            Value::Object(canonical_map)
        }
        Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize_value).collect()),
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                return Value::Number(n);
            }
            // Floats that hold an integral value collapse to the integer form
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < (1u64 << 53) as f64 => {
                    Value::Number(serde_json::Number::from(f as i64))
                }
                _ => Value::Number(n),
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Claim {
        task_id: String,
        round: u64,
        staking_key: Option<String>,
    }

    #[test]
    fn test_key_ordering() {
        let claim = Claim {
            task_id: "t".to_string(),
            round: 3,
            staking_key: Some("k".to_string()),
        };
        let json = to_canonical_json(&claim).unwrap();
        assert_eq!(json, r#"{"round":3,"staking_key":"k","task_id":"t"}"#);
    }

    #[test]
    fn test_null_values_omitted() {
        let claim = Claim {
            task_id: "t".to_string(),
            round: 3,
            staking_key: None,
        };
        let json = to_canonical_json(&claim).unwrap();
        assert!(!json.contains("staking_key"));
    }

    #[test]
    fn test_nested_objects_sorted() {
        let value = json!({
            "z": {"b": 2, "a": 1},
            "a": [ {"y": 1, "x": 2} ],
        });
        let canonical = to_canonical_json(&value).unwrap();
        assert_eq!(canonical, r#"{"a":[{"x":2,"y":1}],"z":{"a":1,"b":2}}"#);
    }

    #[test]
    fn test_large_integers_are_exact() {
        let value = json!({ "amount": u64::MAX });
        let canonical = to_canonical_json(&value).unwrap();
        assert_eq!(canonical, format!(r#"{{"amount":{}}}"#, u64::MAX));
    }

    #[test]
    fn test_same_content_same_bytes() {
        let a = json!({"taskId": "t", "roundNumber": 1});
        let b = json!({"roundNumber": 1, "taskId": "t"});
        assert_eq!(to_canonical_bytes(&a).unwrap(), to_canonical_bytes(&b).unwrap());
    }
}
