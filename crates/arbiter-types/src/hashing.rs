//! Canonical JSON encoding and content hashing.
//!
//! The planner, config store, and manifest builder all need the same
//! "byte-identical for byte-identical input" guarantee, so the canonical
//! form (keys sorted, no insignificant whitespace) and its SHA-256 digest
//! live in one place.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Re-encodes a JSON value with object keys sorted recursively and no
/// insignificant whitespace, so two semantically equal values always
/// produce the same bytes.
pub fn canonicalize(value: &Value) -> String {
    let sorted = sort_value(value);
    serde_json::to_string(&sorted).expect("canonical value always serializes")
}

fn sort_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = serde_json::Map::new();
            for (k, v) in entries {
                out.insert(k.clone(), sort_value(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_value).collect()),
        other => other.clone(),
    }
}

/// SHA-256 of the canonical-JSON encoding of `value`, as lowercase hex.
pub fn sha256_of_value(value: &Value) -> String {
    let canonical = canonicalize(value);
    sha256_hex(canonical.as_bytes())
}

/// SHA-256 of a serializable type's canonical-JSON encoding.
pub fn sha256_of<T: Serialize>(value: &T) -> String {
    let json = serde_json::to_value(value).expect("value serializes to JSON");
    sha256_of_value(&json)
}

/// SHA-256 of raw bytes, as lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonicalize_sorts_keys_regardless_of_input_order() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(canonicalize(&a), canonicalize(&b));
    }

    #[test]
    fn canonicalize_sorts_nested_objects() {
        let a = json!({"outer": {"z": 1, "y": 2}});
        let b = json!({"outer": {"y": 2, "z": 1}});
        assert_eq!(sha256_of_value(&a), sha256_of_value(&b));
    }

    #[test]
    fn different_content_hashes_differ() {
        let a = json!({"k": 1});
        let b = json!({"k": 2});
        assert_ne!(sha256_of_value(&a), sha256_of_value(&b));
    }

    #[test]
    fn array_order_is_significant() {
        let a = json!([1, 2, 3]);
        let b = json!([3, 2, 1]);
        assert_ne!(sha256_of_value(&a), sha256_of_value(&b));
    }
}
