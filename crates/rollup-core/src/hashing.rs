// crates/rollup-core/src/hashing.rs
// ============================================================================
// Module: Rollup Engine Hashing
// Description: Canonical-JSON sha256 hashing for cache keys and merged node
//              ids.
// Purpose: Give the cache (spec.md §6 "Cache keys") and the merge engine
//          (spec.md §4.D "Determinism") one shared, stable hashing routine.
// Dependencies: serde_json, sha2
// ============================================================================

//! ## Overview
//! `spec.md` §6 pins the cache key format to
//! `ro:{keyspace}:{tenant}:{sha256(input)}` where the hashed input is a
//! canonical-JSON serialization of the key material. [`hash_canonical_json`]
//! is the single place that canonicalization happens, so the cache, the
//! index, and the merge engine never compute the hash three different ways.

use serde::Serialize;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;

/// Serializes `value` to canonical JSON (object keys sorted recursively)
/// and returns its lowercase hex sha256 digest.
///
/// # Panics
///
/// Panics if `value` cannot be serialized to JSON at all (a programmer
/// error — every type passed here derives `Serialize`), which can only
/// happen for types with a failing custom `Serialize` impl.
#[must_use]
pub fn hash_canonical_json<T: Serialize>(value: &T) -> String {
    let raw = serde_json::to_value(value).expect("value must be serializable to JSON");
    let canonical = canonicalize(&raw);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex(&hasher.finalize())
}

/// Hashes raw bytes directly, for callers that already have a canonical
/// byte representation (e.g. a pre-sorted `Vec<NodeId>`).
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex(&hasher.finalize())
}

/// Re-serializes a [`Value`] with object keys sorted at every level so the
/// same logical structure always produces the same JSON text.
fn canonicalize(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let rendered: Vec<String> = entries
                .into_iter()
                .map(|(k, v)| format!("{}:{}", serde_json::to_string(k).unwrap_or_default(), canonicalize(v)))
                .collect();
            format!("{{{}}}", rendered.join(","))
        }
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(canonicalize).collect();
            format!("[{}]", rendered.join(","))
        }
        other => other.to_string(),
    }
}

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn key_order_does_not_affect_the_hash() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(hash_canonical_json(&a), hash_canonical_json(&b));
    }

    #[test]
    fn different_content_hashes_differently() {
        let a = json!({"a": 1});
        let b = json!({"a": 2});
        assert_ne!(hash_canonical_json(&a), hash_canonical_json(&b));
    }
}
