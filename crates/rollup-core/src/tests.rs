// crates/rollup-core/src/tests.rs
// ============================================================================
// Module: Rollup Core Integration Tests
// Description: Cross-module invariants that don't belong to a single
//              submodule's own `#[cfg(test)]` block.
// Dependencies: proptest, serde_json
// ============================================================================

use chrono::TimeZone;
use chrono::Utc;
use proptest::prelude::*;

use crate::cache_entry::CacheEntry;
use crate::cache_entry::CacheLayer;
use crate::error::RollupError;
use crate::hashing::hash_canonical_json;
use crate::identifiers::TenantId;
use crate::time::Timestamp;

#[test]
fn safe_error_never_carries_a_correlation_id_it_was_not_given() {
    let err = RollupError::Validation { message: "bad input".to_string() };
    let safe = err.to_safe(None);
    assert!(safe.correlation_id.is_none());
}

#[test]
fn cache_key_is_stable_across_key_ordering_in_input_map() {
    let mut first = serde_json::Map::new();
    first.insert("a".to_string(), serde_json::json!(1));
    first.insert("b".to_string(), serde_json::json!(2));

    let mut second = serde_json::Map::new();
    second.insert("b".to_string(), serde_json::json!(2));
    second.insert("a".to_string(), serde_json::json!(1));

    let left = hash_canonical_json(&serde_json::Value::Object(first));
    let right = hash_canonical_json(&serde_json::Value::Object(second));
    assert_eq!(left, right);
}

#[test]
fn cache_entry_expiry_is_inclusive_at_the_boundary() {
    let at = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).single().expect("valid");
    let now = Timestamp::new(at);
    let entry = CacheEntry {
        key: "ro:test:tenant:abc".to_string(),
        value: vec![1, 2, 3],
        tags: vec![format!("tenant:{}", TenantId::new())],
        layer: CacheLayer::L1,
        written_at: now,
        expires_at: Some(now),
    };
    assert!(entry.is_expired(now));
}

proptest! {
    #[test]
    fn tenant_ids_are_never_accidentally_equal(_n in 0u8..4) {
        let a = TenantId::new();
        let b = TenantId::new();
        prop_assert_ne!(a, b);
    }
}
