// crates/rollup-cache/src/key.rs
// ============================================================================
// Module: Cache Key Construction
// Description: spec.md §6 "Cache keys" and §9's reverse-lookup open
//              question resolution.
// Purpose: The single place cache keys are built so every caller produces
//          the same key for the same logical lookup.
// Dependencies: rollup-core, serde
// ============================================================================

use rollup_core::TenantId;
use rollup_core::hashing::hash_canonical_json;
use serde::Serialize;

use crate::keyspace::Keyspace;

/// Builds the canonical cache key `ro:{keyspace}:{tenant}:{sha256(input)}`
/// (`spec.md` §6), hashing a canonical-JSON serialization of `input`.
#[must_use]
pub fn build_key<T: Serialize>(keyspace: Keyspace, tenant: TenantId, input: &T) -> String {
    format!("ro:{}:{tenant}:{}", keyspace.as_str(), hash_canonical_json(input))
}

/// Builds the external-object-index lookup cache key
/// `{tenant}:{repoId?}:{externalId}` (`spec.md` §4.B "Lookup").
#[must_use]
pub fn index_lookup_key(tenant: TenantId, repository_id: Option<&str>, external_id: &str) -> String {
    format!("{tenant}:{}:{external_id}", repository_id.unwrap_or("_"))
}

/// Builds the reverse-lookup cache key, resolving `spec.md` §9's open
/// question: `rev:{tenant}:{scanId}:{nodeId}`, using `_` when `scan_id` is
/// absent.
#[must_use]
pub fn reverse_lookup_key(tenant: TenantId, scan_id: Option<&str>, node_id: &str) -> String {
    format!("rev:{tenant}:{}:{node_id}", scan_id.unwrap_or("_"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn same_input_produces_the_same_key() {
        let tenant = TenantId::new();
        let a = build_key(Keyspace::MergedGraph, tenant, &json!({"rollupId": "r1"}));
        let b = build_key(Keyspace::MergedGraph, tenant, &json!({"rollupId": "r1"}));
        assert_eq!(a, b);
    }

    #[test]
    fn different_keyspace_produces_a_different_key() {
        let tenant = TenantId::new();
        let a = build_key(Keyspace::MergedGraph, tenant, &json!({"rollupId": "r1"}));
        let b = build_key(Keyspace::BlastRadius, tenant, &json!({"rollupId": "r1"}));
        assert_ne!(a, b);
    }

    #[test]
    fn reverse_lookup_key_uses_underscore_for_absent_scan_id() {
        let tenant = TenantId::new();
        let with_scan = reverse_lookup_key(tenant, Some("scan-1"), "node-1");
        let without_scan = reverse_lookup_key(tenant, None, "node-1");
        assert_eq!(with_scan, format!("rev:{tenant}:scan-1:node-1"));
        assert_eq!(without_scan, format!("rev:{tenant}:_:node-1"));
    }
}
