// crates/rollup-core/src/cache_entry.rs
// ============================================================================
// Module: Cache Entries
// Description: spec.md §3 "CacheEntry" and its layer classification.
// Purpose: The wire shape shared between the L1 in-process cache and the
//          L2 blob cache implemented by rollup-cache.
// Dependencies: serde
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::time::Timestamp;

/// Which tier of the two-tier cache an entry resides in (`spec.md` §4.H).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheLayer {
    /// In-process, per-keyspace LRU.
    L1,
    /// Out-of-process blob store.
    L2,
}

/// `spec.md` §3 "CacheEntry".
///
/// # Invariants
/// - `key` follows the `ro:{keyspace}:{tenant}:{hash}` convention
///   produced by [`crate::hashing::hash_canonical_json`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Cache key.
    pub key: String,
    /// Opaque serialized value.
    pub value: Vec<u8>,
    /// Tags used for bulk invalidation (e.g. `"tenant:{id}"`,
    /// `"rollup:{id}"`).
    pub tags: Vec<String>,
    /// Tier the entry was served from or written to.
    pub layer: CacheLayer,
    /// Time the entry was written.
    pub written_at: Timestamp,
    /// Time the entry expires, if it has a TTL.
    pub expires_at: Option<Timestamp>,
}

impl CacheEntry {
    /// Returns whether the entry has expired as of `now`.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}
