// crates/rollup-cache/src/l1.rs
// ============================================================================
// Module: L1 In-Process Cache
// Description: spec.md §4.H "Topology": a per-keyspace LRU keyed by
//              (tenant, keyspace, key).
// Purpose: The in-process tier of the two-tier rollup cache.
// Dependencies: lru, rollup-core, tokio (sync)
// ============================================================================

use std::collections::BTreeSet;
use std::num::NonZeroUsize;

use lru::LruCache;
use rollup_core::TenantId;
use rollup_core::cache_entry::CacheEntry;
use rollup_core::cache_entry::CacheLayer;
use rollup_core::time::Timestamp;
use tokio::sync::Mutex;

/// An in-process LRU shard scoped to one [`crate::keyspace::Keyspace`]
/// (`spec.md` §4.H).
///
/// # Invariants
/// - Bounded by `Keyspace::default_l1_capacity`, or a caller-supplied
///   override; eviction is least-recently-used.
pub struct L1Shard {
    /// The bounded LRU store itself.
    entries: Mutex<LruCache<String, CacheEntry>>,
}

impl L1Shard {
    /// Creates a shard bounded to `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self { entries: Mutex::new(LruCache::new(capacity)) }
    }

    /// Fetches a value, returning `None` on a miss or an expired entry.
    pub async fn get(&self, key: &str, now: Timestamp) -> Option<CacheEntry> {
        let mut entries = self.entries.lock().await;
        let hit = entries.get(key).cloned()?;
        if hit.is_expired(now) {
            entries.pop(key);
            return None;
        }
        Some(hit)
    }

    /// Writes a value, evicting the least-recently-used entry if at
    /// capacity.
    pub async fn set(&self, key: String, entry: CacheEntry) {
        self.entries.lock().await.put(key, entry);
    }

    /// Removes every entry carrying any of `tags`, returning the count
    /// removed (`spec.md` §4.H "InvalidateByTags").
    pub async fn invalidate_by_tags(&self, tags: &BTreeSet<String>) -> u64 {
        let mut entries = self.entries.lock().await;
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.tags.iter().any(|tag| tags.contains(tag)))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        doomed.len() as u64
    }

    /// Removes every entry tagged with `tenant` (`spec.md` §4.H
    /// "InvalidateTenant").
    pub async fn invalidate_tenant(&self, tenant: TenantId) -> u64 {
        let mut tags = BTreeSet::new();
        tags.insert(format!("tenant:{tenant}"));
        self.invalidate_by_tags(&tags).await
    }

    /// Removes every entry whose key matches a glob-style pattern, used by
    /// the external object index's `Invalidate` (`spec.md` §4.B).
    pub async fn invalidate_by_pattern(&self, pattern_prefix: &str) -> u64 {
        let mut entries = self.entries.lock().await;
        let doomed: Vec<String> =
            entries.iter().filter(|(key, _)| key.starts_with(pattern_prefix)).map(|(key, _)| key.clone()).collect();
        for key in &doomed {
            entries.pop(key);
        }
        doomed.len() as u64
    }

    /// Returns the current entry count, for diagnostics.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rollup_core::time::Timestamp;

    use super::*;

    fn entry(key: &str, tags: &[&str]) -> CacheEntry {
        CacheEntry {
            key: key.to_string(),
            value: vec![1, 2, 3],
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
            layer: CacheLayer::L1,
            written_at: Timestamp::new(Utc::now()),
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn set_then_get_returns_the_value() {
        let shard = L1Shard::new(10);
        shard.set("k1".to_string(), entry("k1", &[])).await;
        let hit = shard.get("k1", Timestamp::new(Utc::now())).await;
        assert!(hit.is_some());
    }

    #[tokio::test]
    async fn invalidate_by_tags_removes_matching_entries_only() {
        let shard = L1Shard::new(10);
        shard.set("k1".to_string(), entry("k1", &["tenant:a"])).await;
        shard.set("k2".to_string(), entry("k2", &["tenant:b"])).await;
        let mut tags = BTreeSet::new();
        tags.insert("tenant:a".to_string());
        let removed = shard.invalidate_by_tags(&tags).await;
        assert_eq!(removed, 1);
        assert!(shard.get("k1", Timestamp::new(Utc::now())).await.is_none());
        assert!(shard.get("k2", Timestamp::new(Utc::now())).await.is_some());
    }

    #[tokio::test]
    async fn capacity_evicts_least_recently_used() {
        let shard = L1Shard::new(1);
        shard.set("k1".to_string(), entry("k1", &[])).await;
        shard.set("k2".to_string(), entry("k2", &[])).await;
        assert_eq!(shard.len().await, 1);
        assert!(shard.get("k1", Timestamp::new(Utc::now())).await.is_none());
    }
}
