// crates/rollup-cache/src/cache.rs
// ============================================================================
// Module: Two-Tier Rollup Cache
// Description: spec.md §4.H "Topology", "Writes", "Reads".
// Purpose: The L1 (in-process LRU) + L2 (optional remote BlobCache)
//          two-tier cache used by execution results, merged graphs, blast
//          radii, and the external object index.
// Dependencies: rollup-core, serde, serde_json, tokio (sync), tracing
// ============================================================================

//! ## Overview
//! [`RollupCache`] degrades gracefully when L2 is absent or failing
//! (`spec.md` §4.H "the cache must degrade gracefully when L2 is
//! unavailable"): every L2 operation's error is logged and treated as a
//! miss or a best-effort write, never surfaced to the caller as a failure.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use rollup_core::BlobCache;
use rollup_core::TenantId;
use rollup_core::cache_entry::CacheEntry;
use rollup_core::cache_entry::CacheLayer;
use rollup_core::time::Timestamp;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::key::build_key;
use crate::keyspace::Keyspace;
use crate::l1::L1Shard;
use crate::stats::CacheStats;
use crate::stats::CacheStatsSnapshot;

/// Configuration for [`RollupCache::new`] (`spec.md` §6 `cache{...}`).
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Per-keyspace L1 capacity overrides; keyspaces not present use
    /// [`Keyspace::default_l1_capacity`].
    pub l1_capacity_overrides: BTreeMap<Keyspace, usize>,
    /// Whether L1 is enabled at all.
    pub enable_l1: bool,
    /// Whether L2 is enabled (the `l2` collaborator may still be `None`
    /// even when this is `true`, in which case L2 is simply skipped).
    pub enable_l2: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { l1_capacity_overrides: BTreeMap::new(), enable_l1: true, enable_l2: true }
    }
}

/// The two-tier rollup cache (`spec.md` §4.H).
pub struct RollupCache {
    /// L1 shards, one per [`Keyspace`], indexed by [`Keyspace::slot`].
    shards: [L1Shard; 4],
    /// Optional L2 collaborator.
    l2: Option<Arc<dyn BlobCache>>,
    /// Which tiers are enabled and per-keyspace capacity overrides.
    config: CacheConfig,
    /// Running hit/miss/latency counters.
    stats: CacheStats,
}

fn now() -> Timestamp {
    Timestamp::new(chrono::Utc::now())
}

impl RollupCache {
    /// Builds a cache with no L2 collaborator configured; every read/write
    /// is served purely from L1.
    #[must_use]
    pub fn l1_only(config: CacheConfig) -> Self {
        Self::new(config, None)
    }

    /// Builds a cache with an optional L2 collaborator.
    #[must_use]
    pub fn new(config: CacheConfig, l2: Option<Arc<dyn BlobCache>>) -> Self {
        let shards = Keyspace::ALL.map(|keyspace| {
            let capacity = config.l1_capacity_overrides.get(&keyspace).copied().unwrap_or(keyspace.default_l1_capacity());
            L1Shard::new(capacity)
        });
        Self { shards, l2, config, stats: CacheStats::new() }
    }

    fn shard(&self, keyspace: Keyspace) -> &L1Shard {
        &self.shards[keyspace.slot()]
    }

    /// Fetches a value by key material, checking L1 then L2
    /// (`spec.md` §4.H "Reads").
    pub async fn get<K: Serialize, V: DeserializeOwned>(
        &self,
        keyspace: Keyspace,
        tenant: TenantId,
        key_material: &K,
    ) -> Option<V> {
        let start = Instant::now();
        let key = build_key(keyspace, tenant, key_material);
        let result = self.get_by_raw_key(keyspace, &key).await;
        self.stats.record_get_latency(start.elapsed().as_micros().try_into().unwrap_or(u64::MAX));
        result.and_then(|bytes| serde_json::from_slice(&bytes).ok())
    }

    /// Fetches raw bytes by a pre-built cache key.
    async fn get_by_raw_key(&self, keyspace: Keyspace, key: &str) -> Option<Vec<u8>> {
        if self.config.enable_l1 {
            if let Some(entry) = self.shard(keyspace).get(key, now()).await {
                self.stats.record_l1(true);
                return Some(entry.value);
            }
            self.stats.record_l1(false);
        }

        if !self.config.enable_l2 {
            return None;
        }
        let Some(l2) = &self.l2 else { return None };
        match l2.get(key).await {
            Ok(Some(bytes)) => {
                self.stats.record_l2(true);
                if self.config.enable_l1 {
                    let entry = CacheEntry {
                        key: key.to_string(),
                        value: bytes.clone(),
                        tags: Vec::new(),
                        layer: CacheLayer::L1,
                        written_at: now(),
                        expires_at: None,
                    };
                    self.shard(keyspace).set(key.to_string(), entry).await;
                }
                Some(bytes)
            }
            Ok(None) => {
                self.stats.record_l2(false);
                None
            }
            Err(err) => {
                warn!(error = %err, %key, "L2 cache read failed, treating as miss");
                self.stats.record_l2(false);
                None
            }
        }
    }

    /// Writes a value, L2 first then L1 (`spec.md` §4.H "Writes"). On L2
    /// write failure, L1 is still populated and a warning is logged.
    pub async fn set<K: Serialize, V: Serialize>(
        &self,
        keyspace: Keyspace,
        tenant: TenantId,
        key_material: &K,
        value: &V,
        ttl: Option<Duration>,
        tags: Vec<String>,
    ) {
        let start = Instant::now();
        let key = build_key(keyspace, tenant, key_material);
        let mut full_tags = tags;
        full_tags.push(format!("tenant:{tenant}"));
        let Ok(bytes) = serde_json::to_vec(value) else {
            warn!(%key, "failed to serialize cache value, skipping write");
            return;
        };

        if self.config.enable_l2 {
            if let Some(l2) = &self.l2 {
                if let Err(err) = l2.set(&key, bytes.clone(), ttl).await {
                    warn!(error = %err, %key, "L2 cache write failed, L1 still populated");
                }
            }
        }

        if self.config.enable_l1 {
            let expires_at = ttl.map(|ttl| Timestamp::new(chrono::Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default()));
            let entry = CacheEntry { key: key.clone(), value: bytes, tags: full_tags, layer: CacheLayer::L1, written_at: now(), expires_at };
            self.shard(keyspace).set(key, entry).await;
        }
        self.stats.record_set_latency(start.elapsed().as_micros().try_into().unwrap_or(u64::MAX));
    }

    /// Removes every entry (across both layers) carrying any of `tags`
    /// (`spec.md` §4.H "InvalidateByTags").
    pub async fn invalidate_by_tags(&self, tags: &[String]) -> u64 {
        let tag_set: BTreeSet<String> = tags.iter().cloned().collect();
        let mut removed = 0u64;
        for keyspace in Keyspace::ALL {
            removed += self.shard(keyspace).invalidate_by_tags(&tag_set).await;
        }
        if let Some(l2) = &self.l2 {
            match l2.delete_by_tags(tags).await {
                Ok(count) => removed += count,
                Err(err) => warn!(error = %err, "L2 invalidate-by-tags failed"),
            }
        }
        removed
    }

    /// Removes every entry belonging to `tenant` (`spec.md` §4.H
    /// "InvalidateTenant").
    pub async fn invalidate_tenant(&self, tenant: TenantId) -> u64 {
        let mut removed = 0u64;
        for keyspace in Keyspace::ALL {
            removed += self.shard(keyspace).invalidate_tenant(tenant).await;
        }
        if let Some(l2) = &self.l2 {
            match l2.delete_by_tenant(tenant).await {
                Ok(count) => removed += count,
                Err(err) => warn!(error = %err, %tenant, "L2 invalidate-tenant failed"),
            }
        }
        removed
    }

    /// Removes every entry whose key starts with `prefix`, used by the
    /// external object index build's cache invalidation
    /// (`spec.md` §4.B "Invalidate the cache keys touched by this build").
    pub async fn invalidate_by_prefix(&self, keyspace: Keyspace, prefix: &str) -> u64 {
        let mut removed = self.shard(keyspace).invalidate_by_pattern(prefix).await;
        if let Some(l2) = &self.l2 {
            match l2.delete_by_pattern(&format!("{prefix}*")).await {
                Ok(count) => removed += count,
                Err(err) => warn!(error = %err, %prefix, "L2 invalidate-by-pattern failed"),
            }
        }
        removed
    }

    /// Returns a snapshot of accumulated hit/miss/latency statistics
    /// (`spec.md` §4.H "Statistics").
    #[must_use]
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::atomic::Ordering;

    use async_trait::async_trait;
    use rollup_core::BlobCacheError;
    use serde_json::json;

    use super::*;

    struct FlakyL2 {
        fail: AtomicBool,
    }

    #[async_trait]
    impl BlobCache for FlakyL2 {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, BlobCacheError> {
            if self.fail.load(Ordering::Relaxed) {
                return Err(BlobCacheError::Unavailable { message: "down".to_string() });
            }
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> Result<(), BlobCacheError> {
            if self.fail.load(Ordering::Relaxed) {
                return Err(BlobCacheError::Unavailable { message: "down".to_string() });
            }
            Ok(())
        }

        async fn delete_by_tags(&self, _tags: &[String]) -> Result<u64, BlobCacheError> {
            Ok(0)
        }

        async fn delete_by_pattern(&self, _pattern: &str) -> Result<u64, BlobCacheError> {
            Ok(0)
        }

        async fn delete_by_tenant(&self, _tenant: TenantId) -> Result<u64, BlobCacheError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn get_after_set_returns_the_value() {
        let cache = RollupCache::l1_only(CacheConfig::default());
        let tenant = TenantId::new();
        cache.set(Keyspace::MergedGraph, tenant, &json!({"id": "r1"}), &json!({"nodes": 3}), None, vec![]).await;
        let value: Option<serde_json::Value> = cache.get(Keyspace::MergedGraph, tenant, &json!({"id": "r1"})).await;
        assert_eq!(value, Some(json!({"nodes": 3})));
    }

    #[tokio::test]
    async fn l2_write_failure_does_not_prevent_l1_population() {
        let l2 = Arc::new(FlakyL2 { fail: AtomicBool::new(true) });
        let cache = RollupCache::new(CacheConfig::default(), Some(l2));
        let tenant = TenantId::new();
        cache.set(Keyspace::ExecutionResult, tenant, &json!({"id": "e1"}), &json!("done"), None, vec![]).await;
        let value: Option<serde_json::Value> = cache.get(Keyspace::ExecutionResult, tenant, &json!({"id": "e1"})).await;
        assert_eq!(value, Some(json!("done")));
    }

    #[tokio::test]
    async fn invalidate_tenant_removes_only_that_tenants_entries() {
        let cache = RollupCache::l1_only(CacheConfig::default());
        let a = TenantId::new();
        let b = TenantId::new();
        cache.set(Keyspace::BlastRadius, a, &json!("k"), &json!(1), None, vec![]).await;
        cache.set(Keyspace::BlastRadius, b, &json!("k"), &json!(2), None, vec![]).await;
        cache.invalidate_tenant(a).await;
        let a_value: Option<serde_json::Value> = cache.get(Keyspace::BlastRadius, a, &json!("k")).await;
        let b_value: Option<serde_json::Value> = cache.get(Keyspace::BlastRadius, b, &json!("k")).await;
        assert_eq!(a_value, None);
        assert_eq!(b_value, Some(json!(2)));
    }
}
