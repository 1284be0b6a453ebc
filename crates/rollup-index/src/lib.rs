// crates/rollup-index/src/lib.rs
// ============================================================================
// Module: Rollup Index Library
// Description: Component B — the per-tenant external object inverted index.
// Purpose: Build, query, reverse-query, invalidate, and report statistics
//          for the index that lets matchers find cross-repository
//          candidates without a full graph scan.
// Dependencies: rollup-cache, rollup-core, rollup-extractors, tokio (sync)
// ============================================================================

//! ## Overview
//! [`RollupIndex`] is the facade `rollup-orchestrator` and `rollup-service`
//! depend on; it owns the build coordinator ([`build::IndexBuilder`]) and
//! delegates queries to the cache-fronted functions in [`lookup`].

pub mod build;
pub mod lookup;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;

use rollup_cache::RollupCache;
use rollup_core::ExternalObjectFilter;
use rollup_core::ExternalObjectStore;
use rollup_core::NodeId;
use rollup_core::RepositoryId;
use rollup_core::RollupError;
use rollup_core::ScanGraphStore;
use rollup_core::ScanId;
use rollup_core::TenantId;
use rollup_core::Timestamp;
use rollup_extractors::ExtractorRegistry;
use tokio::sync::Mutex;

pub use build::IndexBuilder;
pub use types::BuildOptions;
pub use types::BuildResult;
pub use types::IndexStats;
pub use types::LookupResult;
pub use types::ReverseResult;

/// Per-tenant bookkeeping of the most recent `Build` call, used to answer
/// `Stats` without a store round-trip.
#[derive(Debug, Clone, Copy)]
struct LastBuild {
    /// When the build completed.
    at: Timestamp,
    /// How long the build took, in milliseconds.
    duration_ms: u64,
}

/// The external object index (`spec.md` §4.B).
pub struct RollupIndex {
    /// Backing store, also used directly for lookups/invalidation.
    object_store: Arc<dyn ExternalObjectStore>,
    /// Coordinates `Build` calls.
    builder: IndexBuilder,
    /// Optional cache fronting lookups and reverse-lookups.
    cache: Option<Arc<RollupCache>>,
    /// Per-tenant bookkeeping of the most recent build, for `Stats`.
    last_build: Mutex<HashMap<TenantId, LastBuild>>,
}

impl RollupIndex {
    /// Builds an index over the given collaborators.
    #[must_use]
    pub fn new(
        scan_store: Arc<dyn ScanGraphStore>,
        object_store: Arc<dyn ExternalObjectStore>,
        extractors: ExtractorRegistry,
        cache: Option<Arc<RollupCache>>,
    ) -> Self {
        Self {
            object_store: Arc::clone(&object_store),
            builder: IndexBuilder::new(scan_store, object_store, extractors),
            cache,
            last_build: Mutex::new(HashMap::new()),
        }
    }

    /// Builds the index for a set of repositories (`spec.md` §4.B `Build`).
    ///
    /// # Errors
    ///
    /// Returns [`RollupError::IndexBuild`] when every repository fails or
    /// the aggregate error ratio exceeds 10%.
    pub async fn build(
        &self,
        tenant: TenantId,
        repository_ids: &[RepositoryId],
        options: &BuildOptions,
    ) -> Result<BuildResult, RollupError> {
        let result = self.builder.build(tenant, repository_ids, options).await?;

        if let Some(cache) = &self.cache {
            for &repository_id in repository_ids {
                cache.invalidate_by_tags(&[lookup::repo_tag(tenant, repository_id)]).await;
            }
        }

        self.last_build
            .lock()
            .await
            .insert(tenant, LastBuild { at: Timestamp::new(chrono::Utc::now()), duration_ms: result.processing_time_ms });

        Ok(result)
    }

    /// Looks up entries by normalized external id (`spec.md` §4.B `Lookup`).
    ///
    /// # Errors
    ///
    /// Returns [`RollupError::Lookup`] when `external_id` is empty or
    /// whitespace-only, or on backend failure.
    pub async fn lookup_by_external_id(
        &self,
        tenant: TenantId,
        external_id: &str,
        filter: &ExternalObjectFilter,
    ) -> Result<LookupResult, RollupError> {
        lookup::lookup_by_external_id(&self.object_store, self.cache.as_deref(), tenant, external_id, filter).await
    }

    /// Looks up the references declared by a node within a scan
    /// (`spec.md` §4.B `ReverseLookup`).
    ///
    /// # Errors
    ///
    /// Returns [`RollupError::Lookup`] on backend failure.
    pub async fn reverse_lookup(
        &self,
        tenant: TenantId,
        node_id: NodeId,
        scan_id: ScanId,
    ) -> Result<ReverseResult, RollupError> {
        lookup::reverse_lookup(&self.object_store, self.cache.as_deref(), tenant, node_id, scan_id).await
    }

    /// Deletes entries matching `filter` and invalidates the corresponding
    /// cache entries (`spec.md` §4.B `Invalidate`).
    ///
    /// # Errors
    ///
    /// Returns [`RollupError::Lookup`] on backend failure.
    pub async fn invalidate(&self, tenant: TenantId, filter: &ExternalObjectFilter) -> Result<usize, RollupError> {
        lookup::invalidate(&self.object_store, self.cache.as_deref(), tenant, filter).await
    }

    /// Returns aggregate index statistics for a tenant (`spec.md` §4.B
    /// `Stats`).
    ///
    /// # Errors
    ///
    /// Returns [`RollupError::Lookup`] on backend failure.
    pub async fn stats(&self, tenant: TenantId) -> Result<IndexStats, RollupError> {
        let (total_entries, entries_by_type) = lookup::entry_counts(&self.object_store, tenant).await?;
        let last_build = self.last_build.lock().await.get(&tenant).copied();
        let cache_stats = self.cache.as_ref().map(|cache| cache.stats());

        Ok(IndexStats {
            total_entries,
            entries_by_type,
            cache_hit_ratio: cache_stats.map_or(0.0, |snapshot| snapshot.hit_ratio),
            avg_lookup_time_ms: cache_stats.map_or(0.0, |snapshot| snapshot.avg_get_latency_ms),
            last_build_at: last_build.map(|b| b.at),
            last_build_time_ms: last_build.map(|b| b.duration_ms),
        })
    }
}
