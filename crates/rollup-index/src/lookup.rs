// crates/rollup-index/src/lookup.rs
// ============================================================================
// Module: External Object Index Lookup
// Description: spec.md §4.B "Lookup", "ReverseLookup", "Invalidate", "Stats".
// Purpose: Cache-fronted queries and invalidation against the external
//          object store.
// Dependencies: rollup-cache, rollup-core, tokio (time)
// ============================================================================

use std::time::Instant;

use rollup_cache::Keyspace;
use rollup_cache::RollupCache;
use rollup_cache::index_lookup_key;
use rollup_cache::reverse_lookup_key;
use rollup_core::ExternalObjectFilter;
use rollup_core::ExternalObjectStore;
use rollup_core::NodeId;
use rollup_core::ReferenceType;
use rollup_core::RollupError;
use rollup_core::ScanId;
use rollup_core::TenantId;
use std::sync::Arc;

use crate::types::LookupResult;
use crate::types::ReverseResult;

/// Tag used to collapse cache invalidation down to "everything this repo's
/// entries touched" (`spec.md` §4.B "Invalidate the cache keys touched by
/// this build").
#[must_use]
pub fn repo_tag(tenant: TenantId, repository_id: rollup_core::RepositoryId) -> String {
    format!("repo:{tenant}:{repository_id}")
}

/// Looks up entries by normalized external id, consulting cache first
/// (`spec.md` §4.B "Lookup").
///
/// # Errors
///
/// Returns [`RollupError::Lookup`] when `external_id` is empty or
/// whitespace-only.
pub async fn lookup_by_external_id(
    store: &Arc<dyn ExternalObjectStore>,
    cache: Option<&RollupCache>,
    tenant: TenantId,
    external_id: &str,
    filter: &ExternalObjectFilter,
) -> Result<LookupResult, RollupError> {
    if external_id.trim().is_empty() {
        return Err(RollupError::Lookup { message: "externalId must not be empty".to_string() });
    }
    let start = Instant::now();
    let repo_id = filter.repository_ids.first().map(ToString::to_string);
    let key_material = index_lookup_key(tenant, repo_id.as_deref(), external_id);

    if let Some(cache) = cache {
        if let Some(mut entries) = cache.get::<_, Vec<rollup_core::ExternalObjectEntry>>(Keyspace::Index, tenant, &key_material).await
        {
            if let Some(reference_type) = filter.reference_type {
                entries.retain(|entry| entry.reference_type == reference_type);
            }
            return Ok(LookupResult {
                entries,
                from_cache: true,
                lookup_time_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            });
        }
    }

    let entries = store
        .find_by_external_id(tenant, external_id, filter)
        .await
        .map_err(|err| RollupError::Lookup { message: err.to_string() })?;

    if let Some(cache) = cache {
        if !entries.is_empty() {
            let mut tags = vec![format!("tenant:{tenant}")];
            for repository_id in &filter.repository_ids {
                tags.push(repo_tag(tenant, *repository_id));
            }
            cache.set(Keyspace::Index, tenant, &key_material, &entries, None, tags).await;
        }
    }

    Ok(LookupResult { entries, from_cache: false, lookup_time_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX) })
}

/// Looks up the references declared by a single node within a scan
/// (`spec.md` §4.B "ReverseLookup").
///
/// # Errors
///
/// Returns [`RollupError::Lookup`] on backend failure.
pub async fn reverse_lookup(
    store: &Arc<dyn ExternalObjectStore>,
    cache: Option<&RollupCache>,
    tenant: TenantId,
    node_id: NodeId,
    scan_id: ScanId,
) -> Result<ReverseResult, RollupError> {
    let start = Instant::now();
    let key_material = reverse_lookup_key(tenant, Some(&scan_id.to_string()), &node_id.to_string());

    if let Some(cache) = cache {
        if let Some(references) = cache.get::<_, Vec<rollup_core::ExternalObjectEntry>>(Keyspace::Index, tenant, &key_material).await {
            return Ok(ReverseResult {
                references,
                from_cache: true,
                lookup_time_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            });
        }
    }

    let references = store
        .find_by_node_id(tenant, node_id, scan_id)
        .await
        .map_err(|err| RollupError::Lookup { message: err.to_string() })?;

    if let Some(cache) = cache {
        if !references.is_empty() {
            cache
                .set(Keyspace::Index, tenant, &key_material, &references, None, vec![format!("tenant:{tenant}")])
                .await;
        }
    }

    Ok(ReverseResult {
        references,
        from_cache: false,
        lookup_time_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
    })
}

/// Deletes entries matching `filter` from the store and invalidates the
/// corresponding cache entries (`spec.md` §4.B "Invalidate").
///
/// # Errors
///
/// Returns [`RollupError::Lookup`] on backend failure.
pub async fn invalidate(
    store: &Arc<dyn ExternalObjectStore>,
    cache: Option<&RollupCache>,
    tenant: TenantId,
    filter: &ExternalObjectFilter,
) -> Result<usize, RollupError> {
    let removed = store.delete_entries(tenant, filter).await.map_err(|err| RollupError::Lookup { message: err.to_string() })?;

    if let Some(cache) = cache {
        if filter.repository_ids.is_empty() {
            cache.invalidate_tenant(tenant).await;
        } else {
            for repository_id in &filter.repository_ids {
                cache.invalidate_by_tags(&[repo_tag(tenant, *repository_id)]).await;
            }
        }
    }

    Ok(removed)
}

/// Reference-type counts for [`crate::types::IndexStats`], with no cache
/// involvement (`spec.md` §4.B "Stats").
///
/// # Errors
///
/// Returns [`RollupError::Lookup`] on backend failure.
pub async fn entry_counts(
    store: &Arc<dyn ExternalObjectStore>,
    tenant: TenantId,
) -> Result<(u64, std::collections::BTreeMap<ReferenceType, u64>), RollupError> {
    let total = store.count_entries(tenant).await.map_err(|err| RollupError::Lookup { message: err.to_string() })?;
    let by_type = store.count_by_type(tenant).await.map_err(|err| RollupError::Lookup { message: err.to_string() })?;
    Ok((total, by_type))
}
