// crates/rollup-index/src/build.rs
// ============================================================================
// Module: External Object Index Build
// Description: spec.md §4.B "Algorithm" and "Build serialization".
// Purpose: Stream nodes from each repository's latest scan through the
//          extractor registry and persist the resulting entries, with
//          concurrent same-repo builds collapsed into one in-flight build.
// Dependencies: rollup-core, rollup-extractors, tokio (sync, time)
// ============================================================================

//! ## Overview
//! A per-`(tenant, repository)` single-flight coordinator, backed by
//! [`tokio::sync::OnceCell`], ensures concurrent `Build` calls for the same
//! repository share one in-flight build instead of racing to rebuild the
//! same data (`spec.md` §4.B "Build serialization").

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use rollup_core::ExternalObjectEntry;
use rollup_core::ExternalObjectStore;
use rollup_core::RepositoryId;
use rollup_core::RollupError;
use rollup_core::ScanGraphStore;
use rollup_core::TenantId;
use rollup_core::Timestamp;
use rollup_extractors::ExtractorRegistry;
use tokio::sync::Mutex;
use tokio::sync::OnceCell;
use tracing::warn;

use crate::types::BuildOptions;
use crate::types::BuildResult;

/// Outcome of building a single repository, before aggregation across the
/// repositories requested by one `Build` call.
#[derive(Debug, Clone, Default)]
struct RepoBuildOutcome {
    /// Nodes streamed from this repository's scan.
    node_count: usize,
    /// Entries successfully persisted.
    created: usize,
    /// Nodes whose extraction or persistence failed.
    errors: usize,
    /// A small sample of node ids that failed.
    sample_error_node_ids: Vec<String>,
    /// Whether the repository had a scan to build from.
    had_scan: bool,
}

/// Maximum sample error node ids retained per repository, bounding
/// diagnostic payload size.
const MAX_SAMPLE_ERRORS: usize = 10;

/// Error ratio above which a build is considered failed, per `spec.md`
/// §4.B "A per-build error ratio above 10% fails the build".
const MAX_ERROR_RATIO: f64 = 0.10;

/// Drives the build algorithm for the external object index (`spec.md`
/// §4.B).
pub struct IndexBuilder {
    /// Source of each repository's latest scan graph.
    scan_store: Arc<dyn ScanGraphStore>,
    /// Destination for extracted entries.
    object_store: Arc<dyn ExternalObjectStore>,
    /// Maps node types to applicable extractors.
    extractors: ExtractorRegistry,
    /// Single-flight coordination per `(tenant, repository)`.
    in_flight: Mutex<HashMap<(TenantId, RepositoryId), Arc<OnceCell<Arc<Result<RepoBuildOutcome, String>>>>>>,
}

impl IndexBuilder {
    /// Builds an index builder over the given collaborators and extractor
    /// registry.
    #[must_use]
    pub fn new(
        scan_store: Arc<dyn ScanGraphStore>,
        object_store: Arc<dyn ExternalObjectStore>,
        extractors: ExtractorRegistry,
    ) -> Self {
        Self { scan_store, object_store, extractors, in_flight: Mutex::new(HashMap::new()) }
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
        let start = Instant::now();
        let mut aggregate = BuildResult::default();
        let mut scans_attempted = 0usize;
        let mut scans_succeeded = 0usize;

        for &repository_id in repository_ids {
            scans_attempted += 1;
            match self.build_repo_coordinated(tenant, repository_id, options).await.as_ref() {
                Ok(outcome) => {
                    if outcome.had_scan {
                        scans_succeeded += 1;
                    }
                    aggregate.node_count += outcome.node_count;
                    aggregate.entry_count += outcome.created;
                    aggregate.error_count += outcome.errors;
                    for id in &outcome.sample_error_node_ids {
                        if aggregate.sample_error_node_ids.len() >= MAX_SAMPLE_ERRORS {
                            break;
                        }
                        aggregate.sample_error_node_ids.push(id.clone());
                    }
                }
                Err(message) => {
                    warn!(%repository_id, error = %message, "repository build failed");
                }
            }
        }

        aggregate.processing_time_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        #[allow(clippy::cast_precision_loss, reason = "node/time counters are far below f64's exact integer range in practice")]
        {
            aggregate.throughput_nodes_per_sec = if aggregate.processing_time_ms == 0 {
                0.0
            } else {
                aggregate.node_count as f64 / (aggregate.processing_time_ms as f64 / 1000.0)
            };
        }

        if scans_attempted > 0 && scans_succeeded == 0 {
            return Err(RollupError::IndexBuild {
                created: aggregate.entry_count,
                errors: aggregate.error_count,
                sample_error_node_ids: aggregate.sample_error_node_ids,
            });
        }

        let total = aggregate.entry_count + aggregate.error_count;
        if total > 0 {
            #[allow(clippy::cast_precision_loss, reason = "entry counters are far below f64's exact integer range in practice")]
            let ratio = aggregate.error_count as f64 / total as f64;
            if ratio > MAX_ERROR_RATIO {
                return Err(RollupError::IndexBuild {
                    created: aggregate.entry_count,
                    errors: aggregate.error_count,
                    sample_error_node_ids: aggregate.sample_error_node_ids,
                });
            }
        }

        Ok(aggregate)
    }

    /// Collapses concurrent builds for the same `(tenant, repository)` pair
    /// into a single in-flight build (`spec.md` §4.B "Build serialization").
    async fn build_repo_coordinated(
        &self,
        tenant: TenantId,
        repository_id: RepositoryId,
        options: &BuildOptions,
    ) -> Arc<Result<RepoBuildOutcome, String>> {
        let key = (tenant, repository_id);
        let cell = {
            let mut in_flight = self.in_flight.lock().await;
            Arc::clone(in_flight.entry(key).or_insert_with(|| Arc::new(OnceCell::new())))
        };

        let outcome = cell
            .get_or_init(|| async move { Arc::new(self.build_repo(tenant, repository_id, options).await) })
            .await;
        let outcome = Arc::clone(outcome);

        // Drop the coordination entry once settled so a later, genuinely
        // sequential `Build` call re-runs rather than replaying a stale
        // result forever.
        self.in_flight.lock().await.remove(&key);
        outcome
    }

    async fn build_repo(
        &self,
        tenant: TenantId,
        repository_id: RepositoryId,
        options: &BuildOptions,
    ) -> Result<RepoBuildOutcome, String> {
        let scan_id = self
            .scan_store
            .get_latest_scan(tenant, repository_id)
            .await
            .map_err(|err| err.to_string())?;
        let Some(scan_id) = scan_id else {
            return Ok(RepoBuildOutcome { had_scan: false, ..RepoBuildOutcome::default() });
        };

        let graph = self.scan_store.get_graph(tenant, scan_id).await.map_err(|err| err.to_string())?;
        let mut outcome = RepoBuildOutcome { had_scan: true, ..RepoBuildOutcome::default() };
        let mut batch: Vec<ExternalObjectEntry> = Vec::with_capacity(options.batch_size);

        for node in graph.nodes.values() {
            if options.max_nodes.is_some_and(|max| outcome.node_count >= max) {
                break;
            }
            outcome.node_count += 1;

            let references = self.extractors.extract_all(node);
            for reference in references {
                let entry = ExternalObjectEntry {
                    id: uuid::Uuid::new_v4().to_string(),
                    external_id: reference.external_id,
                    reference_type: reference.reference_type,
                    normalized_id: reference.normalized_id,
                    tenant,
                    repository_id,
                    scan_id,
                    node_id: node.id,
                    node_name: node.name.clone(),
                    node_type: node.node_type.clone(),
                    file_path: node.file.clone(),
                    components: reference.components,
                    metadata: reference.metadata,
                    indexed_at: Timestamp::new(chrono::Utc::now()),
                };
                batch.push(entry);
                if batch.len() >= options.batch_size {
                    Self::flush_batch(&self.object_store, &mut batch, &mut outcome).await;
                }
            }
        }
        Self::flush_batch(&self.object_store, &mut batch, &mut outcome).await;

        Ok(outcome)
    }

    async fn flush_batch(
        store: &Arc<dyn ExternalObjectStore>,
        batch: &mut Vec<ExternalObjectEntry>,
        outcome: &mut RepoBuildOutcome,
    ) {
        if batch.is_empty() {
            return;
        }
        match store.save_entries(batch).await {
            Ok(saved) => outcome.created += saved,
            Err(err) => {
                outcome.errors += batch.len();
                if outcome.sample_error_node_ids.len() < MAX_SAMPLE_ERRORS {
                    outcome.sample_error_node_ids.push(batch.first().map_or_else(
                        || "unknown".to_string(),
                        |entry| entry.node_id.to_string(),
                    ));
                }
                warn!(error = %err, batch_size = batch.len(), "failed to persist external object batch");
            }
        }
        batch.clear();
    }
}
