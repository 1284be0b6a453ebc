// crates/rollup-orchestrator/src/phases.rs
// ============================================================================
// Module: Pipeline Phases
// Description: spec.md §4.G "Execution phases": fetch -> match -> merge ->
//              store -> callback.
// Purpose: One function per phase, each a pluggable step against the
//          collaborator traits in rollup-core, composed into a single
//          dispatch-and-classify pipeline.
// Dependencies: rollup-core, rollup-matchers, rollup-merge, rollup-events,
//               serde_json
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use rollup_core::{
    CorrelationId, EventType, ExecutionId, Graph, GraphEdge, GraphNode, MatchResult, MergedGraph, NodeId, RepositoryId,
    RollupConfig, RollupError, RollupId, ScanGraphStore, TenantId,
};
use rollup_events::EventBus;
use rollup_merge::MergeOutput;
use serde::{Deserialize, Serialize};

use crate::circuit_breaker::CircuitBreakerRegistry;

const SCAN_STORE: &str = "scan_store";

/// Output of the fetch phase: every repository's node set and intra-repo
/// edges, tagged by repository, ready for the match phase.
pub struct FetchOutput {
    /// Every node fetched, keyed by the repository and node it came from.
    pub nodes: BTreeMap<(RepositoryId, NodeId), GraphNode>,
    /// Per-repository node lists, in rollup declaration order, for pairwise
    /// matcher calls.
    pub by_repository: Vec<(RepositoryId, Vec<GraphNode>)>,
    /// Every intra-repository edge, tagged with its owning repository.
    pub edges: Vec<(RepositoryId, GraphEdge)>,
}

/// Fetches the latest scan graph for every repository in `rollup`
/// (`spec.md` §4.G "fetch"), behind the scan-store circuit breaker.
///
/// # Errors
///
/// Returns [`RollupError::NotFound`] when a repository has never been
/// scanned, or whatever the store/breaker produce.
pub async fn fetch(
    tenant: TenantId,
    rollup: &RollupConfig,
    scan_store: &Arc<dyn ScanGraphStore>,
    breakers: &CircuitBreakerRegistry,
) -> Result<FetchOutput, RollupError> {
    let mut nodes = BTreeMap::new();
    let mut by_repository = Vec::with_capacity(rollup.repository_ids.len());
    let mut edges = Vec::new();

    for &repository_id in &rollup.repository_ids {
        let graph = fetch_one(tenant, repository_id, scan_store, breakers).await?;
        let mut repo_nodes = Vec::with_capacity(graph.nodes.len());
        for (node_id, node) in graph.nodes {
            repo_nodes.push(node.clone());
            nodes.insert((repository_id, node_id), node);
        }
        for edge in graph.edges {
            edges.push((repository_id, edge));
        }
        by_repository.push((repository_id, repo_nodes));
    }

    Ok(FetchOutput { nodes, by_repository, edges })
}

async fn fetch_one(
    tenant: TenantId,
    repository_id: RepositoryId,
    scan_store: &Arc<dyn ScanGraphStore>,
    breakers: &CircuitBreakerRegistry,
) -> Result<Graph, RollupError> {
    let run = || async {
        let scan_id = scan_store
            .get_latest_scan(tenant, repository_id)
            .await
            .map_err(|err| RollupError::Execution { phase: "fetch", message: err.to_string(), retryable: true })?
            .ok_or_else(|| RollupError::NotFound { entity: "scan", id: repository_id.to_string() })?;
        scan_store
            .get_graph(tenant, scan_id)
            .await
            .map_err(|err| RollupError::Execution { phase: "fetch", message: err.to_string(), retryable: true })
    };
    match breakers.get(SCAN_STORE) {
        Some(breaker) => breaker.call(run).await,
        None => run().await,
    }
}

/// Runs every configured matcher over every unordered pair of repositories
/// in `fetched`, concatenating the results (`spec.md` §4.G "match"; see
/// `rollup_matchers::run_matchers`'s documented swap-symmetry invariant:
/// callers needing that symmetry literally must call it once per unordered
/// pair, not once per direction).
#[must_use]
pub fn run_match_phase(fetched: &FetchOutput, rollup: &RollupConfig) -> Vec<MatchResult> {
    let mut matches = Vec::new();
    let repos = &fetched.by_repository;
    for i in 0..repos.len() {
        for j in (i + 1)..repos.len() {
            let (source_repo, source_nodes) = &repos[i];
            let (target_repo, target_nodes) = &repos[j];
            matches.extend(rollup_matchers::run_matchers(*source_repo, source_nodes, *target_repo, target_nodes, &rollup.matchers));
        }
    }
    matches
}

/// Merges fetched nodes and match results into `MergedNode`s and
/// cross-repository edges (`spec.md` §4.G "merge").
///
/// # Errors
///
/// Returns [`RollupError::Configuration`] when the component count exceeds
/// `rollup.merge_options.max_nodes`.
pub fn run_merge_phase(fetched: &FetchOutput, matches: &[MatchResult], rollup: &RollupConfig) -> Result<MergeOutput, RollupError> {
    rollup_merge::merge(&fetched.nodes, matches, &fetched.edges, &rollup.repository_ids, &rollup.merge_options)
}

/// Persists the merged graph via [`ScanGraphStore::persist_merged_graph`],
/// behind the scan-store circuit breaker (`spec.md` §4.G "store").
///
/// # Errors
///
/// Returns whatever the store/breaker produce.
pub async fn store(
    tenant: TenantId,
    execution_id: ExecutionId,
    merge_output: &MergeOutput,
    scan_store: &Arc<dyn ScanGraphStore>,
    breakers: &CircuitBreakerRegistry,
) -> Result<(), RollupError> {
    let merged_graph = MergedGraph {
        execution_id,
        nodes: merge_output.nodes.clone(),
        cross_repo_edges: merge_output.cross_repo_edges.clone(),
    };
    let run = || async {
        scan_store
            .persist_merged_graph(tenant, execution_id, &merged_graph)
            .await
            .map_err(|err| RollupError::Execution { phase: "store", message: err.to_string(), retryable: true })
    };
    match breakers.get(SCAN_STORE) {
        Some(breaker) => breaker.call(run).await,
        None => run().await,
    }
}

/// Emits the lifecycle event for a completed phase or finished execution
/// (`spec.md` §4.G "callback"; §4.I "Event Bus Adapter").
pub async fn callback(
    events: &EventBus,
    tenant: TenantId,
    rollup_id: RollupId,
    correlation_id: CorrelationId,
    event_type: EventType,
    payload: serde_json::Value,
) {
    let _event = events.emit(tenant, rollup_id, correlation_id, event_type, payload).await;
}

/// Serializable resume-token payload checkpointed after the match phase
/// (`spec.md` §4.G "Checkpointing"), so a resumed execution can skip
/// re-matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCheckpoint {
    /// Matches produced so far.
    pub matches: Vec<MatchResult>,
}
