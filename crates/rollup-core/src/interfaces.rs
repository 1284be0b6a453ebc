// crates/rollup-core/src/interfaces.rs
// ============================================================================
// Module: Collaborator Interfaces
// Description: spec.md §6 "External interfaces", inbound collaborator
//              contracts.
// Purpose: Let every core subsystem (index, matchers, merge, blast radius,
//          service, orchestrator, cache, events) talk to scan storage, the
//          external object store, the rollup store, the job broker, the
//          blob cache, and the event bus without depending on their
//          implementations.
// Dependencies: async-trait, serde, thiserror, std::collections::BTreeMap
// ============================================================================

//! ## Overview
//! One trait per collaborator, one `thiserror` error enum per trait,
//! `Result` returns, no panics across the boundary.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::external_object::ExternalObjectEntry;
use crate::identifiers::ExecutionId;
use crate::identifiers::NodeId;
use crate::identifiers::RepositoryId;
use crate::identifiers::RollupId;
use crate::identifiers::ScanId;
use crate::identifiers::TenantId;
use crate::merged_node::MergedNode;
use crate::rollup_config::RollupConfig;

// ============================================================================
// SECTION: Scan Graph Store
// ============================================================================

/// A node in a repository's scan graph (`spec.md` §6 "Graph").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Node identifier, unique within its scan.
    pub id: NodeId,
    /// IaC node type (e.g. `aws_s3_bucket`).
    pub node_type: String,
    /// Display name.
    pub name: String,
    /// File path the node was declared in.
    pub file: String,
    /// Starting line number.
    pub line_start: u32,
    /// Ending line number.
    pub line_end: u32,
    /// Free-form scanned attributes (ARNs, resource ids, tags, etc.).
    pub attributes: BTreeMap<String, String>,
}

/// A directed edge between two nodes in a scan graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Edge's source node.
    pub from: NodeId,
    /// Edge's target node.
    pub to: NodeId,
    /// Edge kind (e.g. `"references"`, `"depends_on"`).
    pub kind: &'static str,
}

/// A single repository's scan graph as fetched from the scan store
/// (`spec.md` §6 `Graph{nodes, edges, metadata}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    /// Repository this graph belongs to.
    pub repository_id: RepositoryId,
    /// Scan this graph was produced by.
    pub scan_id: ScanId,
    /// Nodes keyed by id.
    pub nodes: BTreeMap<NodeId, GraphNode>,
    /// Edges.
    pub edges: Vec<GraphEdge>,
    /// Free-form scan metadata (scanner version, timestamp, etc.).
    pub metadata: BTreeMap<String, String>,
}

/// A directed edge between two [`MergedNode`]s, emitted by the merge engine
/// when `MergeOptions.create_cross_repo_edges` is set (`spec.md` §4.D) and
/// traversed by the blast-radius engine's reverse-adjacency BFS
/// (`spec.md` §4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedEdge {
    /// Edge's source merged node.
    pub from: crate::identifiers::MergedNodeId,
    /// Edge's target merged node.
    pub to: crate::identifiers::MergedNodeId,
    /// Edge kind, carried over from the originating scan edge.
    pub kind: &'static str,
    /// Maximum confidence across the edge's contributing endpoint matches.
    pub confidence: u8,
}

/// A merged graph produced by the merge engine, ready for persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedGraph {
    /// Execution that produced this graph.
    pub execution_id: ExecutionId,
    /// Merged nodes.
    pub nodes: Vec<MergedNode>,
    /// Cross-repository edges emitted alongside the merged nodes.
    pub cross_repo_edges: Vec<MergedEdge>,
}

/// Errors surfaced by a [`ScanGraphStore`] implementation.
#[derive(Debug, Error)]
pub enum ScanGraphStoreError {
    /// No scan exists for the requested repository.
    #[error("no scan found for repository {repository_id}")]
    NoScan {
        /// Repository that has no scan.
        repository_id: RepositoryId,
    },
    /// The requested scan graph does not exist or was deleted.
    #[error("scan graph {scan_id} not found")]
    GraphNotFound {
        /// Missing scan id.
        scan_id: ScanId,
    },
    /// The backing store is unavailable or returned a transient failure.
    #[error("scan graph store unavailable: {message}")]
    Unavailable {
        /// Diagnostic detail; never exposed to untrusted callers.
        message: String,
    },
}

/// Collaborator contract for fetching and persisting scan/merged graphs
/// (`spec.md` §6 `ScanGraphStore`).
#[async_trait]
pub trait ScanGraphStore: Send + Sync {
    /// Returns the most recent scan id for a repository, or `None` when the
    /// repository has never been scanned.
    ///
    /// # Errors
    ///
    /// Returns [`ScanGraphStoreError`] on backend failure.
    async fn get_latest_scan(
        &self,
        tenant: TenantId,
        repository_id: RepositoryId,
    ) -> Result<Option<ScanId>, ScanGraphStoreError>;

    /// Returns the full graph for a given scan.
    ///
    /// # Errors
    ///
    /// Returns [`ScanGraphStoreError`] when the scan is missing or the
    /// backend fails.
    async fn get_graph(&self, tenant: TenantId, scan_id: ScanId) -> Result<Graph, ScanGraphStoreError>;

    /// Persists a merged graph produced by an execution.
    ///
    /// # Errors
    ///
    /// Returns [`ScanGraphStoreError`] on backend failure.
    async fn persist_merged_graph(
        &self,
        tenant: TenantId,
        execution_id: ExecutionId,
        merged_graph: &MergedGraph,
    ) -> Result<(), ScanGraphStoreError>;
}

// ============================================================================
// SECTION: External Object Store
// ============================================================================

/// Filter applied to external object lookups and invalidation
/// (`spec.md` §4.B).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalObjectFilter {
    /// Restrict to these repositories, when non-empty.
    pub repository_ids: Vec<RepositoryId>,
    /// Restrict to this scan, when set (`spec.md` §4.B `Invalidate`).
    pub scan_id: Option<ScanId>,
    /// Restrict to this reference type, when set.
    pub reference_type: Option<crate::external_object::ReferenceType>,
}

/// Errors surfaced by an [`ExternalObjectStore`] implementation.
#[derive(Debug, Error)]
pub enum ExternalObjectStoreError {
    /// A lookup argument was rejected (e.g. empty external id).
    #[error("invalid external object query: {message}")]
    InvalidQuery {
        /// Diagnostic detail.
        message: String,
    },
    /// The backing store is unavailable or returned a transient failure.
    #[error("external object store unavailable: {message}")]
    Unavailable {
        /// Diagnostic detail; never exposed to untrusted callers.
        message: String,
    },
}

/// Collaborator contract for the external-object inverted index
/// (`spec.md` §6 `ExternalObjectStore`).
#[async_trait]
pub trait ExternalObjectStore: Send + Sync {
    /// Bulk-inserts entries, returning the count actually persisted.
    ///
    /// # Errors
    ///
    /// Returns [`ExternalObjectStoreError`] on backend failure.
    async fn save_entries(&self, entries: &[ExternalObjectEntry]) -> Result<usize, ExternalObjectStoreError>;

    /// Finds entries by normalized external id.
    ///
    /// # Errors
    ///
    /// Returns [`ExternalObjectStoreError`] when the query is invalid or the
    /// backend fails.
    async fn find_by_external_id(
        &self,
        tenant: TenantId,
        external_id: &str,
        filter: &ExternalObjectFilter,
    ) -> Result<Vec<ExternalObjectEntry>, ExternalObjectStoreError>;

    /// Finds entries for a specific node within a scan.
    ///
    /// # Errors
    ///
    /// Returns [`ExternalObjectStoreError`] on backend failure.
    async fn find_by_node_id(
        &self,
        tenant: TenantId,
        node_id: NodeId,
        scan_id: ScanId,
    ) -> Result<Vec<ExternalObjectEntry>, ExternalObjectStoreError>;

    /// Deletes entries matching a filter, returning the count removed.
    ///
    /// # Errors
    ///
    /// Returns [`ExternalObjectStoreError`] on backend failure.
    async fn delete_entries(
        &self,
        tenant: TenantId,
        filter: &ExternalObjectFilter,
    ) -> Result<usize, ExternalObjectStoreError>;

    /// Returns the total entry count for a tenant.
    ///
    /// # Errors
    ///
    /// Returns [`ExternalObjectStoreError`] on backend failure.
    async fn count_entries(&self, tenant: TenantId) -> Result<u64, ExternalObjectStoreError>;

    /// Returns entry counts for a tenant grouped by reference type.
    ///
    /// # Errors
    ///
    /// Returns [`ExternalObjectStoreError`] on backend failure.
    async fn count_by_type(
        &self,
        tenant: TenantId,
    ) -> Result<BTreeMap<crate::external_object::ReferenceType, u64>, ExternalObjectStoreError>;
}

// ============================================================================
// SECTION: Rollup Store
// ============================================================================

/// Errors surfaced by a [`RollupStore`] implementation.
#[derive(Debug, Error)]
pub enum RollupStoreError {
    /// The requested rollup does not exist for this tenant.
    #[error("rollup {rollup_id} not found")]
    RollupNotFound {
        /// Missing rollup id.
        rollup_id: RollupId,
    },
    /// The requested execution does not exist for this tenant.
    #[error("execution {execution_id} not found")]
    ExecutionNotFound {
        /// Missing execution id.
        execution_id: ExecutionId,
    },
    /// Optimistic concurrency version mismatch.
    #[error("version conflict on rollup {rollup_id}: expected {expected}, found {actual}")]
    VersionConflict {
        /// Rollup in conflict.
        rollup_id: RollupId,
        /// Version the caller supplied.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },
    /// The backing store is unavailable or returned a transient failure.
    #[error("rollup store unavailable: {message}")]
    Unavailable {
        /// Diagnostic detail; never exposed to untrusted callers.
        message: String,
    },
}

/// Collaborator contract for `RollupConfig`/`RollupExecution`/dead-letter
/// persistence (`spec.md` §6 `RollupStore`).
#[async_trait]
pub trait RollupStore: Send + Sync {
    /// Creates a new rollup configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RollupStoreError`] on backend failure.
    async fn create_rollup(&self, rollup: RollupConfig) -> Result<RollupConfig, RollupStoreError>;

    /// Fetches a rollup configuration by id.
    ///
    /// # Errors
    ///
    /// Returns [`RollupStoreError::RollupNotFound`] when absent, or
    /// [`RollupStoreError::Unavailable`] on backend failure.
    async fn get_rollup(&self, tenant: TenantId, rollup_id: RollupId) -> Result<RollupConfig, RollupStoreError>;

    /// Replaces a rollup configuration, enforcing the expected version.
    ///
    /// # Errors
    ///
    /// Returns [`RollupStoreError::VersionConflict`] on a stale write, or
    /// [`RollupStoreError::Unavailable`] on backend failure.
    async fn update_rollup(
        &self,
        rollup: RollupConfig,
        expected_version: u64,
    ) -> Result<RollupConfig, RollupStoreError>;

    /// Deletes a rollup configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RollupStoreError`] on backend failure.
    async fn delete_rollup(&self, tenant: TenantId, rollup_id: RollupId) -> Result<(), RollupStoreError>;

    /// Lists rollups for a tenant.
    ///
    /// # Errors
    ///
    /// Returns [`RollupStoreError`] on backend failure.
    async fn list_rollups(&self, tenant: TenantId) -> Result<Vec<RollupConfig>, RollupStoreError>;

    /// Lists executions still in [`crate::execution::ExecutionStatus::Running`]
    /// for a tenant, used by the orchestrator to resume work after a worker
    /// restart (`spec.md` §4.G "on restart, the orchestrator enumerates
    /// `status=active` executions for the tenant").
    ///
    /// # Errors
    ///
    /// Returns [`RollupStoreError`] on backend failure.
    async fn list_active_executions(
        &self,
        tenant: TenantId,
    ) -> Result<Vec<crate::execution::RollupExecution>, RollupStoreError>;

    /// Persists a new or updated execution record.
    ///
    /// # Errors
    ///
    /// Returns [`RollupStoreError`] on backend failure.
    async fn put_execution(
        &self,
        execution: crate::execution::RollupExecution,
    ) -> Result<crate::execution::RollupExecution, RollupStoreError>;

    /// Fetches an execution record by id.
    ///
    /// # Errors
    ///
    /// Returns [`RollupStoreError::ExecutionNotFound`] when absent, or
    /// [`RollupStoreError::Unavailable`] on backend failure.
    async fn get_execution(
        &self,
        tenant: TenantId,
        execution_id: ExecutionId,
    ) -> Result<crate::execution::RollupExecution, RollupStoreError>;

    /// Persists a dead-letter entry.
    ///
    /// # Errors
    ///
    /// Returns [`RollupStoreError`] on backend failure.
    async fn put_dead_letter(
        &self,
        entry: crate::dead_letter::DeadLetterEntry,
    ) -> Result<crate::dead_letter::DeadLetterEntry, RollupStoreError>;

    /// Lists dead-letter entries for a tenant.
    ///
    /// # Errors
    ///
    /// Returns [`RollupStoreError`] on backend failure.
    async fn list_dead_letters(
        &self,
        tenant: TenantId,
    ) -> Result<Vec<crate::dead_letter::DeadLetterEntry>, RollupStoreError>;
}

// ============================================================================
// SECTION: Job Broker
// ============================================================================

/// Options accepted when enqueueing a job (`spec.md` §4.G "Priority
/// scheduling").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnqueueOptions {
    /// Higher values are dequeued first.
    pub priority: i32,
    /// Delay before the job becomes eligible for dequeue.
    pub delay: Duration,
    /// Maximum retry attempts before dead-lettering.
    pub max_attempts: u32,
}

/// Lifecycle hook fired by the broker as a job progresses
/// (`spec.md` §6 `JobBroker` "per-job event hooks").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEvent {
    /// The job handler returned successfully.
    Completed,
    /// The job handler returned an error and no retries remain.
    Failed,
    /// The job handler returned an error and a retry was scheduled.
    Retrying,
}

/// Errors surfaced by a [`JobBroker`] implementation.
#[derive(Debug, Error)]
pub enum JobBrokerError {
    /// The broker is paused and cannot accept or dequeue jobs.
    #[error("job broker is paused")]
    Paused,
    /// The broker has been closed.
    #[error("job broker is closed")]
    Closed,
    /// The backing queue is unavailable or returned a transient failure.
    #[error("job broker unavailable: {message}")]
    Unavailable {
        /// Diagnostic detail; never exposed to untrusted callers.
        message: String,
    },
}

/// Collaborator contract for the execution job queue (`spec.md` §6
/// `JobBroker`).
#[async_trait]
pub trait JobBroker: Send + Sync {
    /// Enqueues a job payload under the given name.
    ///
    /// # Errors
    ///
    /// Returns [`JobBrokerError`] when the broker is paused, closed, or the
    /// backend fails.
    async fn enqueue(
        &self,
        name: &str,
        payload: Vec<u8>,
        opts: EnqueueOptions,
    ) -> Result<(), JobBrokerError>;

    /// Pauses dequeue; enqueued jobs remain queued.
    ///
    /// # Errors
    ///
    /// Returns [`JobBrokerError`] on backend failure.
    async fn pause(&self) -> Result<(), JobBrokerError>;

    /// Resumes dequeue after [`JobBroker::pause`].
    ///
    /// # Errors
    ///
    /// Returns [`JobBrokerError`] on backend failure.
    async fn resume(&self) -> Result<(), JobBrokerError>;

    /// Closes the broker; no further jobs may be enqueued or dequeued.
    ///
    /// # Errors
    ///
    /// Returns [`JobBrokerError`] on backend failure.
    async fn close(&self) -> Result<(), JobBrokerError>;

    /// Lists dead-lettered job ids for operator inspection.
    ///
    /// # Errors
    ///
    /// Returns [`JobBrokerError`] on backend failure.
    async fn list_dead_letters(&self) -> Result<Vec<String>, JobBrokerError>;

    /// Retries a dead-lettered job by id.
    ///
    /// # Errors
    ///
    /// Returns [`JobBrokerError`] on backend failure.
    async fn retry_dead_letter(&self, job_id: &str) -> Result<(), JobBrokerError>;

    /// Discards a dead-lettered job by id without retrying.
    ///
    /// # Errors
    ///
    /// Returns [`JobBrokerError`] on backend failure.
    async fn discard_dead_letter(&self, job_id: &str) -> Result<(), JobBrokerError>;
}

// ============================================================================
// SECTION: Blob Cache
// ============================================================================

/// Errors surfaced by a [`BlobCache`] implementation.
#[derive(Debug, Error)]
pub enum BlobCacheError {
    /// The backing store is unavailable; callers treat this as a miss, per
    /// `spec.md` §4.H "never fatal".
    #[error("blob cache unavailable: {message}")]
    Unavailable {
        /// Diagnostic detail; never exposed to untrusted callers.
        message: String,
    },
}

/// Collaborator contract for the L2 out-of-process cache (`spec.md` §6
/// `BlobCache`).
#[async_trait]
pub trait BlobCache: Send + Sync {
    /// Fetches a value by key, or `None` on a miss.
    ///
    /// # Errors
    ///
    /// Returns [`BlobCacheError`] on backend failure.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobCacheError>;

    /// Writes a value with an optional TTL.
    ///
    /// # Errors
    ///
    /// Returns [`BlobCacheError`] on backend failure.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), BlobCacheError>;

    /// Deletes every entry carrying any of the given tags.
    ///
    /// # Errors
    ///
    /// Returns [`BlobCacheError`] on backend failure.
    async fn delete_by_tags(&self, tags: &[String]) -> Result<u64, BlobCacheError>;

    /// Deletes every entry whose key matches a glob-style pattern.
    ///
    /// # Errors
    ///
    /// Returns [`BlobCacheError`] on backend failure.
    async fn delete_by_pattern(&self, pattern: &str) -> Result<u64, BlobCacheError>;

    /// Deletes every entry belonging to a tenant.
    ///
    /// # Errors
    ///
    /// Returns [`BlobCacheError`] on backend failure.
    async fn delete_by_tenant(&self, tenant: TenantId) -> Result<u64, BlobCacheError>;
}

// ============================================================================
// SECTION: Event Publisher
// ============================================================================

/// Errors surfaced by an [`EventPublisher`] implementation.
#[derive(Debug, Error)]
pub enum EventPublisherError {
    /// The backing transport is unavailable or returned a transient
    /// failure; per `spec.md` §4.I, publish failures are retried then
    /// dropped, never fatal to the caller.
    #[error("event publisher unavailable: {message}")]
    Unavailable {
        /// Diagnostic detail; never exposed to untrusted callers.
        message: String,
    },
}

/// Collaborator contract for the event bus (`spec.md` §6 `EventPublisher`).
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes a raw message to a channel.
    ///
    /// # Errors
    ///
    /// Returns [`EventPublisherError`] on backend failure.
    async fn publish(&self, channel: &str, message: Vec<u8>) -> Result<(), EventPublisherError>;
}
