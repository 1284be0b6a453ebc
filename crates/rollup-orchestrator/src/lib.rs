// crates/rollup-orchestrator/src/lib.rs
// ============================================================================
// Module: Execution Orchestrator (Component G)
// Description: spec.md §4.G "Execution Orchestrator".
// Purpose: Ties the job model, circuit breakers, the in-process broker, and
//          the fetch/match/merge/store/callback pipeline into the single
//          entry point rollup-service and rollup-cli drive executions
//          through: enqueue, run to completion with retry and
//          checkpoint-aware resume, cancel, and resume-after-restart.
// Dependencies: rollup-core, rollup-config, rollup-events, rollup-matchers,
//               rollup-merge, rand, serde_json, tokio, tracing
// ============================================================================

//! ## Overview
//! [`Orchestrator`] owns the collaborators an execution needs — the rollup
//! store, the scan graph store, the event bus, the job broker, and the
//! circuit breaker registry — and exposes the operations the rest of the
//! engine drives it through: [`Orchestrator::enqueue_execution`],
//! [`Orchestrator::spawn_workers`], [`Orchestrator::cancel`], and
//! [`Orchestrator::resume_pending`]. Everything else in this crate (`job`,
//! `circuit_breaker`, `broker`, `phases`) is a building block this type
//! assembles.
//!
//! Checkpoint resume (`spec.md` §4.G "Checkpointing"): an execution records
//! a [`rollup_core::PhaseCheckpoint`] after the match phase (so a retried
//! attempt does not recompute matches) and after the store phase (so a
//! retried attempt never re-persists a merged graph it already wrote). The
//! fetch and merge phases are cheap, pure recomputation and are always
//! re-run on retry.

pub mod broker;
pub mod circuit_breaker;
pub mod job;
pub mod phases;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rand::distributions::Alphanumeric;
use rand::Rng;
use rollup_config::RetryPolicyConfig;
use rollup_core::CorrelationId;
use rollup_core::DeadLetterEntry;
use rollup_core::DeadLetterId;
use rollup_core::DlqStatus;
use rollup_core::EnqueueOptions;
use rollup_core::EventType;
use rollup_core::ExecutionId;
use rollup_core::ExecutionPhase;
use rollup_core::ExecutionProgress;
use rollup_core::ExecutionStatus;
use rollup_core::JobBroker;
use rollup_core::JobBrokerError;
use rollup_core::PhaseCheckpoint;
use rollup_core::RollupConfig;
use rollup_core::RollupError;
use rollup_core::RollupExecution;
use rollup_core::RollupId;
use rollup_core::RollupStatus;
use rollup_core::RollupStore;
use rollup_core::RollupStoreError;
use rollup_core::ScanGraphStore;
use rollup_core::TenantId;
use rollup_core::Timestamp;
use rollup_events::EventBus;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::warn;

pub use broker::Handler;
pub use broker::InProcessJobBroker;
pub use broker::JobOutcome;
pub use circuit_breaker::CircuitBreaker;
pub use circuit_breaker::CircuitBreakerRegistry;
pub use job::Job;
pub use job::JobStatus;
pub use phases::FetchOutput;
pub use phases::MatchCheckpoint;

/// Job name every enqueued execution is registered under
/// (`spec.md` §4.G "Job model").
const EXECUTE_JOB_NAME: &str = "rollup.execute";

/// The payload carried by an `rollup.execute` job; small and self
/// contained so a resumed execution need only be looked up again by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct JobPayload {
    tenant: TenantId,
    rollup_id: RollupId,
    execution_id: ExecutionId,
    correlation_id: CorrelationId,
}

struct Inner {
    rollup_store: Arc<dyn RollupStore>,
    scan_store: Arc<dyn ScanGraphStore>,
    events: Arc<EventBus>,
    broker: Arc<InProcessJobBroker>,
    breakers: Arc<CircuitBreakerRegistry>,
    execution_retry: RetryPolicyConfig,
    cancellations: Mutex<HashSet<ExecutionId>>,
}

/// Component G: drives rollup executions through the pipeline described in
/// `spec.md` §4.G, on top of the collaborators in `rollup-core`.
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// Builds an orchestrator over the given collaborators.
    #[must_use]
    pub fn new(
        rollup_store: Arc<dyn RollupStore>,
        scan_store: Arc<dyn ScanGraphStore>,
        events: Arc<EventBus>,
        broker: Arc<InProcessJobBroker>,
        breakers: Arc<CircuitBreakerRegistry>,
        execution_retry: RetryPolicyConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                rollup_store,
                scan_store,
                events,
                broker,
                breakers,
                execution_retry,
                cancellations: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Enqueues a new execution of `rollup_id` for `tenant`
    /// (`spec.md` §4.F "Execute", §4.G "Priority scheduling").
    ///
    /// # Errors
    ///
    /// Returns [`RollupError::NotFound`] when the rollup does not exist,
    /// [`RollupError::Validation`] when it is not in an executable status,
    /// or whatever the rollup store / job broker produce.
    pub async fn enqueue_execution(
        &self,
        tenant: TenantId,
        rollup_id: RollupId,
        correlation_id: CorrelationId,
        triggered_by_schedule: bool,
    ) -> Result<ExecutionId, RollupError> {
        let rollup = self.inner.rollup_store.get_rollup(tenant, rollup_id).await.map_err(store_err)?;
        if rollup.status != RollupStatus::Active {
            return Err(RollupError::Validation { message: "rollup is not in an executable status".to_string() });
        }

        let execution_id = ExecutionId::new();
        let now = Timestamp::new(chrono::Utc::now());
        let execution = RollupExecution {
            execution_id,
            rollup_id,
            tenant,
            status: ExecutionStatus::Pending,
            current_phase: None,
            progress: ExecutionProgress::zero(),
            checkpoints: Vec::new(),
            retry_count: 0,
            last_error: None,
            triggered_by_schedule,
            started_at: now,
            finished_at: None,
        };
        self.inner.rollup_store.put_execution(execution).await.map_err(store_err)?;

        self.schedule_job(tenant, rollup_id, execution_id, correlation_id, Duration::ZERO).await?;

        Ok(execution_id)
    }

    async fn schedule_job(
        &self,
        tenant: TenantId,
        rollup_id: RollupId,
        execution_id: ExecutionId,
        correlation_id: CorrelationId,
        delay: Duration,
    ) -> Result<(), RollupError> {
        let payload = JobPayload { tenant, rollup_id, execution_id, correlation_id };
        let bytes = serde_json::to_vec(&payload)
            .map_err(|err| RollupError::Execution { phase: "fetch", message: err.to_string(), retryable: false })?;
        let opts = EnqueueOptions { priority: 0, delay, max_attempts: self.inner.execution_retry.max_attempts };
        self.inner.broker.enqueue(EXECUTE_JOB_NAME, bytes, opts).await.map_err(broker_err)
    }

    /// Spawns `concurrency` workers draining the job broker and running the
    /// pipeline for each dequeued execution (`spec.md` §4.G "worker pool").
    pub fn spawn_workers(&self, concurrency: usize) -> Vec<JoinHandle<()>> {
        let inner = Arc::clone(&self.inner);
        let handler: Handler = Arc::new(move |payload: Vec<u8>| {
            let inner = Arc::clone(&inner);
            Box::pin(async move { run_attempt(&inner, payload).await })
        });
        self.inner.broker.spawn_workers(concurrency, handler)
    }

    /// Cancels an in-flight or queued execution (`spec.md` §4.F "Cancel").
    ///
    /// # Errors
    ///
    /// Returns [`RollupError::NotFound`] when the execution does not exist,
    /// [`RollupError::Validation`] when it has already reached a terminal
    /// status, or whatever the rollup store produces.
    pub async fn cancel(&self, tenant: TenantId, execution_id: ExecutionId) -> Result<(), RollupError> {
        let mut execution = self.inner.rollup_store.get_execution(tenant, execution_id).await.map_err(store_err)?;
        if execution.status.is_terminal() {
            return Err(RollupError::Validation { message: "execution has already finished".to_string() });
        }
        self.inner.cancellations.lock().await.insert(execution_id);
        execution.status = ExecutionStatus::Cancelled;
        execution.finished_at = Some(Timestamp::new(chrono::Utc::now()));
        let rollup_id = execution.rollup_id;
        self.inner.rollup_store.put_execution(execution).await.map_err(store_err)?;
        self.inner
            .events
            .emit(tenant, rollup_id, CorrelationId::new(), EventType::ExecutionCancelled, json!({ "execution_id": execution_id.external_id() }))
            .await;
        Ok(())
    }

    /// Re-enqueues every execution still [`ExecutionStatus::Running`] for
    /// `tenant`, for a worker restarting after a crash
    /// (`spec.md` §4.G "on restart, the orchestrator enumerates
    /// `status=active` executions for the tenant").
    ///
    /// # Errors
    ///
    /// Returns whatever the rollup store or job broker produce.
    pub async fn resume_pending(&self, tenant: TenantId) -> Result<usize, RollupError> {
        let actives = self.inner.rollup_store.list_active_executions(tenant).await.map_err(store_err)?;
        let mut resumed = 0;
        for execution in actives {
            self.schedule_job(tenant, execution.rollup_id, execution.execution_id, CorrelationId::new(), Duration::ZERO).await?;
            resumed += 1;
        }
        Ok(resumed)
    }
}

fn store_err(err: RollupStoreError) -> RollupError {
    match err {
        RollupStoreError::RollupNotFound { rollup_id } => RollupError::NotFound { entity: "rollup", id: rollup_id.to_string() },
        RollupStoreError::ExecutionNotFound { execution_id } => {
            RollupError::NotFound { entity: "execution", id: execution_id.to_string() }
        }
        RollupStoreError::VersionConflict { expected, actual, .. } => RollupError::Conflict { expected, actual },
        RollupStoreError::Unavailable { message } => RollupError::Transient { message },
    }
}

fn broker_err(err: JobBrokerError) -> RollupError {
    match err {
        JobBrokerError::Paused => RollupError::Transient { message: "job broker is paused".to_string() },
        JobBrokerError::Closed => RollupError::Transient { message: "job broker is closed".to_string() },
        JobBrokerError::Unavailable { message } => RollupError::Transient { message },
    }
}

/// Runs one attempt of an execution's pipeline and classifies the outcome
/// for the broker (`spec.md` §4.G "Retryable vs. terminal failures").
async fn run_attempt(inner: &Arc<Inner>, payload: Vec<u8>) -> JobOutcome {
    let job_payload: JobPayload = match serde_json::from_slice(&payload) {
        Ok(payload) => payload,
        Err(err) => return JobOutcome::Terminal(format!("malformed job payload: {err}")),
    };
    let JobPayload { tenant, rollup_id, execution_id, correlation_id } = job_payload;

    let mut execution = match inner.rollup_store.get_execution(tenant, execution_id).await {
        Ok(execution) => execution,
        Err(err) => return JobOutcome::Terminal(format!("execution record unavailable: {err}")),
    };
    if execution.status.is_terminal() {
        return JobOutcome::Completed;
    }
    if inner.cancellations.lock().await.contains(&execution_id) {
        return JobOutcome::Terminal("cancelled by operator".to_string());
    }

    let rollup = match inner.rollup_store.get_rollup(tenant, rollup_id).await {
        Ok(rollup) => rollup,
        Err(err) => return JobOutcome::Terminal(format!("rollup configuration unavailable: {err}")),
    };

    let attempt_number = execution.retry_count + 1;
    let is_first_attempt = attempt_number == 1;
    execution.status = ExecutionStatus::Running;
    if let Err(err) = inner.rollup_store.put_execution(execution.clone()).await {
        warn!(%execution_id, %err, "failed to persist running status, retrying");
        return JobOutcome::Retryable(err.to_string());
    }

    if is_first_attempt {
        inner
            .events
            .emit(tenant, rollup_id, correlation_id, EventType::ExecutionStarted, json!({ "execution_id": execution_id.external_id() }))
            .await;
    }

    match run_pipeline(inner, tenant, &mut execution, &rollup, correlation_id).await {
        Ok(()) => {
            execution.status = ExecutionStatus::Completed;
            execution.finished_at = Some(Timestamp::new(chrono::Utc::now()));
            let _ = inner.rollup_store.put_execution(execution).await;
            JobOutcome::Completed
        }
        Err(err) => classify_failure(inner, tenant, rollup_id, execution_id, &mut execution, attempt_number, err).await,
    }
}

async fn classify_failure(
    inner: &Arc<Inner>,
    tenant: TenantId,
    rollup_id: RollupId,
    execution_id: ExecutionId,
    execution: &mut RollupExecution,
    attempt_number: u32,
    err: RollupError,
) -> JobOutcome {
    let message = err.to_safe(None).message;
    execution.retry_count = attempt_number;
    execution.last_error = Some(err.to_string());
    let is_last_attempt = attempt_number >= inner.execution_retry.max_attempts;

    if err.is_retryable() && !is_last_attempt {
        execution.status = ExecutionStatus::Running;
        let _ = inner.rollup_store.put_execution(execution.clone()).await;
        return JobOutcome::Retryable(message);
    }

    execution.status = ExecutionStatus::Failed;
    execution.finished_at = Some(Timestamp::new(chrono::Utc::now()));
    let _ = inner.rollup_store.put_execution(execution.clone()).await;

    let now = Timestamp::new(chrono::Utc::now());
    let rand9: String = rand::thread_rng().sample_iter(&Alphanumeric).take(9).map(char::from).collect();
    let epoch_millis = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0);
    let entry = DeadLetterEntry {
        id: DeadLetterId::new(epoch_millis, &rand9),
        execution_id,
        rollup_id,
        tenant,
        phase: execution.current_phase.unwrap_or(ExecutionPhase::Fetch),
        error_message: err.to_string(),
        attempts: attempt_number,
        status: DlqStatus::Pending,
        created_at: now,
        updated_at: now,
    };
    if let Err(put_err) = inner.rollup_store.put_dead_letter(entry).await {
        warn!(%execution_id, %put_err, "failed to persist dead-letter entry");
    }

    inner
        .events
        .emit(tenant, rollup_id, CorrelationId::new(), EventType::ExecutionFailed, json!({ "execution_id": execution_id.external_id(), "message": message }))
        .await;
    JobOutcome::Terminal(err.to_string())
}

/// Runs whichever phases have not already been checkpointed, skipping the
/// match phase when a checkpoint already holds its results and skipping
/// straight to the callback when the store phase already completed.
async fn run_pipeline(
    inner: &Arc<Inner>,
    tenant: TenantId,
    execution: &mut RollupExecution,
    rollup: &RollupConfig,
    correlation_id: CorrelationId,
) -> Result<(), RollupError> {
    let already_stored = execution.checkpoints.iter().any(|checkpoint| checkpoint.phase == ExecutionPhase::Store);

    if !already_stored {
        let fetched = phases::fetch(tenant, rollup, &inner.scan_store, &inner.breakers).await?;
        execution.current_phase = Some(ExecutionPhase::Fetch);
        execution.progress.repositories_total = u32::try_from(fetched.by_repository.len()).unwrap_or(u32::MAX);
        execution.progress.repositories_processed = execution.progress.repositories_total;
        persist_progress(inner, execution).await;
        emit_phase_event(inner, tenant, rollup.rollup_id, correlation_id, ExecutionPhase::Fetch).await;

        let matches = match checkpointed_matches(execution) {
            Some(matches) => matches,
            None => {
                let matches = phases::run_match_phase(&fetched, rollup);
                checkpoint_matches(execution, &matches);
                execution.progress.nodes_matched = u32::try_from(matches.len()).unwrap_or(u32::MAX);
                persist_progress(inner, execution).await;
                emit_phase_event(inner, tenant, rollup.rollup_id, correlation_id, ExecutionPhase::Match).await;
                matches
            }
        };

        let merge_output = phases::run_merge_phase(&fetched, &matches, rollup)?;
        execution.current_phase = Some(ExecutionPhase::Merge);
        execution.progress.nodes_merged = u32::try_from(merge_output.nodes.len()).unwrap_or(u32::MAX);
        execution.checkpoints.push(PhaseCheckpoint {
            phase: ExecutionPhase::Merge,
            resume_token: merge_output.nodes.len().to_string(),
            recorded_at: Timestamp::new(chrono::Utc::now()),
        });
        persist_progress(inner, execution).await;
        emit_phase_event(inner, tenant, rollup.rollup_id, correlation_id, ExecutionPhase::Merge).await;

        phases::store(tenant, execution.execution_id, &merge_output, &inner.scan_store, &inner.breakers).await?;
        execution.current_phase = Some(ExecutionPhase::Store);
        execution.checkpoints.push(PhaseCheckpoint {
            phase: ExecutionPhase::Store,
            resume_token: "stored".to_string(),
            recorded_at: Timestamp::new(chrono::Utc::now()),
        });
        persist_progress(inner, execution).await;
        emit_phase_event(inner, tenant, rollup.rollup_id, correlation_id, ExecutionPhase::Store).await;
    }

    phases::callback(
        &inner.events,
        tenant,
        rollup.rollup_id,
        correlation_id,
        EventType::ExecutionCompleted,
        json!({ "execution_id": execution.execution_id.external_id() }),
    )
    .await;
    execution.current_phase = Some(ExecutionPhase::Callback);
    execution.checkpoints.push(PhaseCheckpoint {
        phase: ExecutionPhase::Callback,
        resume_token: String::new(),
        recorded_at: Timestamp::new(chrono::Utc::now()),
    });
    Ok(())
}

fn checkpointed_matches(execution: &RollupExecution) -> Option<Vec<rollup_core::MatchResult>> {
    let checkpoint = execution.checkpoints.iter().find(|checkpoint| checkpoint.phase == ExecutionPhase::Match)?;
    serde_json::from_str::<MatchCheckpoint>(&checkpoint.resume_token).ok().map(|checkpoint| checkpoint.matches)
}

fn checkpoint_matches(execution: &mut RollupExecution, matches: &[rollup_core::MatchResult]) {
    let resume_token = serde_json::to_string(&MatchCheckpoint { matches: matches.to_vec() }).unwrap_or_default();
    execution.checkpoints.push(PhaseCheckpoint {
        phase: ExecutionPhase::Match,
        resume_token,
        recorded_at: Timestamp::new(chrono::Utc::now()),
    });
}

async fn persist_progress(inner: &Arc<Inner>, execution: &RollupExecution) {
    if let Err(err) = inner.rollup_store.put_execution(execution.clone()).await {
        warn!(execution_id = %execution.execution_id, %err, "failed to persist execution progress");
    }
}

async fn emit_phase_event(inner: &Arc<Inner>, tenant: TenantId, rollup_id: RollupId, correlation_id: CorrelationId, phase: ExecutionPhase) {
    phases::callback(
        &inner.events,
        tenant,
        rollup_id,
        correlation_id,
        EventType::ExecutionProgress,
        json!({ "phase": format!("{phase:?}") }),
    )
    .await;
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::collections::HashMap;

    use async_trait::async_trait;
    use rollup_core::Graph;
    use rollup_core::GraphNode;
    use rollup_core::MergedGraph;
    use rollup_core::MergeOptions;
    use rollup_core::NodeId;
    use rollup_core::RepositoryId;
    use rollup_core::ScanGraphStoreError;
    use rollup_core::ScanId;
    use tokio::sync::Mutex as AsyncMutex;

    use super::*;

    struct FakeScanStore {
        graphs: HashMap<RepositoryId, Graph>,
    }

    #[async_trait]
    impl ScanGraphStore for FakeScanStore {
        async fn get_latest_scan(&self, _tenant: TenantId, repository_id: RepositoryId) -> Result<Option<ScanId>, ScanGraphStoreError> {
            Ok(self.graphs.get(&repository_id).map(|graph| graph.scan_id))
        }

        async fn get_graph(&self, _tenant: TenantId, scan_id: ScanId) -> Result<Graph, ScanGraphStoreError> {
            self.graphs
                .values()
                .find(|graph| graph.scan_id == scan_id)
                .cloned()
                .ok_or(ScanGraphStoreError::GraphNotFound { scan_id })
        }

        async fn persist_merged_graph(
            &self,
            _tenant: TenantId,
            _execution_id: ExecutionId,
            _merged_graph: &MergedGraph,
        ) -> Result<(), ScanGraphStoreError> {
            Ok(())
        }
    }

    struct FakeRollupStore {
        rollups: AsyncMutex<HashMap<RollupId, RollupConfig>>,
        executions: AsyncMutex<HashMap<ExecutionId, RollupExecution>>,
        dead_letters: AsyncMutex<Vec<DeadLetterEntry>>,
    }

    #[async_trait]
    impl RollupStore for FakeRollupStore {
        async fn create_rollup(&self, rollup: RollupConfig) -> Result<RollupConfig, RollupStoreError> {
            self.rollups.lock().await.insert(rollup.rollup_id, rollup.clone());
            Ok(rollup)
        }
        async fn get_rollup(&self, _tenant: TenantId, rollup_id: RollupId) -> Result<RollupConfig, RollupStoreError> {
            self.rollups.lock().await.get(&rollup_id).cloned().ok_or(RollupStoreError::RollupNotFound { rollup_id })
        }
        async fn update_rollup(&self, rollup: RollupConfig, _expected_version: u64) -> Result<RollupConfig, RollupStoreError> {
            self.rollups.lock().await.insert(rollup.rollup_id, rollup.clone());
            Ok(rollup)
        }
        async fn delete_rollup(&self, _tenant: TenantId, rollup_id: RollupId) -> Result<(), RollupStoreError> {
            self.rollups.lock().await.remove(&rollup_id);
            Ok(())
        }
        async fn list_rollups(&self, _tenant: TenantId) -> Result<Vec<RollupConfig>, RollupStoreError> {
            Ok(self.rollups.lock().await.values().cloned().collect())
        }
        async fn list_active_executions(&self, tenant: TenantId) -> Result<Vec<RollupExecution>, RollupStoreError> {
            Ok(self
                .executions
                .lock()
                .await
                .values()
                .filter(|execution| execution.tenant == tenant && execution.status == ExecutionStatus::Running)
                .cloned()
                .collect())
        }
        async fn put_execution(&self, execution: RollupExecution) -> Result<RollupExecution, RollupStoreError> {
            self.executions.lock().await.insert(execution.execution_id, execution.clone());
            Ok(execution)
        }
        async fn get_execution(&self, _tenant: TenantId, execution_id: ExecutionId) -> Result<RollupExecution, RollupStoreError> {
            self.executions.lock().await.get(&execution_id).cloned().ok_or(RollupStoreError::ExecutionNotFound { execution_id })
        }
        async fn put_dead_letter(&self, entry: DeadLetterEntry) -> Result<DeadLetterEntry, RollupStoreError> {
            self.dead_letters.lock().await.push(entry.clone());
            Ok(entry)
        }
        async fn list_dead_letters(&self, tenant: TenantId) -> Result<Vec<DeadLetterEntry>, RollupStoreError> {
            Ok(self.dead_letters.lock().await.iter().filter(|entry| entry.tenant == tenant).cloned().collect())
        }
    }

    fn node(id: NodeId, name: &str, attributes: BTreeMap<String, String>) -> GraphNode {
        GraphNode { id, node_type: "aws::s3::bucket".to_string(), name: name.to_string(), file: "main.tf".to_string(), line_start: 1, line_end: 2, attributes }
    }

    fn build_fixture() -> (Arc<FakeRollupStore>, Arc<FakeScanStore>, RollupId, TenantId) {
        let tenant = TenantId::new();
        let repo_a = RepositoryId::new();
        let repo_b = RepositoryId::new();
        let mut attrs_a = BTreeMap::new();
        attrs_a.insert("arn".to_string(), "arn:aws:s3:::shared-bucket".to_string());
        let mut attrs_b = attrs_a.clone();
        attrs_b.insert("arn".to_string(), "arn:aws:s3:::shared-bucket".to_string());
        let scan_a = ScanId::new();
        let scan_b = ScanId::new();
        let mut nodes_a = BTreeMap::new();
        let node_a_id = NodeId::new();
        nodes_a.insert(node_a_id, node(node_a_id, "bucket-a", attrs_a));
        let mut nodes_b = BTreeMap::new();
        let node_b_id = NodeId::new();
        nodes_b.insert(node_b_id, node(node_b_id, "bucket-b", attrs_b));

        let mut graphs = HashMap::new();
        graphs.insert(repo_a, Graph { repository_id: repo_a, scan_id: scan_a, nodes: nodes_a, edges: Vec::new(), metadata: BTreeMap::new() });
        graphs.insert(repo_b, Graph { repository_id: repo_b, scan_id: scan_b, nodes: nodes_b, edges: Vec::new(), metadata: BTreeMap::new() });
        let scan_store = Arc::new(FakeScanStore { graphs });

        let matcher = rollup_core::MatcherConfig::Arn(rollup_core::ArnMatcherConfig {
            common: rollup_core::MatcherCommon { enabled: true, priority: 10, min_confidence: 50 },
            pattern: "*".to_string(),
            component_enables: None,
            allow_partial: false,
        });
        let rollup_id = RollupId::new();
        let now = Timestamp::new(chrono::Utc::now());
        let rollup = RollupConfig {
            rollup_id,
            tenant,
            name: "fixture".to_string(),
            description: None,
            created_by: "tester".to_string(),
            updated_by: "tester".to_string(),
            repository_ids: vec![repo_a, repo_b],
            matchers: vec![matcher],
            merge_options: MergeOptions { conflict_resolution: rollup_core::ConflictResolution::Union, preserve_source_info: true, create_cross_repo_edges: true, max_nodes: 1000 },
            schedule: None,
            status: RollupStatus::Active,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        let rollup_store = Arc::new(FakeRollupStore {
            rollups: AsyncMutex::new(HashMap::from([(rollup_id, rollup)])),
            executions: AsyncMutex::new(HashMap::new()),
            dead_letters: AsyncMutex::new(Vec::new()),
        });
        (rollup_store, scan_store, rollup_id, tenant)
    }

    #[tokio::test]
    async fn enqueue_and_run_completes_an_execution() {
        let (rollup_store, scan_store, rollup_id, tenant) = build_fixture();
        let events = Arc::new(EventBus::null("rollup-orchestrator"));
        let broker = Arc::new(InProcessJobBroker::new(RetryPolicyConfig { max_attempts: 3, base_delay_ms: 5, backoff_multiplier: 2.0, max_delay_ms: 50, jitter_factor: 0.0, timeout_ms: 1000 }));
        let breakers = Arc::new(CircuitBreakerRegistry::new(
            rollup_config::CircuitBreakerConfig { failure_threshold: 3, success_threshold: 1, reset_timeout_ms: 1000, failure_window_ms: 60_000 },
            &["scan_store", "blob_store"],
        ));
        let orchestrator = Orchestrator::new(
            rollup_store.clone(),
            scan_store,
            events,
            broker,
            breakers,
            RetryPolicyConfig { max_attempts: 3, base_delay_ms: 5, backoff_multiplier: 2.0, max_delay_ms: 50, jitter_factor: 0.0, timeout_ms: 1000 },
        );
        let handles = orchestrator.spawn_workers(1);

        let execution_id = orchestrator.enqueue_execution(tenant, rollup_id, CorrelationId::new(), false).await.expect("enqueue succeeds");
        tokio::time::sleep(Duration::from_millis(100)).await;

        let execution = rollup_store.get_execution(tenant, execution_id).await.expect("execution exists");
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert!(execution.checkpoints.iter().any(|checkpoint| checkpoint.phase == ExecutionPhase::Store));

        for handle in handles {
            handle.abort();
        }
    }

    #[tokio::test]
    async fn cancel_marks_execution_cancelled_before_it_runs() {
        let (rollup_store, scan_store, rollup_id, tenant) = build_fixture();
        let events = Arc::new(EventBus::null("rollup-orchestrator"));
        let retry = RetryPolicyConfig { max_attempts: 3, base_delay_ms: 5, backoff_multiplier: 2.0, max_delay_ms: 50, jitter_factor: 0.0, timeout_ms: 1000 };
        let broker = Arc::new(InProcessJobBroker::new(retry));
        let breakers = Arc::new(CircuitBreakerRegistry::new(
            rollup_config::CircuitBreakerConfig { failure_threshold: 3, success_threshold: 1, reset_timeout_ms: 1000, failure_window_ms: 60_000 },
            &["scan_store", "blob_store"],
        ));
        let orchestrator = Orchestrator::new(rollup_store.clone(), scan_store, events, broker, breakers, retry);

        let execution_id = orchestrator.enqueue_execution(tenant, rollup_id, CorrelationId::new(), false).await.expect("enqueue succeeds");
        orchestrator.cancel(tenant, execution_id).await.expect("cancel succeeds");

        let execution = rollup_store.get_execution(tenant, execution_id).await.expect("execution exists");
        assert_eq!(execution.status, ExecutionStatus::Cancelled);
        assert!(orchestrator.cancel(tenant, execution_id).await.is_err());
    }
}
