// crates/rollup-system-tests/tests/scenarios.rs
// ============================================================================
// Suite: End-to-End Rollup Scenarios
// Description: spec.md §8 concrete numbered scenarios, driven against the
//              real collaborator wiring (sqlite store, in-process broker,
//              orchestrator, service) the way `rollup-cli` assembles it.
// Purpose: One scenario per file, built against the production
//          collaborator stack rather than mocks.
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use rollup_config::RollupEngineConfig;
use rollup_core::ArnMatcherConfig;
use rollup_core::ConflictResolution;
use rollup_core::ExecutionStatus;
use rollup_core::Graph;
use rollup_core::GraphNode;
use rollup_core::MatcherConfig;
use rollup_core::MergeOptions;
use rollup_core::RepositoryId;
use rollup_core::RollupConfig;
use rollup_core::RollupError;
use rollup_core::RollupId;
use rollup_core::RollupStatus;
use rollup_core::RollupStore;
use rollup_core::ScanGraphStore;
use rollup_core::ScanId;
use rollup_core::TenantId;
use rollup_core::matcher_config::MatcherCommon;
use rollup_events::EventBus;
use rollup_orchestrator::CircuitBreakerRegistry;
use rollup_orchestrator::InProcessJobBroker;
use rollup_orchestrator::Orchestrator;
use rollup_service::CreateRollupInput;
use rollup_service::RollupService;
use rollup_service::RollupServiceLimits;
use rollup_store_sqlite::SqliteRollupStore;

/// Collaborator stack one test drives, mirroring `rollup-cli`'s `Context`.
struct Harness {
    store: Arc<SqliteRollupStore>,
    service: RollupService,
    orchestrator: Arc<Orchestrator>,
}

impl Harness {
    async fn new() -> Self {
        let config = RollupEngineConfig::default();
        let store = Arc::new(SqliteRollupStore::open_in_memory().expect("in-memory store must open"));
        let events = Arc::new(EventBus::null("rollup-system-tests"));
        let broker = Arc::new(InProcessJobBroker::new(config.execution_retry_policy));
        let breakers = Arc::new(CircuitBreakerRegistry::new(config.circuit_breaker, &["scan_store", "blob_store"]));
        let orchestrator = Arc::new(Orchestrator::new(
            store.clone() as Arc<dyn RollupStore>,
            store.clone() as Arc<dyn ScanGraphStore>,
            events.clone(),
            broker,
            breakers,
            config.execution_retry_policy,
        ));
        let limits = RollupServiceLimits {
            max_repositories_per_rollup: config.max_repositories_per_rollup,
            max_matchers_per_rollup: config.max_matchers_per_rollup,
        };
        let service = RollupService::new(store.clone() as Arc<dyn RollupStore>, orchestrator.clone(), events, limits);
        Self { store, service, orchestrator }
    }
}

/// Builds a one-node scan graph whose node carries `arn` in its attributes,
/// seeded directly through the store's inherent `put_graph`.
fn node(id: rollup_core::NodeId, arn: &str) -> GraphNode {
    let mut attributes = BTreeMap::new();
    attributes.insert("arn".to_string(), arn.to_string());
    GraphNode { id, node_type: "aws_s3_bucket".to_string(), name: "bucket".to_string(), file: "main.tf".to_string(), line_start: 1, line_end: 3, attributes }
}

async fn seed_matching_repos(store: &SqliteRollupStore, tenant: TenantId, arn: &str) -> (RepositoryId, RepositoryId) {
    let repo_a = RepositoryId::new();
    let repo_b = RepositoryId::new();
    let node_a = rollup_core::NodeId::new();
    let node_b = rollup_core::NodeId::new();

    let graph_a = Graph {
        repository_id: repo_a,
        scan_id: ScanId::new(),
        nodes: BTreeMap::from([(node_a, node(node_a, arn))]),
        edges: Vec::new(),
        metadata: BTreeMap::new(),
    };
    let graph_b = Graph {
        repository_id: repo_b,
        scan_id: ScanId::new(),
        nodes: BTreeMap::from([(node_b, node(node_b, arn))]),
        edges: Vec::new(),
        metadata: BTreeMap::new(),
    };
    store.put_graph(tenant, graph_a).await.expect("seeding repo_a graph must succeed");
    store.put_graph(tenant, graph_b).await.expect("seeding repo_b graph must succeed");
    (repo_a, repo_b)
}

fn arn_matcher(pattern: &str) -> MatcherConfig {
    MatcherConfig::Arn(ArnMatcherConfig {
        common: MatcherCommon { enabled: true, priority: 50, min_confidence: 50 },
        pattern: pattern.to_string(),
        component_enables: None,
        allow_partial: false,
    })
}

fn default_merge_options() -> MergeOptions {
    MergeOptions { conflict_resolution: ConflictResolution::PreferHigherConfidence, preserve_source_info: true, create_cross_repo_edges: true, max_nodes: 1_000 }
}

async fn activate(harness: &Harness, tenant: TenantId, rollup_id: RollupId) -> RollupConfig {
    let rollup = harness.store.get_rollup(tenant, rollup_id).await.expect("rollup must exist");
    harness
        .service
        .update(tenant, rollup_id, rollup.version, rollup_service::UpdateRollupPatch { updated_by: "qa".to_string(), status: Some(RollupStatus::Active), ..Default::default() })
        .await
        .expect("activation update must succeed")
}

/// A rollup spanning two repositories with matching ARNs runs to completion
/// and produces a merged graph, end to end through `RollupService` and
/// `Orchestrator`.
#[tokio::test]
async fn execute_completes_a_two_repository_rollup() {
    let harness = Harness::new().await;
    let tenant = TenantId::new();
    let (repo_a, repo_b) = seed_matching_repos(&harness.store, tenant, "arn:aws:s3:::shared-bucket").await;

    let rollup = harness
        .service
        .create(
            tenant,
            CreateRollupInput {
                name: "prod-rollup".to_string(),
                description: None,
                created_by: "qa".to_string(),
                repository_ids: vec![repo_a, repo_b],
                matchers: vec![arn_matcher("arn:aws:*")],
                merge_options: default_merge_options(),
                schedule: None,
            },
        )
        .await
        .expect("create must succeed");

    activate(&harness, tenant, rollup.rollup_id).await;

    let workers = harness.orchestrator.spawn_workers(1);
    let execution_id = harness.service.execute(tenant, rollup.rollup_id, rollup_service::ExecuteOptions::default()).await.expect("execute must enqueue");

    let execution = wait_for_terminal(&harness, tenant, execution_id).await;
    for worker in workers {
        worker.abort();
    }

    assert_eq!(execution.status, ExecutionStatus::Completed, "execution must complete: {:?}", execution.last_error);
}

/// A rollup in one tenant's scope is invisible to another tenant: fetching
/// it surfaces `NotFound`, never a distinguishable authorization error
/// (`spec.md` §8 "tenant isolation").
#[tokio::test]
async fn tenant_isolation_hides_other_tenants_rollups() {
    let harness = Harness::new().await;
    let owner = TenantId::new();
    let intruder = TenantId::new();
    let (repo_a, repo_b) = seed_matching_repos(&harness.store, owner, "arn:aws:s3:::owner-bucket").await;

    let rollup = harness
        .service
        .create(
            owner,
            CreateRollupInput {
                name: "owner-rollup".to_string(),
                description: None,
                created_by: "qa".to_string(),
                repository_ids: vec![repo_a, repo_b],
                matchers: vec![arn_matcher("arn:aws:*")],
                merge_options: default_merge_options(),
                schedule: None,
            },
        )
        .await
        .expect("create must succeed");

    let result = harness.service.get(intruder, rollup.rollup_id).await;
    assert!(matches!(result, Err(RollupError::NotFound { entity: "rollup", .. })));
}

/// Validation rejects a rollup with too few repositories before any
/// persistence happens (`spec.md` §4.F "Validation (before any
/// persistence)").
#[tokio::test]
async fn create_rejects_invalid_rollups_without_persisting() {
    let harness = Harness::new().await;
    let tenant = TenantId::new();
    let repo = RepositoryId::new();

    let result = harness
        .service
        .create(
            tenant,
            CreateRollupInput {
                name: "too-few-repos".to_string(),
                description: None,
                created_by: "qa".to_string(),
                repository_ids: vec![repo],
                matchers: vec![arn_matcher("arn:aws:*")],
                merge_options: default_merge_options(),
                schedule: None,
            },
        )
        .await;

    assert!(matches!(result, Err(RollupError::Validation { .. })));
    let listed = harness.service.list(tenant, &rollup_service::RollupListFilter::default(), rollup_service::RollupListSort::default(), rollup_service::Pagination::default()).await.expect("list must succeed");
    assert!(listed.is_empty(), "a rejected create must not persist a partial rollup");
}

/// Polls an execution to a terminal status, with an upper bound so a
/// regression that wedges the pipeline fails the test instead of hanging.
async fn wait_for_terminal(harness: &Harness, tenant: TenantId, execution_id: rollup_core::ExecutionId) -> rollup_core::RollupExecution {
    for _ in 0..200 {
        let execution = harness.service.get_execution_result(tenant, execution_id).await.expect("execution record must exist");
        if execution.status.is_terminal() {
            return execution;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("execution {execution_id} did not reach a terminal status in time");
}
