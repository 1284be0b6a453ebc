// crates/rollup-service/src/service.rs
// ============================================================================
// Module: Rollup Service
// Description: spec.md §4.F "Rollup Service" — tenant-scoped CRUD and
//              lifecycle for RollupConfig, plus execution dispatch.
// Purpose: The single entry point callers (the CLI, a future HTTP surface)
//          drive rollup configuration and execution through, enforcing
//          validation and optimistic concurrency ahead of the orchestrator.
// Dependencies: rollup-core, rollup-events, rollup-matchers, rollup-orchestrator
// ============================================================================

use std::sync::Arc;

use rollup_core::CorrelationId;
use rollup_core::EventType;
use rollup_core::ExecutionId;
use rollup_core::RollupConfig;
use rollup_core::RollupError;
use rollup_core::RollupExecution;
use rollup_core::RollupId;
use rollup_core::RollupStatus;
use rollup_core::RollupStore;
use rollup_core::TenantId;
use rollup_core::Timestamp;
use rollup_events::EventBus;
use rollup_orchestrator::Orchestrator;
use serde_json::json;
use tracing::info;
use tracing::instrument;

use crate::types::CreateRollupInput;
use crate::types::ExecuteOptions;
use crate::types::Pagination;
use crate::types::RollupListFilter;
use crate::types::RollupListSort;
use crate::types::RollupSortField;
use crate::types::UpdateRollupPatch;
use crate::validation::validate_rollup_config;

/// Policy limits `RollupService` enforces ahead of persistence
/// (`spec.md` §6 `RollupEngineConfig`, generalized here so this crate does
/// not depend on `rollup-config` for its whole surface, only the two
/// fields validation actually consumes).
#[derive(Debug, Clone, Copy)]
pub struct RollupServiceLimits {
    /// Maximum repositories a single rollup may reference.
    pub max_repositories_per_rollup: u32,
    /// Maximum matchers a single rollup may configure.
    pub max_matchers_per_rollup: u32,
}

impl Default for RollupServiceLimits {
    fn default() -> Self {
        Self { max_repositories_per_rollup: 50, max_matchers_per_rollup: 20 }
    }
}

/// Component F: tenant-scoped CRUD + lifecycle for [`RollupConfig`],
/// validation, optimistic concurrency, and execution dispatch through the
/// [`Orchestrator`] (`spec.md` §4.F).
pub struct RollupService {
    store: Arc<dyn RollupStore>,
    orchestrator: Arc<Orchestrator>,
    events: Arc<EventBus>,
    limits: RollupServiceLimits,
}

impl RollupService {
    /// Builds a rollup service over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn RollupStore>,
        orchestrator: Arc<Orchestrator>,
        events: Arc<EventBus>,
        limits: RollupServiceLimits,
    ) -> Self {
        Self { store, orchestrator, events, limits }
    }

    /// Validates a prospective rollup configuration without persisting it
    /// (`spec.md` §4.F "Validate").
    ///
    /// # Errors
    ///
    /// Returns [`RollupError::Validation`] on the first rule violated.
    pub fn validate(&self, rollup: &RollupConfig) -> Result<(), RollupError> {
        validate_rollup_config(rollup, self.limits.max_repositories_per_rollup, self.limits.max_matchers_per_rollup)
    }

    /// Creates a new rollup configuration (`spec.md` §4.F "Create").
    ///
    /// # Errors
    ///
    /// Returns [`RollupError::Validation`] when `input` fails policy
    /// validation, or whatever the rollup store produces.
    #[instrument(skip(self, input), fields(tenant = %tenant))]
    pub async fn create(&self, tenant: TenantId, input: CreateRollupInput) -> Result<RollupConfig, RollupError> {
        let now = Timestamp::new(chrono::Utc::now());
        let rollup = RollupConfig {
            rollup_id: RollupId::new(),
            tenant,
            name: input.name,
            description: input.description,
            created_by: input.created_by.clone(),
            updated_by: input.created_by,
            repository_ids: input.repository_ids,
            matchers: input.matchers,
            merge_options: input.merge_options,
            schedule: input.schedule,
            status: RollupStatus::Draft,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        self.validate(&rollup)?;

        let created = self.store.create_rollup(rollup).await.map_err(crate::store_err)?;
        info!(rollup_id = %created.rollup_id, "rollup created");
        self.events
            .emit(
                tenant,
                created.rollup_id,
                CorrelationId::new(),
                EventType::RollupCreated,
                json!({ "rollup_id": created.rollup_id.external_id() }),
            )
            .await;
        Ok(created)
    }

    /// Fetches a rollup configuration by id, scoped to `tenant`
    /// (`spec.md` §4.F authorization invariant: a rollup belonging to a
    /// different tenant is reported as [`RollupError::NotFound`], never a
    /// distinguishable authorization error).
    ///
    /// # Errors
    ///
    /// Returns [`RollupError::NotFound`] when absent, or whatever the
    /// rollup store produces.
    pub async fn get(&self, tenant: TenantId, rollup_id: RollupId) -> Result<RollupConfig, RollupError> {
        self.store.get_rollup(tenant, rollup_id).await.map_err(crate::store_err)
    }

    /// Applies a field-level patch to a rollup configuration, enforcing
    /// optimistic concurrency against `expected_version`
    /// (`spec.md` §4.F "Update", §8 invariant 3 "optimistic concurrency via
    /// `version`").
    ///
    /// # Errors
    ///
    /// Returns [`RollupError::Conflict`] when `expected_version` does not
    /// match the stored version, [`RollupError::Validation`] when the
    /// patched configuration fails policy validation, or whatever the
    /// rollup store produces.
    #[instrument(skip(self, patch), fields(tenant = %tenant, %rollup_id))]
    pub async fn update(
        &self,
        tenant: TenantId,
        rollup_id: RollupId,
        expected_version: u64,
        patch: UpdateRollupPatch,
    ) -> Result<RollupConfig, RollupError> {
        let mut rollup = self.get(tenant, rollup_id).await?;
        if rollup.version != expected_version {
            return Err(RollupError::Conflict { expected: expected_version, actual: rollup.version });
        }

        if let Some(name) = patch.name {
            rollup.name = name;
        }
        if let Some(description) = patch.description {
            rollup.description = description;
        }
        if let Some(repository_ids) = patch.repository_ids {
            rollup.repository_ids = repository_ids;
        }
        if let Some(matchers) = patch.matchers {
            rollup.matchers = matchers;
        }
        if let Some(merge_options) = patch.merge_options {
            rollup.merge_options = merge_options;
        }
        if let Some(schedule) = patch.schedule {
            rollup.schedule = schedule;
        }
        if let Some(status) = patch.status {
            rollup.status = status;
        }
        rollup.updated_by = patch.updated_by;
        rollup.updated_at = Timestamp::new(chrono::Utc::now());
        rollup.version += 1;
        self.validate(&rollup)?;

        let updated = self.store.update_rollup(rollup, expected_version).await.map_err(crate::store_err)?;
        info!(rollup_id = %updated.rollup_id, version = updated.version, "rollup updated");
        self.events
            .emit(
                tenant,
                updated.rollup_id,
                CorrelationId::new(),
                EventType::RollupUpdated,
                json!({ "rollup_id": updated.rollup_id.external_id(), "version": updated.version }),
            )
            .await;
        Ok(updated)
    }

    /// Deletes a rollup configuration (`spec.md` §4.F "Delete").
    ///
    /// A rollup with status [`RollupStatus::Executing`] may not be
    /// deleted, to avoid orphaning an in-flight execution
    /// (`spec.md` §3 `RollupStatus::is_deletable`).
    ///
    /// # Errors
    ///
    /// Returns [`RollupError::Validation`] when the rollup is currently
    /// executing, [`RollupError::NotFound`] when absent, or whatever the
    /// rollup store produces.
    #[instrument(skip(self), fields(tenant = %tenant, %rollup_id))]
    pub async fn delete(&self, tenant: TenantId, rollup_id: RollupId) -> Result<(), RollupError> {
        let rollup = self.get(tenant, rollup_id).await?;
        if !rollup.status.is_deletable() {
            return Err(RollupError::Validation { message: "rollup cannot be deleted in its current status".to_string() });
        }
        self.store.delete_rollup(tenant, rollup_id).await.map_err(crate::store_err)?;
        info!(%rollup_id, "rollup deleted");
        self.events
            .emit(
                tenant,
                rollup_id,
                CorrelationId::new(),
                EventType::RollupDeleted,
                json!({ "rollup_id": rollup_id.external_id() }),
            )
            .await;
        Ok(())
    }

    /// Lists rollup configurations for `tenant`, applying a filter, a sort
    /// order, and pagination over the filtered+sorted set
    /// (`spec.md` §4.F "List(filter, sort, pagination)").
    ///
    /// # Errors
    ///
    /// Returns whatever the rollup store produces.
    pub async fn list(
        &self,
        tenant: TenantId,
        filter: &RollupListFilter,
        sort: RollupListSort,
        pagination: Pagination,
    ) -> Result<Vec<RollupConfig>, RollupError> {
        let mut rollups = self.store.list_rollups(tenant).await.map_err(crate::store_err)?;

        rollups.retain(|rollup| {
            if let Some(status) = filter.status {
                if rollup.status != status {
                    return false;
                }
            }
            if let Some(needle) = &filter.name_contains {
                if !rollup.name.to_lowercase().contains(&needle.to_lowercase()) {
                    return false;
                }
            }
            true
        });

        rollups.sort_by(|a, b| {
            let ordering = match sort.field {
                RollupSortField::Name => a.name.cmp(&b.name),
                RollupSortField::CreatedAt => a.created_at.cmp(&b.created_at),
                RollupSortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            };
            if sort.descending {
                ordering.reverse()
            } else {
                ordering
            }
        });

        Ok(rollups.into_iter().skip(pagination.offset).take(pagination.limit).collect())
    }

    /// Enqueues an execution of `rollup_id` (`spec.md` §4.F "Execute").
    ///
    /// # Errors
    ///
    /// Returns [`RollupError::NotFound`] when the rollup does not exist,
    /// [`RollupError::Validation`] when it is not in status
    /// [`RollupStatus::Active`], or whatever the orchestrator produces.
    pub async fn execute(&self, tenant: TenantId, rollup_id: RollupId, options: ExecuteOptions) -> Result<ExecutionId, RollupError> {
        self.orchestrator
            .enqueue_execution(tenant, rollup_id, CorrelationId::new(), options.triggered_by_schedule)
            .await
    }

    /// Fetches the current state of an execution (`spec.md` §4.F
    /// "GetExecutionResult").
    ///
    /// # Errors
    ///
    /// Returns [`RollupError::NotFound`] when absent, or whatever the
    /// rollup store produces.
    pub async fn get_execution_result(&self, tenant: TenantId, execution_id: ExecutionId) -> Result<RollupExecution, RollupError> {
        self.store.get_execution(tenant, execution_id).await.map_err(crate::store_err)
    }

    /// Cancels an in-flight or queued execution (`spec.md` §4.F "Cancel").
    ///
    /// # Errors
    ///
    /// Returns [`RollupError::NotFound`] when the execution does not
    /// exist, [`RollupError::Validation`] when it already reached a
    /// terminal status, or whatever the orchestrator produces.
    pub async fn cancel(&self, tenant: TenantId, execution_id: ExecutionId) -> Result<(), RollupError> {
        self.orchestrator.cancel(tenant, execution_id).await
    }
}
