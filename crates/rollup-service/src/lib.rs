// crates/rollup-service/src/lib.rs
// ============================================================================
// Module: Rollup Service Library
// Description: spec.md §4.F "Rollup Service".
// Purpose: Tenant-scoped CRUD and lifecycle for RollupConfig, validation,
//          optimistic concurrency, and execution dispatch through the
//          orchestrator — the entry point the CLI and any future outer
//          surface drive rollups through.
// Dependencies: rollup-core, rollup-events, rollup-matchers,
//               rollup-orchestrator
// ============================================================================

//! ## Overview
//! [`RollupService`] is the one type outer callers hold onto: it owns
//! nothing but references to its collaborators (a [`rollup_core::RollupStore`],
//! a [`rollup_orchestrator::Orchestrator`], a [`rollup_events::EventBus`])
//! and enforces validation and optimistic concurrency ahead of every write.

pub mod service;
pub mod types;
pub mod validation;

pub use service::RollupService;
pub use service::RollupServiceLimits;
pub use types::CreateRollupInput;
pub use types::ExecuteOptions;
pub use types::Pagination;
pub use types::RollupListFilter;
pub use types::RollupListSort;
pub use types::RollupSortField;
pub use types::UpdateRollupPatch;
pub use validation::validate_merge_options;
pub use validation::validate_rollup_config;
pub use validation::validate_schedule;

use rollup_core::RollupError;
use rollup_core::RollupStoreError;

/// Converts a [`RollupStoreError`] into the shared [`RollupError`]
/// taxonomy, the same mapping `rollup-orchestrator` applies at its own
/// store boundary.
pub(crate) fn store_err(err: RollupStoreError) -> RollupError {
    match err {
        RollupStoreError::RollupNotFound { rollup_id } => RollupError::NotFound { entity: "rollup", id: rollup_id.to_string() },
        RollupStoreError::ExecutionNotFound { execution_id } => {
            RollupError::NotFound { entity: "execution", id: execution_id.to_string() }
        }
        RollupStoreError::VersionConflict { expected, actual, .. } => RollupError::Conflict { expected, actual },
        RollupStoreError::Unavailable { message } => RollupError::Transient { message },
    }
}
