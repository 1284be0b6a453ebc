// crates/rollup-service/src/types.rs
// ============================================================================
// Module: Rollup Service Request/Response Types
// Description: spec.md §4.F operations' input and listing shapes.
// Purpose: Give `RollupService` callers typed request shapes instead of
//          threading `RollupConfig`'s internal fields directly.
// Dependencies: rollup-core
// ============================================================================

use rollup_core::MatcherConfig;
use rollup_core::MergeOptions;
use rollup_core::RepositoryId;
use rollup_core::RollupStatus;
use serde::Deserialize;

/// Input to [`crate::RollupService::create`] (`spec.md` §3 "RollupConfig").
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRollupInput {
    /// Display name.
    pub name: String,
    /// Optional free-form description.
    pub description: Option<String>,
    /// Identity of the creator.
    pub created_by: String,
    /// Repositories participating in the rollup.
    pub repository_ids: Vec<RepositoryId>,
    /// Ordered matcher configuration.
    pub matchers: Vec<MatcherConfig>,
    /// Merge behavior configuration.
    pub merge_options: MergeOptions,
    /// Optional 5- or 6-field cron schedule string.
    pub schedule: Option<String>,
}

/// A field-level patch applied by [`crate::RollupService::update`]; `None`
/// leaves the corresponding field unchanged. `Some(None)` on an
/// `Option`-valued field clears it.
#[derive(Debug, Clone, Default)]
pub struct UpdateRollupPatch {
    /// Identity of the updater.
    pub updated_by: String,
    /// Replacement display name.
    pub name: Option<String>,
    /// Replacement description; `Some(None)` clears it.
    pub description: Option<Option<String>>,
    /// Replacement repository set.
    pub repository_ids: Option<Vec<RepositoryId>>,
    /// Replacement matcher configuration.
    pub matchers: Option<Vec<MatcherConfig>>,
    /// Replacement merge options.
    pub merge_options: Option<MergeOptions>,
    /// Replacement schedule; `Some(None)` clears it.
    pub schedule: Option<Option<String>>,
    /// Replacement lifecycle status.
    pub status: Option<RollupStatus>,
}

/// Filter applied by [`crate::RollupService::list`] (`spec.md` §4.F
/// `List(filter, sort, pagination)`).
#[derive(Debug, Clone, Default)]
pub struct RollupListFilter {
    /// Restrict to this lifecycle status, when set.
    pub status: Option<RollupStatus>,
    /// Restrict to rollups whose name contains this substring
    /// (case-insensitive), when set.
    pub name_contains: Option<String>,
}

/// Field a [`RollupListSort`] orders by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RollupSortField {
    /// Sort by display name.
    Name,
    /// Sort by creation time.
    #[default]
    CreatedAt,
    /// Sort by last update time.
    UpdatedAt,
}

/// Sort directive for [`crate::RollupService::list`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RollupListSort {
    /// Field to sort by.
    pub field: RollupSortField,
    /// Whether to sort descending.
    pub descending: bool,
}

/// Pagination directive for [`crate::RollupService::list`].
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    /// Zero-indexed offset into the sorted result set.
    pub offset: usize,
    /// Maximum number of results to return.
    pub limit: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { offset: 0, limit: 100 }
    }
}

/// Options accepted by [`crate::RollupService::execute`] (`spec.md` §4.F
/// `Execute(rollupId, {scanIds?, options?})`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions {
    /// Whether this execution was triggered by an external scheduler
    /// rather than an explicit operator call (`spec.md` §1 Non-goals: "Cron
    /// scheduling of rollups (an external scheduler may invoke `Execute`)").
    pub triggered_by_schedule: bool,
}
