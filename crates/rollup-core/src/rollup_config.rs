// crates/rollup-core/src/rollup_config.rs
// ============================================================================
// Module: Rollup Configuration
// Description: spec.md §3 "RollupConfig" and its lifecycle status.
// Purpose: The tenant-owned, versioned configuration record the service
//          manages and the orchestrator executes.
// Dependencies: serde
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::RepositoryId;
use crate::identifiers::RollupId;
use crate::identifiers::TenantId;
use crate::matcher_config::MatcherConfig;
use crate::merge_options::MergeOptions;
use crate::time::Timestamp;

/// Lifecycle status of a [`RollupConfig`] (`spec.md` §3 "Lifecycle &
/// ownership").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollupStatus {
    /// Newly created, not yet activated.
    Draft,
    /// Activated, eligible for execution.
    Active,
    /// An execution is currently in flight.
    Executing,
    /// The most recent execution completed successfully.
    Completed,
    /// The most recent execution failed.
    Failed,
    /// Retired; no longer executable.
    Archived,
}

impl RollupStatus {
    /// Returns whether the rollup may be modified in this status
    /// (`spec.md` §3: modifiable only when draft, active, completed, or
    /// failed).
    #[must_use]
    pub const fn is_modifiable(self) -> bool {
        matches!(self, Self::Draft | Self::Active | Self::Completed | Self::Failed)
    }

    /// Returns whether the rollup may be deleted in this status
    /// (`spec.md` §3: deletable only when draft or archived).
    #[must_use]
    pub const fn is_deletable(self) -> bool {
        matches!(self, Self::Draft | Self::Archived)
    }

    /// Returns whether an active matcher and at least two repositories are
    /// required in this status (`spec.md` §3: not required when draft or
    /// archived).
    #[must_use]
    pub const fn requires_full_validity(self) -> bool {
        !matches!(self, Self::Draft | Self::Archived)
    }
}

/// `spec.md` §3 "RollupConfig".
///
/// # Invariants
/// - `repository_ids.len() >= 2`.
/// - At least one enabled matcher when `status.requires_full_validity()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupConfig {
    /// Globally unique, unguessable identifier.
    pub rollup_id: RollupId,
    /// Owning tenant.
    pub tenant: TenantId,
    /// Display name.
    pub name: String,
    /// Optional free-form description.
    pub description: Option<String>,
    /// Identity of the creator.
    pub created_by: String,
    /// Identity of the last updater.
    pub updated_by: String,
    /// Repositories participating in the rollup (2..N_max).
    pub repository_ids: Vec<RepositoryId>,
    /// Ordered matcher configuration (1..M_max enabled).
    pub matchers: Vec<MatcherConfig>,
    /// Merge behavior configuration.
    pub merge_options: MergeOptions,
    /// Optional 5- or 6-field cron schedule string.
    pub schedule: Option<String>,
    /// Lifecycle status.
    pub status: RollupStatus,
    /// Monotonically increasing optimistic-concurrency version.
    pub version: u64,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Last update timestamp.
    pub updated_at: Timestamp,
}

impl RollupConfig {
    /// Returns whether at least one matcher is enabled.
    #[must_use]
    pub fn has_enabled_matcher(&self) -> bool {
        self.matchers.iter().any(|m| m.common().enabled)
    }

    /// Returns whether the repository count satisfies the "2..N_max"
    /// invariant given an upper bound.
    #[must_use]
    pub fn has_valid_repository_count(&self, max_repositories: usize) -> bool {
        (2..=max_repositories).contains(&self.repository_ids.len())
    }
}
