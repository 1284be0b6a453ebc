// crates/rollup-core/src/merge_options.rs
// ============================================================================
// Module: Merge Options
// Description: spec.md §3 "MergeOptions".
// Purpose: Configure the merge engine's conflict resolution and edge
//          creation behavior.
// Dependencies: serde
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

/// Conflict resolution strategy for merged metadata (`spec.md` §4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictResolution {
    /// Winning source is the node on the highest-confidence match.
    PreferHigherConfidence,
    /// Winning source is the first repository in `RollupConfig.repositoryIds`.
    PreferFirstSource,
    /// Winning source is the last repository in `RollupConfig.repositoryIds`.
    PreferLastSource,
    /// Take the set of distinct values per key; scalar collisions become
    /// arrays.
    Union,
}

/// `spec.md` §3 "MergeOptions".
///
/// # Invariants
/// - `max_nodes` must be positive (enforced at validation boundaries, not
///   by this type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOptions {
    /// Conflict resolution strategy.
    pub conflict_resolution: ConflictResolution,
    /// Whether to retain which source repository contributed each field.
    pub preserve_source_info: bool,
    /// Whether to emit merged-level cross-repository edges.
    pub create_cross_repo_edges: bool,
    /// Maximum merged node count; exceeding it fails the merge.
    pub max_nodes: u32,
}

impl MergeOptions {
    /// Returns whether `max_nodes` satisfies the "must be positive"
    /// invariant.
    #[must_use]
    pub const fn has_valid_max_nodes(&self) -> bool {
        self.max_nodes > 0
    }
}
