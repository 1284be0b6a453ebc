// crates/rollup-core/src/merged_node.rs
// ============================================================================
// Module: Merged Nodes
// Description: spec.md §3 "MergedNode".
// Purpose: The output record of the merge engine, and the node type the
//          blast-radius engine traverses.
// Dependencies: serde
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::MergedNodeId;
use crate::identifiers::NodeId;
use crate::identifiers::RepositoryId;
use crate::match_result::MatchStrategy;

/// Free-form merged metadata value; `Union` conflict resolution can turn a
/// scalar into an array, so this is a small closed value type rather than
/// a bare `String`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MergedValue {
    /// A single scalar value.
    Scalar(String),
    /// Multiple distinct values (produced by `Union` conflict resolution).
    Many(Vec<String>),
}

/// A source location contributing to a merged node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeLocation {
    /// Repository the location belongs to.
    pub repo_id: RepositoryId,
    /// File path within the repository.
    pub file: String,
    /// Starting line number.
    pub line_start: u32,
    /// Ending line number.
    pub line_end: u32,
}

/// Provenance summary for a merged node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchInfo {
    /// The highest-confidence strategy that contributed to this merge.
    pub strategy: MatchStrategy,
    /// The confidence of the winning match.
    pub confidence: u8,
    /// Number of matches that contributed to this merged node.
    pub match_count: u32,
}

/// `spec.md` §3 "MergedNode".
///
/// # Invariants
/// - `source_node_ids` and `source_repo_ids` are both non-empty.
/// - `id` is a stable hash of sorted `source_node_ids`
///   (`spec.md` §4.D "Determinism").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedNode {
    /// Stable merged node id.
    pub id: MergedNodeId,
    /// IaC node type of the merged resource.
    pub r#type: String,
    /// Display name of the merged resource.
    pub name: String,
    /// Source node ids that were merged into this node.
    pub source_node_ids: Vec<NodeId>,
    /// Source repository ids that contributed to this node.
    pub source_repo_ids: Vec<RepositoryId>,
    /// Source locations across repositories.
    pub locations: Vec<NodeLocation>,
    /// Conflict-resolved metadata.
    pub metadata: BTreeMap<String, MergedValue>,
    /// Provenance summary.
    pub match_info: MatchInfo,
}
