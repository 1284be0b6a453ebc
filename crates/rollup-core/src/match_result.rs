// crates/rollup-core/src/match_result.rs
// ============================================================================
// Module: Match Results
// Description: spec.md §3 "MatchResult".
// Purpose: The scored candidate pair emitted by a matcher and consumed by
//          the merge engine.
// Dependencies: serde
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::NodeId;
use crate::identifiers::RepositoryId;

/// Which matcher produced a [`MatchResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// ARN matcher.
    Arn,
    /// Resource-id matcher.
    ResourceId,
    /// Name matcher.
    Name,
    /// Tag matcher.
    Tag,
}

/// Diagnostic detail describing exactly what matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchDetails {
    /// The attribute that produced the match (e.g. `"arn"`, `"tag:Name"`).
    pub matched_attribute: String,
    /// Source node's value for the matched attribute.
    pub source_value: String,
    /// Target node's value for the matched attribute.
    pub target_value: String,
}

/// `spec.md` §3 "MatchResult".
///
/// # Invariants
/// - Symmetric by swap of `(source, target)`; engines canonicalize by
///   lexicographic ordering of `(repoId, nodeId)` (`spec.md` §8 invariant
///   3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Source node id.
    pub source_node_id: NodeId,
    /// Source repository id.
    pub source_repo_id: RepositoryId,
    /// Target node id.
    pub target_node_id: NodeId,
    /// Target repository id.
    pub target_repo_id: RepositoryId,
    /// Matcher strategy that produced this result.
    pub strategy: MatchStrategy,
    /// Confidence in `[0, 100]`.
    pub confidence: u8,
    /// Diagnostic detail.
    pub details: MatchDetails,
}

impl MatchResult {
    /// Returns the canonical `(repoId, nodeId)` ordering key for the source
    /// endpoint after swap-canonicalization (`spec.md` §3 invariant).
    #[must_use]
    pub fn canonical_pair_key(&self) -> ((RepositoryId, NodeId), (RepositoryId, NodeId)) {
        let a = (self.source_repo_id, self.source_node_id);
        let b = (self.target_repo_id, self.target_node_id);
        if a <= b { (a, b) } else { (b, a) }
    }

    /// Returns a copy of this result with source and target swapped, used
    /// to test the symmetry invariant (`spec.md` §8 invariant 3).
    #[must_use]
    pub fn swapped(&self) -> Self {
        Self {
            source_node_id: self.target_node_id,
            source_repo_id: self.target_repo_id,
            target_node_id: self.source_node_id,
            target_repo_id: self.source_repo_id,
            strategy: self.strategy,
            confidence: self.confidence,
            details: MatchDetails {
                matched_attribute: self.details.matched_attribute.clone(),
                source_value: self.details.target_value.clone(),
                target_value: self.details.source_value.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MatchResult {
        MatchResult {
            source_node_id: NodeId::new(),
            source_repo_id: RepositoryId::new(),
            target_node_id: NodeId::new(),
            target_repo_id: RepositoryId::new(),
            strategy: MatchStrategy::Arn,
            confidence: 100,
            details: MatchDetails {
                matched_attribute: "arn".to_string(),
                source_value: "arn:aws:s3:::foo".to_string(),
                target_value: "arn:aws:s3:::foo".to_string(),
            },
        }
    }

    #[test]
    fn canonical_pair_key_is_stable_under_swap() {
        let result = sample();
        assert_eq!(result.canonical_pair_key(), result.swapped().canonical_pair_key());
    }
}
