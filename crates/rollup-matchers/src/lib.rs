// crates/rollup-matchers/src/lib.rs
// ============================================================================
// Module: Rollup Matchers Library
// Description: Component C — ARN/resource-id/name/tag matchers, confidence
//              rules, deduplication, and matcher-configuration validation.
// Purpose: Given two node sets and an ordered set of matcher configs,
//          produce a single deduplicated, confidence-filtered list of
//          scored MatchResults for the merge engine to consume.
// Dependencies: rollup-core, rollup-extractors
// ============================================================================

//! ## Overview
//! Each matcher variant (`arn`, `resource_id`, `name`, `tag`) is a pure
//! function `match(sourceSet, targetSet, cfg) -> []MatchResult`, exposed in
//! its own module. [`run_matchers`] is the orchestration entry point used by
//! `rollup-service`/`rollup-orchestrator`: it runs every enabled matcher in
//! priority order, drops results below each matcher's `minConfidence`, and
//! deduplicates matches that name the same canonical node pair, keeping the
//! highest-confidence result (`spec.md` §4.C).

pub mod arn;
pub mod fuzzy;
pub mod glob;
pub mod name;
pub mod resource_id;
pub mod tag;
pub mod validate;

use std::collections::BTreeMap;

use rollup_core::GraphNode;
use rollup_core::MatchResult;
use rollup_core::MatcherConfig;
use rollup_core::NodeId;
use rollup_core::RepositoryId;

pub use validate::ValidationError;
pub use validate::has_catastrophic_backtracking_risk;
pub use validate::validate;

/// Canonical `(repoId, nodeId)` pair key used for deduplication, already
/// ordered lexicographically (`spec.md` §4.C "duplicates... deduped").
type CanonicalKey = ((RepositoryId, NodeId), (RepositoryId, NodeId));

/// Runs a single matcher variant against two node sets.
fn run_one(
    source_repo: RepositoryId,
    source: &[GraphNode],
    target_repo: RepositoryId,
    target: &[GraphNode],
    config: &MatcherConfig,
) -> Vec<MatchResult> {
    match config {
        MatcherConfig::Arn(cfg) => arn::match_arn(source_repo, source, target_repo, target, cfg),
        MatcherConfig::ResourceId(cfg) => resource_id::match_resource_id(source_repo, source, target_repo, target, cfg),
        MatcherConfig::Name(cfg) => name::match_name(source_repo, source, target_repo, target, cfg),
        MatcherConfig::Tag(cfg) => tag::match_tag(source_repo, source, target_repo, target, cfg),
    }
}

/// Runs every enabled matcher in `configs` against `source`/`target`, in
/// priority order (descending; ties broken by declaration order), dropping
/// results below each matcher's `minConfidence` and deduplicating matches
/// that name the same canonical node pair (`spec.md` §4.C).
///
/// # Invariants
/// - Output is symmetric under swap of `source`/`target` up to canonical
///   ordering (`spec.md` §8 invariant 3): callers that need the swap
///   symmetry to hold literally should run this once per unordered
///   repository pair, not once per direction.
#[must_use]
pub fn run_matchers(
    source_repo: RepositoryId,
    source: &[GraphNode],
    target_repo: RepositoryId,
    target: &[GraphNode],
    configs: &[MatcherConfig],
) -> Vec<MatchResult> {
    let mut ordered: Vec<(usize, &MatcherConfig)> =
        configs.iter().enumerate().filter(|(_, c)| c.common().enabled).collect();
    ordered.sort_by(|(ia, a), (ib, b)| b.common().priority.cmp(&a.common().priority).then(ia.cmp(ib)));

    let mut winners: BTreeMap<CanonicalKey, (MatchResult, u8)> = BTreeMap::new();
    for (_, cfg) in ordered {
        let min_confidence = cfg.common().min_confidence;
        let priority = cfg.common().priority;
        for result in run_one(source_repo, source, target_repo, target, cfg) {
            if result.confidence < min_confidence {
                continue;
            }
            let key = result.canonical_pair_key();
            match winners.get(&key) {
                Some((existing, existing_priority)) => {
                    let existing_confidence = existing.confidence;
                    if result.confidence > existing_confidence
                        || (result.confidence == existing_confidence && priority > *existing_priority)
                    {
                        winners.insert(key, (result, priority));
                    }
                }
                None => {
                    winners.insert(key, (result, priority));
                }
            }
        }
    }

    winners.into_values().map(|(result, _)| result).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rollup_core::ArnMatcherConfig;
    use rollup_core::MatcherCommon;
    use rollup_core::NameMatcherConfig;

    use super::*;

    fn node(attrs: &[(&str, &str)], name: &str) -> GraphNode {
        let mut attributes = BTreeMap::new();
        for (k, v) in attrs {
            attributes.insert((*k).to_string(), (*v).to_string());
        }
        GraphNode {
            id: NodeId::new(),
            node_type: "aws_s3_bucket".to_string(),
            name: name.to_string(),
            file: "main.tf".to_string(),
            line_start: 1,
            line_end: 1,
            attributes,
        }
    }

    #[test]
    fn higher_priority_matcher_wins_on_tied_confidence() {
        let source = vec![node(&[("arn", "arn:aws:s3:::foo")], "foo")];
        let target = vec![node(&[("arn", "arn:aws:s3:::foo")], "foo")];
        let configs = vec![
            MatcherConfig::Name(NameMatcherConfig {
                common: MatcherCommon { enabled: true, priority: 10, min_confidence: 0 },
                pattern: None,
                include_namespace: false,
                namespace_pattern: None,
                case_sensitive: false,
                fuzzy_threshold: None,
            }),
            MatcherConfig::Arn(ArnMatcherConfig {
                common: MatcherCommon { enabled: true, priority: 90, min_confidence: 0 },
                pattern: "*".to_string(),
                component_enables: None,
                allow_partial: false,
            }),
        ];
        let results = run_matchers(RepositoryId::new(), &source, RepositoryId::new(), &target, &configs);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].confidence, 100);
    }

    #[test]
    fn results_below_min_confidence_are_dropped() {
        let source = vec![node(&[("arn", "arn:aws:s3:::bucket-a")], "bucket-a")];
        let target = vec![node(&[("arn", "arn:aws:lambda:::function-b")], "function-b")];
        let configs = vec![MatcherConfig::Arn(ArnMatcherConfig {
            common: MatcherCommon { enabled: true, priority: 90, min_confidence: 50 },
            pattern: "*".to_string(),
            component_enables: None,
            allow_partial: true,
        })];
        let results = run_matchers(RepositoryId::new(), &source, RepositoryId::new(), &target, &configs);
        assert!(results.is_empty());
    }

    #[test]
    fn disabled_matchers_never_run() {
        let source = vec![node(&[("arn", "arn:aws:s3:::foo")], "foo")];
        let target = vec![node(&[("arn", "arn:aws:s3:::foo")], "foo")];
        let configs = vec![MatcherConfig::Arn(ArnMatcherConfig {
            common: MatcherCommon { enabled: false, priority: 90, min_confidence: 0 },
            pattern: "*".to_string(),
            component_enables: None,
            allow_partial: false,
        })];
        let results = run_matchers(RepositoryId::new(), &source, RepositoryId::new(), &target, &configs);
        assert!(results.is_empty());
    }
}
