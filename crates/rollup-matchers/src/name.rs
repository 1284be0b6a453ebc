// crates/rollup-matchers/src/name.rs
// ============================================================================
// Module: Name Matcher
// Description: spec.md §4.C name confidence rules.
// Purpose: Pure match(sourceSet, targetSet, cfg) -> []MatchResult for the
//          name matcher variant.
// Dependencies: rollup-core, rollup-extractors
// ============================================================================

use rollup_core::GraphNode;
use rollup_core::MatchDetails;
use rollup_core::MatchResult;
use rollup_core::MatchStrategy;
use rollup_core::NameMatcherConfig;
use rollup_core::RepositoryId;
use rollup_extractors::normalize_name;

use crate::fuzzy::levenshtein_ratio;
use crate::glob::glob_match;

const EXACT_BASE_CONFIDENCE: u8 = 80;
const NAMESPACE_BONUS: u8 = 10;
const NAMESPACE_CAP: u8 = 95;

fn namespace_of(node: &GraphNode) -> &str {
    node.attributes.get("namespace").map_or("", String::as_str)
}

/// Confidence for a single source/target name pair, or `None`.
fn confidence_for(cfg: &NameMatcherConfig, source: &GraphNode, target: &GraphNode) -> Option<u8> {
    let source_name = normalize_name(&source.name, cfg.case_sensitive);
    let target_name = normalize_name(&target.name, cfg.case_sensitive);

    if let Some(pattern) = &cfg.pattern {
        let pattern = if cfg.case_sensitive { pattern.clone() } else { pattern.to_lowercase() };
        if !glob_match(&pattern, &source_name) || !glob_match(&pattern, &target_name) {
            return None;
        }
    }

    let namespaces_match = if cfg.include_namespace {
        let source_ns = normalize_name(namespace_of(source), cfg.case_sensitive);
        let target_ns = normalize_name(namespace_of(target), cfg.case_sensitive);
        match &cfg.namespace_pattern {
            Some(pattern) => {
                let pattern = if cfg.case_sensitive { pattern.clone() } else { pattern.to_lowercase() };
                glob_match(&pattern, &source_ns) && glob_match(&pattern, &target_ns)
            }
            None => source_ns == target_ns,
        }
    } else {
        false
    };

    if source_name == target_name {
        let confidence =
            if cfg.include_namespace && namespaces_match { EXACT_BASE_CONFIDENCE + NAMESPACE_BONUS } else { EXACT_BASE_CONFIDENCE };
        return Some(confidence.min(NAMESPACE_CAP));
    }

    if let Some(threshold) = cfg.fuzzy_threshold {
        let ratio = levenshtein_ratio(&source_name, &target_name);
        if ratio >= threshold {
            return Some(ratio);
        }
    }

    None
}

/// Matches two node sets by name (`spec.md` §4.C).
#[must_use]
pub fn match_name(
    source_repo: RepositoryId,
    source: &[GraphNode],
    target_repo: RepositoryId,
    target: &[GraphNode],
    cfg: &NameMatcherConfig,
) -> Vec<MatchResult> {
    let mut results = Vec::new();
    for s in source {
        for t in target {
            let Some(confidence) = confidence_for(cfg, s, t) else { continue };
            results.push(MatchResult {
                source_node_id: s.id,
                source_repo_id: source_repo,
                target_node_id: t.id,
                target_repo_id: target_repo,
                strategy: MatchStrategy::Name,
                confidence,
                details: MatchDetails {
                    matched_attribute: "name".to_string(),
                    source_value: s.name.clone(),
                    target_value: t.name.clone(),
                },
            });
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rollup_core::MatcherCommon;
    use rollup_core::NodeId;

    use super::*;

    fn node(name: &str, namespace: Option<&str>) -> GraphNode {
        let mut attributes = BTreeMap::new();
        if let Some(ns) = namespace {
            attributes.insert("namespace".to_string(), ns.to_string());
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

    fn cfg(include_namespace: bool, fuzzy_threshold: Option<u8>) -> NameMatcherConfig {
        NameMatcherConfig {
            common: MatcherCommon { enabled: true, priority: 10, min_confidence: 0 },
            pattern: None,
            include_namespace,
            namespace_pattern: None,
            case_sensitive: false,
            fuzzy_threshold,
        }
    }

    #[test]
    fn exact_match_scores_80() {
        let source = vec![node("My Bucket", None)];
        let target = vec![node("my   bucket", None)];
        let results = match_name(RepositoryId::new(), &source, RepositoryId::new(), &target, &cfg(false, None));
        assert_eq!(results[0].confidence, 80);
    }

    #[test]
    fn matching_namespace_adds_bonus_capped_at_95() {
        let source = vec![node("bucket", Some("prod"))];
        let target = vec![node("bucket", Some("prod"))];
        let results = match_name(RepositoryId::new(), &source, RepositoryId::new(), &target, &cfg(true, None));
        assert_eq!(results[0].confidence, 90);
    }

    #[test]
    fn fuzzy_match_uses_ratio_as_score() {
        let source = vec![node("bucket", None)];
        let target = vec![node("buckets", None)];
        let results = match_name(RepositoryId::new(), &source, RepositoryId::new(), &target, &cfg(false, Some(50)));
        assert_eq!(results.len(), 1);
        assert!(results[0].confidence >= 50);
    }
}
