// crates/rollup-matchers/src/tag.rs
// ============================================================================
// Module: Tag Matcher
// Description: spec.md §4.C tag confidence rules.
// Purpose: Pure match(sourceSet, targetSet, cfg) -> []MatchResult for the
//          tag matcher variant.
// Dependencies: rollup-core, rollup-extractors
// ============================================================================

use rollup_core::GraphNode;
use rollup_core::MatchDetails;
use rollup_core::MatchResult;
use rollup_core::MatchStrategy;
use rollup_core::RepositoryId;
use rollup_core::TagMatchMode;
use rollup_core::TagMatcherConfig;
use rollup_core::TagRequirement;
use rollup_extractors::normalize_tag_value_for_pattern_match;

use crate::glob::glob_match;

const ALL_MATCH_CONFIDENCE: i16 = 85;
const ANY_MATCH_CONFIDENCE: i16 = 70;
const PATTERN_PENALTY: i16 = 5;

/// The tag key attribute prefix nodes carry scanned tags under, e.g.
/// `tag:Name` (`spec.md` §4.C).
const TAG_ATTRIBUTE_PREFIX: &str = "tag:";

fn tag_value<'a>(node: &'a GraphNode, key: &str) -> Option<&'a str> {
    node.attributes.get(&format!("{TAG_ATTRIBUTE_PREFIX}{key}")).map(String::as_str)
}

/// Whether a single requirement is satisfied by both nodes, and whether a
/// `valuePattern` penalty applies.
fn requirement_outcome(requirement: &TagRequirement, source: &GraphNode, target: &GraphNode) -> Option<bool> {
    let source_value = tag_value(source, &requirement.key)?;
    let target_value = tag_value(target, &requirement.key)?;

    if let Some(exact) = &requirement.value {
        return Some(source_value == exact && target_value == exact);
    }

    if let Some(pattern) = &requirement.value_pattern {
        let normalized_pattern = normalize_tag_value_for_pattern_match(pattern);
        let source_normalized = normalize_tag_value_for_pattern_match(source_value);
        let target_normalized = normalize_tag_value_for_pattern_match(target_value);
        return Some(
            glob_match(&normalized_pattern, &source_normalized) && glob_match(&normalized_pattern, &target_normalized),
        );
    }

    Some(source_value == target_value)
}

fn confidence_for(cfg: &TagMatcherConfig, source: &GraphNode, target: &GraphNode) -> Option<u8> {
    let ignored: Vec<&str> = cfg.ignore_tags.as_deref().unwrap_or(&[]).iter().map(String::as_str).collect();
    let mut any_pattern_used = false;
    let mut outcomes: Vec<bool> = Vec::with_capacity(cfg.required_tags.len());

    for requirement in &cfg.required_tags {
        if ignored.contains(&requirement.key.as_str()) {
            continue;
        }
        if requirement.value_pattern.is_some() {
            any_pattern_used = true;
        }
        match requirement_outcome(requirement, source, target) {
            Some(outcome) => outcomes.push(outcome),
            None => outcomes.push(false),
        }
    }

    if outcomes.is_empty() {
        return None;
    }

    let satisfied = match cfg.match_mode {
        TagMatchMode::All => outcomes.iter().all(|outcome| *outcome),
        TagMatchMode::Any => outcomes.iter().any(|outcome| *outcome),
    };
    if !satisfied {
        return None;
    }

    let base = match cfg.match_mode {
        TagMatchMode::All => ALL_MATCH_CONFIDENCE,
        TagMatchMode::Any => ANY_MATCH_CONFIDENCE,
    };
    let penalized = if any_pattern_used { base - PATTERN_PENALTY } else { base };
    Some(u8::try_from(penalized.clamp(0, 100)).unwrap_or(0))
}

/// Matches two node sets by tags (`spec.md` §4.C).
#[must_use]
pub fn match_tag(
    source_repo: RepositoryId,
    source: &[GraphNode],
    target_repo: RepositoryId,
    target: &[GraphNode],
    cfg: &TagMatcherConfig,
) -> Vec<MatchResult> {
    let mut results = Vec::new();
    for s in source {
        for t in target {
            let Some(confidence) = confidence_for(cfg, s, t) else { continue };
            let matched_keys: Vec<&str> = cfg.required_tags.iter().map(|r| r.key.as_str()).collect();
            results.push(MatchResult {
                source_node_id: s.id,
                source_repo_id: source_repo,
                target_node_id: t.id,
                target_repo_id: target_repo,
                strategy: MatchStrategy::Tag,
                confidence,
                details: MatchDetails {
                    matched_attribute: format!("tags:{}", matched_keys.join(",")),
                    source_value: matched_keys
                        .iter()
                        .filter_map(|k| tag_value(s, k))
                        .collect::<Vec<_>>()
                        .join(","),
                    target_value: matched_keys
                        .iter()
                        .filter_map(|k| tag_value(t, k))
                        .collect::<Vec<_>>()
                        .join(","),
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

    fn node(tags: &[(&str, &str)]) -> GraphNode {
        let mut attributes = BTreeMap::new();
        for (k, v) in tags {
            attributes.insert(format!("tag:{k}"), (*v).to_string());
        }
        GraphNode {
            id: NodeId::new(),
            node_type: "aws_s3_bucket".to_string(),
            name: "bucket".to_string(),
            file: "main.tf".to_string(),
            line_start: 1,
            line_end: 1,
            attributes,
        }
    }

    fn cfg(mode: TagMatchMode, requirements: Vec<TagRequirement>) -> TagMatcherConfig {
        TagMatcherConfig {
            common: MatcherCommon { enabled: true, priority: 10, min_confidence: 0 },
            required_tags: requirements,
            match_mode: mode,
            ignore_tags: None,
        }
    }

    #[test]
    fn all_mode_requires_every_tag_to_match() {
        let source = vec![node(&[("env", "prod"), ("team", "infra")])];
        let target = vec![node(&[("env", "prod"), ("team", "infra")])];
        let requirements = vec![
            TagRequirement { key: "env".to_string(), value: None, value_pattern: None },
            TagRequirement { key: "team".to_string(), value: None, value_pattern: None },
        ];
        let results =
            match_tag(RepositoryId::new(), &source, RepositoryId::new(), &target, &cfg(TagMatchMode::All, requirements));
        assert_eq!(results[0].confidence, 85);
    }

    #[test]
    fn any_mode_succeeds_with_one_matching_tag() {
        let source = vec![node(&[("env", "prod"), ("team", "a")])];
        let target = vec![node(&[("env", "prod"), ("team", "b")])];
        let requirements = vec![
            TagRequirement { key: "env".to_string(), value: None, value_pattern: None },
            TagRequirement { key: "team".to_string(), value: None, value_pattern: None },
        ];
        let results =
            match_tag(RepositoryId::new(), &source, RepositoryId::new(), &target, &cfg(TagMatchMode::Any, requirements));
        assert_eq!(results[0].confidence, 70);
    }

    #[test]
    fn value_pattern_applies_a_penalty() {
        let source = vec![node(&[("env", "prod-us")])];
        let target = vec![node(&[("env", "prod-eu")])];
        let requirements =
            vec![TagRequirement { key: "env".to_string(), value: None, value_pattern: Some("prod-*".to_string()) }];
        let results =
            match_tag(RepositoryId::new(), &source, RepositoryId::new(), &target, &cfg(TagMatchMode::All, requirements));
        assert_eq!(results[0].confidence, 80);
    }

    #[test]
    fn missing_required_tag_yields_no_match() {
        let source = vec![node(&[("env", "prod")])];
        let target = vec![node(&[])];
        let requirements = vec![TagRequirement { key: "env".to_string(), value: None, value_pattern: None }];
        let results =
            match_tag(RepositoryId::new(), &source, RepositoryId::new(), &target, &cfg(TagMatchMode::All, requirements));
        assert!(results.is_empty());
    }
}
