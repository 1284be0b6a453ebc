// crates/rollup-matchers/src/resource_id.rs
// ============================================================================
// Module: Resource ID Matcher
// Description: spec.md §4.C resource-id confidence rules.
// Purpose: Pure match(sourceSet, targetSet, cfg) -> []MatchResult for the
//          resource_id matcher variant.
// Dependencies: rollup-core, rollup-extractors
// ============================================================================

use rollup_core::GraphNode;
use rollup_core::MatchDetails;
use rollup_core::MatchResult;
use rollup_core::MatchStrategy;
use rollup_core::RepositoryId;
use rollup_core::ResourceIdMatcherConfig;
use rollup_extractors::normalize_resource_id;

/// Extracts the substring captured by the single `*` in a single-wildcard
/// pattern, searching anywhere in `text` rather than anchoring at its
/// start/end, or `None` when the pattern's prefix/suffix don't both occur.
/// With no `*` present, the pattern must occur as a substring and the
/// capture is empty.
///
/// This is a deliberately narrow stand-in for a full regex engine — the
/// `extractionRegex` field only ever needs to pull a single variable
/// segment out of an otherwise differently-shaped id (`spec.md` §4.C).
fn extract_capture(pattern: &str, text: &str) -> Option<String> {
    match pattern.find('*') {
        None => text.contains(pattern).then(String::new),
        Some(star_at) => {
            let prefix = &pattern[..star_at];
            let suffix = &pattern[star_at + 1..];
            let start = if prefix.is_empty() { 0 } else { text.find(prefix)? + prefix.len() };
            let rest = &text[start..];
            let end = if suffix.is_empty() { rest.len() } else { rest.find(suffix)? };
            Some(rest[..end].to_string())
        }
    }
}

fn attribute_key(cfg: &ResourceIdMatcherConfig) -> &str {
    cfg.id_attribute.as_deref().unwrap_or("resource_id")
}

/// Confidence for a single source/target resource-id pair, or `None`.
fn confidence_for(cfg: &ResourceIdMatcherConfig, source_raw: &str, target_raw: &str) -> Option<u8> {
    if cfg.normalize {
        let source_normalized = normalize_resource_id(source_raw, true);
        let target_normalized = normalize_resource_id(target_raw, true);
        if source_normalized == target_normalized {
            return Some(95);
        }
    }

    let source_stripped = normalize_resource_id(source_raw, true);
    let target_stripped = normalize_resource_id(target_raw, true);
    if source_stripped.eq_ignore_ascii_case(&target_stripped) {
        return Some(85);
    }

    if let Some(regex) = &cfg.extraction_regex {
        let source_capture = extract_capture(regex, source_raw)?;
        let target_capture = extract_capture(regex, target_raw)?;
        if !source_capture.is_empty() && source_capture == target_capture {
            return Some(75);
        }
    }

    None
}

/// Matches two node sets by resource id (`spec.md` §4.C).
#[must_use]
pub fn match_resource_id(
    source_repo: RepositoryId,
    source: &[GraphNode],
    target_repo: RepositoryId,
    target: &[GraphNode],
    cfg: &ResourceIdMatcherConfig,
) -> Vec<MatchResult> {
    let attribute = attribute_key(cfg).to_string();
    let mut results = Vec::new();
    for s in source {
        let Some(source_raw) = s.attributes.get(&attribute) else { continue };
        for t in target {
            let Some(target_raw) = t.attributes.get(&attribute) else { continue };
            let Some(confidence) = confidence_for(cfg, source_raw, target_raw) else { continue };
            results.push(MatchResult {
                source_node_id: s.id,
                source_repo_id: source_repo,
                target_node_id: t.id,
                target_repo_id: target_repo,
                strategy: MatchStrategy::ResourceId,
                confidence,
                details: MatchDetails {
                    matched_attribute: attribute.clone(),
                    source_value: source_raw.clone(),
                    target_value: target_raw.clone(),
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

    fn node(id: &str) -> GraphNode {
        let mut attributes = BTreeMap::new();
        attributes.insert("resource_id".to_string(), id.to_string());
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

    fn cfg(extraction_regex: Option<&str>) -> ResourceIdMatcherConfig {
        ResourceIdMatcherConfig {
            common: MatcherCommon { enabled: true, priority: 50, min_confidence: 0 },
            resource_type: "s3_bucket".to_string(),
            id_attribute: None,
            normalize: true,
            extraction_regex: extraction_regex.map(str::to_string),
        }
    }

    #[test]
    fn exact_normalized_id_scores_95() {
        let source = vec![node("aws_s3_bucket My Bucket")];
        let target = vec![node("my_bucket")];
        let results = match_resource_id(RepositoryId::new(), &source, RepositoryId::new(), &target, &cfg(None));
        assert_eq!(results[0].confidence, 95);
    }

    #[test]
    fn regex_extracted_equality_scores_75() {
        let source = vec![node("xxx-res-777-end")];
        let target = vec![node("yyy-res-777-end-more")];
        let results =
            match_resource_id(RepositoryId::new(), &source, RepositoryId::new(), &target, &cfg(Some("res-*-end")));
        assert_eq!(results[0].confidence, 75);
    }

    #[test]
    fn mismatched_capture_yields_no_match() {
        let source = vec![node("xxx-res-777-end")];
        let target = vec![node("yyy-res-888-end")];
        let results =
            match_resource_id(RepositoryId::new(), &source, RepositoryId::new(), &target, &cfg(Some("res-*-end")));
        assert!(results.is_empty());
    }
}
