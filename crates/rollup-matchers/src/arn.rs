// crates/rollup-matchers/src/arn.rs
// ============================================================================
// Module: ARN Matcher
// Description: spec.md §4.C ARN confidence rules.
// Purpose: Pure match(sourceSet, targetSet, cfg) -> []MatchResult for the
//          arn matcher variant.
// Dependencies: rollup-core, rollup-extractors
// ============================================================================

use rollup_core::ArnMatcherConfig;
use rollup_core::GraphNode;
use rollup_core::MatchDetails;
use rollup_core::MatchResult;
use rollup_core::MatchStrategy;
use rollup_core::RepositoryId;
use rollup_extractors::normalize_arn;

use crate::glob::glob_match;

/// The five ARN components in wire order.
struct ArnComponents<'a> {
    partition: &'a str,
    service: &'a str,
    region: &'a str,
    account: &'a str,
    resource: &'a str,
}

fn split(normalized: &str) -> ArnComponents<'_> {
    let mut parts = normalized.splitn(6, ':').skip(1);
    ArnComponents {
        partition: parts.next().unwrap_or_default(),
        service: parts.next().unwrap_or_default(),
        region: parts.next().unwrap_or_default(),
        account: parts.next().unwrap_or_default(),
        resource: parts.next().unwrap_or_default(),
    }
}

/// Counts how many of the (up to 5) enabled components are equal between
/// two normalized ARNs.
fn equal_component_count(cfg: &ArnMatcherConfig, a: &ArnComponents<'_>, b: &ArnComponents<'_>) -> (u32, u32) {
    let enables = cfg.component_enables.unwrap_or(rollup_core::ArnComponentEnables {
        partition: true,
        service: true,
        region: true,
        account: true,
        resource: true,
    });
    let checks: [(bool, bool); 5] = [
        (enables.partition, a.partition == b.partition),
        (enables.service, a.service == b.service),
        (enables.region, a.region == b.region),
        (enables.account, a.account == b.account),
        (enables.resource, a.resource == b.resource),
    ];
    let total = checks.iter().filter(|(enabled, _)| *enabled).count() as u32;
    let equal = checks.iter().filter(|(enabled, eq)| *enabled && *eq).count() as u32;
    (equal, total)
}

/// Confidence for a single source/target ARN pair, or `None` when nothing
/// about the pair meets any confidence rule.
fn confidence_for(cfg: &ArnMatcherConfig, source_arn: &str, target_arn: &str) -> Option<u8> {
    let source_normalized = normalize_arn(source_arn);
    let target_normalized = normalize_arn(target_arn);

    if source_normalized == target_normalized {
        return Some(100);
    }

    let source_components = split(&source_normalized);
    let target_components = split(&target_normalized);
    let region_or_account_only_diff = source_components.partition == target_components.partition
        && source_components.service == target_components.service
        && source_components.resource == target_components.resource
        && (source_components.region != target_components.region
            || source_components.account != target_components.account);
    if region_or_account_only_diff {
        return Some(90);
    }

    if glob_match(&cfg.pattern, source_arn) && glob_match(&cfg.pattern, target_arn) {
        return Some(80);
    }

    if cfg.allow_partial {
        let (equal, total) = equal_component_count(cfg, &source_components, &target_components);
        if total > 0 && equal > 0 {
            let fraction = f64::from(equal) / f64::from(total);
            #[allow(
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss,
                reason = "fraction is in [0,1] by construction; result is clamped into [60,75]"
            )]
            let scaled = (60.0 + fraction * 15.0).round() as u8;
            return Some(scaled.clamp(60, 75));
        }
    }

    None
}

/// Matches two node sets by ARN (`spec.md` §4.C).
#[must_use]
pub fn match_arn(
    source_repo: RepositoryId,
    source: &[GraphNode],
    target_repo: RepositoryId,
    target: &[GraphNode],
    cfg: &ArnMatcherConfig,
) -> Vec<MatchResult> {
    let mut results = Vec::new();
    for s in source {
        let Some(source_arn) = s.attributes.get("arn") else { continue };
        for t in target {
            let Some(target_arn) = t.attributes.get("arn") else { continue };
            let Some(confidence) = confidence_for(cfg, source_arn, target_arn) else { continue };
            results.push(MatchResult {
                source_node_id: s.id,
                source_repo_id: source_repo,
                target_node_id: t.id,
                target_repo_id: target_repo,
                strategy: MatchStrategy::Arn,
                confidence,
                details: MatchDetails {
                    matched_attribute: "arn".to_string(),
                    source_value: source_arn.clone(),
                    target_value: target_arn.clone(),
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

    fn node(arn: &str) -> GraphNode {
        let mut attributes = BTreeMap::new();
        attributes.insert("arn".to_string(), arn.to_string());
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

    fn cfg(pattern: &str, allow_partial: bool) -> ArnMatcherConfig {
        ArnMatcherConfig {
            common: MatcherCommon { enabled: true, priority: 100, min_confidence: 0 },
            pattern: pattern.to_string(),
            component_enables: None,
            allow_partial,
        }
    }

    #[test]
    fn exact_normalized_match_scores_100() {
        let source = vec![node("arn:aws:s3:::my-bucket")];
        let target = vec![node("arn:AWS:S3:::my-bucket")];
        let results = match_arn(RepositoryId::new(), &source, RepositoryId::new(), &target, &cfg("*", false));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].confidence, 100);
    }

    #[test]
    fn region_only_difference_scores_90() {
        let source = vec![node("arn:aws:s3:us-east-1:111122223333:my-bucket")];
        let target = vec![node("arn:aws:s3:us-west-2:111122223333:my-bucket")];
        let results = match_arn(RepositoryId::new(), &source, RepositoryId::new(), &target, &cfg("*", false));
        assert_eq!(results[0].confidence, 90);
    }

    #[test]
    fn unrelated_arns_produce_no_match() {
        let source = vec![node("arn:aws:s3:::bucket-a")];
        let target = vec![node("arn:aws:lambda:::function-b")];
        let results = match_arn(RepositoryId::new(), &source, RepositoryId::new(), &target, &cfg("arn:aws:s3:::*", false));
        assert!(results.is_empty());
    }
}
