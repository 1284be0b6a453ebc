// crates/rollup-merge/src/lib.rs
// ============================================================================
// Module: Rollup Merge Library
// Description: Component D — union-find merge engine: connected components
//              over match results, conflict-resolved metadata, deterministic
//              merged-node ids, and cross-repository edge emission.
// Purpose: Turn a set of per-matcher MatchResults plus the scanned node data
//          they refer to into the merged nodes the blast-radius engine and
//          rollup service persist and traverse.
// Dependencies: rollup-core, sha2
// ============================================================================

//! ## Overview
//! [`merge`] builds an undirected graph over `(repoId, nodeId)` pairs with
//! one edge per [`MatchResult`], computes connected components via
//! [`union_find::UnionFind`], and resolves each component down to a single
//! [`MergedNode`] according to the configured [`ConflictResolution`]
//! (`spec.md` §4.D). `MergedNode.id` is a stable hash of the component's
//! sorted `source_node_ids`, so identical inputs and `MergeOptions` always
//! produce byte-identical output.

mod union_find;

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use rollup_core::ConflictResolution;
use rollup_core::GraphEdge;
use rollup_core::GraphNode;
use rollup_core::MatchInfo;
use rollup_core::MatchResult;
use rollup_core::MatchStrategy;
use rollup_core::MergeOptions;
use rollup_core::MergedEdge;
use rollup_core::MergedNode;
use rollup_core::MergedNodeId;
use rollup_core::MergedValue;
use rollup_core::NodeId;
use rollup_core::NodeLocation;
use rollup_core::RepositoryId;
use rollup_core::RollupError;
use sha2::Digest;
use sha2::Sha256;
use union_find::UnionFind;
use uuid::Uuid;

/// Output of [`merge`]: the merged nodes and the cross-repository edges
/// emitted alongside them (`spec.md` §4.D).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutput {
    /// One entry per connected component.
    pub nodes: Vec<MergedNode>,
    /// Cross-repository edges; empty unless
    /// `MergeOptions.create_cross_repo_edges` is set.
    pub cross_repo_edges: Vec<MergedEdge>,
}

/// Merges per-repository scan nodes into cross-repository [`MergedNode`]s.
///
/// `nodes` is the full set of scanned nodes participating in the rollup,
/// keyed by the `(repoId, nodeId)` pair they originated from. `edges` is
/// every intra-repository scan edge across those same repositories, tagged
/// with the repository it came from — used only to emit cross-repository
/// edges once their endpoints are expressed at merged-node granularity.
/// `repository_order` is `RollupConfig.repository_ids`, consulted to break
/// ties for `preferFirstSource`/`preferLastSource`.
///
/// # Errors
///
/// Returns [`RollupError::Configuration`] when the number of connected
/// components would exceed `options.max_nodes` (`spec.md` §4.D).
pub fn merge(
    nodes: &BTreeMap<(RepositoryId, NodeId), GraphNode>,
    matches: &[MatchResult],
    edges: &[(RepositoryId, GraphEdge)],
    repository_order: &[RepositoryId],
    options: &MergeOptions,
) -> Result<MergeOutput, RollupError> {
    if nodes.is_empty() {
        return Ok(MergeOutput { nodes: Vec::new(), cross_repo_edges: Vec::new() });
    }

    // A dense index over the sorted (repoId, nodeId) universe. Iterating a
    // BTreeMap always yields key order, so this assignment is independent
    // of match/edge arrival order and therefore deterministic.
    let index: BTreeMap<(RepositoryId, NodeId), u32> =
        nodes.keys().enumerate().map(|(i, key)| (*key, u32::try_from(i).unwrap_or(u32::MAX))).collect();

    let mut uf = UnionFind::new(index.len());
    for candidate in matches {
        let source = (candidate.source_repo_id, candidate.source_node_id);
        let target = (candidate.target_repo_id, candidate.target_node_id);
        if let (Some(&a), Some(&b)) = (index.get(&source), index.get(&target)) {
            uf.union(a, b);
        }
    }

    let root_of: BTreeMap<(RepositoryId, NodeId), u32> =
        index.iter().map(|(&key, &idx)| (key, uf.find(idx))).collect();

    let mut components: BTreeMap<u32, Vec<(RepositoryId, NodeId)>> = BTreeMap::new();
    for (&key, &root) in &root_of {
        components.entry(root).or_default().push(key);
    }

    if components.len() as u64 > u64::from(options.max_nodes) {
        return Err(RollupError::Configuration {
            message: format!(
                "merge would produce {} merged nodes, exceeding max_nodes {}",
                components.len(),
                options.max_nodes
            ),
        });
    }

    let mut merged_id_by_root: BTreeMap<u32, MergedNodeId> = BTreeMap::new();
    let mut confidence_by_root: BTreeMap<u32, u8> = BTreeMap::new();
    let mut merged_nodes = Vec::with_capacity(components.len());
    for (&root, members) in &components {
        let merged = build_merged_node(members, nodes, matches, repository_order, options.conflict_resolution);
        merged_id_by_root.insert(root, merged.id);
        confidence_by_root.insert(root, merged.match_info.confidence);
        merged_nodes.push(merged);
    }

    let cross_repo_edges = if options.create_cross_repo_edges {
        build_cross_repo_edges(edges, &root_of, &merged_id_by_root, &confidence_by_root)
    } else {
        Vec::new()
    };

    Ok(MergeOutput { nodes: merged_nodes, cross_repo_edges })
}

/// Re-expresses intra-repository scan edges at merged-node granularity,
/// dropping any edge whose endpoints merged into the same [`MergedNode`]
/// (`spec.md` §4.D "endpoints merged into two distinct MergedNodes").
fn build_cross_repo_edges(
    edges: &[(RepositoryId, GraphEdge)],
    root_of: &BTreeMap<(RepositoryId, NodeId), u32>,
    merged_id_by_root: &BTreeMap<u32, MergedNodeId>,
    confidence_by_root: &BTreeMap<u32, u8>,
) -> Vec<MergedEdge> {
    let mut seen: BTreeSet<(MergedNodeId, MergedNodeId, &'static str)> = BTreeSet::new();
    let mut out = Vec::new();
    for (repo_id, edge) in edges {
        let from_key = (*repo_id, edge.from);
        let to_key = (*repo_id, edge.to);
        let (Some(&from_root), Some(&to_root)) = (root_of.get(&from_key), root_of.get(&to_key)) else {
            continue;
        };
        if from_root == to_root {
            continue;
        }
        let (Some(&from_id), Some(&to_id)) = (merged_id_by_root.get(&from_root), merged_id_by_root.get(&to_root))
        else {
            continue;
        };
        if !seen.insert((from_id, to_id, edge.kind)) {
            continue;
        }
        let confidence =
            confidence_by_root.get(&from_root).copied().unwrap_or(0).max(confidence_by_root.get(&to_root).copied().unwrap_or(0));
        out.push(MergedEdge { from: from_id, to: to_id, kind: edge.kind, confidence });
    }
    out
}

/// Builds one [`MergedNode`] from a connected component's members.
fn build_merged_node(
    members: &[(RepositoryId, NodeId)],
    nodes: &BTreeMap<(RepositoryId, NodeId), GraphNode>,
    matches: &[MatchResult],
    repository_order: &[RepositoryId],
    resolution: ConflictResolution,
) -> MergedNode {
    let winner = winning_match(members, matches);
    let ordered = order_members(members, repository_order, resolution, winner.as_ref());

    let primary_key = ordered.first().copied().unwrap_or_else(|| default_member(members));
    let primary = nodes.get(&primary_key);
    let (node_type, name) =
        primary.map_or_else(|| (String::new(), String::new()), |node| (node.node_type.clone(), node.name.clone()));

    let mut source_node_ids: Vec<NodeId> = members.iter().map(|(_, node_id)| *node_id).collect();
    source_node_ids.sort_unstable();
    source_node_ids.dedup();

    let mut source_repo_ids: Vec<RepositoryId> = members.iter().map(|(repo_id, _)| *repo_id).collect();
    source_repo_ids.sort_unstable();
    source_repo_ids.dedup();

    let mut locations: Vec<NodeLocation> = members
        .iter()
        .filter_map(|key| {
            nodes.get(key).map(|node| NodeLocation {
                repo_id: key.0,
                file: node.file.clone(),
                line_start: node.line_start,
                line_end: node.line_end,
            })
        })
        .collect();
    locations.sort_by(|a, b| (a.repo_id, &a.file, a.line_start).cmp(&(b.repo_id, &b.file, b.line_start)));

    let metadata = merge_metadata(&ordered, nodes, resolution);
    let match_count = intra_component_match_count(members, matches);
    let match_info = winner.map_or(
        MatchInfo { strategy: MatchStrategy::Arn, confidence: 0, match_count: 0 },
        |result| MatchInfo { strategy: result.strategy, confidence: result.confidence, match_count },
    );

    MergedNode {
        id: stable_merged_id(&source_node_ids),
        r#type: node_type,
        name,
        source_node_ids,
        source_repo_ids,
        locations,
        metadata,
        match_info,
    }
}

/// Returns the lexicographically smallest member, used only as a defensive
/// fallback when `order_members` unexpectedly returns no members (it never
/// does: it always returns a permutation of its non-empty input).
fn default_member(members: &[(RepositoryId, NodeId)]) -> (RepositoryId, NodeId) {
    members.iter().copied().min().unwrap_or_else(|| (RepositoryId::new(), NodeId::new()))
}

/// Finds the highest-confidence match whose endpoints both belong to
/// `members`, breaking ties in favor of the lexicographically smaller
/// canonical pair (`spec.md` §4.C tie-break rule, reused here for
/// determinism).
fn winning_match(members: &[(RepositoryId, NodeId)], matches: &[MatchResult]) -> Option<MatchResult> {
    let member_set: BTreeSet<(RepositoryId, NodeId)> = members.iter().copied().collect();
    matches
        .iter()
        .filter(|candidate| {
            member_set.contains(&(candidate.source_repo_id, candidate.source_node_id))
                && member_set.contains(&(candidate.target_repo_id, candidate.target_node_id))
        })
        .max_by(|a, b| {
            a.confidence.cmp(&b.confidence).then_with(|| b.canonical_pair_key().cmp(&a.canonical_pair_key()))
        })
        .cloned()
}

/// Counts matches whose endpoints both belong to `members`.
fn intra_component_match_count(members: &[(RepositoryId, NodeId)], matches: &[MatchResult]) -> u32 {
    let member_set: BTreeSet<(RepositoryId, NodeId)> = members.iter().copied().collect();
    let count = matches
        .iter()
        .filter(|candidate| {
            member_set.contains(&(candidate.source_repo_id, candidate.source_node_id))
                && member_set.contains(&(candidate.target_repo_id, candidate.target_node_id))
        })
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Returns a repository's position in `order`, or `order.len()` when it is
/// absent (sorts last).
fn repo_rank(repo_id: RepositoryId, order: &[RepositoryId]) -> usize {
    order.iter().position(|candidate| *candidate == repo_id).unwrap_or(order.len())
}

/// Orders a component's members according to the conflict resolution
/// strategy, so the first entry is always the "winning" source
/// (`spec.md` §4.D).
fn order_members(
    members: &[(RepositoryId, NodeId)],
    repository_order: &[RepositoryId],
    resolution: ConflictResolution,
    winner: Option<&MatchResult>,
) -> Vec<(RepositoryId, NodeId)> {
    let mut ordered = members.to_vec();
    match resolution {
        ConflictResolution::PreferHigherConfidence => {
            let winning_key = winner.map(|result| (result.source_repo_id, result.source_node_id));
            ordered.sort_by_key(|key| (Some(*key) != winning_key, *key));
        }
        ConflictResolution::PreferFirstSource => {
            ordered.sort_by_key(|key| (repo_rank(key.0, repository_order), *key));
        }
        ConflictResolution::PreferLastSource => {
            ordered.sort_by_key(|key| (std::cmp::Reverse(repo_rank(key.0, repository_order)), *key));
        }
        ConflictResolution::Union => ordered.sort_unstable(),
    }
    ordered
}

/// Merges each member's attributes into a single metadata map according to
/// `resolution` (`spec.md` §4.D).
fn merge_metadata(
    ordered: &[(RepositoryId, NodeId)],
    nodes: &BTreeMap<(RepositoryId, NodeId), GraphNode>,
    resolution: ConflictResolution,
) -> BTreeMap<String, MergedValue> {
    if matches!(resolution, ConflictResolution::Union) {
        let mut collected: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for key in ordered {
            let Some(node) = nodes.get(key) else { continue };
            for (attr_key, attr_value) in &node.attributes {
                collected.entry(attr_key.clone()).or_default().insert(attr_value.clone());
            }
        }
        return collected
            .into_iter()
            .map(|(key, values)| {
                let value = if values.len() == 1 {
                    MergedValue::Scalar(values.into_iter().next().unwrap_or_default())
                } else {
                    MergedValue::Many(values.into_iter().collect())
                };
                (key, value)
            })
            .collect();
    }

    // Non-union strategies: the first member in `ordered` wins any key it
    // defines; later members only fill in keys the winner lacks.
    let mut out: BTreeMap<String, MergedValue> = BTreeMap::new();
    for key in ordered {
        let Some(node) = nodes.get(key) else { continue };
        for (attr_key, attr_value) in &node.attributes {
            out.entry(attr_key.clone()).or_insert_with(|| MergedValue::Scalar(attr_value.clone()));
        }
    }
    out
}

/// Derives a stable [`MergedNodeId`] from a component's sorted source node
/// ids (`spec.md` §4.D "Determinism").
fn stable_merged_id(sorted_node_ids: &[NodeId]) -> MergedNodeId {
    let mut hasher = Sha256::new();
    for node_id in sorted_node_ids {
        hasher.update(node_id.as_uuid().as_bytes());
    }
    let digest = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    MergedNodeId::from_uuid(Uuid::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use rollup_core::MatchDetails;

    use super::*;

    fn node(repo: RepositoryId, name: &str, attrs: &[(&str, &str)]) -> (NodeId, GraphNode) {
        let id = NodeId::new();
        let mut attributes = BTreeMap::new();
        for (k, v) in attrs {
            attributes.insert((*k).to_string(), (*v).to_string());
        }
        (
            id,
            GraphNode {
                id,
                node_type: "aws_s3_bucket".to_string(),
                name: name.to_string(),
                file: format!("{repo}.tf"),
                line_start: 1,
                line_end: 1,
                attributes,
            },
        )
    }

    fn match_between(
        source_repo: RepositoryId,
        source_node: NodeId,
        target_repo: RepositoryId,
        target_node: NodeId,
        confidence: u8,
    ) -> MatchResult {
        MatchResult {
            source_node_id: source_node,
            source_repo_id: source_repo,
            target_node_id: target_node,
            target_repo_id: target_repo,
            strategy: MatchStrategy::Arn,
            confidence,
            details: MatchDetails {
                matched_attribute: "arn".to_string(),
                source_value: "arn:aws:s3:::foo".to_string(),
                target_value: "arn:aws:s3:::foo".to_string(),
            },
        }
    }

    fn default_options() -> MergeOptions {
        MergeOptions {
            conflict_resolution: ConflictResolution::PreferHigherConfidence,
            preserve_source_info: true,
            create_cross_repo_edges: true,
            max_nodes: 100,
        }
    }

    #[test]
    fn matched_nodes_collapse_into_one_merged_node() {
        let repo_a = RepositoryId::new();
        let repo_b = RepositoryId::new();
        let (id_a, node_a) = node(repo_a, "foo", &[("env", "prod")]);
        let (id_b, node_b) = node(repo_b, "foo", &[("env", "prod")]);
        let mut nodes = BTreeMap::new();
        nodes.insert((repo_a, id_a), node_a);
        nodes.insert((repo_b, id_b), node_b);
        let matches = vec![match_between(repo_a, id_a, repo_b, id_b, 100)];

        let result = merge(&nodes, &matches, &[], &[repo_a, repo_b], &default_options()).expect("merge succeeds");
        assert_eq!(result.nodes.len(), 1);
        assert_eq!(result.nodes[0].source_node_ids.len(), 2);
        assert_eq!(result.nodes[0].match_info.confidence, 100);
    }

    #[test]
    fn unmatched_nodes_remain_singleton_merged_nodes() {
        let repo_a = RepositoryId::new();
        let repo_b = RepositoryId::new();
        let (id_a, node_a) = node(repo_a, "foo", &[]);
        let (id_b, node_b) = node(repo_b, "bar", &[]);
        let mut nodes = BTreeMap::new();
        nodes.insert((repo_a, id_a), node_a);
        nodes.insert((repo_b, id_b), node_b);

        let result = merge(&nodes, &[], &[], &[repo_a, repo_b], &default_options()).expect("merge succeeds");
        assert_eq!(result.nodes.len(), 2);
        assert!(result.nodes.iter().all(|n| n.match_info.confidence == 0));
    }

    #[test]
    fn output_is_deterministic_across_runs() {
        let repo_a = RepositoryId::new();
        let repo_b = RepositoryId::new();
        let (id_a, node_a) = node(repo_a, "foo", &[("env", "prod")]);
        let (id_b, node_b) = node(repo_b, "foo", &[("env", "staging")]);
        let mut nodes = BTreeMap::new();
        nodes.insert((repo_a, id_a), node_a);
        nodes.insert((repo_b, id_b), node_b);
        let matches = vec![match_between(repo_a, id_a, repo_b, id_b, 90)];
        let options = default_options();

        let first = merge(&nodes, &matches, &[], &[repo_a, repo_b], &options).expect("merge succeeds");
        let second = merge(&nodes, &matches, &[], &[repo_a, repo_b], &options).expect("merge succeeds");
        assert_eq!(first.nodes, second.nodes);
    }

    #[test]
    fn exceeding_max_nodes_fails_with_configuration_error() {
        let repo = RepositoryId::new();
        let (id_a, node_a) = node(repo, "foo", &[]);
        let (id_b, node_b) = node(repo, "bar", &[]);
        let mut nodes = BTreeMap::new();
        nodes.insert((repo, id_a), node_a);
        nodes.insert((repo, id_b), node_b);
        let mut options = default_options();
        options.max_nodes = 1;

        let result = merge(&nodes, &[], &[], &[repo], &options);
        assert!(matches!(result, Err(RollupError::Configuration { .. })));
    }

    #[test]
    fn union_resolution_collects_distinct_values_into_many() {
        let repo_a = RepositoryId::new();
        let repo_b = RepositoryId::new();
        let (id_a, node_a) = node(repo_a, "foo", &[("env", "prod")]);
        let (id_b, node_b) = node(repo_b, "foo", &[("env", "staging")]);
        let mut nodes = BTreeMap::new();
        nodes.insert((repo_a, id_a), node_a);
        nodes.insert((repo_b, id_b), node_b);
        let matches = vec![match_between(repo_a, id_a, repo_b, id_b, 90)];
        let mut options = default_options();
        options.conflict_resolution = ConflictResolution::Union;

        let result = merge(&nodes, &matches, &[], &[repo_a, repo_b], &options).expect("merge succeeds");
        let env = result.nodes[0].metadata.get("env").cloned();
        match env {
            Some(MergedValue::Many(mut values)) => {
                values.sort_unstable();
                assert_eq!(values, vec!["prod".to_string(), "staging".to_string()]);
            }
            other => panic!("expected MergedValue::Many, got {other:?}"),
        }
    }

    #[test]
    fn cross_repo_edges_are_emitted_between_distinct_merged_nodes() {
        let repo_a = RepositoryId::new();
        let repo_b = RepositoryId::new();
        let (id_a1, node_a1) = node(repo_a, "bucket", &[]);
        let (id_a2, node_a2) = node(repo_a, "role", &[]);
        let (id_b, node_b) = node(repo_b, "role", &[]);
        let mut nodes = BTreeMap::new();
        nodes.insert((repo_a, id_a1), node_a1);
        nodes.insert((repo_a, id_a2), node_a2);
        nodes.insert((repo_b, id_b), node_b);
        let matches = vec![match_between(repo_a, id_a2, repo_b, id_b, 95)];
        let edges = vec![(repo_a, GraphEdge { from: id_a1, to: id_a2, kind: "depends_on" })];

        let result = merge(&nodes, &matches, &edges, &[repo_a, repo_b], &default_options()).expect("merge succeeds");
        assert_eq!(result.nodes.len(), 2);
        assert_eq!(result.cross_repo_edges.len(), 1);
        assert_eq!(result.cross_repo_edges[0].confidence, 95);
    }

    #[test]
    fn cross_repo_edges_are_empty_when_disabled() {
        let repo_a = RepositoryId::new();
        let (id_a1, node_a1) = node(repo_a, "bucket", &[]);
        let (id_a2, node_a2) = node(repo_a, "role", &[]);
        let mut nodes = BTreeMap::new();
        nodes.insert((repo_a, id_a1), node_a1);
        nodes.insert((repo_a, id_a2), node_a2);
        let edges = vec![(repo_a, GraphEdge { from: id_a1, to: id_a2, kind: "depends_on" })];
        let mut options = default_options();
        options.create_cross_repo_edges = false;

        let result = merge(&nodes, &[], &edges, &[repo_a], &options).expect("merge succeeds");
        assert!(result.cross_repo_edges.is_empty());
    }
}
