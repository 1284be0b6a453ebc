// crates/rollup-blast/src/lib.rs
// ============================================================================
// Module: Rollup Blast-Radius Library
// Description: Component E — BFS blast-radius traversal over the merged
//              graph's reverse-adjacency, classified into direct/indirect/
//              cross-repository impact.
// Purpose: Answer "what breaks if this resource changes" queries against a
//          persisted MergedGraph without re-running the merge engine.
// Dependencies: rollup-core
// ============================================================================

//! ## Overview
//! `spec.md` §9 "Cyclic graph shape" calls for an arena-plus-index
//! representation rather than interior pointers, since the merged graph may
//! be cyclic under co-ownership. [`BlastGraph`] builds that arena once from
//! a [`rollup_core::MergedGraph`] and [`BlastGraph::compute`] runs the BFS
//! against a `Vec<bool>` visited set indexed by the dense [`NodeHandle`],
//! never by `MergedNodeId` directly.
//!
//! Only [`rollup_core::MergedEdge`]s participate in the traversal: the
//! merge engine only emits edges at merged-node granularity when
//! `MergeOptions.create_cross_repo_edges` is set (`spec.md` §4.D), so a
//! rollup merged without that option produces a blast radius of depth zero
//! — there is nothing else to traverse.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::VecDeque;

use rollup_core::MergedEdge;
use rollup_core::MergedGraph;
use rollup_core::MergedNodeId;

/// Default maximum BFS depth (`spec.md` §4.E).
pub const DEFAULT_MAX_DEPTH: u32 = 50;
/// Default bound on the number of nodes visited before truncating
/// (`spec.md` §4.E "maxGraphNodes default 100,000").
pub const DEFAULT_MAX_GRAPH_NODES: usize = 100_000;

/// A dense index into [`BlastGraph`]'s node arena, standing in for an
/// interior pointer (`spec.md` §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct NodeHandle(u32);

/// A query against a built [`BlastGraph`] (`spec.md` §4.E `Compute`
/// `query`).
#[derive(Debug, Clone)]
pub struct BlastQuery {
    /// Seed node ids to traverse from.
    pub node_ids: Vec<MergedNodeId>,
    /// Maximum BFS depth; `None` uses [`DEFAULT_MAX_DEPTH`].
    pub max_depth: Option<u32>,
    /// Whether to separately record cross-repository impact; `None`
    /// defaults to `true`.
    pub include_cross_repo: Option<bool>,
    /// Bound on the number of nodes visited; `None` uses
    /// [`DEFAULT_MAX_GRAPH_NODES`].
    pub max_graph_nodes: Option<usize>,
}

impl BlastQuery {
    /// Builds a query with every optional field defaulted.
    #[must_use]
    pub fn new(node_ids: Vec<MergedNodeId>) -> Self {
        Self { node_ids, max_depth: None, include_cross_repo: None, max_graph_nodes: None }
    }

    fn resolved_max_depth(&self) -> u32 {
        self.max_depth.unwrap_or(DEFAULT_MAX_DEPTH)
    }

    fn resolved_include_cross_repo(&self) -> bool {
        self.include_cross_repo.unwrap_or(true)
    }

    fn resolved_max_graph_nodes(&self) -> usize {
        self.max_graph_nodes.unwrap_or(DEFAULT_MAX_GRAPH_NODES)
    }
}

/// Aggregate counts over a [`BlastRadiusResult`] (`spec.md` §4.E
/// `summary`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlastRadiusSummary {
    /// Total distinct nodes impacted across direct and indirect impact.
    pub total_impacted: u64,
    /// Nodes at depth 1.
    pub direct_count: u64,
    /// Nodes at depth 2..=maxDepth.
    pub indirect_count: u64,
    /// Nodes reached across a repository boundary.
    pub cross_repo_count: u64,
}

/// Result of [`BlastGraph::compute`] (`spec.md` §4.E `Compute`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlastRadiusResult {
    /// Nodes at depth 1 from the seed set.
    pub direct_impact: Vec<MergedNodeId>,
    /// Nodes at depth 2..=maxDepth.
    pub indirect_impact: Vec<MergedNodeId>,
    /// Nodes reached across a repository boundary, at any depth.
    pub cross_repo_impact: Vec<MergedNodeId>,
    /// Aggregate counts.
    pub summary: BlastRadiusSummary,
    /// Set when the visited-node bound was hit before the BFS frontier was
    /// exhausted (`spec.md` §4.E "returns partial results with a
    /// `truncated: true` flag, not an error").
    pub truncated: bool,
}

/// An arena-indexed view of a [`MergedGraph`]'s nodes and cross-repository
/// edges, built once and queried many times (`spec.md` §4.E).
pub struct BlastGraph {
    /// Node ids, dense-indexed by [`NodeHandle`].
    node_ids: Vec<MergedNodeId>,
    /// Source repository ids, dense-indexed by [`NodeHandle`], used to
    /// classify cross-repository edges during traversal.
    repo_ids: Vec<BTreeSet<rollup_core::RepositoryId>>,
    /// Maps a node id back to its handle.
    handle_of: BTreeMap<MergedNodeId, NodeHandle>,
    /// Reverse adjacency: `reverse_adjacency[h]` holds the handles of
    /// nodes that have an edge *into* `h` (i.e. nodes impacted when `h`
    /// changes), since blast radius traverses dependents, not
    /// dependencies (`spec.md` §4.E "reverse-adjacency").
    reverse_adjacency: Vec<Vec<NodeHandle>>,
}

impl BlastGraph {
    /// Builds a [`BlastGraph`] from a persisted merged graph.
    #[must_use]
    pub fn build(graph: &MergedGraph) -> Self {
        let mut node_ids = Vec::with_capacity(graph.nodes.len());
        let mut repo_ids = Vec::with_capacity(graph.nodes.len());
        let mut handle_of = BTreeMap::new();
        for (index, node) in graph.nodes.iter().enumerate() {
            let handle = NodeHandle(u32::try_from(index).unwrap_or(u32::MAX));
            node_ids.push(node.id);
            repo_ids.push(node.source_repo_ids.iter().copied().collect());
            handle_of.insert(node.id, handle);
        }

        let mut reverse_adjacency = vec![Vec::new(); node_ids.len()];
        for edge in &graph.cross_repo_edges {
            let MergedEdge { from, to, .. } = *edge;
            if let (Some(&from_handle), Some(&to_handle)) = (handle_of.get(&from), handle_of.get(&to)) {
                reverse_adjacency[to_handle.0 as usize].push(from_handle);
            }
        }

        Self { node_ids, repo_ids, handle_of, reverse_adjacency }
    }

    /// Returns the number of nodes in the arena.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.node_ids.len()
    }

    fn handle(&self, id: MergedNodeId) -> Option<NodeHandle> {
        self.handle_of.get(&id).copied()
    }

    fn is_cross_repo(&self, a: NodeHandle, b: NodeHandle) -> bool {
        self.repo_ids[a.0 as usize].is_disjoint(&self.repo_ids[b.0 as usize])
    }

    /// Computes direct/indirect/cross-repository impact for `query`
    /// (`spec.md` §4.E `Compute`).
    #[must_use]
    pub fn compute(&self, query: &BlastQuery) -> BlastRadiusResult {
        let max_depth = query.resolved_max_depth();
        let include_cross_repo = query.resolved_include_cross_repo();
        let max_graph_nodes = query.resolved_max_graph_nodes();

        let mut visited: Vec<bool> = vec![false; self.node_ids.len()];
        let mut frontier = VecDeque::new();
        let mut visited_count = 0usize;
        let mut truncated = false;

        for &seed in &query.node_ids {
            if let Some(handle) = self.handle(seed) {
                if !visited[handle.0 as usize] {
                    visited[handle.0 as usize] = true;
                    visited_count += 1;
                    frontier.push_back((handle, 0u32));
                }
            }
        }

        let mut direct_impact = Vec::new();
        let mut indirect_impact = Vec::new();
        let mut cross_repo_impact = Vec::new();

        while let Some((handle, depth)) = frontier.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for &next in &self.reverse_adjacency[handle.0 as usize] {
                if visited[next.0 as usize] {
                    continue;
                }
                if visited_count >= max_graph_nodes {
                    truncated = true;
                    continue;
                }
                visited[next.0 as usize] = true;
                visited_count += 1;
                let next_depth = depth + 1;

                if next_depth == 1 {
                    direct_impact.push(self.node_ids[next.0 as usize]);
                } else {
                    indirect_impact.push(self.node_ids[next.0 as usize]);
                }
                if include_cross_repo && self.is_cross_repo(handle, next) {
                    cross_repo_impact.push(self.node_ids[next.0 as usize]);
                }

                frontier.push_back((next, next_depth));
            }
        }

        let summary = BlastRadiusSummary {
            total_impacted: (direct_impact.len() + indirect_impact.len()) as u64,
            direct_count: direct_impact.len() as u64,
            indirect_count: indirect_impact.len() as u64,
            cross_repo_count: cross_repo_impact.len() as u64,
        };

        BlastRadiusResult { direct_impact, indirect_impact, cross_repo_impact, summary, truncated }
    }
}

#[cfg(test)]
mod tests {
    use rollup_core::MatchInfo;
    use rollup_core::MatchStrategy;
    use rollup_core::MergedNode;
    use rollup_core::NodeId;
    use rollup_core::RepositoryId;
    use std::collections::BTreeMap;

    use super::*;

    fn node(repo: RepositoryId) -> MergedNode {
        MergedNode {
            id: MergedNodeId::new(),
            r#type: "aws_s3_bucket".to_string(),
            name: "n".to_string(),
            source_node_ids: vec![NodeId::new()],
            source_repo_ids: vec![repo],
            locations: Vec::new(),
            metadata: BTreeMap::new(),
            match_info: MatchInfo { strategy: MatchStrategy::Arn, confidence: 100, match_count: 1 },
        }
    }

    #[test]
    fn direct_and_indirect_impact_are_classified_by_depth() {
        let repo_a = RepositoryId::new();
        let seed = node(repo_a);
        let direct = node(repo_a);
        let indirect = node(repo_a);
        let graph = MergedGraph {
            execution_id: rollup_core::ExecutionId::new(),
            nodes: vec![seed.clone(), direct.clone(), indirect.clone()],
            cross_repo_edges: vec![
                MergedEdge { from: direct.id, to: seed.id, kind: "depends_on", confidence: 90 },
                MergedEdge { from: indirect.id, to: direct.id, kind: "depends_on", confidence: 80 },
            ],
        };
        let blast = BlastGraph::build(&graph);
        let result = blast.compute(&BlastQuery::new(vec![seed.id]));
        assert_eq!(result.direct_impact, vec![direct.id]);
        assert_eq!(result.indirect_impact, vec![indirect.id]);
        assert_eq!(result.summary.total_impacted, 2);
        assert!(!result.truncated);
    }

    #[test]
    fn cross_repository_edges_are_recorded_separately() {
        let repo_a = RepositoryId::new();
        let repo_b = RepositoryId::new();
        let seed = node(repo_a);
        let dependent = node(repo_b);
        let graph = MergedGraph {
            execution_id: rollup_core::ExecutionId::new(),
            nodes: vec![seed.clone(), dependent.clone()],
            cross_repo_edges: vec![MergedEdge { from: dependent.id, to: seed.id, kind: "references", confidence: 95 }],
        };
        let blast = BlastGraph::build(&graph);
        let result = blast.compute(&BlastQuery::new(vec![seed.id]));
        assert_eq!(result.cross_repo_impact, vec![dependent.id]);
    }

    #[test]
    fn max_depth_bounds_the_traversal() {
        let repo = RepositoryId::new();
        let seed = node(repo);
        let hop1 = node(repo);
        let hop2 = node(repo);
        let graph = MergedGraph {
            execution_id: rollup_core::ExecutionId::new(),
            nodes: vec![seed.clone(), hop1.clone(), hop2.clone()],
            cross_repo_edges: vec![
                MergedEdge { from: hop1.id, to: seed.id, kind: "depends_on", confidence: 90 },
                MergedEdge { from: hop2.id, to: hop1.id, kind: "depends_on", confidence: 90 },
            ],
        };
        let blast = BlastGraph::build(&graph);
        let mut query = BlastQuery::new(vec![seed.id]);
        query.max_depth = Some(1);
        let result = blast.compute(&query);
        assert_eq!(result.direct_impact, vec![hop1.id]);
        assert!(result.indirect_impact.is_empty());
    }

    #[test]
    fn truncates_when_the_node_bound_is_exceeded() {
        let repo = RepositoryId::new();
        let seed = node(repo);
        let overflow = node(repo);
        let graph = MergedGraph {
            execution_id: rollup_core::ExecutionId::new(),
            nodes: vec![seed.clone(), overflow.clone()],
            cross_repo_edges: vec![MergedEdge { from: overflow.id, to: seed.id, kind: "depends_on", confidence: 90 }],
        };
        let blast = BlastGraph::build(&graph);
        let mut query = BlastQuery::new(vec![seed.id]);
        query.max_graph_nodes = Some(1);
        let result = blast.compute(&query);
        assert!(result.truncated);
        assert!(result.direct_impact.is_empty());
    }
}
