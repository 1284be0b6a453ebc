// crates/rollup-cache/src/keyspace.rs
// ============================================================================
// Module: Cache Keyspaces
// Description: spec.md §4.H "Keyspaces" plus the index keyspace from §4.B.
// Purpose: Give every cached artifact kind its own L1 size budget and a
//          stable string used in cache keys and metrics.
// Dependencies: none
// ============================================================================

/// A logical partition of the rollup cache, each with its own L1 entry
/// budget (`spec.md` §4.H).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Keyspace {
    /// Cached `RollupExecution` results.
    ExecutionResult,
    /// Cached merged graphs.
    MergedGraph,
    /// Cached blast-radius query results.
    BlastRadius,
    /// The external object index's lookup/reverse-lookup cache
    /// (`spec.md` §4.B).
    Index,
}

impl Keyspace {
    /// Returns the stable string used in cache keys (`spec.md` §6 "Cache
    /// keys": `ro:{keyspace}:{tenant}:{hash}`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ExecutionResult => "execution-result",
            Self::MergedGraph => "merged-graph",
            Self::BlastRadius => "blast-radius",
            Self::Index => "index",
        }
    }

    /// Returns the default per-keyspace L1 entry budget (`spec.md` §4.H:
    /// "1500 execution results, 1000 graphs, 1000 blast radii").
    #[must_use]
    pub const fn default_l1_capacity(self) -> usize {
        match self {
            Self::ExecutionResult => 1500,
            Self::MergedGraph | Self::BlastRadius => 1000,
            Self::Index => 2000,
        }
    }

    /// All keyspaces, for iterating L1 shard construction.
    pub const ALL: [Self; 4] = [Self::ExecutionResult, Self::MergedGraph, Self::BlastRadius, Self::Index];

    /// A stable, dense index into a 4-element array matching [`Self::ALL`]'s
    /// order, used by [`crate::cache::RollupCache`] to avoid a fallible
    /// map lookup per keyspace.
    #[must_use]
    pub const fn slot(self) -> usize {
        match self {
            Self::ExecutionResult => 0,
            Self::MergedGraph => 1,
            Self::BlastRadius => 2,
            Self::Index => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_keyspace_has_a_positive_capacity() {
        for ks in Keyspace::ALL {
            assert!(ks.default_l1_capacity() > 0);
        }
    }
}
