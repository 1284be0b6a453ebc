// crates/rollup-index/src/types.rs
// ============================================================================
// Module: External Object Index Wire Types
// Description: spec.md §4.B "Public contract" request/response shapes.
// Purpose: Give `RollupIndex`'s four operations typed inputs and outputs
//          instead of bare tuples.
// Dependencies: rollup-core
// ============================================================================

use std::collections::BTreeMap;

use rollup_core::ExternalObjectEntry;
use rollup_core::ReferenceType;
use rollup_core::Timestamp;

/// Options accepted by [`crate::build::build`] (`spec.md` §4.B `Build`).
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Caps the number of nodes streamed per repository; `None` means
    /// unbounded.
    pub max_nodes: Option<usize>,
    /// Entries are persisted in batches of this size (`spec.md` §4.B
    /// step 3, default 500).
    pub batch_size: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self { max_nodes: None, batch_size: 500 }
    }
}

/// Result of a [`crate::build::build`] call (`spec.md` §4.B `BuildResult`
/// and "Emit per-build metrics").
#[derive(Debug, Clone, Default)]
pub struct BuildResult {
    /// Nodes streamed across every requested repository.
    pub node_count: usize,
    /// Entries successfully created and persisted.
    pub entry_count: usize,
    /// Nodes that failed extraction or persistence.
    pub error_count: usize,
    /// A small sample of node ids that failed, for diagnostics.
    pub sample_error_node_ids: Vec<String>,
    /// Wall-clock milliseconds spent building.
    pub processing_time_ms: u64,
    /// Nodes processed per second, derived from `node_count` and
    /// `processing_time_ms`.
    pub throughput_nodes_per_sec: f64,
}

/// Result of [`crate::lookup::lookup_by_external_id`] (`spec.md` §4.B
/// `LookupResult`).
#[derive(Debug, Clone)]
pub struct LookupResult {
    /// Matching entries.
    pub entries: Vec<ExternalObjectEntry>,
    /// Whether this result was served from cache.
    pub from_cache: bool,
    /// Lookup wall-clock time.
    pub lookup_time_ms: u64,
}

/// Result of [`crate::lookup::reverse_lookup`] (`spec.md` §4.B
/// `ReverseResult`).
#[derive(Debug, Clone)]
pub struct ReverseResult {
    /// References declared by the queried node.
    pub references: Vec<ExternalObjectEntry>,
    /// Whether this result was served from cache.
    pub from_cache: bool,
    /// Lookup wall-clock time.
    pub lookup_time_ms: u64,
}

/// Aggregate index statistics for a tenant (`spec.md` §4.B `Stats`).
#[derive(Debug, Clone)]
pub struct IndexStats {
    /// Total indexed entries for the tenant.
    pub total_entries: u64,
    /// Entry counts grouped by reference type.
    pub entries_by_type: BTreeMap<ReferenceType, u64>,
    /// Cache hit ratio across lookups and reverse-lookups, in `[0.0, 1.0]`.
    pub cache_hit_ratio: f64,
    /// Average lookup latency in milliseconds.
    pub avg_lookup_time_ms: f64,
    /// When the tenant's index was last built, if ever.
    pub last_build_at: Option<Timestamp>,
    /// How long the last build took, in milliseconds.
    pub last_build_time_ms: Option<u64>,
}
