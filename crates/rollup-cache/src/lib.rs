// crates/rollup-cache/src/lib.rs
// ============================================================================
// Module: Rollup Cache Library
// Description: spec.md §4.H "Rollup Cache (L1+L2)".
// Purpose: The two-tier cache (in-process LRU fronting an optional remote
//          blob cache) and its proactive warming subsystem, shared by the
//          external object index, execution orchestrator, and rollup
//          service.
// Dependencies: async-trait, lru, rollup-core, serde, serde_json, thiserror,
//               tokio, tracing
// ============================================================================

//! ## Overview
//! `rollup-cache` gives every keyspace (execution results, merged graphs,
//! blast radii, the external object index) its own bounded L1 shard and a
//! shared, optional L2 [`rollup_core::BlobCache`] collaborator. Tag- and
//! tenant-scoped invalidation sweep both tiers; L2 failures are logged and
//! treated as cache misses, never propagated as errors.

pub mod cache;
pub mod key;
pub mod keyspace;
pub mod l1;
pub mod stats;
pub mod warming;

pub use cache::CacheConfig;
pub use cache::RollupCache;
pub use key::build_key;
pub use key::index_lookup_key;
pub use key::reverse_lookup_key;
pub use keyspace::Keyspace;
pub use stats::CacheStats;
pub use stats::CacheStatsSnapshot;
pub use warming::WarmItemOutcome;
pub use warming::WarmJob;
pub use warming::WarmJobSummary;
pub use warming::WarmPriority;
pub use warming::WarmTarget;
pub use warming::Warmer;
pub use warming::WarmingProcessor;
