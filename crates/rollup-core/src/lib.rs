// crates/rollup-core/src/lib.rs
// ============================================================================
// Module: Rollup Core Library
// Description: Identifiers, domain records, error taxonomy, and collaborator
//              interfaces shared by every crate in the rollup engine.
// Purpose: Give every other crate one stable, dependency-light contract
//          layer so the core subsystems (index, matchers, merge, blast
//          radius, service, orchestrator, cache, events) never depend on
//          each other's internals.
// Dependencies: chrono, serde, serde_json, sha2, thiserror, uuid
// ============================================================================

//! ## Overview
//! `rollup-core` is the contract crate for the cross-repository rollup
//! engine. It has no knowledge of how references are extracted, how
//! matchers score candidate pairs, or how executions are scheduled — it
//! only defines the identifiers, wire records, and collaborator traits that
//! let those pieces talk to each other and to external systems (scan
//! stores, object stores, job brokers, blob caches, event publishers)
//! without depending on their implementations.
//!
//! Security posture: every tenant-scoped record and interface enforces
//! tenant isolation at the type level (`TenantId` is a required field, not
//! inferred); callers outside this crate are responsible for passing the
//! correct tenant context.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod cache_entry;
pub mod dead_letter;
pub mod error;
pub mod event;
pub mod execution;
pub mod external_object;
pub mod hashing;
pub mod identifiers;
pub mod interfaces;
pub mod match_result;
pub mod matcher_config;
pub mod merge_options;
pub mod merged_node;
pub mod rollup_config;
pub mod time;

#[cfg(test)]
mod tests;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use cache_entry::CacheEntry;
pub use cache_entry::CacheLayer;
pub use dead_letter::DeadLetterEntry;
pub use dead_letter::DlqStatus;
pub use error::ErrorCode;
pub use error::RollupError;
pub use error::SafeError;
pub use event::Event;
pub use event::EventType;
pub use execution::ExecutionPhase;
pub use execution::ExecutionProgress;
pub use execution::ExecutionStatus;
pub use execution::PhaseCheckpoint;
pub use execution::RollupExecution;
pub use external_object::ExternalObjectEntry;
pub use external_object::ReferenceType;
pub use identifiers::CorrelationId;
pub use identifiers::DeadLetterId;
pub use identifiers::EventId;
pub use identifiers::ExecutionId;
pub use identifiers::MergedNodeId;
pub use identifiers::NodeId;
pub use identifiers::RepositoryId;
pub use identifiers::RollupId;
pub use identifiers::ScanId;
pub use identifiers::TenantId;
pub use interfaces::BlobCache;
pub use interfaces::BlobCacheError;
pub use interfaces::EnqueueOptions;
pub use interfaces::EventPublisher;
pub use interfaces::EventPublisherError;
pub use interfaces::ExternalObjectFilter;
pub use interfaces::ExternalObjectStore;
pub use interfaces::ExternalObjectStoreError;
pub use interfaces::Graph;
pub use interfaces::GraphEdge;
pub use interfaces::GraphNode;
pub use interfaces::JobBroker;
pub use interfaces::JobBrokerError;
pub use interfaces::JobEvent;
pub use interfaces::MergedEdge;
pub use interfaces::MergedGraph;
pub use interfaces::RollupStore;
pub use interfaces::RollupStoreError;
pub use interfaces::ScanGraphStore;
pub use interfaces::ScanGraphStoreError;
pub use match_result::MatchDetails;
pub use match_result::MatchResult;
pub use match_result::MatchStrategy;
pub use matcher_config::ArnMatcherConfig;
pub use matcher_config::MatcherConfig;
pub use matcher_config::NameMatcherConfig;
pub use matcher_config::ResourceIdMatcherConfig;
pub use matcher_config::TagMatcherConfig;
pub use matcher_config::TagMatchMode;
pub use matcher_config::TagRequirement;
pub use merge_options::ConflictResolution;
pub use merge_options::MergeOptions;
pub use merged_node::MatchInfo;
pub use merged_node::MergedNode;
pub use merged_node::NodeLocation;
pub use rollup_config::RollupConfig;
pub use rollup_config::RollupStatus;
pub use time::Timestamp;
