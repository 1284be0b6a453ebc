// crates/rollup-core/src/event.rs
// ============================================================================
// Module: Events
// Description: spec.md §3 "Event" and its type enumeration.
// Purpose: The envelope published by rollup-events and consumed by
//          subscribers of rollup lifecycle and execution state.
// Dependencies: serde
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::identifiers::CorrelationId;
use crate::identifiers::EventId;
use crate::identifiers::RollupId;
use crate::identifiers::TenantId;
use crate::time::Timestamp;

/// The eight lifecycle/execution event kinds defined in `spec.md` §3,
/// serialized as the dotted wire tokens `spec.md` §6 names (e.g.
/// `"rollup.execution.completed"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    /// A `RollupConfig` was created.
    #[serde(rename = "rollup.created")]
    RollupCreated,
    /// A `RollupConfig` was updated.
    #[serde(rename = "rollup.updated")]
    RollupUpdated,
    /// A `RollupConfig` was deleted.
    #[serde(rename = "rollup.deleted")]
    RollupDeleted,
    /// An execution's worker has begun the pipeline.
    #[serde(rename = "rollup.execution.started")]
    ExecutionStarted,
    /// An execution moved to a new phase.
    #[serde(rename = "rollup.execution.progress")]
    ExecutionProgress,
    /// An execution finished successfully.
    #[serde(rename = "rollup.execution.completed")]
    ExecutionCompleted,
    /// An execution failed terminally.
    #[serde(rename = "rollup.execution.failed")]
    ExecutionFailed,
    /// An execution was cancelled by an operator.
    #[serde(rename = "rollup.execution.cancelled")]
    ExecutionCancelled,
}

impl EventType {
    /// Returns the routing channel suffix for this event type
    /// (`spec.md` §4.I "Channel routing": `rollup.*` events route to
    /// `{prefix}:lifecycle`, `execution.*` events to `{prefix}:execution`).
    #[must_use]
    pub const fn channel_suffix(self) -> &'static str {
        match self {
            Self::RollupCreated | Self::RollupUpdated | Self::RollupDeleted => "lifecycle",
            Self::ExecutionStarted
            | Self::ExecutionProgress
            | Self::ExecutionCompleted
            | Self::ExecutionFailed
            | Self::ExecutionCancelled => "execution",
        }
    }
}

/// `spec.md` §3 "Event", wire-compatible with `spec.md` §6's "Event
/// message" artifact: field order and names below are load-bearing, not
/// stylistic (`spec.md` §6 "stable field order for deterministic tests").
///
/// # Invariants
/// - Events for the same `rollup_id` are delivered to a given subscriber
///   in `sequence` order (`spec.md` §4.I "Ordering"), even though
///   `sequence` itself is process-internal and never serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event identifier.
    #[serde(rename = "eventId")]
    pub event_id: EventId,
    /// Event kind.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Rollup the event concerns.
    #[serde(rename = "rollupId")]
    pub rollup_id: RollupId,
    /// Owning tenant.
    #[serde(rename = "tenantId")]
    pub tenant: TenantId,
    /// Time the event was published.
    #[serde(rename = "timestamp")]
    pub published_at: Timestamp,
    /// Correlation id threading this event back to the triggering request.
    #[serde(rename = "correlationId")]
    pub correlation_id: CorrelationId,
    /// Schema version of this envelope; currently always `1`.
    pub version: u32,
    /// Component that published the event (e.g. `"rollup-service"`).
    pub source: String,
    /// Event-type-specific payload.
    #[serde(rename = "data")]
    pub payload: Value,
    /// Monotonically increasing per-`rollup_id` sequence number; internal
    /// ordering bookkeeping, not part of the wire contract.
    #[serde(skip_serializing, default)]
    pub sequence: u64,
}
