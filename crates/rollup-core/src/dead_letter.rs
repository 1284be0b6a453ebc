// crates/rollup-core/src/dead_letter.rs
// ============================================================================
// Module: Dead Letters
// Description: spec.md §3 "DeadLetterEntry" and its status.
// Purpose: Records an execution phase that exhausted retries, for operator
//          inspection and manual or automatic recovery.
// Dependencies: serde
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::execution::ExecutionPhase;
use crate::identifiers::DeadLetterId;
use crate::identifiers::ExecutionId;
use crate::identifiers::RollupId;
use crate::identifiers::TenantId;
use crate::time::Timestamp;

/// Status of a [`DeadLetterEntry`] (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DlqStatus {
    /// Newly recorded, awaiting operator action.
    Pending,
    /// A manual or scheduled retry is in flight.
    Retrying,
    /// Retries were exhausted a second time; requires manual intervention.
    Exhausted,
    /// The underlying execution eventually succeeded.
    Recovered,
    /// An operator discarded the entry without retrying.
    Discarded,
}

/// `spec.md` §3 "DeadLetterEntry".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    /// Dead letter identifier.
    pub id: DeadLetterId,
    /// Execution that produced this entry.
    pub execution_id: ExecutionId,
    /// Rollup the execution belonged to.
    pub rollup_id: RollupId,
    /// Owning tenant.
    pub tenant: TenantId,
    /// Phase that exhausted retries.
    pub phase: ExecutionPhase,
    /// Error message from the final retry attempt.
    pub error_message: String,
    /// Number of retry attempts consumed before dead-lettering.
    pub attempts: u32,
    /// Current status.
    pub status: DlqStatus,
    /// Time the entry was recorded.
    pub created_at: Timestamp,
    /// Time the status last changed.
    pub updated_at: Timestamp,
}
