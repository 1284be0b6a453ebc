// crates/rollup-core/src/execution.rs
// ============================================================================
// Module: Rollup Executions
// Description: spec.md §3 "RollupExecution" and its phase/progress types.
// Purpose: Tracks one run of the orchestrator pipeline for a RollupConfig,
//          including resumable checkpoints.
// Dependencies: serde
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::ExecutionId;
use crate::identifiers::RollupId;
use crate::identifiers::TenantId;
use crate::time::Timestamp;

/// Status of a [`RollupExecution`] (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Queued, not yet picked up by a worker.
    Pending,
    /// A worker is actively driving the pipeline.
    Running,
    /// All phases finished without error.
    Completed,
    /// A phase failed after exhausting retries.
    Failed,
    /// Cancelled by operator request.
    Cancelled,
}

impl ExecutionStatus {
    /// Returns whether this status is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// One phase of the orchestrator pipeline (`spec.md` §4.G "Phases").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPhase {
    /// Fetch scan graphs for every repository in the rollup.
    Fetch,
    /// Run configured matchers over the fetched graphs.
    Match,
    /// Merge matched nodes into `MergedNode` records.
    Merge,
    /// Persist results to the rollup store.
    Store,
    /// Publish lifecycle events / invoke configured callbacks.
    Callback,
}

impl ExecutionPhase {
    /// Returns the phase that follows this one, or `None` after the last
    /// phase.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Fetch => Some(Self::Match),
            Self::Match => Some(Self::Merge),
            Self::Merge => Some(Self::Store),
            Self::Store => Some(Self::Callback),
            Self::Callback => None,
        }
    }
}

/// Per-repository progress counters for the current phase (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionProgress {
    /// Repositories processed so far in the current phase.
    pub repositories_processed: u32,
    /// Total repositories to process in the current phase.
    pub repositories_total: u32,
    /// Nodes matched so far (meaningful from the match phase onward).
    pub nodes_matched: u32,
    /// Merged nodes produced so far (meaningful from the merge phase
    /// onward).
    pub nodes_merged: u32,
}

impl ExecutionProgress {
    /// Returns a zeroed progress counter.
    #[must_use]
    pub const fn zero() -> Self {
        Self { repositories_processed: 0, repositories_total: 0, nodes_matched: 0, nodes_merged: 0 }
    }
}

/// A resumable checkpoint recorded at phase boundaries (`spec.md` §4.G
/// "Checkpointing").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseCheckpoint {
    /// Phase this checkpoint was taken at the end of.
    pub phase: ExecutionPhase,
    /// Opaque, phase-specific resume token (e.g. serialized match results).
    pub resume_token: String,
    /// Time the checkpoint was recorded.
    pub recorded_at: Timestamp,
}

/// `spec.md` §3 "RollupExecution".
///
/// # Invariants
/// - `checkpoints` is ordered by `ExecutionPhase` and contains no
///   duplicate phases.
/// - `status.is_terminal()` implies `finished_at.is_some()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupExecution {
    /// Execution identifier.
    pub execution_id: ExecutionId,
    /// Rollup this execution runs.
    pub rollup_id: RollupId,
    /// Owning tenant.
    pub tenant: TenantId,
    /// Current status.
    pub status: ExecutionStatus,
    /// Current phase, if running.
    pub current_phase: Option<ExecutionPhase>,
    /// Progress within the current phase.
    pub progress: ExecutionProgress,
    /// Checkpoints recorded so far, oldest first.
    pub checkpoints: Vec<PhaseCheckpoint>,
    /// Number of retry attempts consumed across all phases.
    pub retry_count: u32,
    /// Error message of the most recent failure, if any.
    pub last_error: Option<String>,
    /// Whether the execution was triggered by a schedule rather than an
    /// explicit operator call.
    pub triggered_by_schedule: bool,
    /// Time the execution was enqueued.
    pub started_at: Timestamp,
    /// Time the execution reached a terminal status.
    pub finished_at: Option<Timestamp>,
}

impl RollupExecution {
    /// Returns the highest phase reached by a recorded checkpoint, if any.
    #[must_use]
    pub fn last_checkpointed_phase(&self) -> Option<ExecutionPhase> {
        self.checkpoints.iter().map(|c| c.phase).max()
    }
}
