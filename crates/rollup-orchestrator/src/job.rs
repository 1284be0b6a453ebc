// crates/rollup-orchestrator/src/job.rs
// ============================================================================
// Module: Job Model
// Description: spec.md §4.G "Job model" and "Scheduling policy".
// Purpose: The queued unit of work the in-process broker schedules and the
//          worker pool executes: strict priority, ties broken by enqueue
//          order, delayed jobs promoted once their delay elapses.
// Dependencies: rollup-core, tokio (time)
// ============================================================================

use std::cmp::Ordering;

use rollup_core::Timestamp;
use tokio::time::Instant;

/// Status of a queued [`Job`] (`spec.md` §4.G "Job model").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Eligible for dequeue once its turn comes.
    Waiting,
    /// Not yet eligible; `ready_at` is still in the future.
    Delayed,
    /// Currently being processed by a worker.
    Active,
    /// The handler returned success.
    Completed,
    /// The handler returned a terminal failure or retries were exhausted.
    Failed,
    /// Moved to the dead-letter queue.
    DeadLetter,
}

/// A queued unit of work (`spec.md` §4.G "Job model": `{id, name, payload,
/// status, attempts, maxAttempts, priority, delayUntil, createdAt,
/// processedAt?, completedAt?, error?, progress}`).
#[derive(Debug, Clone)]
pub struct Job {
    /// Broker-assigned job identifier.
    pub id: String,
    /// Job name (`spec.md` §6 `JobBroker.enqueue(name, ...)`).
    pub name: String,
    /// Opaque payload handed to the registered handler.
    pub payload: Vec<u8>,
    /// Current status.
    pub status: JobStatus,
    /// Attempts consumed so far.
    pub attempts: u32,
    /// Maximum attempts before dead-lettering.
    pub max_attempts: u32,
    /// Scheduling priority; higher runs first.
    pub priority: i32,
    /// Wall-clock creation time, for operator-facing reporting.
    pub created_at: Timestamp,
    /// Wall-clock time the most recent attempt began.
    pub processed_at: Option<Timestamp>,
    /// Wall-clock time the job reached a terminal status.
    pub completed_at: Option<Timestamp>,
    /// Error message from the most recent failed attempt.
    pub error: Option<String>,
    /// Progress indicator in `[0, 100]`.
    pub progress: u8,
}

impl Job {
    /// Records a progress update, clamped into `[0, 100]`
    /// (`spec.md` §4.G "Job model" `progress ∈ [0,100]`).
    pub fn set_progress(&mut self, progress: u8) {
        self.progress = progress.min(100);
    }
}

/// A [`Job`] placed in the scheduler's priority queue, carrying the
/// monotonic readiness instant and enqueue sequence used to break ties
/// (`spec.md` §4.G "Scheduling policy": "ties broken by `createdAt`").
#[derive(Debug, Clone)]
pub(crate) struct ScheduledJob {
    /// Monotonic instant after which this job is eligible to run.
    pub ready_at: Instant,
    /// Enqueue sequence number; lower values were enqueued earlier.
    pub sequence: u64,
    /// The job itself.
    pub job: Job,
}

impl ScheduledJob {
    /// Returns whether this job is eligible to run at `now`.
    pub fn is_ready(&self, now: Instant) -> bool {
        self.ready_at <= now
    }
}

impl PartialEq for ScheduledJob {
    fn eq(&self, other: &Self) -> bool {
        self.job.priority == other.job.priority && self.sequence == other.sequence
    }
}

impl Eq for ScheduledJob {}

impl PartialOrd for ScheduledJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledJob {
    /// Orders so [`std::collections::BinaryHeap::pop`] returns the
    /// highest-priority job, breaking ties in favor of the earlier
    /// `sequence` (`spec.md` §4.G "Strict priority... ties broken by
    /// createdAt").
    fn cmp(&self, other: &Self) -> Ordering {
        self.job.priority.cmp(&other.job.priority).then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BinaryHeap;

    use super::*;

    fn job(priority: i32, sequence: u64, ready_at: Instant) -> ScheduledJob {
        ScheduledJob {
            ready_at,
            sequence,
            job: Job {
                id: format!("job-{sequence}"),
                name: "rollup.execute".to_string(),
                payload: Vec::new(),
                status: JobStatus::Waiting,
                attempts: 0,
                max_attempts: 3,
                priority,
                created_at: Timestamp::new(chrono::Utc::now()),
                processed_at: None,
                completed_at: None,
                error: None,
                progress: 0,
            },
        }
    }

    #[test]
    fn higher_priority_is_popped_first() {
        let now = Instant::now();
        let mut heap = BinaryHeap::new();
        heap.push(job(1, 1, now));
        heap.push(job(10, 2, now));
        heap.push(job(5, 3, now));
        let popped = heap.pop().expect("heap has entries");
        assert_eq!(popped.job.priority, 10);
    }

    #[test]
    fn tied_priority_breaks_by_earlier_sequence() {
        let now = Instant::now();
        let mut heap = BinaryHeap::new();
        heap.push(job(5, 2, now));
        heap.push(job(5, 1, now));
        let popped = heap.pop().expect("heap has entries");
        assert_eq!(popped.sequence, 1);
    }

    #[test]
    fn progress_is_clamped_to_100() {
        let mut j = job(0, 0, Instant::now()).job;
        j.set_progress(150);
        assert_eq!(j.progress, 100);
    }
}
