// crates/rollup-cache/src/warming.rs
// ============================================================================
// Module: Cache Warming
// Description: spec.md §4.H "Warming".
// Purpose: A priority-queued worker pool that proactively repopulates the
//          cache for a tenant/rollup set ahead of demand.
// Dependencies: rollup-core, tokio (sync), tracing
// ============================================================================

//! ## Overview
//! Warming jobs never fail as a whole: per-item failures are logged and
//! counted, and the job completes with a tally (`spec.md` §4.H "Failures
//! inside warming are logged and counted but never fail the warming job as
//! a whole").

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use rollup_core::RollupId;
use rollup_core::TenantId;
use tokio::sync::Mutex;
use tracing::warn;

/// A cached artifact kind a warming job may target (`spec.md` §4.H).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WarmTarget {
    /// Warm cached execution results.
    ExecutionResult,
    /// Warm cached merged graphs.
    MergedGraph,
    /// Warm cached blast-radius results.
    BlastRadius,
}

/// Priority tier for a warming job (`spec.md` §4.H: `{high=10, normal=5,
/// low=1}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WarmPriority {
    /// Lowest priority, `1`.
    Low,
    /// Default priority, `5`.
    Normal,
    /// Highest priority, `10`.
    High,
}

impl WarmPriority {
    /// Returns the numeric weight used for ordering (`spec.md` §4.H).
    #[must_use]
    pub const fn weight(self) -> i32 {
        match self {
            Self::Low => 1,
            Self::Normal => 5,
            Self::High => 10,
        }
    }
}

/// A single warming request (`spec.md` §4.H `{tenant, rollupIds?,
/// targetTypes, priority, forceRefresh, maxItems}`).
#[derive(Debug, Clone)]
pub struct WarmJob {
    /// Tenant to warm on behalf of.
    pub tenant: TenantId,
    /// Restrict warming to these rollups, when non-empty.
    pub rollup_ids: Vec<RollupId>,
    /// Cached artifact kinds to warm.
    pub target_types: Vec<WarmTarget>,
    /// Dequeue priority.
    pub priority: WarmPriority,
    /// When set, re-fetch and overwrite even a live cache entry.
    pub force_refresh: bool,
    /// Upper bound on items warmed by this job.
    pub max_items: usize,
}

/// A per-item outcome reported while a [`WarmJob`] drains (`spec.md` §4.H
/// "each warmed item emits a per-item progress update").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmItemOutcome {
    /// Rollup the warmed item belonged to.
    pub rollup_id: RollupId,
    /// Cached artifact kind that was warmed.
    pub target_type: WarmTarget,
    /// Whether the item was successfully warmed.
    pub succeeded: bool,
}

/// Final tally for a completed [`WarmJob`] (`spec.md` §4.H).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WarmJobSummary {
    /// Items successfully warmed.
    pub warmed: u64,
    /// Items attempted but failed.
    pub failed: u64,
}

/// A single item of work produced by expanding a [`WarmJob`] across its
/// `rollup_ids` and `target_types`.
#[derive(Debug, Clone)]
struct WarmWorkItem {
    /// Tenant to warm on behalf of.
    tenant: TenantId,
    /// Rollup to warm.
    rollup_id: RollupId,
    /// Cached artifact kind to warm.
    target_type: WarmTarget,
    /// Whether to overwrite a live cache entry.
    force_refresh: bool,
    /// Dequeue priority.
    priority: WarmPriority,
}

impl PartialEq for WarmWorkItem {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}
impl Eq for WarmWorkItem {}
impl PartialOrd for WarmWorkItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for WarmWorkItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority.cmp(&other.priority)
    }
}

/// A single warmer, invoked once per `(rollup, target type)` pair. Callers
/// supply this as the bridge into the orchestrator's execution-result /
/// merged-graph / blast-radius producers.
#[async_trait::async_trait]
pub trait Warmer: Send + Sync {
    /// Warms one item, returning `Ok(())` on success.
    ///
    /// # Errors
    ///
    /// Returns an opaque error message on failure; the warming processor
    /// logs and counts it but never propagates it as a job failure.
    async fn warm(
        &self,
        tenant: TenantId,
        rollup_id: RollupId,
        target_type: WarmTarget,
        force_refresh: bool,
    ) -> Result<(), String>;
}

/// A priority-queued, single-worker warming processor (`spec.md` §4.H
/// "Warming"). Multiple processors may be run concurrently by callers to
/// form a worker pool.
pub struct WarmingProcessor<W: Warmer> {
    /// Bridge into the actual per-item warm operation.
    warmer: Arc<W>,
    /// Pending work items, highest priority first.
    queue: Mutex<BinaryHeap<WarmWorkItem>>,
}

impl<W: Warmer> WarmingProcessor<W> {
    /// Builds a processor backed by `warmer`.
    #[must_use]
    pub fn new(warmer: Arc<W>) -> Self {
        Self { warmer, queue: Mutex::new(BinaryHeap::new()) }
    }

    /// Enqueues a job, expanding it into one work item per
    /// `(rollup, target type)` pair, bounded by `max_items`.
    pub async fn enqueue(&self, job: WarmJob) {
        let mut queue = self.queue.lock().await;
        let mut enqueued = 0usize;
        'outer: for rollup_id in &job.rollup_ids {
            for target_type in &job.target_types {
                if enqueued >= job.max_items {
                    break 'outer;
                }
                queue.push(WarmWorkItem {
                    tenant: job.tenant,
                    rollup_id: *rollup_id,
                    target_type: *target_type,
                    force_refresh: job.force_refresh,
                    priority: job.priority,
                });
                enqueued += 1;
            }
        }
    }

    /// Drains the queue, warming each item and reporting progress through
    /// `on_progress`. Returns the final tally once the queue is empty.
    pub async fn drain<F: FnMut(WarmItemOutcome)>(&self, mut on_progress: F) -> WarmJobSummary {
        let mut summary = WarmJobSummary::default();
        loop {
            let item = {
                let mut queue = self.queue.lock().await;
                let Some(item) = queue.pop() else { break };
                item
            };
            let result = self.warmer.warm(item.tenant, item.rollup_id, item.target_type, item.force_refresh).await;
            let succeeded = result.is_ok();
            if let Err(message) = result {
                warn!(rollup_id = %item.rollup_id, ?item.target_type, error = %message, "cache warming item failed");
                summary.failed += 1;
            } else {
                summary.warmed += 1;
            }
            on_progress(WarmItemOutcome { rollup_id: item.rollup_id, target_type: item.target_type, succeeded });
        }
        summary
    }

    /// Returns the number of items still queued.
    pub async fn pending(&self) -> usize {
        self.queue.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering as AtomicOrdering;

    use super::*;

    struct CountingWarmer {
        calls: AtomicUsize,
        fail_every: usize,
    }

    #[async_trait::async_trait]
    impl Warmer for CountingWarmer {
        async fn warm(
            &self,
            _tenant: TenantId,
            _rollup_id: RollupId,
            _target_type: WarmTarget,
            _force_refresh: bool,
        ) -> Result<(), String> {
            let call = self.calls.fetch_add(1, AtomicOrdering::Relaxed);
            if self.fail_every != 0 && call % self.fail_every == 0 {
                return Err("boom".to_string());
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn drains_all_enqueued_items_and_tallies_failures() {
        let warmer = Arc::new(CountingWarmer { calls: AtomicUsize::new(0), fail_every: 2 });
        let processor = WarmingProcessor::new(warmer);
        let job = WarmJob {
            tenant: TenantId::new(),
            rollup_ids: vec![RollupId::new(), RollupId::new()],
            target_types: vec![WarmTarget::ExecutionResult],
            priority: WarmPriority::Normal,
            force_refresh: false,
            max_items: 100,
        };
        processor.enqueue(job).await;
        let mut progress_events = 0;
        let summary = processor.drain(|_| progress_events += 1).await;
        assert_eq!(summary.warmed + summary.failed, 2);
        assert_eq!(progress_events, 2);
        assert_eq!(processor.pending().await, 0);
    }

    #[tokio::test]
    async fn enqueue_respects_max_items() {
        let warmer = Arc::new(CountingWarmer { calls: AtomicUsize::new(0), fail_every: 0 });
        let processor = WarmingProcessor::new(warmer);
        let job = WarmJob {
            tenant: TenantId::new(),
            rollup_ids: vec![RollupId::new(), RollupId::new(), RollupId::new()],
            target_types: vec![WarmTarget::ExecutionResult, WarmTarget::MergedGraph],
            priority: WarmPriority::High,
            force_refresh: true,
            max_items: 2,
        };
        processor.enqueue(job).await;
        assert_eq!(processor.pending().await, 2);
    }

    #[tokio::test]
    async fn higher_priority_items_drain_first() {
        let warmer = Arc::new(CountingWarmer { calls: AtomicUsize::new(0), fail_every: 0 });
        let processor = WarmingProcessor::new(warmer);
        processor
            .enqueue(WarmJob {
                tenant: TenantId::new(),
                rollup_ids: vec![RollupId::new()],
                target_types: vec![WarmTarget::BlastRadius],
                priority: WarmPriority::Low,
                force_refresh: false,
                max_items: 10,
            })
            .await;
        let high_rollup = RollupId::new();
        processor
            .enqueue(WarmJob {
                tenant: TenantId::new(),
                rollup_ids: vec![high_rollup],
                target_types: vec![WarmTarget::BlastRadius],
                priority: WarmPriority::High,
                force_refresh: false,
                max_items: 10,
            })
            .await;
        let mut order = Vec::new();
        processor.drain(|outcome| order.push(outcome.rollup_id)).await;
        assert_eq!(order[0], high_rollup);
    }
}
