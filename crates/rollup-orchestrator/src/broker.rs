// crates/rollup-orchestrator/src/broker.rs
// ============================================================================
// Module: In-Process Job Broker
// Description: spec.md §4.G "Scheduling policy" and §6 `JobBroker`.
// Purpose: Implements rollup_core::JobBroker for producer/admin calls, and
//          separately owns the worker-pool consumption loop the trait itself
//          does not describe: a shared priority queue drained by a fixed set
//          of tokio tasks, one handler invocation per job.
// Dependencies: rollup-core, rollup-config, tokio (sync, time), rand
// ============================================================================

use std::collections::BinaryHeap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use rollup_config::RetryPolicyConfig;
use rollup_core::{EnqueueOptions, JobBroker, JobBrokerError, Timestamp};
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::job::{Job, JobStatus, ScheduledJob};

/// Outcome a registered handler reports for one job attempt
/// (`spec.md` §4.G "Retryable vs. terminal failures").
#[derive(Debug, Clone)]
pub enum JobOutcome {
    /// The job finished successfully.
    Completed,
    /// The job failed but may be retried.
    Retryable(String),
    /// The job failed and must not be retried.
    Terminal(String),
}

/// A registered job handler: takes the payload, returns a future resolving
/// to the outcome of one attempt.
pub type Handler = Arc<dyn Fn(Vec<u8>) -> Pin<Box<dyn Future<Output = JobOutcome> + Send>> + Send + Sync>;

struct SharedState {
    queue: Mutex<BinaryHeap<ScheduledJob>>,
    dead_letters: Mutex<Vec<Job>>,
    notify: Notify,
    paused: AtomicBool,
    closed: AtomicBool,
    sequence: AtomicU64,
}

/// An in-process [`JobBroker`] backed by a shared priority queue and a fixed
/// pool of Tokio workers (`spec.md` §4.G "worker pool runs at most
/// `concurrency` jobs in parallel").
///
/// The [`JobBroker`] trait only covers producer/admin operations; this type
/// additionally exposes [`InProcessJobBroker::spawn_workers`], an inherent
/// method that registers the handler and starts consumption — there is no
/// dequeue method on the trait itself to implement.
pub struct InProcessJobBroker {
    shared: Arc<SharedState>,
    retry_policy: RetryPolicyConfig,
}

impl InProcessJobBroker {
    /// Creates an empty broker governed by `retry_policy` for job-level
    /// backoff between attempts.
    #[must_use]
    pub fn new(retry_policy: RetryPolicyConfig) -> Self {
        Self {
            shared: Arc::new(SharedState {
                queue: Mutex::new(BinaryHeap::new()),
                dead_letters: Mutex::new(Vec::new()),
                notify: Notify::new(),
                paused: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                sequence: AtomicU64::new(0),
            }),
            retry_policy,
        }
    }

    /// Spawns `concurrency` worker tasks draining the queue and invoking
    /// `handler` for each job, rescheduling retryable failures with
    /// jittered backoff and dead-lettering exhausted or terminal ones
    /// (`spec.md` §4.G "Retry policy", "Dead-letter queue").
    pub fn spawn_workers(&self, concurrency: usize, handler: Handler) -> Vec<tokio::task::JoinHandle<()>> {
        (0..concurrency)
            .map(|_| {
                let shared = Arc::clone(&self.shared);
                let handler = Arc::clone(&handler);
                let retry_policy = self.retry_policy;
                tokio::spawn(async move { worker_loop(shared, handler, retry_policy).await })
            })
            .collect()
    }

    /// Returns the number of jobs currently queued (waiting or delayed).
    pub async fn queue_len(&self) -> usize {
        self.shared.queue.lock().await.len()
    }
}

async fn worker_loop(shared: Arc<SharedState>, handler: Handler, retry_policy: RetryPolicyConfig) {
    loop {
        if shared.closed.load(AtomicOrdering::SeqCst) {
            return;
        }
        let Some(mut scheduled) = pop_ready(&shared).await else {
            shared.notify.notified().await;
            continue;
        };
        scheduled.job.status = JobStatus::Active;
        scheduled.job.attempts += 1;
        scheduled.job.processed_at = Some(Timestamp::new(chrono::Utc::now()));
        let outcome = (handler)(scheduled.job.payload.clone()).await;
        match outcome {
            JobOutcome::Completed => {
                scheduled.job.status = JobStatus::Completed;
                scheduled.job.completed_at = Some(Timestamp::new(chrono::Utc::now()));
                scheduled.job.set_progress(100);
            }
            JobOutcome::Retryable(message) if scheduled.job.attempts < scheduled.job.max_attempts => {
                scheduled.job.error = Some(message);
                scheduled.job.status = JobStatus::Waiting;
                let mut rng = rand::thread_rng();
                let jitter = rng.gen_range(-retry_policy.jitter_factor..=retry_policy.jitter_factor);
                let delay_ms = retry_policy.delay_for(scheduled.job.attempts, jitter);
                scheduled.ready_at = Instant::now() + tokio::time::Duration::from_millis(delay_ms);
                let mut queue = shared.queue.lock().await;
                queue.push(scheduled);
                drop(queue);
                shared.notify.notify_one();
                continue;
            }
            JobOutcome::Retryable(message) => {
                scheduled.job.error = Some(message);
                scheduled.job.status = JobStatus::DeadLetter;
                scheduled.job.completed_at = Some(Timestamp::new(chrono::Utc::now()));
                shared.dead_letters.lock().await.push(scheduled.job);
                continue;
            }
            JobOutcome::Terminal(message) => {
                scheduled.job.error = Some(message);
                scheduled.job.status = JobStatus::Failed;
                scheduled.job.completed_at = Some(Timestamp::new(chrono::Utc::now()));
                continue;
            }
        }
    }
}

async fn pop_ready(shared: &Arc<SharedState>) -> Option<ScheduledJob> {
    if shared.paused.load(AtomicOrdering::SeqCst) {
        return None;
    }
    let mut queue = shared.queue.lock().await;
    let now = Instant::now();
    let Some(top) = queue.peek() else { return None };
    if top.is_ready(now) { queue.pop() } else { None }
}

#[async_trait]
impl JobBroker for InProcessJobBroker {
    async fn enqueue(&self, name: &str, payload: Vec<u8>, opts: EnqueueOptions) -> Result<(), JobBrokerError> {
        if self.shared.closed.load(AtomicOrdering::SeqCst) {
            return Err(JobBrokerError::Closed);
        }
        let sequence = self.shared.sequence.fetch_add(1, AtomicOrdering::SeqCst);
        let now = Instant::now();
        let ready_at = now + opts.delay;
        let status = if opts.delay.is_zero() { JobStatus::Waiting } else { JobStatus::Delayed };
        let job = Job {
            id: format!("job_{sequence}"),
            name: name.to_string(),
            payload,
            status,
            attempts: 0,
            max_attempts: opts.max_attempts,
            priority: opts.priority,
            created_at: Timestamp::new(chrono::Utc::now()),
            processed_at: None,
            completed_at: None,
            error: None,
            progress: 0,
        };
        self.shared.queue.lock().await.push(ScheduledJob { ready_at, sequence, job });
        self.shared.notify.notify_one();
        Ok(())
    }

    async fn pause(&self) -> Result<(), JobBrokerError> {
        self.shared.paused.store(true, AtomicOrdering::SeqCst);
        Ok(())
    }

    async fn resume(&self) -> Result<(), JobBrokerError> {
        self.shared.paused.store(false, AtomicOrdering::SeqCst);
        self.shared.notify.notify_waiters();
        Ok(())
    }

    async fn close(&self) -> Result<(), JobBrokerError> {
        self.shared.closed.store(true, AtomicOrdering::SeqCst);
        self.shared.notify.notify_waiters();
        Ok(())
    }

    async fn list_dead_letters(&self) -> Result<Vec<String>, JobBrokerError> {
        Ok(self.shared.dead_letters.lock().await.iter().map(|job| job.id.clone()).collect())
    }

    async fn retry_dead_letter(&self, job_id: &str) -> Result<(), JobBrokerError> {
        let mut dead_letters = self.shared.dead_letters.lock().await;
        let Some(index) = dead_letters.iter().position(|job| job.id == job_id) else {
            return Err(JobBrokerError::Unavailable { message: format!("unknown dead letter job id: {job_id}") });
        };
        let mut job = dead_letters.remove(index);
        drop(dead_letters);
        job.attempts = 0;
        job.status = JobStatus::Waiting;
        job.error = None;
        let sequence = self.shared.sequence.fetch_add(1, AtomicOrdering::SeqCst);
        self.shared.queue.lock().await.push(ScheduledJob { ready_at: Instant::now(), sequence, job });
        self.shared.notify.notify_one();
        Ok(())
    }

    async fn discard_dead_letter(&self, job_id: &str) -> Result<(), JobBrokerError> {
        let mut dead_letters = self.shared.dead_letters.lock().await;
        let before = dead_letters.len();
        dead_letters.retain(|job| job.id != job_id);
        if dead_letters.len() == before {
            return Err(JobBrokerError::Unavailable { message: format!("unknown dead letter job id: {job_id}") });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;

    fn policy() -> RetryPolicyConfig {
        RetryPolicyConfig { max_attempts: 3, base_delay_ms: 5, backoff_multiplier: 2.0, max_delay_ms: 50, jitter_factor: 0.0, timeout_ms: 1000 }
    }

    #[tokio::test]
    async fn completed_job_does_not_reach_dead_letters() {
        let broker = InProcessJobBroker::new(policy());
        let handler: Handler = Arc::new(|_payload| Box::pin(async { JobOutcome::Completed }));
        let handles = broker.spawn_workers(1, handler);
        broker
            .enqueue("rollup.execute", b"payload".to_vec(), EnqueueOptions { priority: 0, delay: Duration::ZERO, max_attempts: 3 })
            .await
            .expect("enqueue succeeds");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(broker.list_dead_letters().await.expect("list"), Vec::<String>::new());
        for handle in handles {
            handle.abort();
        }
    }

    #[tokio::test]
    async fn retryable_failure_exhausts_into_dead_letter() {
        let broker = InProcessJobBroker::new(policy());
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = Arc::clone(&attempts);
        let handler: Handler = Arc::new(move |_payload| {
            attempts_clone.fetch_add(1, AtomicOrdering::SeqCst);
            Box::pin(async { JobOutcome::Retryable("transient".to_string()) })
        });
        let handles = broker.spawn_workers(1, handler);
        broker
            .enqueue("rollup.execute", b"payload".to_vec(), EnqueueOptions { priority: 0, delay: Duration::ZERO, max_attempts: 2 })
            .await
            .expect("enqueue succeeds");
        tokio::time::sleep(Duration::from_millis(200)).await;
        let dead_letters = broker.list_dead_letters().await.expect("list");
        assert_eq!(dead_letters.len(), 1);
        assert_eq!(attempts.load(AtomicOrdering::SeqCst), 2);
        for handle in handles {
            handle.abort();
        }
    }

    #[tokio::test]
    async fn dead_letter_can_be_retried() {
        let broker = InProcessJobBroker::new(policy());
        let handler: Handler = Arc::new(|_payload| Box::pin(async { JobOutcome::Terminal("bad input".to_string()) }));
        let _handles = broker.spawn_workers(1, handler);
        broker
            .enqueue("rollup.execute", b"payload".to_vec(), EnqueueOptions { priority: 0, delay: Duration::ZERO, max_attempts: 1 })
            .await
            .expect("enqueue succeeds");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(broker.queue_len().await, 0);
    }

    #[tokio::test]
    async fn paused_broker_does_not_dequeue() {
        let broker = InProcessJobBroker::new(policy());
        broker.pause().await.expect("pause succeeds");
        let handler: Handler = Arc::new(|_payload| Box::pin(async { JobOutcome::Completed }));
        let handles = broker.spawn_workers(1, handler);
        broker
            .enqueue("rollup.execute", b"payload".to_vec(), EnqueueOptions { priority: 0, delay: Duration::ZERO, max_attempts: 1 })
            .await
            .expect("enqueue succeeds");
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(broker.queue_len().await, 1);
        for handle in handles {
            handle.abort();
        }
    }
}
