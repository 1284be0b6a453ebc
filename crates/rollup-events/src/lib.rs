// crates/rollup-events/src/lib.rs
// ============================================================================
// Module: Rollup Events Library
// Description: Component I — event envelope construction, channel routing,
//              per-rollup ordering, retry-on-publish, and in-process
//              subscribers.
// Purpose: The single place every lifecycle/execution event is wrapped,
//          sequenced, and handed to the configured EventPublisher, so
//          rollup-service and rollup-orchestrator never build envelopes by
//          hand.
// Dependencies: rand, rollup-core, serde_json, tokio (sync, time), tracing
// ============================================================================

//! ## Overview
//! [`EventBus::emit`] is fire-and-forget (`spec.md` §4.I "Publishing is
//! fire-and-forget... emit MUST NOT throw to the caller"): it assigns a
//! fresh [`rollup_core::EventId`] and the next per-`rollupId` sequence
//! number, routes to the lifecycle or execution channel by
//! [`rollup_core::EventType::channel_suffix`], retries the configured
//! [`rollup_core::EventPublisher`] with jittered exponential backoff, and
//! logs-and-drops on exhaustion. A `publisher: None` bus is a valid
//! configuration — events are discarded silently (`spec.md` §4.I "A null
//! publisher is an acceptable configuration").
//!
//! Per-`rollupId` ordering (`spec.md` §4.I "Ordering guarantee") is
//! enforced by serializing `emit` calls for the same rollup through a
//! per-rollup [`tokio::sync::Mutex`], so two concurrent emits for the same
//! rollup never race to assign sequence numbers or publish out of order;
//! concurrent emits for different rollups proceed independently.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use rand::Rng;
use rollup_core::CorrelationId;
use rollup_core::Event;
use rollup_core::EventId;
use rollup_core::EventPublisher;
use rollup_core::EventType;
use rollup_core::RollupId;
use rollup_core::TenantId;
use rollup_core::Timestamp;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::error;
use tracing::warn;

/// Retry policy applied to a single publisher call before the event is
/// dropped (`spec.md` §4.I "Retry").
#[derive(Debug, Clone, Copy)]
pub struct PublishRetryPolicy {
    /// Maximum publish attempts before the event is dropped.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub multiplier: f64,
    /// Upper bound on the computed delay.
    pub max_delay: Duration,
    /// Fractional jitter applied to each computed delay, in `[0, 1]`.
    pub jitter_factor: f64,
}

impl Default for PublishRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            multiplier: 2.0,
            max_delay: Duration::from_secs(5),
            jitter_factor: 0.1,
        }
    }
}

impl PublishRetryPolicy {
    /// Computes the jittered backoff delay before attempt number `attempt`
    /// (1-indexed: the delay before the *second* attempt uses `attempt =
    /// 1`).
    fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        #[allow(clippy::cast_possible_truncation, reason = "bounded below max_delay before conversion")]
        #[allow(clippy::cast_sign_loss, reason = "multiplier.powi result is non-negative for non-negative base_delay")]
        let raw_ms = (self.base_delay.as_millis() as f64 * self.multiplier.powi(exponent)).min(self.max_delay.as_millis() as f64);
        let jitter = rand::thread_rng().gen_range(-self.jitter_factor..=self.jitter_factor);
        let jittered_ms = (raw_ms * (1.0 + jitter)).max(0.0);
        Duration::from_millis(jittered_ms as u64)
    }
}

/// Channel prefix used to build the two routed channel names
/// (`spec.md` §6 "Channel names", default `rollup:events`).
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Prefix shared by both channels.
    pub prefix: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self { prefix: "rollup:events".to_string() }
    }
}

impl ChannelConfig {
    /// Returns the full channel name for an event type
    /// (`spec.md` §4.I "Channel routing").
    #[must_use]
    pub fn channel_for(&self, event_type: EventType) -> String {
        format!("{}:{}", self.prefix, event_type.channel_suffix())
    }
}

/// An in-process subscription handle (`spec.md` §4.I "Subscribers").
struct Subscription {
    id: u64,
    types: Option<Vec<EventType>>,
    handler: Box<dyn Fn(&Event) + Send + Sync>,
}

/// Unsubscribes a handler registered via [`EventBus::subscribe`] when
/// dropped or called explicitly.
pub struct Unsubscribe {
    id: u64,
    subscriptions: Arc<StdMutex<Vec<Subscription>>>,
}

impl Unsubscribe {
    /// Removes the associated handler.
    pub fn call(self) {
        if let Ok(mut subscriptions) = self.subscriptions.lock() {
            subscriptions.retain(|s| s.id != self.id);
        }
    }
}

/// Per-rollup event sequencing and publication (`spec.md` §4.I).
pub struct EventBus {
    publisher: Option<Arc<dyn EventPublisher>>,
    channels: ChannelConfig,
    retry: PublishRetryPolicy,
    source: String,
    next_sequence: Mutex<HashMap<RollupId, u64>>,
    rollup_locks: Mutex<HashMap<RollupId, Arc<Mutex<()>>>>,
    subscriptions: Arc<StdMutex<Vec<Subscription>>>,
    next_subscription_id: std::sync::atomic::AtomicU64,
}

impl EventBus {
    /// Builds an event bus with no publisher configured; every emit is
    /// discarded after notifying in-process subscribers
    /// (`spec.md` §4.I "A null publisher is an acceptable configuration").
    #[must_use]
    pub fn null(source: impl Into<String>) -> Self {
        Self::new(None, ChannelConfig::default(), PublishRetryPolicy::default(), source)
    }

    /// Builds an event bus backed by a publisher.
    #[must_use]
    pub fn new(
        publisher: Option<Arc<dyn EventPublisher>>,
        channels: ChannelConfig,
        retry: PublishRetryPolicy,
        source: impl Into<String>,
    ) -> Self {
        Self {
            publisher,
            channels,
            retry,
            source: source.into(),
            next_sequence: Mutex::new(HashMap::new()),
            rollup_locks: Mutex::new(HashMap::new()),
            subscriptions: Arc::new(StdMutex::new(Vec::new())),
            next_subscription_id: std::sync::atomic::AtomicU64::new(1),
        }
    }

    async fn lock_for(&self, rollup_id: RollupId) -> Arc<Mutex<()>> {
        let mut locks = self.rollup_locks.lock().await;
        Arc::clone(locks.entry(rollup_id).or_insert_with(|| Arc::new(Mutex::new(()))))
    }

    async fn next_sequence_for(&self, rollup_id: RollupId) -> u64 {
        let mut sequences = self.next_sequence.lock().await;
        let entry = sequences.entry(rollup_id).or_insert(0);
        *entry += 1;
        *entry
    }

    /// Builds, sequences, and publishes an event; never returns an error to
    /// the caller (`spec.md` §4.I "Publishing is fire-and-forget").
    ///
    /// Events for the same `rollup_id` are emitted in the order this
    /// method is called, relative to other `emit` calls against the same
    /// `EventBus` (`spec.md` §4.I "Ordering guarantee").
    pub async fn emit(
        &self,
        tenant: TenantId,
        rollup_id: RollupId,
        correlation_id: CorrelationId,
        event_type: EventType,
        payload: Value,
    ) -> Event {
        let rollup_lock = self.lock_for(rollup_id).await;
        let _guard = rollup_lock.lock().await;

        let sequence = self.next_sequence_for(rollup_id).await;
        let event = Event {
            event_id: EventId::new(),
            version: 1,
            event_type,
            rollup_id,
            tenant,
            correlation_id,
            sequence,
            source: self.source.clone(),
            payload,
            published_at: Timestamp::new(chrono::Utc::now()),
        };

        self.notify_subscribers(&event);
        self.publish_with_retry(&event).await;
        event
    }

    fn notify_subscribers(&self, event: &Event) {
        let Ok(subscriptions) = self.subscriptions.lock() else { return };
        for subscription in subscriptions.iter() {
            if let Some(types) = &subscription.types {
                if !types.contains(&event.event_type) {
                    continue;
                }
            }
            // Subscriber exceptions must never propagate to the emitter
            // (`spec.md` §4.I "Subscribers").
            let handler = &subscription.handler;
            if std::panic::catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                error!(event_id = %event.event_id, "event subscriber panicked, continuing");
            }
        }
    }

    async fn publish_with_retry(&self, event: &Event) {
        let Some(publisher) = &self.publisher else { return };
        let channel = self.channels.channel_for(event.event_type);
        let Ok(message) = serde_json::to_vec(event) else {
            error!(event_id = %event.event_id, "failed to serialize event, dropping");
            return;
        };

        for attempt in 1..=self.retry.max_attempts {
            match publisher.publish(&channel, message.clone()).await {
                Ok(()) => return,
                Err(err) => {
                    if attempt == self.retry.max_attempts {
                        error!(event_id = %event.event_id, %channel, error = %err, "event publish exhausted retries, dropping");
                        return;
                    }
                    warn!(event_id = %event.event_id, %channel, error = %err, attempt, "event publish failed, retrying");
                    tokio::time::sleep(self.retry.delay_for(attempt)).await;
                }
            }
        }
    }

    /// Registers an in-process handler, optionally filtered to a set of
    /// event types (`spec.md` §4.I "Subscribers").
    pub fn subscribe(
        &self,
        types: Option<Vec<EventType>>,
        handler: impl Fn(&Event) + Send + Sync + 'static,
    ) -> Unsubscribe {
        let id = self.next_subscription_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        if let Ok(mut subscriptions) = self.subscriptions.lock() {
            subscriptions.push(Subscription { id, types, handler: Box::new(handler) });
        }
        Unsubscribe { id, subscriptions: Arc::clone(&self.subscriptions) }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use async_trait::async_trait;
    use rollup_core::EventPublisherError;

    use super::*;

    struct RecordingPublisher {
        messages: StdMutex<Vec<(String, Vec<u8>)>>,
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, channel: &str, message: Vec<u8>) -> Result<(), EventPublisherError> {
            self.messages.lock().expect("lock").push((channel.to_string(), message));
            Ok(())
        }
    }

    struct AlwaysFailsPublisher {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl EventPublisher for AlwaysFailsPublisher {
        async fn publish(&self, _channel: &str, _message: Vec<u8>) -> Result<(), EventPublisherError> {
            self.attempts.fetch_add(1, Ordering::Relaxed);
            Err(EventPublisherError::Unavailable { message: "down".to_string() })
        }
    }

    #[tokio::test]
    async fn events_route_to_the_correct_channel() {
        let publisher = Arc::new(RecordingPublisher { messages: StdMutex::new(Vec::new()) });
        let bus = EventBus::new(Some(publisher.clone()), ChannelConfig::default(), PublishRetryPolicy::default(), "rollup-service");
        let tenant = TenantId::new();
        let rollup_id = RollupId::new();
        bus.emit(tenant, rollup_id, CorrelationId::new(), EventType::RollupCreated, Value::Null).await;
        bus.emit(tenant, rollup_id, CorrelationId::new(), EventType::ExecutionStarted, Value::Null).await;

        let messages = publisher.messages.lock().expect("lock");
        assert_eq!(messages[0].0, "rollup:events:lifecycle");
        assert_eq!(messages[1].0, "rollup:events:execution");
    }

    #[tokio::test]
    async fn sequence_numbers_increase_per_rollup() {
        let bus = EventBus::null("rollup-service");
        let tenant = TenantId::new();
        let rollup_id = RollupId::new();
        let first = bus.emit(tenant, rollup_id, CorrelationId::new(), EventType::RollupCreated, Value::Null).await;
        let second = bus.emit(tenant, rollup_id, CorrelationId::new(), EventType::RollupUpdated, Value::Null).await;
        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
    }

    #[tokio::test]
    async fn publish_failures_exhaust_retries_and_never_panic() {
        let publisher = Arc::new(AlwaysFailsPublisher { attempts: AtomicUsize::new(0) });
        let mut retry = PublishRetryPolicy::default();
        retry.base_delay = Duration::from_millis(1);
        retry.max_delay = Duration::from_millis(2);
        let bus = EventBus::new(Some(publisher.clone()), ChannelConfig::default(), retry, "rollup-service");
        bus.emit(TenantId::new(), RollupId::new(), CorrelationId::new(), EventType::RollupCreated, Value::Null).await;
        assert_eq!(publisher.attempts.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn subscribers_receive_every_emitted_event() {
        let bus = EventBus::null("rollup-service");
        let received = Arc::new(StdMutex::new(Vec::new()));
        let received_clone = Arc::clone(&received);
        let _unsub = bus.subscribe(None, move |event| {
            received_clone.lock().expect("lock").push(event.event_type);
        });
        bus.emit(TenantId::new(), RollupId::new(), CorrelationId::new(), EventType::RollupCreated, Value::Null).await;
        assert_eq!(received.lock().expect("lock").as_slice(), &[EventType::RollupCreated]);
    }

    #[tokio::test]
    async fn unsubscribe_stops_future_notifications() {
        let bus = EventBus::null("rollup-service");
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let unsub = bus.subscribe(None, move |_event| {
            calls_clone.fetch_add(1, Ordering::Relaxed);
        });
        unsub.call();
        bus.emit(TenantId::new(), RollupId::new(), CorrelationId::new(), EventType::RollupCreated, Value::Null).await;
        assert_eq!(calls.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn subscriber_panic_does_not_propagate() {
        let bus = EventBus::null("rollup-service");
        let _unsub = bus.subscribe(None, |_event| panic!("boom"));
        // Must not panic the test.
        bus.emit(TenantId::new(), RollupId::new(), CorrelationId::new(), EventType::RollupCreated, Value::Null).await;
    }
}
