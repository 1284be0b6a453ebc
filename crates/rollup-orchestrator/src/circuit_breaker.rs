// crates/rollup-orchestrator/src/circuit_breaker.rs
// ============================================================================
// Module: Circuit Breaker
// Description: spec.md §4.G "Circuit breaker".
// Purpose: Per-external-service failure isolation wrapping calls to the scan
//          store and the blob store: closed -> open -> half-open -> closed,
//          failing fast while open.
// Dependencies: rollup-core, rollup-config, tokio (time), std::sync::Mutex
// ============================================================================

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rollup_config::CircuitBreakerConfig;
use rollup_core::RollupError;

/// Lifecycle state of a [`CircuitBreaker`] (`spec.md` §4.G "Circuit
/// breaker": "states closed -> open -> half-open -> closed").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    /// Calls pass through; failures are counted against the threshold.
    Closed,
    /// Calls fail fast without reaching the wrapped service.
    Open,
    /// A single probe call is allowed through to test recovery.
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    window_start: Instant,
    opened_at: Option<Instant>,
}

/// A per-service circuit breaker guarding calls to an external collaborator
/// (`spec.md` §4.G "Circuit breaker": "wraps external-service calls...
/// per service-name").
#[derive(Debug)]
pub struct CircuitBreaker {
    service: &'static str,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Creates a breaker for `service`, starting closed.
    #[must_use]
    pub fn new(service: &'static str, config: CircuitBreakerConfig) -> Self {
        Self {
            service,
            config,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                window_start: Instant::now(),
                opened_at: None,
            }),
        }
    }

    /// Runs `call` through the breaker, failing fast with
    /// [`RollupError::CircuitOpen`] while open and otherwise recording the
    /// outcome against the breaker's thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`RollupError::CircuitOpen`] while the breaker is open, or
    /// whatever error `call` itself produces.
    pub async fn call<F, Fut, T>(&self, call: F) -> Result<T, RollupError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RollupError>>,
    {
        self.admit()?;
        match call().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(err)
            }
        }
    }

    /// Checks whether a call may proceed, transitioning open -> half-open
    /// once `reset_timeout_ms` has elapsed.
    fn admit(&self) -> Result<(), RollupError> {
        #[allow(clippy::unwrap_used, reason = "lock is only held briefly within this process and never panics while held")]
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            BreakerState::Closed => Ok(()),
            BreakerState::HalfOpen => Ok(()),
            BreakerState::Open => {
                let opened_at = inner.opened_at.unwrap_or_else(Instant::now);
                let elapsed = opened_at.elapsed();
                let reset_timeout = Duration::from_millis(self.config.reset_timeout_ms);
                if elapsed >= reset_timeout {
                    inner.state = BreakerState::HalfOpen;
                    inner.consecutive_successes = 0;
                    Ok(())
                } else {
                    #[allow(clippy::cast_possible_truncation, reason = "remaining wait is bounded by reset_timeout_ms, itself a u64 millisecond count")]
                    let retry_after_ms = (reset_timeout - elapsed).as_millis() as u64;
                    Err(RollupError::CircuitOpen { service: self.service, retry_after_ms })
                }
            }
        }
    }

    fn record_success(&self) {
        #[allow(clippy::unwrap_used, reason = "lock is only held briefly within this process and never panics while held")]
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures = 0;
            }
            BreakerState::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.success_threshold {
                    inner.state = BreakerState::Closed;
                    inner.consecutive_failures = 0;
                    inner.consecutive_successes = 0;
                    inner.opened_at = None;
                    inner.window_start = Instant::now();
                }
            }
            BreakerState::Open => {}
        }
    }

    fn record_failure(&self) {
        #[allow(clippy::unwrap_used, reason = "lock is only held briefly within this process and never panics while held")]
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            BreakerState::Closed => {
                let window = Duration::from_millis(self.config.failure_window_ms);
                if inner.window_start.elapsed() > window {
                    inner.window_start = Instant::now();
                    inner.consecutive_failures = 0;
                }
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                inner.consecutive_successes = 0;
            }
            BreakerState::Open => {}
        }
    }

    /// Returns whether the breaker is currently open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        #[allow(clippy::unwrap_used, reason = "lock is only held briefly within this process and never panics while held")]
        let inner = self.inner.lock().unwrap();
        inner.state == BreakerState::Open
    }
}

/// Registry of [`CircuitBreaker`]s keyed by external service name
/// (`spec.md` §4.G "Circuit breaker"; services named in `spec.md` §6:
/// `scan_store`, `blob_store`).
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    breakers: HashMap<&'static str, CircuitBreaker>,
}

impl CircuitBreakerRegistry {
    /// Builds a registry with one breaker per named service, all sharing
    /// `config`.
    #[must_use]
    pub fn new(config: CircuitBreakerConfig, services: &[&'static str]) -> Self {
        let breakers = services.iter().map(|&name| (name, CircuitBreaker::new(name, config))).collect();
        Self { breakers }
    }

    /// Returns the breaker registered for `service`, if any.
    #[must_use]
    pub fn get(&self, service: &str) -> Option<&CircuitBreaker> {
        self.breakers.get(service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig { failure_threshold: 2, success_threshold: 2, reset_timeout_ms: 20, failure_window_ms: 60_000 }
    }

    fn failing() -> Result<(), RollupError> {
        Err(RollupError::Transient { message: "boom".to_string() })
    }

    #[tokio::test]
    async fn opens_after_consecutive_failures() {
        let breaker = CircuitBreaker::new("scan_store", config());
        let _ = breaker.call(|| async { failing() }).await;
        let _ = breaker.call(|| async { failing() }).await;
        assert!(breaker.is_open());
        let result = breaker.call(|| async { Ok::<_, RollupError>(()) }).await;
        assert!(matches!(result, Err(RollupError::CircuitOpen { service: "scan_store", .. })));
    }

    #[tokio::test]
    async fn half_open_probe_closes_breaker_after_successes() {
        let breaker = CircuitBreaker::new("blob_store", config());
        let _ = breaker.call(|| async { failing() }).await;
        let _ = breaker.call(|| async { failing() }).await;
        assert!(breaker.is_open());
        tokio::time::sleep(Duration::from_millis(25)).await;
        breaker.call(|| async { Ok::<_, RollupError>(()) }).await.expect("probe should be admitted");
        breaker.call(|| async { Ok::<_, RollupError>(()) }).await.expect("second half-open success");
        assert!(!breaker.is_open());
    }

    #[tokio::test]
    async fn half_open_failure_reopens_immediately() {
        let breaker = CircuitBreaker::new("scan_store", config());
        let _ = breaker.call(|| async { failing() }).await;
        let _ = breaker.call(|| async { failing() }).await;
        tokio::time::sleep(Duration::from_millis(25)).await;
        let _ = breaker.call(|| async { failing() }).await;
        assert!(breaker.is_open());
    }

    #[test]
    fn registry_resolves_by_service_name() {
        let registry = CircuitBreakerRegistry::new(config(), &["scan_store", "blob_store"]);
        assert!(registry.get("scan_store").is_some());
        assert!(registry.get("unknown_service").is_none());
    }
}
