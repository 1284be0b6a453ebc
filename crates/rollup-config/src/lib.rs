// crates/rollup-config/src/lib.rs
// ============================================================================
// Module: Rollup Config Library
// Description: The engine-wide configuration model enumerated in spec.md §6.
// Purpose: Single source of truth for rollup-engine.toml semantics: policy
//          limits, retry policies, circuit breaker thresholds, dead-letter
//          sizing, and cache sizing, with fail-closed validation.
// Dependencies: rollup-core, serde, thiserror, toml
// ============================================================================

//! ## Overview
//! `rollup-config` defines [`RollupEngineConfig`], the single struct holding
//! every field `spec.md` §6 "Configuration (enumerated)" lists. Config is
//! loaded from a TOML file with strict size limits and fails closed: missing
//! or invalid configuration is an error, never a silent default override of
//! a named field the caller did supply.
//!
//! Security posture: config inputs are untrusted input from the operator's
//! filesystem, not from request bodies, but are still size-limited and
//! strictly validated before any other subsystem consults them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum configuration file size in bytes.
const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;

const fn default_max_repositories_per_rollup() -> u32 {
    50
}
const fn default_max_matchers_per_rollup() -> u32 {
    20
}
const fn default_max_merged_nodes() -> u32 {
    100_000
}
const fn default_timeout_seconds() -> u64 {
    300
}
const fn default_max_timeout_seconds() -> u64 {
    3600
}
const fn default_enable_result_caching() -> bool {
    true
}
const fn default_result_cache_ttl_seconds() -> u64 {
    300
}
const fn default_max_concurrent_executions() -> u32 {
    10
}
const fn default_dead_letter_queue_max_size() -> usize {
    1_000
}
const fn default_dead_letter_retention_ms() -> u64 {
    7 * 24 * 60 * 60 * 1000
}

const fn default_retry_max_attempts() -> u32 {
    3
}
const fn default_retry_base_delay_ms() -> u64 {
    200
}
const fn default_retry_backoff_multiplier() -> f64 {
    2.0
}
const fn default_retry_max_delay_ms() -> u64 {
    30_000
}
const fn default_retry_jitter_factor() -> f64 {
    0.1
}
const fn default_retry_timeout_ms() -> u64 {
    30_000
}

const fn default_circuit_failure_threshold() -> u32 {
    5
}
const fn default_circuit_success_threshold() -> u32 {
    2
}
const fn default_circuit_reset_timeout_ms() -> u64 {
    30_000
}
const fn default_circuit_failure_window_ms() -> u64 {
    60_000
}

const fn default_cache_l1_max_size() -> usize {
    1_000
}
const fn default_cache_l1_ttl_seconds() -> u64 {
    60
}
const fn default_cache_l2_ttl_seconds() -> u64 {
    300
}
fn default_cache_key_prefix() -> String {
    "ro".to_string()
}
const fn default_cache_enable_l1() -> bool {
    true
}
const fn default_cache_enable_l2() -> bool {
    false
}

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Engine-wide configuration for the cross-repository rollup engine
/// (`spec.md` §6 "Configuration (enumerated)").
#[derive(Debug, Clone, Deserialize)]
pub struct RollupEngineConfig {
    /// Maximum repositories a single rollup may reference.
    #[serde(default = "default_max_repositories_per_rollup")]
    pub max_repositories_per_rollup: u32,
    /// Maximum matchers a single rollup may configure.
    #[serde(default = "default_max_matchers_per_rollup")]
    pub max_matchers_per_rollup: u32,
    /// Maximum merged nodes a single execution may produce.
    #[serde(default = "default_max_merged_nodes")]
    pub max_merged_nodes: u32,
    /// Default execution timeout in seconds when a rollup does not specify one.
    #[serde(default = "default_timeout_seconds")]
    pub default_timeout_seconds: u64,
    /// Maximum execution timeout in seconds a rollup may request.
    #[serde(default = "default_max_timeout_seconds")]
    pub max_timeout_seconds: u64,
    /// Whether execution results are cached.
    #[serde(default = "default_enable_result_caching")]
    pub enable_result_caching: bool,
    /// Result cache entry lifetime in seconds.
    #[serde(default = "default_result_cache_ttl_seconds")]
    pub result_cache_ttl_seconds: u64,
    /// Maximum in-flight executions per service instance.
    #[serde(default = "default_max_concurrent_executions")]
    pub max_concurrent_executions: u32,
    /// Retry policy applied to execution-phase failures.
    #[serde(default)]
    pub execution_retry_policy: RetryPolicyConfig,
    /// Retry policy applied to external-service calls within a phase.
    #[serde(default)]
    pub external_retry_policy: RetryPolicyConfig,
    /// Circuit breaker thresholds for external services.
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
    /// Maximum number of entries retained in the dead-letter queue.
    #[serde(default = "default_dead_letter_queue_max_size")]
    pub dead_letter_queue_max_size: usize,
    /// Maximum age of a dead-letter entry before the retention sweep evicts it.
    #[serde(default = "default_dead_letter_retention_ms")]
    pub dead_letter_retention_ms: u64,
    /// Cache sizing and TTL configuration.
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for RollupEngineConfig {
    fn default() -> Self {
        Self {
            max_repositories_per_rollup: default_max_repositories_per_rollup(),
            max_matchers_per_rollup: default_max_matchers_per_rollup(),
            max_merged_nodes: default_max_merged_nodes(),
            default_timeout_seconds: default_timeout_seconds(),
            max_timeout_seconds: default_max_timeout_seconds(),
            enable_result_caching: default_enable_result_caching(),
            result_cache_ttl_seconds: default_result_cache_ttl_seconds(),
            max_concurrent_executions: default_max_concurrent_executions(),
            execution_retry_policy: RetryPolicyConfig::default(),
            external_retry_policy: RetryPolicyConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            dead_letter_queue_max_size: default_dead_letter_queue_max_size(),
            dead_letter_retention_ms: default_dead_letter_retention_ms(),
            cache: CacheConfig::default(),
        }
    }
}

impl RollupEngineConfig {
    /// Loads and validates configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, exceeds the
    /// size limit, fails to parse, or fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self = toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency
    /// (`spec.md` §6, §7 "`ConfigurationError`").
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when any field violates its policy bound.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_repositories_per_rollup < 2 {
            return Err(ConfigError::Invalid(
                "max_repositories_per_rollup must be at least 2".to_string(),
            ));
        }
        if self.max_matchers_per_rollup < 1 {
            return Err(ConfigError::Invalid("max_matchers_per_rollup must be at least 1".to_string()));
        }
        if self.max_merged_nodes == 0 {
            return Err(ConfigError::Invalid("max_merged_nodes must be greater than zero".to_string()));
        }
        if self.max_timeout_seconds == 0 {
            return Err(ConfigError::Invalid("max_timeout_seconds must be greater than zero".to_string()));
        }
        if self.default_timeout_seconds < 1 || self.default_timeout_seconds > self.max_timeout_seconds {
            return Err(ConfigError::Invalid(format!(
                "default_timeout_seconds must be between 1 and {}",
                self.max_timeout_seconds
            )));
        }
        if self.max_concurrent_executions == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_executions must be greater than zero".to_string(),
            ));
        }
        if self.dead_letter_queue_max_size == 0 {
            return Err(ConfigError::Invalid(
                "dead_letter_queue_max_size must be greater than zero".to_string(),
            ));
        }
        self.execution_retry_policy.validate("execution_retry_policy")?;
        self.external_retry_policy.validate("external_retry_policy")?;
        self.circuit_breaker.validate()?;
        self.cache.validate()?;
        Ok(())
    }

    /// Clips a rollup-supplied timeout into `[1s, max_timeout_seconds]`
    /// (`spec.md` §4.G "Cancellation & timeouts").
    #[must_use]
    pub fn clip_timeout_seconds(&self, requested: u64) -> u64 {
        requested.clamp(1, self.max_timeout_seconds)
    }
}

/// Exponential-backoff retry policy (`spec.md` §6
/// `executionRetryPolicy`/`externalRetryPolicy`).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RetryPolicyConfig {
    /// Maximum attempts before the failure is terminal.
    #[serde(default = "default_retry_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_retry_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Multiplier applied to the delay after each failed attempt.
    #[serde(default = "default_retry_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Upper bound on the computed delay, in milliseconds.
    #[serde(default = "default_retry_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Fractional jitter applied to each computed delay, in `[0, 1]`.
    #[serde(default = "default_retry_jitter_factor")]
    pub jitter_factor: f64,
    /// Per-attempt timeout, in milliseconds.
    #[serde(default = "default_retry_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_max_attempts(),
            base_delay_ms: default_retry_base_delay_ms(),
            backoff_multiplier: default_retry_backoff_multiplier(),
            max_delay_ms: default_retry_max_delay_ms(),
            jitter_factor: default_retry_jitter_factor(),
            timeout_ms: default_retry_timeout_ms(),
        }
    }
}

impl RetryPolicyConfig {
    /// Validates retry policy bounds.
    fn validate(&self, field: &str) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid(format!("{field}.max_attempts must be at least 1")));
        }
        if self.base_delay_ms == 0 {
            return Err(ConfigError::Invalid(format!("{field}.base_delay_ms must be greater than zero")));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!("{field}.backoff_multiplier must be at least 1.0")));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "{field}.max_delay_ms must be at least base_delay_ms"
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ConfigError::Invalid(format!("{field}.jitter_factor must be between 0 and 1")));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid(format!("{field}.timeout_ms must be greater than zero")));
        }
        Ok(())
    }

    /// Computes the jittered backoff delay before attempt number `attempt`
    /// (1-indexed: the delay before the *second* attempt uses `attempt = 1`).
    #[must_use]
    pub fn delay_for(&self, attempt: u32, jitter: f64) -> u64 {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        #[allow(clippy::cast_precision_loss, reason = "base_delay_ms is bounded well under f64's exact-integer range")]
        let raw_ms = (self.base_delay_ms as f64 * self.backoff_multiplier.powi(exponent)).min(self.max_delay_ms as f64);
        let jittered_ms = (raw_ms * (1.0 + jitter.clamp(-self.jitter_factor, self.jitter_factor))).max(0.0);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "jittered_ms is non-negative and bounded by max_delay_ms")]
        let result = jittered_ms as u64;
        result
    }
}

/// Per-external-service circuit breaker thresholds (`spec.md` §6
/// `circuitBreaker`, §4.G "Circuit breaker").
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    #[serde(default = "default_circuit_failure_threshold")]
    pub failure_threshold: u32,
    /// Consecutive half-open successes before the circuit closes.
    #[serde(default = "default_circuit_success_threshold")]
    pub success_threshold: u32,
    /// Duration the circuit stays open before probing half-open, in milliseconds.
    #[serde(default = "default_circuit_reset_timeout_ms")]
    pub reset_timeout_ms: u64,
    /// Rolling window over which failures are counted, in milliseconds.
    #[serde(default = "default_circuit_failure_window_ms")]
    pub failure_window_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_circuit_failure_threshold(),
            success_threshold: default_circuit_success_threshold(),
            reset_timeout_ms: default_circuit_reset_timeout_ms(),
            failure_window_ms: default_circuit_failure_window_ms(),
        }
    }
}

impl CircuitBreakerConfig {
    /// Validates circuit breaker thresholds.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::Invalid("circuit_breaker.failure_threshold must be at least 1".to_string()));
        }
        if self.success_threshold == 0 {
            return Err(ConfigError::Invalid("circuit_breaker.success_threshold must be at least 1".to_string()));
        }
        if self.reset_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "circuit_breaker.reset_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.failure_window_ms == 0 {
            return Err(ConfigError::Invalid(
                "circuit_breaker.failure_window_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Cache sizing and TTL configuration (`spec.md` §6 `cache`).
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Maximum entries retained per keyspace in L1.
    #[serde(default = "default_cache_l1_max_size")]
    pub l1_max_size: usize,
    /// L1 entry lifetime in seconds.
    #[serde(default = "default_cache_l1_ttl_seconds")]
    pub l1_ttl_seconds: u64,
    /// L2 entry lifetime in seconds.
    #[serde(default = "default_cache_l2_ttl_seconds")]
    pub l2_ttl_seconds: u64,
    /// Cache key prefix (`spec.md` §6 cache key format `{prefix}:...`).
    #[serde(default = "default_cache_key_prefix")]
    pub key_prefix: String,
    /// Whether the L1 in-process tier is enabled.
    #[serde(default = "default_cache_enable_l1")]
    pub enable_l1: bool,
    /// Whether the L2 remote tier is enabled.
    #[serde(default = "default_cache_enable_l2")]
    pub enable_l2: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            l1_max_size: default_cache_l1_max_size(),
            l1_ttl_seconds: default_cache_l1_ttl_seconds(),
            l2_ttl_seconds: default_cache_l2_ttl_seconds(),
            key_prefix: default_cache_key_prefix(),
            enable_l1: default_cache_enable_l1(),
            enable_l2: default_cache_enable_l2(),
        }
    }
}

impl CacheConfig {
    /// Validates cache configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.l1_max_size == 0 {
            return Err(ConfigError::Invalid("cache.l1_max_size must be greater than zero".to_string()));
        }
        if self.l1_ttl_seconds == 0 {
            return Err(ConfigError::Invalid("cache.l1_ttl_seconds must be greater than zero".to_string()));
        }
        if self.l2_ttl_seconds == 0 {
            return Err(ConfigError::Invalid("cache.l2_ttl_seconds must be greater than zero".to_string()));
        }
        if self.key_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("cache.key_prefix must be non-empty".to_string()));
        }
        if !self.enable_l1 && !self.enable_l2 {
            return Err(ConfigError::Invalid(
                "cache must enable at least one of enable_l1 or enable_l2".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors produced while loading or validating engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading the configuration file.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<ConfigError> for rollup_core::RollupError {
    fn from(err: ConfigError) -> Self {
        Self::Configuration { message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn defaults_validate_cleanly() {
        RollupEngineConfig::default().validate().expect("defaults must validate");
    }

    #[test]
    fn rejects_too_few_repositories() {
        let mut config = RollupEngineConfig::default();
        config.max_repositories_per_rollup = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_default_timeout_above_max() {
        let mut config = RollupEngineConfig::default();
        config.max_timeout_seconds = 100;
        config.default_timeout_seconds = 200;
        assert!(config.validate().is_err());
    }

    #[test]
    fn clip_timeout_seconds_clamps_into_range() {
        let config = RollupEngineConfig::default();
        assert_eq!(config.clip_timeout_seconds(0), 1);
        assert_eq!(config.clip_timeout_seconds(u64::MAX), config.max_timeout_seconds);
        assert_eq!(config.clip_timeout_seconds(120), 120);
    }

    #[test]
    fn rejects_retry_policy_with_max_delay_below_base() {
        let mut config = RollupEngineConfig::default();
        config.execution_retry_policy.base_delay_ms = 1000;
        config.execution_retry_policy.max_delay_ms = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_cache_with_both_tiers_disabled() {
        let mut config = RollupEngineConfig::default();
        config.cache.enable_l1 = false;
        config.cache.enable_l2 = false;
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_valid_toml_file() {
        let mut file = NamedTempFile::new().expect("create temp file");
        writeln!(file, "max_repositories_per_rollup = 10").expect("write");
        writeln!(file, "max_matchers_per_rollup = 5").expect("write");
        let config = RollupEngineConfig::load(file.path()).expect("load config");
        assert_eq!(config.max_repositories_per_rollup, 10);
        assert_eq!(config.max_matchers_per_rollup, 5);
        assert_eq!(config.max_merged_nodes, default_max_merged_nodes());
    }

    #[test]
    fn rejects_malformed_toml() {
        let mut file = NamedTempFile::new().expect("create temp file");
        writeln!(file, "this is not valid toml {{{{").expect("write");
        assert!(matches!(RollupEngineConfig::load(file.path()), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn retry_delay_grows_exponentially_and_is_capped() {
        let policy = RetryPolicyConfig {
            max_attempts: 5,
            base_delay_ms: 100,
            backoff_multiplier: 2.0,
            max_delay_ms: 1000,
            jitter_factor: 0.0,
            timeout_ms: 5000,
        };
        assert_eq!(policy.delay_for(1, 0.0), 100);
        assert_eq!(policy.delay_for(2, 0.0), 200);
        assert_eq!(policy.delay_for(3, 0.0), 400);
        assert_eq!(policy.delay_for(10, 0.0), 1000);
    }
}
