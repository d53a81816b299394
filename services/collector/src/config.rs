//! Process configuration for the collector service
//!
//! Retention thresholds and store-retry behavior are process configuration,
//! not per-detector settings. The detector roster itself is an externally
//! produced table (deserialized from JSON by the binary).

use std::time::Duration;

use tracing::warn;
use types::series::RetentionPolicy;

/// Bounded retry behavior for store writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts (first try included).
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles per retry.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(250),
        }
    }
}

/// Configuration for one collector instance.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorConfig {
    /// Bounds on retained series length (ceiling M, floor R).
    pub retention: RetentionPolicy,
    /// Retry behavior for store writes.
    pub store_retry: RetryPolicy,
    /// Opt-in grace period after which idle open intervals are force-closed.
    /// None (the default) preserves purely reactive interval closing: a
    /// silent detector's last interval stays open indefinitely.
    pub stale_flush_after: Option<Duration>,
    /// Capacity of the inbound message channel.
    pub channel_capacity: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            retention: RetentionPolicy::default(),
            store_retry: RetryPolicy::default(),
            stale_flush_after: None,
            channel_capacity: 1024,
        }
    }
}

impl CollectorConfig {
    /// Build a config from environment variables, falling back to defaults
    /// for anything unset or unparseable.
    ///
    /// Recognized: `RETENTION_MAX_LEN`, `RETENTION_TRIM_TO`,
    /// `STORE_RETRY_ATTEMPTS`, `STORE_RETRY_BACKOFF_MS`,
    /// `STALE_FLUSH_SECS`, `CHANNEL_CAPACITY`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(max_len) = env_parse::<usize>("RETENTION_MAX_LEN") {
            config.retention.max_len = max_len;
        }
        if let Some(trim_to) = env_parse::<usize>("RETENTION_TRIM_TO") {
            config.retention.trim_to = trim_to;
        }
        if let Some(attempts) = env_parse::<u32>("STORE_RETRY_ATTEMPTS") {
            config.store_retry.max_attempts = attempts;
        }
        if let Some(backoff_ms) = env_parse::<u64>("STORE_RETRY_BACKOFF_MS") {
            config.store_retry.initial_backoff = Duration::from_millis(backoff_ms);
        }
        if let Some(secs) = env_parse::<u64>("STALE_FLUSH_SECS") {
            config.stale_flush_after = Some(Duration::from_secs(secs));
        }
        if let Some(capacity) = env_parse::<usize>("CHANNEL_CAPACITY") {
            config.channel_capacity = capacity;
        }

        config.validate()
    }

    /// Reject unusable settings, falling back to the defaults.
    ///
    /// The retention floor must sit strictly below the ceiling; anything
    /// else would make the trim a no-op (or worse) once a series fills up.
    pub fn validate(mut self) -> Self {
        if !self.retention.is_valid() {
            warn!(
                max_len = self.retention.max_len,
                trim_to = self.retention.trim_to,
                "Invalid retention policy (trim_to must be < max_len); using defaults"
            );
            self.retention = RetentionPolicy::default();
        }
        self
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|raw| raw.parse().ok())
}
