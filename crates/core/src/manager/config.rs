//! Job manager configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Worker pool, scheduling and retry settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Number of jobs processed concurrently.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// How often idle workers poll for queued jobs (milliseconds).
    /// Submissions also wake a worker immediately.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Priority of the lightest possible job. Lower runs sooner.
    #[serde(default = "default_base_priority")]
    pub base_priority: i64,

    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_workers() -> usize {
    2
}

fn default_poll_interval() -> u64 {
    500
}

fn default_base_priority() -> i64 {
    100
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            poll_interval_ms: default_poll_interval(),
            base_priority: default_base_priority(),
            retry: RetryConfig::default(),
        }
    }
}

impl ManagerConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Retry policy for failed and partially completed jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total executions allowed, the first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first automatic retry (milliseconds).
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    /// Upper bound for the backoff delay (milliseconds).
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Subtracted from a job's priority when it is re-queued.
    #[serde(default = "default_priority_boost")]
    pub priority_boost: i64,

    /// Schedule retries automatically for retryable failures.
    #[serde(default = "default_auto_retry")]
    pub auto_retry: bool,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    60_000
}

fn default_priority_boost() -> i64 {
    50
}

fn default_auto_retry() -> bool {
    true
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            priority_boost: default_priority_boost(),
            auto_retry: default_auto_retry(),
        }
    }
}

impl RetryConfig {
    pub fn with_delays(mut self, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self.max_delay_ms = max_delay_ms;
        self
    }

    pub fn with_auto_retry(mut self, auto_retry: bool) -> Self {
        self.auto_retry = auto_retry;
        self
    }

    /// Backoff after `attempts` executions: `base * 2^(attempts - 1)`, capped.
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(32);
        let delay = self.base_delay_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}
