//! Retry policy

use std::time::Duration;

use flavorsnap_common::config::ClientConfig;

/// Per-endpoint retry settings plus an optional whole-run deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first transport failure, per endpoint
    pub max_retries: u32,
    /// Wait between attempts on the same endpoint
    pub retry_delay: Duration,
    /// Deadline for the whole classification; expiry acts as cancellation
    pub overall_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            retry_delay: Duration::from_millis(500),
            overall_timeout: None,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
            overall_timeout: None,
        }
    }

    pub fn with_overall_timeout(mut self, timeout: Duration) -> Self {
        self.overall_timeout = Some(timeout);
        self
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            overall_timeout: config.overall_timeout_ms.map(Duration::from_millis),
        }
    }

    /// Attempts made against one endpoint at most
    pub fn attempts_per_endpoint(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}
