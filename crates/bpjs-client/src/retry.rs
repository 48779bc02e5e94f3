use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Transport-level retry policy, shared by every request of one credential set.
///
/// This is separate from strategy fallback: a retry repeats the *same*
/// request, and only when repeating cannot duplicate a side effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one (1 disables retries)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Growth factor between consecutive delays (1 = fixed delay)
    #[serde(default = "default_multiplier")]
    pub multiplier: u32,

    /// Upper bound for a single delay
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Response statuses worth retrying for safe (read-only) requests
    #[serde(default = "default_retry_statuses")]
    pub retry_statuses: Vec<u16>,
}

fn default_max_attempts() -> u32 {
    1
}
fn default_initial_backoff_ms() -> u64 {
    1_000
}
fn default_multiplier() -> u32 {
    2
}
fn default_max_backoff_ms() -> u64 {
    10_000
}
fn default_retry_statuses() -> Vec<u16> {
    vec![502, 503, 504]
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            multiplier: default_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
            retry_statuses: default_retry_statuses(),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self::default()
    }

    /// Fixed delay between attempts.
    pub fn fixed(max_attempts: u32, backoff_ms: u64) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: backoff_ms,
            multiplier: 1,
            max_backoff_ms: backoff_ms,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be > 0".into());
        }
        if self.multiplier == 0 {
            return Err("multiplier must be > 0".into());
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err("initial_backoff_ms must be <= max_backoff_ms".into());
        }
        Ok(())
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = u64::from(self.multiplier).saturating_pow(retry.saturating_sub(1));
        let delay = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(delay)
    }

    fn has_attempts_left(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Whether a failed attempt should be repeated.
    ///
    /// Connection failures never reached the gateway and are always safe to
    /// repeat. Timeouts may have been processed upstream, so they are only
    /// repeated for safe methods.
    pub fn should_retry_error(&self, attempt: u32, safe_method: bool, err: &TransportError) -> bool {
        if !self.has_attempts_left(attempt) {
            return false;
        }
        err.is_connect() || (safe_method && err.is_timeout())
    }

    /// Whether a response status should be retried.
    pub fn should_retry_status(&self, attempt: u32, safe_method: bool, status: u16) -> bool {
        safe_method && self.has_attempts_left(attempt) && self.retry_statuses.contains(&status)
    }
}
