use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Credentials and connection settings for one BPJS gateway.
///
/// Loaded once at startup and never mutated afterwards. The pharmacy and
/// control-visit workflows each get their own set.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialSet {
    /// Gateway base URL, e.g. `https://apijkn.bpjs-kesehatan.go.id/apotek-rest`
    pub base_url: String,

    /// Consumer id sent as `X-cons-id`
    pub consumer_id: String,

    /// Consumer secret used for HMAC signing and envelope key derivation
    pub secret_key: String,

    /// Gateway user key sent as `user_key`
    pub user_key: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Transport-level retry policy
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_timeout_secs() -> u64 {
    30
}

impl CredentialSet {
    pub fn new(
        base_url: impl Into<String>,
        consumer_id: impl Into<String>,
        secret_key: impl Into<String>,
        user_key: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            consumer_id: consumer_id.into(),
            secret_key: secret_key.into(),
            user_key: user_key.into(),
            timeout_secs: default_timeout_secs(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Joins the base URL and an endpoint path with exactly one slash.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn validate(&self, name: &str) -> Result<(), String> {
        if self.base_url.trim().is_empty() {
            return Err(format!("{name}.base_url must not be empty"));
        }
        if self.consumer_id.trim().is_empty() {
            return Err(format!("{name}.consumer_id must not be empty"));
        }
        if self.secret_key.is_empty() {
            return Err(format!("{name}.secret_key must not be empty"));
        }
        if self.timeout_secs == 0 {
            return Err(format!("{name}.timeout_secs must be > 0"));
        }
        self.retry
            .validate()
            .map_err(|e| format!("{name}.retry: {e}"))
    }
}

impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSet")
            .field("base_url", &self.base_url)
            .field("consumer_id", &self.consumer_id)
            .field("secret_key", &"***")
            .field("user_key", &"***")
            .field("timeout_secs", &self.timeout_secs)
            .field("retry", &self.retry)
            .finish()
    }
}
