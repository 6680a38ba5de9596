//! Timeout and retry policy for capability calls.
//!
//! Every embedding and generation request runs under a [`CallPolicy`]: the
//! call is bounded by `tokio::time::timeout`, and a transport failure
//! (including an expired timeout) is retried up to `retries` times with a
//! doubling backoff. Failures that arrived with response content are
//! returned immediately.

use medintel_core::config::RuntimeSettings;
use medintel_core::{AppError, AppResult};
use std::future::Future;
use std::time::Duration;

/// Per-call timeout and retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    /// Upper bound on a single attempt
    pub timeout: Duration,

    /// Extra attempts after a transient failure
    pub retries: u32,

    /// Delay before the first retry (doubles each retry)
    pub backoff: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retries: 1,
            backoff: Duration::from_millis(250),
        }
    }
}

impl CallPolicy {
    /// Create a policy with the default backoff.
    pub fn new(timeout: Duration, retries: u32) -> Self {
        Self {
            timeout,
            retries,
            ..Self::default()
        }
    }

    /// Build a policy from the `runtime` config section.
    pub fn from_settings(settings: &RuntimeSettings) -> Self {
        Self::new(
            Duration::from_secs(settings.request_timeout_secs),
            settings.retries,
        )
    }

    /// Override the retry backoff.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Run `call` under this policy.
    ///
    /// `call` is invoked once per attempt; `operation` names the call in logs
    /// and timeout errors.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut attempt: u32 = 0;
        let mut backoff = self.backoff;

        loop {
            let outcome = match tokio::time::timeout(self.timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(AppError::Transport(format!(
                    "{} timed out after {:?}",
                    operation, self.timeout
                ))),
            };

            match outcome {
                Err(err) if err.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    tracing::warn!(
                        operation,
                        attempt,
                        max_retries = self.retries,
                        error = %err,
                        "Transient failure, retrying after {:?}",
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                other => return other,
            }
        }
    }
}
