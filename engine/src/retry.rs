//! Retry with exponential backoff over remote calls.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Backoff configuration. Delays are in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: u64,
    /// Ceiling for the backoff curve
    pub max_delay: u64,
    /// Growth factor between retries
    pub backoff_multiplier: f64,
    /// HTTP statuses worth retrying
    pub retry_on_status_codes: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: 1000,
            max_delay: 30_000,
            backoff_multiplier: 2.0,
            retry_on_status_codes: vec![408, 429, 500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following attempt `attempt` (0-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponential =
            self.initial_delay as f64 * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis(exponential.min(self.max_delay as f64) as u64)
    }
}

/// Run `operation` under the policy: retryable failures wait and try again,
/// anything else fails fast. The last error surfaces once attempts run out.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let out_of_attempts = attempt + 1 >= policy.max_attempts.max(1);
                if out_of_attempts || !err.is_retryable(&policy.retry_on_status_codes) {
                    return Err(err);
                }
                let delay = policy.delay_for(attempt);
                tracing::debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
