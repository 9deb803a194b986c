//! Bounded exponential-backoff retry.
//!
//! Retry policy is data: maximum attempts, base delay, delay cap, plus
//! a caller-supplied predicate deciding which failures are worth
//! retrying. Attempt counters are kept per operation id and reset on
//! success, so an unrelated later failure starts a fresh backoff
//! sequence instead of inheriting exhausted attempts.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tracing::{debug, warn};

use weavecast_protocol::UploadError;

/// Backoff policy: `delay = min(base * 2^attempt, cap)`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt (3 means up to 4 invocations).
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following failure number `attempt`
    /// (0-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.min(63));
        let delay = self
            .base_delay
            .checked_mul(u32::try_from(factor).unwrap_or(u32::MAX))
            .unwrap_or(self.max_delay);
        delay.min(self.max_delay)
    }
}

/// Default retry predicate: network errors and recoverable upload
/// errors retry; validation, balance and cancellation never do.
pub fn default_should_retry(err: &UploadError) -> bool {
    err.is_retryable()
}

/// Executes operations with bounded exponential-backoff retry.
pub struct RetryManager {
    policy: RetryPolicy,
    attempts: Mutex<HashMap<String, u32>>,
}

impl Default for RetryManager {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl RetryManager {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Recorded failure count for an operation id (for diagnostics).
    pub fn attempts_for(&self, operation_id: &str) -> u32 {
        self.attempts
            .lock()
            .unwrap()
            .get(operation_id)
            .copied()
            .unwrap_or(0)
    }

    /// Runs `operation` until it succeeds, `should_retry` declines, or
    /// the retry budget is exhausted. Returns the original error on
    /// final failure.
    pub async fn execute<T, F, Fut, P>(
        &self,
        operation_id: &str,
        mut operation: F,
        should_retry: P,
    ) -> Result<T, UploadError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UploadError>>,
        P: Fn(&UploadError) -> bool,
    {
        loop {
            match operation().await {
                Ok(value) => {
                    self.attempts.lock().unwrap().remove(operation_id);
                    return Ok(value);
                }
                Err(err) => {
                    let attempt = {
                        let mut attempts = self.attempts.lock().unwrap();
                        let entry = attempts.entry(operation_id.to_string()).or_insert(0);
                        let current = *entry;
                        *entry += 1;
                        current
                    };

                    if attempt >= self.policy.max_retries || !should_retry(&err) {
                        warn!(
                            operation = operation_id,
                            attempts = attempt + 1,
                            error = %err,
                            "giving up"
                        );
                        self.attempts.lock().unwrap().remove(operation_id);
                        return Err(err);
                    }

                    let delay = self.policy.delay_for_attempt(attempt);
                    debug!(
                        operation = operation_id,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// [`execute`](Self::execute) with the default predicate.
    pub async fn execute_default<T, F, Fut>(
        &self,
        operation_id: &str,
        operation: F,
    ) -> Result<T, UploadError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UploadError>>,
    {
        self.execute(operation_id, operation, default_should_retry)
            .await
    }
}
