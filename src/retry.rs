//! Automatic retries with exponential backoff for non-interactive operations.
//!
//! User-triggered retries go through
//! [`OperationExecutor::retry_last`](crate::executor::OperationExecutor::retry_last).
//! This module is for background work (balance polling, confirmations)
//! where retrying without asking is acceptable. Failures that need the user
//! to act, such as a rejection in the wallet, are never retried here.

use std::future::Future;
use std::time::Duration;

use crate::error::{Classifier, ErrorCode, RawFailure};
use crate::notification::{Notification, NotificationSink};

/// Exponential backoff settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay after the first failed attempt.
    pub base_delay: Duration,
    /// Cap for any single delay.
    pub max_delay: Duration,
    /// Total attempts including the first one.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 3,
        }
    }
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Delay after the given failed attempt (1-based):
    /// `base_delay * 2^(attempt - 1)`, capped at `max_delay`.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return self.base_delay.min(self.max_delay);
        }

        let exponent = (attempt - 1).min(31);
        let multiplier = 1u64 << exponent;
        let base_millis = self.base_delay.as_millis() as u64;
        let delay_millis = base_millis.saturating_mul(multiplier);

        Duration::from_millis(delay_millis.min(self.max_delay.as_millis() as u64))
    }

    /// Whether another attempt should follow failed attempt `attempt`
    /// classified as `code`.
    pub fn should_retry(&self, attempt: u32, code: ErrorCode) -> bool {
        code.is_auto_retryable() && attempt < self.max_attempts
    }
}

/// Runs `operation` until it succeeds, the policy is exhausted, or it fails
/// with a code that needs user intervention. Returns the last raw failure
/// when giving up.
pub async fn retry_with_backoff<F, Fut, T, E>(
    policy: &RetryPolicy,
    classifier: &Classifier,
    operation_name: &str,
    sink: Option<&dyn NotificationSink>,
    mut operation: F,
) -> Result<T, RawFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<RawFailure>,
{
    let mut attempt: u32 = 1;
    loop {
        let raw: RawFailure = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e.into(),
        };

        let code = classifier.classify_code(&raw);
        if !policy.should_retry(attempt, code) {
            tracing::debug!(
                operation = operation_name,
                attempt,
                code = %code,
                "giving up"
            );
            return Err(raw);
        }

        let delay = policy.calculate_delay(attempt);
        tracing::info!(
            operation = operation_name,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "{} attempt {} failed, retrying in {}ms",
            operation_name,
            attempt,
            delay.as_millis()
        );
        if let Some(sink) = sink {
            sink.notify(Notification::retrying(
                attempt,
                policy.max_attempts,
                delay,
                raw.technical_message(),
            ));
        }

        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::MemorySink;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(1), Duration::from_millis(4), max_attempts)
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_exponential_delays() {
        let policy = RetryPolicy::new(Duration::from_secs(1), Duration::from_secs(60), 5);
        assert_eq!(policy.calculate_delay(1), Duration::from_secs(1));
        assert_eq!(policy.calculate_delay(2), Duration::from_secs(2));
        assert_eq!(policy.calculate_delay(3), Duration::from_secs(4));
        assert_eq!(policy.calculate_delay(4), Duration::from_secs(8));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy::new(Duration::from_secs(1), Duration::from_secs(5), 10);
        assert_eq!(policy.calculate_delay(4), Duration::from_secs(5));
        assert_eq!(policy.calculate_delay(100), Duration::from_secs(5));
    }

    #[test]
    fn test_should_retry_respects_code_and_attempts() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(1, ErrorCode::NetworkError));
        assert!(policy.should_retry(2, ErrorCode::TransactionFailed));
        assert!(!policy.should_retry(3, ErrorCode::NetworkError));
        assert!(!policy.should_retry(1, ErrorCode::UserRejected));
        assert!(!policy.should_retry(1, ErrorCode::WalletNotFound));
        assert!(!policy.should_retry(1, ErrorCode::UnsupportedMethod));
    }

    #[test]
    fn test_zero_attempts_is_raised_to_one() {
        assert_eq!(RetryPolicy::new(Duration::ZERO, Duration::ZERO, 0).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let mut calls = 0;
        let result: Result<u32, RawFailure> = retry_with_backoff(
            &fast_policy(3),
            &Classifier::new(),
            "Fetch balance",
            None,
            || {
                calls += 1;
                let n = calls;
                async move {
                    if n < 3 {
                        Err("network unreachable")
                    } else {
                        Ok(42)
                    }
                }
            },
        )
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let mut calls = 0;
        let sink = MemorySink::new();
        let result: Result<(), RawFailure> = retry_with_backoff(
            &fast_policy(3),
            &Classifier::new(),
            "Confirm",
            Some(&sink),
            || {
                calls += 1;
                async { Err::<(), _>("timeout waiting for confirmation") }
            },
        )
        .await;

        assert_eq!(
            result.unwrap_err().message_text(),
            Some("timeout waiting for confirmation")
        );
        assert_eq!(calls, 3);
        let received = sink.received();
        assert_eq!(received.len(), 2);
        assert!(received.iter().all(Notification::is_recovery));
    }

    #[tokio::test]
    async fn test_user_rejection_is_not_retried() {
        let mut calls = 0;
        let result: Result<(), RawFailure> = retry_with_backoff(
            &fast_policy(5),
            &Classifier::new(),
            "Sign",
            None,
            || {
                calls += 1;
                async { Err::<(), _>(RawFailure::new().with_code(4001)) }
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
