//! Retry with exponential backoff for transient relay faults

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::types::{RelayConfig, RelayError, Result};

/// Upper bound of a single backoff delay
const MAX_DELAY: Duration = Duration::from_secs(10);
const BACKOFF_MULTIPLIER: u32 = 2;

/// How often and how patiently a failed request is retried
///
/// Only errors for which [`RelayError::is_retryable`] holds are retried; a
/// missing binary, a timeout or a tool that reported failure is returned
/// immediately.
///
/// [`RelayError::is_retryable`]: crate::types::RelayError::is_retryable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RelayConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Policy that makes exactly one attempt
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(config.retry_max_attempts, config.retry_base_delay)
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = BACKOFF_MULTIPLIER.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(MAX_DELAY)
    }

    /// Run `operation` until it succeeds, fails permanently, or retries run out
    ///
    /// Cancelling `cancel` ends the request with [`RelayError::Cancelled`],
    /// whether an attempt is running or the policy is waiting between
    /// attempts. A running attempt is dropped, which releases its session.
    pub async fn run<T, F, Fut>(&self, cancel: &CancellationToken, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retry = 0;
        loop {
            let attempt = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(RelayError::Cancelled),
                result = operation() => result,
            };
            match attempt {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && retry < self.max_retries => {
                    retry += 1;
                    let delay = self.delay_for(retry);
                    tracing::warn!(
                        error = %e,
                        retry,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis(),
                        "Transient failure, retrying"
                    );
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            tracing::info!(retry, "Request cancelled while waiting to retry");
                            return Err(RelayError::Cancelled);
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_millis(1))
    }

    #[test]
    fn test_delay_for_backs_off_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(10), MAX_DELAY);
    }

    #[test]
    fn test_from_config() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.base_delay, Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let result = fast(2)
            .run(&CancellationToken::new(), || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(RelayError::execution("claude", "resource temporarily unavailable"))
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = fast(2)
            .run(&CancellationToken::new(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RelayError::execution("claude", "broken pipe"))
            })
            .await;

        assert!(matches!(result, Err(RelayError::Execution { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = fast(3)
            .run(&CancellationToken::new(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RelayError::Timeout(Duration::from_secs(1)))
            })
            .await;

        assert!(matches!(result, Err(RelayError::Timeout(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let result: Result<()> = RetryPolicy::none()
            .run(&CancellationToken::new(), || async { Err(RelayError::execution("claude", "spawn failed")) })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_faults_after_spawn_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = fast(3)
            .run(&CancellationToken::new(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RelayError::execution_after_spawn("claude", "wait failed"))
            })
            .await;

        assert!(matches!(result, Err(RelayError::Execution { spawned: true, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_during_backoff_stops_retrying() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let policy = RetryPolicy::new(2, Duration::from_secs(5));

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        let result: Result<()> = policy
            .run(&cancel, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RelayError::execution("claude", "resource temporarily unavailable"))
            })
            .await;

        assert!(matches!(result, Err(RelayError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_cancelled_request_never_starts() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: Result<()> = fast(2)
            .run(&cancel, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(RelayError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_drops_running_attempt() {
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let result: Result<()> = fast(0)
            .run(&cancel, || std::future::pending())
            .await;
        assert!(matches!(result, Err(RelayError::Cancelled)));
    }
}
