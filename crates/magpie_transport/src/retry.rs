//! Retry with jittered exponential backoff.

use magpie_error::{TransportError, TransportErrorKind};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_retry2::strategy::{ExponentialBackoff, jitter};
use tokio_retry2::{Retry, RetryError};
use tracing::warn;

/// Backoff ceiling shared by every retried call.
const MAX_DELAY: Duration = Duration::from_secs(60);

/// Counters of retry-worthy events, including ones that later succeeded.
///
/// The run report folds these into `errors_by_kind` so a rate limit that
/// was absorbed by an internal retry is still visible in the aggregate.
#[derive(Debug, Default)]
pub struct RetryStats {
    /// Rate-limit responses observed
    pub rate_limited: AtomicU64,
    /// Transient failures observed
    pub transient: AtomicU64,
}

impl RetryStats {
    /// Rate-limit responses observed so far.
    pub fn rate_limited_count(&self) -> u64 {
        self.rate_limited.load(Ordering::Relaxed)
    }

    /// Transient failures observed so far.
    pub fn transient_count(&self) -> u64 {
        self.transient.load(Ordering::Relaxed)
    }
}

/// Retry policy for transport calls.
///
/// Sleeps `retry_base_interval * 2^(attempt-1)` (jittered) between attempts,
/// up to `max_retries` retries after the initial call. `RateLimited` errors
/// override the computed delay with the server-supplied one, clamped to
/// `[retry_base_interval, 60s]`. `AuthExpired`, `NotFound`, and remote error
/// codes are permanent at this layer.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retry attempts after the initial call
    pub max_retries: u32,
    /// Base of the exponential backoff, in seconds
    pub base_interval: f64,
    stats: Option<Arc<RetryStats>>,
}

impl RetryPolicy {
    /// Create a policy.
    pub fn new(max_retries: u32, base_interval: f64) -> Self {
        Self {
            max_retries,
            base_interval,
            stats: None,
        }
    }

    /// Attach event counters.
    pub fn with_stats(mut self, stats: Arc<RetryStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    fn strategy(&self) -> impl Iterator<Item = Duration> {
        let base_ms = ((self.base_interval * 1000.0).max(1.0)) as u64;
        // from_millis(2) yields 2^n; the factor rescales that to
        // base * 2^(attempt-1).
        ExponentialBackoff::from_millis(2)
            .factor((base_ms / 2).max(1))
            .max_delay(MAX_DELAY)
            .map(jitter)
            .take(self.max_retries as usize)
    }

    /// Run `operation`, retrying retryable transport failures.
    ///
    /// A persistently failing operation is attempted exactly
    /// `max_retries + 1` times and the last error is surfaced.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let base = Duration::from_secs_f64(self.base_interval.max(0.001));
        Retry::spawn(self.strategy(), || {
            let attempt = operation();
            async move {
                match attempt.await {
                    Ok(value) => Ok(value),
                    Err(e) => match &e.kind {
                        TransportErrorKind::RateLimited { retry_after } => {
                            if let Some(stats) = &self.stats {
                                stats.rate_limited.fetch_add(1, Ordering::Relaxed);
                            }
                            let delay = retry_after.map(|d| d.clamp(base, MAX_DELAY));
                            warn!(retry_after = ?delay, "Rate limited, will retry");
                            Err(RetryError::Transient {
                                err: e,
                                retry_after: delay,
                            })
                        }
                        kind if kind.is_retryable() => {
                            if let Some(stats) = &self.stats {
                                stats.transient.fetch_add(1, Ordering::Relaxed);
                            }
                            warn!(error = %e, "Transient transport failure, will retry");
                            Err(RetryError::Transient {
                                err: e,
                                retry_after: None,
                            })
                        }
                        _ => Err(RetryError::Permanent(e)),
                    },
                }
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient() -> TransportError {
        TransportError::new(TransportErrorKind::Transient("connection reset".to_string()))
    }

    #[tokio::test]
    async fn test_persistent_failure_attempts_max_retries_plus_one() {
        let policy = RetryPolicy::new(3, 0.001);
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = policy
            .run(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(transient()) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let policy = RetryPolicy::new(3, 0.001);
        let attempts = AtomicU32::new(0);
        let result = policy
            .run(|| {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(transient())
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_auth_expired_is_not_retried() {
        let policy = RetryPolicy::new(3, 0.001);
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = policy
            .run(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(TransportError::new(TransportErrorKind::AuthExpired)) }
            })
            .await;
        assert!(matches!(
            result.unwrap_err().kind,
            TransportErrorKind::AuthExpired
        ));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rate_limited_honors_server_delay() {
        let policy = RetryPolicy::new(2, 0.001);
        let attempts = AtomicU32::new(0);
        let start = std::time::Instant::now();
        let result = policy
            .run(|| {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(TransportError::new(TransportErrorKind::RateLimited {
                            retry_after: Some(Duration::from_millis(50)),
                        }))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;
        assert!(result.is_ok());
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
