//! The process-wide request gate.
//!
//! One token bucket (rate = `1 / request_interval`, burst 1) that every
//! outbound call traverses, built on governor's GCRA limiter with uniform
//! jitter in `[0, random_offset]` applied on top of each grant.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Jitter, Quota, RateLimiter as GovernorRateLimiter};
use magpie_error::{ConfigError, MagpieResult};
use std::time::Duration;

type DirectRateLimiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Process-wide admission gate for outbound requests.
///
/// Constructed once by the orchestrator and shared by every concurrent
/// caller; governor keeps the grant path lock-free.
pub struct RequestGate {
    limiter: DirectRateLimiter,
    jitter: Option<Jitter>,
}

impl RequestGate {
    /// Create a gate granting one request per `request_interval` seconds,
    /// with uniform jitter up to `random_offset` seconds after each grant.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when `request_interval` is not positive.
    pub fn new(request_interval: f64, random_offset: f64) -> MagpieResult<Self> {
        if request_interval <= 0.0 {
            return Err(ConfigError::new("request_interval must be positive").into());
        }
        let quota = Quota::with_period(Duration::from_secs_f64(request_interval))
            .ok_or_else(|| ConfigError::new("request_interval must be positive"))?;
        let jitter =
            (random_offset > 0.0).then(|| Jitter::up_to(Duration::from_secs_f64(random_offset)));
        Ok(Self {
            limiter: GovernorRateLimiter::direct(quota),
            jitter,
        })
    }

    /// Wait until the gate grants the next request.
    pub async fn admit(&self) {
        match self.jitter {
            Some(jitter) => self.limiter.until_ready_with_jitter(jitter).await,
            None => self.limiter.until_ready().await,
        }
    }
}

impl std::fmt::Debug for RequestGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestGate")
            .field("jitter", &self.jitter.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_gate_spaces_requests() {
        let gate = RequestGate::new(0.05, 0.0).unwrap();
        let start = Instant::now();
        for _ in 0..3 {
            gate.admit().await;
        }
        // First grant is immediate; two more cost one interval each.
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn test_rejects_non_positive_interval() {
        assert!(RequestGate::new(0.0, 0.0).is_err());
        assert!(RequestGate::new(-1.0, 0.0).is_err());
    }
}
