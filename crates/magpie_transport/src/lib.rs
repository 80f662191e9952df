//! Rate-limited HTTP transport for the magpie crawler.
//!
//! This crate is the single chokepoint for every outbound call. It enforces
//! a process-wide minimum inter-request delay with uniform jitter (governor's
//! GCRA limiter), rotates user-agent strings, injects session headers,
//! applies per-request timeouts, and retries with jittered exponential
//! backoff.
//!
//! Classification contract: 2xx yields the parsed body; 401/403 yields
//! `AuthExpired` (never retried here - the session manager re-authenticates
//! and the caller re-issues); 429 yields `RateLimited` honoring a
//! server-supplied delay clamped to `[retry_base_interval, 60s]`; network
//! and 5xx failures yield `Transient`; everything else yields `Remote`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod agents;
mod gate;
mod retry;
mod transport;

pub use agents::UserAgentCycle;
pub use gate::RequestGate;
pub use retry::{RetryPolicy, RetryStats};
pub use transport::Transport;
