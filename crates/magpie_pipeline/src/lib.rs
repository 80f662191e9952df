//! Bounded-concurrency acquisition pipeline for the magpie crawler.
//!
//! The orchestrator wires session, search, metadata collection, and
//! download into three stages connected by bounded channels:
//!
//! 1. Search fan-out - sequential per keyword, candidates emitted into a
//!    channel of capacity `page_size * 2`.
//! 2. Metadata workers - `metadata_workers` tasks committing records and
//!    forwarding ready ids.
//! 3. Download workers - `concurrent_limit` tasks downloading, muxing, and
//!    attaching media.
//!
//! Blocking sends give backpressure: a slow download stage throttles
//! metadata, which throttles search. A shared cancellation token stops
//! intake at every stage boundary; partial downloads stay on disk as
//! `.part` files. Per-stage circuit breakers halt a stage when half of the
//! recent items failed.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod breaker;
mod orchestrator;
mod report;

pub use breaker::CircuitBreaker;
pub use orchestrator::Orchestrator;
pub use report::RunReport;
