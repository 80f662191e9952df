//! Magpie - keyword-driven video dataset crawler.
//!
//! Magpie builds a local dataset of media artifacts and their metadata
//! from a public video-sharing service: a concurrent, rate-limited
//! pipeline (search, metadata, filtered download) over an on-disk layout
//! whose three artifacts - metadata files, media files, and a master
//! index - stay mutually consistent under partial failures, retries, and
//! offline maintenance.
//!
//! # Architecture
//!
//! Magpie is organized as a workspace with focused crates:
//!
//! - `magpie_core` - data model and configuration
//! - `magpie_error` - error types
//! - `magpie_interface` - capability traits at the seams
//! - `magpie_transport` - rate-limited HTTP transport
//! - `magpie_session` - session acquisition and persistence
//! - `magpie_remote` - the remote web-API adapter
//! - `magpie_dataset` - on-disk layout and index coherence
//! - `magpie_search` / `magpie_metadata` / `magpie_download` - the
//!   acquisition stages
//! - `magpie_maintenance` - offline reconciliation
//! - `magpie_pipeline` - the bounded-concurrency orchestrator
//!
//! This crate (`magpie`) re-exports everything for convenience and ships
//! the thin command-line binary.

pub use magpie_core::*;
pub use magpie_dataset::{DatasetStore, PutOutcome, RemovalReport};
pub use magpie_download::{DownloadOutcome, Downloader, FfmpegMuxer};
pub use magpie_error::*;
pub use magpie_interface::*;
pub use magpie_maintenance::{
    CleanOptions, CleanReport, FfprobeProber, FilterReport, MaintenanceEngine, MatchReport,
    SyncReport,
};
pub use magpie_metadata::Collector;
pub use magpie_pipeline::{CircuitBreaker, Orchestrator, RunReport};
pub use magpie_remote::{BiliClient, Endpoints};
pub use magpie_search::SearchEngine;
pub use magpie_session::{
    CredentialStore, EnvCredentialSource, SessionManager, StaticCredentialSource,
};
pub use magpie_transport::{RequestGate, RetryPolicy, RetryStats, Transport, UserAgentCycle};

pub mod observability;
