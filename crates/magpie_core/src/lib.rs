//! Core data model and configuration for the magpie crawler.
//!
//! This crate defines the typed records that flow through the acquisition
//! pipeline and the immutable configuration record consumed by every
//! component:
//!
//! - [`ItemId`] - the opaque primary key across all storage artifacts
//! - [`Candidate`] - an in-memory item discovered by search, never persisted
//! - [`MetadataRecord`] - the persisted per-item descriptive document
//! - [`IndexDocument`] - the process-wide document enumerating the dataset
//! - [`CrawlerConfig`] - the flattened configuration record
//! - [`CancelToken`] - cooperative cancellation shared across pipeline stages
//!
//! External documents are parsed into these types at the boundary; internal
//! code never deals with untyped maps.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod cancel;
mod candidate;
mod config;
mod index;
mod item;
mod record;

pub use cancel::CancelToken;
pub use candidate::Candidate;
pub use config::{
    CrawlerConfig, DownloadConfig, NetworkConfig, PipelineConfig, QualityWeights, SearchConfig,
    StorageConfig,
};
pub use index::{IndexDocument, IndexEntry, IndexStats};
pub use item::ItemId;
pub use record::{BasicInfo, CrawlInfo, MetadataRecord, OwnerInfo, PageInfo, StatsInfo};

/// Schema version stamped into every newly written metadata record.
pub const METADATA_SCHEMA_VERSION: u32 = 2;
