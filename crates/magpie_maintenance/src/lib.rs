//! Offline dataset maintenance for the magpie crawler.
//!
//! Maintenance operates directly on the dataset store, never on the
//! network. Every operation computes a full plan first; with `dry_run` set
//! it reports the plan and leaves the filesystem byte-identical, and every
//! operation is idempotent under repeated execution.
//!
//! Removal ordering inside a commit is media file, then metadata file,
//! then index entry, then index persist - a crash between any two steps is
//! recoverable by the next `sync_index`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod engine;
mod prober;
mod reports;

pub use engine::MaintenanceEngine;
pub use prober::FfprobeProber;
pub use reports::{CleanOptions, CleanReport, FilterReport, MatchReport, PlannedRemoval, SyncReport};
