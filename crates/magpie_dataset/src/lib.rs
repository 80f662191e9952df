//! On-disk dataset layout and index coherence for the magpie crawler.
//!
//! The dataset store exclusively owns the filesystem layout:
//!
//! ```text
//! <root>/
//!   metadata/<ItemID>.json    one per item, pretty-printed UTF-8
//!   media/<ItemID>.<ext>      one per item, muxed container
//!   metadata/index.json       the index document
//! ```
//!
//! Every mutation is a commit: touch the artifact file first, update the
//! index in memory, then persist the index atomically (temp file, fsync,
//! rename, directory fsync). If the final index write fails, the in-memory
//! document rolls back to its prior snapshot and `CommitFailed` surfaces;
//! the on-disk artifacts remain as orphans for maintenance to reconcile.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod atomic;
mod store;

pub use atomic::atomic_write_json;
pub use store::{DatasetStore, PutOutcome, RemovalReport};
