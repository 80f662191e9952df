//! Resumable stream downloads and muxing for the magpie crawler.
//!
//! A download is serial per item: resolve the stream pair, transfer the
//! video stream, transfer the audio stream, then invoke the external muxer
//! with copy codecs. Each transfer writes to `<ItemID>.<stream>.part` and
//! resumes from the partial file's size via HTTP ranges; advertised byte
//! lengths are verified and a mismatch deletes the partial and counts as a
//! retry. On mux success the partials are removed; on mux failure they are
//! retained for inspection.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod downloader;
mod guard;
mod muxer;

pub use downloader::{DownloadOutcome, Downloader};
pub use guard::check_disk;
pub use muxer::FfmpegMuxer;
