//! Keyword search engine for the magpie crawler.
//!
//! Translates keywords into a de-duplicated, filtered, lazily produced
//! stream of candidates. Pagination stops at remote exhaustion, the
//! per-keyword limit, or the page cap; the engine sleeps a uniformly
//! sampled interval between pages. A failed page is skipped (the remote
//! already retried it); a keyword whose every page failed surfaces
//! `SearchFailed` without aborting the other keywords.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod engine;
mod filters;

pub use engine::SearchEngine;
pub use filters::{passes_filters, quality_score};
