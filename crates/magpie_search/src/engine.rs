//! The search engine.

use crate::filters::passes_filters;
use async_stream::try_stream;
use futures_util::stream::Stream;
use magpie_core::{Candidate, ItemId, SearchConfig};
use magpie_error::{MagpieResult, SearchError, SearchErrorKind};
use magpie_interface::RemoteService;
use rand::Rng;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Translates keywords into a de-duplicated stream of candidates.
///
/// The seen-set is shared across every `search` call on one engine
/// instance, so a candidate surfacing under two keywords in the same run
/// is yielded once.
pub struct SearchEngine {
    remote: Arc<dyn RemoteService>,
    config: SearchConfig,
    seen: Arc<Mutex<HashSet<ItemId>>>,
}

impl SearchEngine {
    /// Create an engine over the remote capability.
    pub fn new(remote: Arc<dyn RemoteService>, config: SearchConfig) -> Self {
        Self {
            remote,
            config,
            seen: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Lazily produce up to `limit` candidates for one keyword.
    ///
    /// Results are yielded in the order the remote returned them,
    /// interleaved across pages. A page failure is logged and skipped; if
    /// every page of the keyword fails, the stream ends with
    /// `SearchFailed`.
    pub fn search(
        &self,
        keyword: String,
        limit: usize,
    ) -> impl Stream<Item = MagpieResult<Candidate>> + Send {
        let remote = self.remote.clone();
        let config = self.config.clone();
        let seen = self.seen.clone();

        try_stream! {
            let mut produced = 0usize;
            let mut pages_ok = 0u32;
            let mut pages_failed = 0u32;

            'pages: for page in 1..=config.max_pages.max(1) {
                if page > 1 {
                    tokio::time::sleep(sample_interval(config.page_interval)).await;
                }

                let page_data = match remote
                    .search_page(&keyword, page, config.page_size)
                    .await
                {
                    Ok(data) => {
                        pages_ok += 1;
                        data
                    }
                    Err(e) => {
                        warn!(keyword = %keyword, page, error = %e, "Search page failed, skipping");
                        pages_failed += 1;
                        continue;
                    }
                };

                for candidate in page_data.items {
                    if !passes_filters(&config, &candidate) {
                        continue;
                    }
                    {
                        let mut seen = seen.lock().unwrap();
                        if !seen.insert(candidate.item_id.clone()) {
                            debug!(item_id = %candidate.item_id, "Dropping duplicate candidate");
                            continue;
                        }
                    }
                    yield candidate;
                    produced += 1;
                    if produced >= limit {
                        break 'pages;
                    }
                }

                if !page_data.has_more {
                    break;
                }
            }

            if pages_ok == 0 && pages_failed > 0 {
                Err(SearchError::new(SearchErrorKind::AllPagesFailed(keyword.clone())))?;
            }
            debug!(keyword = %keyword, produced, "Keyword exhausted");
        }
    }
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("page_size", &self.config.page_size)
            .field("max_pages", &self.config.max_pages)
            .finish_non_exhaustive()
    }
}

/// Sample the inter-page sleep uniformly from `[lo, hi]`.
fn sample_interval([lo, hi]: [f64; 2]) -> Duration {
    let lo = lo.max(0.0);
    let hi = hi.max(lo);
    let secs = if hi > lo {
        rand::thread_rng().gen_range(lo..=hi)
    } else {
        lo
    };
    Duration::from_secs_f64(secs)
}
