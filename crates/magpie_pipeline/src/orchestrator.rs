//! The pipeline orchestrator.

use crate::{CircuitBreaker, RunReport};
use futures_util::StreamExt;
use magpie_core::{CancelToken, Candidate, CrawlerConfig, ItemId};
use magpie_dataset::DatasetStore;
use magpie_download::Downloader;
use magpie_error::{FailureKind, MagpieError, MagpieResult, PipelineError, PipelineErrorKind};
use magpie_interface::{Muxer, RemoteService};
use magpie_metadata::Collector;
use magpie_search::SearchEngine;
use magpie_session::SessionManager;
use magpie_transport::RetryStats;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex as StdMutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Outcomes tracked per stage before the breaker trips.
const BREAKER_WINDOW: usize = 20;

/// Wires session, search, metadata, download, and the dataset store into a
/// bounded-concurrency pipeline.
pub struct Orchestrator {
    remote: Arc<dyn RemoteService>,
    store: Arc<DatasetStore>,
    session: Arc<SessionManager>,
    muxer: Arc<dyn Muxer>,
    retry_stats: Option<Arc<RetryStats>>,
    config: CrawlerConfig,
    cancel: CancelToken,
}

impl Orchestrator {
    /// Wire an orchestrator from its collaborators.
    ///
    /// `retry_stats` lets the report include rate-limit events the
    /// transport absorbed internally; pass the transport's counters when
    /// running against the real remote.
    pub fn new(
        remote: Arc<dyn RemoteService>,
        store: Arc<DatasetStore>,
        session: Arc<SessionManager>,
        muxer: Arc<dyn Muxer>,
        retry_stats: Option<Arc<RetryStats>>,
        config: CrawlerConfig,
        cancel: CancelToken,
    ) -> Self {
        Self {
            remote,
            store,
            session,
            muxer,
            retry_stats,
            config,
            cancel,
        }
    }

    /// Run the acquisition pipeline over the given keywords.
    ///
    /// Aborts with an error only on run-level failures (no session,
    /// failed re-authentication); per-item failures are tallied in the
    /// report and the run completes.
    #[instrument(skip(self, keywords), fields(keywords = keywords.len()))]
    pub async fn run(&self, keywords: Vec<String>) -> MagpieResult<RunReport> {
        self.session.login(false).await?;

        let run_id = Uuid::new_v4();
        info!(run_id = %run_id, "Pipeline starting");

        let tally = Arc::new(RunTally::default());
        let meta_breaker = Arc::new(CircuitBreaker::new(BREAKER_WINDOW));
        let dl_breaker = Arc::new(CircuitBreaker::new(BREAKER_WINDOW));
        let reauth = Arc::new(ReauthGate::new(self.session.clone(), self.cancel.clone()));

        let candidate_capacity = (self.config.search.page_size as usize * 2).max(1);
        let ready_capacity = (self.config.download.concurrent_limit * 2).max(1);
        let (candidate_tx, candidate_rx) = mpsc::channel::<Candidate>(candidate_capacity);
        let (ready_tx, ready_rx) = mpsc::channel::<ItemId>(ready_capacity);
        let candidate_rx = Arc::new(Mutex::new(candidate_rx));
        let ready_rx = Arc::new(Mutex::new(ready_rx));

        // Stage 1: search fan-out, sequential per keyword.
        let search_task = {
            let engine = SearchEngine::new(self.remote.clone(), self.config.search.clone());
            let store = self.store.clone();
            let tally = tally.clone();
            let cancel = self.cancel.clone();
            let meta_breaker = meta_breaker.clone();
            let resume = self.config.pipeline.resume;
            let max_items = self.config.pipeline.max_items;
            tokio::spawn(async move {
                let mut emitted = 0u64;
                'keywords: for keyword in keywords {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let mut stream = Box::pin(engine.search(keyword.clone(), usize::MAX));
                    while let Some(item) = stream.next().await {
                        let candidate = match item {
                            Ok(candidate) => candidate,
                            Err(e) => {
                                tally.record_error(&e);
                                continue;
                            }
                        };
                        tally.candidates_seen.fetch_add(1, Ordering::Relaxed);

                        if resume
                            && store.get(&candidate.item_id).await.ok().flatten().is_some()
                            && store.has_media(&candidate.item_id).await
                        {
                            debug!(item_id = %candidate.item_id, "Complete pair exists, skipping");
                            tally.skipped_existing.fetch_add(1, Ordering::Relaxed);
                            continue;
                        }
                        if cancel.is_cancelled() {
                            break 'keywords;
                        }
                        if meta_breaker.is_tripped() {
                            warn!("Metadata stage halted, stopping intake");
                            break 'keywords;
                        }
                        if candidate_tx.send(candidate).await.is_err() {
                            break 'keywords;
                        }
                        emitted += 1;
                        if max_items > 0 && emitted >= max_items {
                            info!(max_items, "Global item cap reached");
                            break 'keywords;
                        }
                    }
                    tally.keywords_processed.fetch_add(1, Ordering::Relaxed);
                }
            })
        };

        // Stage 2: metadata workers.
        let collector = Arc::new(Collector::new(self.remote.clone(), self.store.clone()));
        let mut workers = Vec::new();
        for worker in 0..self.config.pipeline.metadata_workers.max(1) {
            let collector = collector.clone();
            let candidate_rx = candidate_rx.clone();
            let ready_tx = ready_tx.clone();
            let tally = tally.clone();
            let cancel = self.cancel.clone();
            let breaker = meta_breaker.clone();
            let reauth = reauth.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    if cancel.is_cancelled() || breaker.is_tripped() {
                        break;
                    }
                    let candidate = { candidate_rx.lock().await.recv().await };
                    let Some(candidate) = candidate else { break };
                    match collect_with_reauth(&collector, &reauth, &candidate.item_id).await {
                        Ok(()) => {
                            tally.metadata_committed.fetch_add(1, Ordering::Relaxed);
                            breaker.record(true);
                            if ready_tx.send(candidate.item_id).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(item_id = %candidate.item_id, worker, error = %e, "Metadata failed");
                            // A vanished item is a skip, not a stage failure.
                            if e.failure_kind() != FailureKind::NotFound {
                                breaker.record(false);
                            }
                            tally.record_error(&e);
                        }
                    }
                }
                if breaker.is_tripped() {
                    tally.halt_stage("metadata");
                }
            }));
        }
        drop(ready_tx);

        // Stage 3: download workers, the concurrency bound on transfers.
        let downloader = Arc::new(Downloader::new(
            self.remote.clone(),
            self.muxer.clone(),
            self.store.media_dir().to_path_buf(),
            self.config.download.clone(),
        ));
        let duration_ceiling = self.config.download.duration_ceiling();
        for worker in 0..self.config.download.concurrent_limit.max(1) {
            let downloader = downloader.clone();
            let store = self.store.clone();
            let ready_rx = ready_rx.clone();
            let tally = tally.clone();
            let cancel = self.cancel.clone();
            let breaker = dl_breaker.clone();
            let reauth = reauth.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    if cancel.is_cancelled() || breaker.is_tripped() {
                        break;
                    }
                    let item_id = { ready_rx.lock().await.recv().await };
                    let Some(item_id) = item_id else { break };

                    if let Some(ceiling) = duration_ceiling {
                        let duration = store
                            .get(&item_id)
                            .await
                            .ok()
                            .flatten()
                            .map(|r| r.duration_seconds());
                        if duration.is_some_and(|d| d > ceiling) {
                            info!(item_id = %item_id, ?duration, ceiling, "Skipping download over duration ceiling");
                            tally
                                .downloads_skipped_by_duration
                                .fetch_add(1, Ordering::Relaxed);
                            continue;
                        }
                    }

                    let dataset_bytes = store.dataset_size_bytes().await;
                    match download_with_reauth(&downloader, &reauth, &item_id, dataset_bytes, &cancel)
                        .await
                    {
                        Ok(outcome) => {
                            if outcome.downgraded {
                                tally.quality_downgrades.fetch_add(1, Ordering::Relaxed);
                            }
                            match store.attach_media(&item_id, &outcome.ext).await {
                                Ok(()) => {
                                    tally.downloads_committed.fetch_add(1, Ordering::Relaxed);
                                    breaker.record(true);
                                }
                                Err(e) => {
                                    warn!(item_id = %item_id, error = %e, "Media attach failed");
                                    tally.record_error(&e);
                                    breaker.record(false);
                                }
                            }
                        }
                        Err(e) => {
                            warn!(item_id = %item_id, worker, error = %e, "Download failed");
                            let disk_full = e.failure_kind() == FailureKind::DiskFull;
                            tally.record_error(&e);
                            breaker.record(false);
                            if disk_full {
                                tally.halt_stage("download");
                                break;
                            }
                        }
                    }
                }
                if breaker.is_tripped() {
                    tally.halt_stage("download");
                }
            }));
        }

        // The orchestrator's receiver handles must go away now: once every
        // worker exits, the receivers close and a blocked search send
        // unblocks with an error instead of deadlocking.
        drop(candidate_rx);
        drop(ready_rx);

        let _ = search_task.await;
        for worker in workers {
            let _ = worker.await;
        }

        if reauth.failed().await {
            return Err(PipelineError::new(PipelineErrorKind::ReauthFailed(
                "session could not be refreshed mid-run".to_string(),
            ))
            .into());
        }

        let report = tally.report(run_id, self.retry_stats.as_deref());
        info!(
            run_id = %run_id,
            keywords = report.keywords_processed,
            candidates = report.candidates_seen,
            metadata = report.metadata_committed,
            downloads = report.downloads_committed,
            "Pipeline finished"
        );
        Ok(report)
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("metadata_workers", &self.config.pipeline.metadata_workers)
            .field("concurrent_limit", &self.config.download.concurrent_limit)
            .finish_non_exhaustive()
    }
}

/// Collect an item, absorbing one session expiry through the re-auth gate.
async fn collect_with_reauth(
    collector: &Collector,
    reauth: &ReauthGate,
    item_id: &ItemId,
) -> MagpieResult<()> {
    match collector.collect(item_id).await {
        Err(e) if e.failure_kind() == FailureKind::AuthExpired => {
            reauth.ensure().await?;
            collector.collect(item_id).await.map(|_| ())
        }
        other => other.map(|_| ()),
    }
}

/// Download an item, absorbing one session expiry through the re-auth gate.
async fn download_with_reauth(
    downloader: &Downloader,
    reauth: &ReauthGate,
    item_id: &ItemId,
    dataset_bytes: u64,
    cancel: &CancelToken,
) -> MagpieResult<magpie_download::DownloadOutcome> {
    match downloader.download(item_id, dataset_bytes, cancel).await {
        Err(e) if e.failure_kind() == FailureKind::AuthExpired => {
            reauth.ensure().await?;
            downloader.download(item_id, dataset_bytes, cancel).await
        }
        other => other,
    }
}

/// Single-flight re-authentication, at most one attempt per run.
struct ReauthGate {
    session: Arc<SessionManager>,
    cancel: CancelToken,
    state: Mutex<ReauthState>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ReauthState {
    NotTried,
    Succeeded,
    Failed,
}

impl ReauthGate {
    fn new(session: Arc<SessionManager>, cancel: CancelToken) -> Self {
        Self {
            session,
            cancel,
            state: Mutex::new(ReauthState::NotTried),
        }
    }

    async fn ensure(&self) -> MagpieResult<()> {
        let mut state = self.state.lock().await;
        match *state {
            ReauthState::Succeeded => Ok(()),
            ReauthState::Failed => Err(PipelineError::new(PipelineErrorKind::ReauthFailed(
                "re-authentication already failed this run".to_string(),
            ))
            .into()),
            ReauthState::NotTried => {
                warn!("Session expired mid-run, re-authenticating");
                match self.session.login(true).await {
                    Ok(_) => {
                        *state = ReauthState::Succeeded;
                        Ok(())
                    }
                    Err(e) => {
                        *state = ReauthState::Failed;
                        self.cancel.cancel();
                        Err(PipelineError::new(PipelineErrorKind::ReauthFailed(e.to_string()))
                            .into())
                    }
                }
            }
        }
    }

    async fn failed(&self) -> bool {
        *self.state.lock().await == ReauthState::Failed
    }
}

/// Mutable counters shared by every stage of one run.
#[derive(Default)]
struct RunTally {
    keywords_processed: AtomicU64,
    candidates_seen: AtomicU64,
    metadata_committed: AtomicU64,
    downloads_committed: AtomicU64,
    downloads_skipped_by_duration: AtomicU64,
    quality_downgrades: AtomicU64,
    skipped_existing: AtomicU64,
    errors: StdMutex<BTreeMap<String, u64>>,
    halted: StdMutex<BTreeSet<String>>,
}

impl RunTally {
    fn record_error(&self, error: &MagpieError) {
        let kind: &'static str = error.failure_kind().into();
        *self
            .errors
            .lock()
            .unwrap()
            .entry(kind.to_string())
            .or_default() += 1;
    }

    fn halt_stage(&self, stage: &str) {
        self.halted.lock().unwrap().insert(stage.to_string());
    }

    fn report(&self, run_id: Uuid, retry_stats: Option<&RetryStats>) -> RunReport {
        let mut errors = self.errors.lock().unwrap().clone();
        if let Some(stats) = retry_stats {
            let rate_limited = stats.rate_limited_count();
            if rate_limited > 0 {
                let entry = errors.entry(FailureKind::RateLimited.to_string()).or_default();
                *entry = (*entry).max(rate_limited);
            }
        }
        RunReport {
            run_id,
            keywords_processed: self.keywords_processed.load(Ordering::Relaxed) as usize,
            candidates_seen: self.candidates_seen.load(Ordering::Relaxed),
            metadata_committed: self.metadata_committed.load(Ordering::Relaxed),
            downloads_committed: self.downloads_committed.load(Ordering::Relaxed),
            downloads_skipped_by_duration: self
                .downloads_skipped_by_duration
                .load(Ordering::Relaxed),
            quality_downgrades: self.quality_downgrades.load(Ordering::Relaxed),
            skipped_existing: self.skipped_existing.load(Ordering::Relaxed),
            errors_by_kind: errors,
            stages_halted: self.halted.lock().unwrap().iter().cloned().collect(),
        }
    }
}
