//! The stream downloader.

use crate::guard::check_disk;
use futures_util::StreamExt;
use magpie_core::{CancelToken, DownloadConfig, ItemId};
use magpie_error::{
    DownloadError, DownloadErrorKind, FailureKind, MagpieError, MagpieResult, PipelineError,
    PipelineErrorKind,
};
use magpie_interface::{Muxer, RemoteService, StreamSource};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_retry2::strategy::{ExponentialBackoff, jitter};
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, info, instrument, warn};

/// Container extension of the muxed output.
const OUTPUT_EXT: &str = "mp4";

/// Base of the transfer retry backoff.
const RETRY_BASE: Duration = Duration::from_secs(1);

/// What a successful download produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// Extension of the muxed media file
    pub ext: String,
    /// Quality code actually granted
    pub quality: u32,
    /// Whether the requested quality was unavailable
    pub downgraded: bool,
}

/// Downloads and muxes one item at a time.
///
/// Within one download, the video fetch happens before the audio fetch,
/// which happens before the mux; concurrency across items is the
/// orchestrator's business.
pub struct Downloader {
    remote: std::sync::Arc<dyn RemoteService>,
    muxer: std::sync::Arc<dyn Muxer>,
    media_dir: PathBuf,
    config: DownloadConfig,
}

impl Downloader {
    /// Wire a downloader from its collaborators.
    pub fn new(
        remote: std::sync::Arc<dyn RemoteService>,
        muxer: std::sync::Arc<dyn Muxer>,
        media_dir: PathBuf,
        config: DownloadConfig,
    ) -> Self {
        Self {
            remote,
            muxer,
            media_dir,
            config,
        }
    }

    /// Produce `<media_dir>/<ItemID>.mp4` for an item.
    ///
    /// `dataset_bytes` is the current cumulative media size, for the size
    /// cap. Partial files are left in place on cancellation and on mux
    /// failure.
    #[instrument(skip(self, cancel), fields(item_id = %item_id))]
    pub async fn download(
        &self,
        item_id: &ItemId,
        dataset_bytes: u64,
        cancel: &CancelToken,
    ) -> MagpieResult<DownloadOutcome> {
        check_disk(
            &self.media_dir,
            self.config.chunk_size,
            self.config.max_size_gb,
            dataset_bytes,
        )?;

        let requested = self.config.default_quality;
        let sources = self.remote.stream_sources(item_id, requested).await?;
        let downgraded = sources.quality > requested;
        if downgraded {
            warn!(
                item_id = %item_id,
                requested,
                granted = sources.quality,
                "Requested quality unavailable, downgrading"
            );
        }

        let video_part = self.part_path(item_id, "video");
        let audio_part = self.part_path(item_id, "audio");

        self.transfer_with_retry(&sources.video, &video_part, cancel)
            .await?;
        self.transfer_with_retry(&sources.audio, &audio_part, cancel)
            .await?;

        let output = self.media_dir.join(format!("{}.{}", item_id, OUTPUT_EXT));
        self.muxer.mux(&video_part, &audio_part, &output).await?;

        // The partials are only disposable once the mux has succeeded.
        for part in [&video_part, &audio_part] {
            if let Err(e) = tokio::fs::remove_file(part).await {
                warn!(path = %part.display(), error = %e, "Failed to remove partial file");
            }
        }

        info!(item_id = %item_id, quality = sources.quality, "Download committed");
        Ok(DownloadOutcome {
            ext: OUTPUT_EXT.to_string(),
            quality: sources.quality,
            downgraded,
        })
    }

    fn part_path(&self, item_id: &ItemId, stream: &str) -> PathBuf {
        self.media_dir.join(format!("{}.{}.part", item_id, stream))
    }

    /// Transfer one stream with bounded retries.
    ///
    /// A length mismatch deletes the partial, so the retried attempt
    /// restarts from offset zero; plain I/O failures resume from the
    /// partial's current size.
    async fn transfer_with_retry(
        &self,
        source: &StreamSource,
        part: &Path,
        cancel: &CancelToken,
    ) -> MagpieResult<()> {
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(RETRY_BASE.as_millis() as u64 / 2)
            .max_delay(Duration::from_secs(60))
            .map(jitter)
            .take(self.config.retry_times as usize);

        Retry::spawn(strategy, || async move {
            match self.transfer(source, part, cancel).await {
                Ok(()) => Ok(()),
                Err(e) if is_retryable(&e) => {
                    warn!(part = %part.display(), error = %e, "Transfer failed, will retry");
                    Err(RetryError::Transient {
                        err: e,
                        retry_after: None,
                    })
                }
                Err(e) => Err(RetryError::Permanent(e)),
            }
        })
        .await
    }

    /// One transfer attempt: resume from the partial, stream to disk,
    /// verify the advertised length.
    async fn transfer(
        &self,
        source: &StreamSource,
        part: &Path,
        cancel: &CancelToken,
    ) -> MagpieResult<()> {
        let mut existing = match tokio::fs::metadata(part).await {
            Ok(meta) => meta.len(),
            Err(_) => 0,
        };
        if let Some(total) = source.byte_length {
            if existing == total {
                debug!(part = %part.display(), "Partial already complete");
                return Ok(());
            }
            if existing > total {
                warn!(part = %part.display(), existing, total, "Partial overshoots, restarting");
                remove_part(part).await?;
                existing = 0;
            }
        }

        let body = self.remote.fetch_range(&source.url, existing).await?;
        let expected_total = source.byte_length.or(body.total_length);

        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(part)
            .await
            .map_err(|e| io_error(part, e))?;
        let mut writer = BufWriter::with_capacity(self.config.chunk_size as usize, file);

        let mut stream = body.stream;
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            if cancel.is_cancelled() {
                writer.flush().await.map_err(|e| io_error(part, e))?;
                return Err(PipelineError::new(PipelineErrorKind::Cancelled).into());
            }
            let chunk = chunk?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| io_error(part, e))?;
            written += chunk.len() as u64;
        }
        writer.flush().await.map_err(|e| io_error(part, e))?;

        let final_len = existing + written;
        if let Some(total) = expected_total {
            if final_len != total {
                remove_part(part).await?;
                return Err(DownloadError::new(DownloadErrorKind::LengthMismatch {
                    expected: total,
                    actual: final_len,
                })
                .into());
            }
        }
        debug!(part = %part.display(), resumed_from = existing, written, "Stream transferred");
        Ok(())
    }
}

impl std::fmt::Debug for Downloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader")
            .field("media_dir", &self.media_dir)
            .field("default_quality", &self.config.default_quality)
            .finish_non_exhaustive()
    }
}

fn is_retryable(error: &MagpieError) -> bool {
    matches!(
        error.failure_kind(),
        FailureKind::Transient | FailureKind::RateLimited
    )
}

fn io_error(part: &Path, e: std::io::Error) -> DownloadError {
    DownloadError::new(DownloadErrorKind::Io(format!("{}: {}", part.display(), e)))
}

async fn remove_part(part: &Path) -> MagpieResult<()> {
    match tokio::fs::remove_file(part).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error(part, e).into()),
    }
}
