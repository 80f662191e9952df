//! Tests for the stream downloader.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream;
use magpie_core::{CancelToken, DownloadConfig, ItemId, MetadataRecord};
use magpie_download::{DownloadOutcome, Downloader};
use magpie_error::{
    DownloadError, DownloadErrorKind, MagpieResult, TransportError, TransportErrorKind,
};
use magpie_interface::{
    ByteStream, Credential, Muxer, RemoteIdentity, RemoteService, SearchPage, StreamSource,
    StreamSources,
};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Remote serving in-memory video and audio buffers with range support.
struct StreamRemote {
    video: Vec<u8>,
    audio: Vec<u8>,
    granted_quality: u32,
    /// Serve this many bytes short of the advertised length on every call.
    shortfall: usize,
    offsets: Mutex<Vec<(String, u64)>>,
}

impl StreamRemote {
    fn new(video: &[u8], audio: &[u8]) -> Self {
        Self {
            video: video.to_vec(),
            audio: audio.to_vec(),
            granted_quality: 64,
            shortfall: 0,
            offsets: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RemoteService for StreamRemote {
    async fn verify_session(&self, _: &Credential) -> MagpieResult<Option<RemoteIdentity>> {
        Ok(None)
    }

    async fn search_page(&self, _: &str, _: u32, _: u32) -> MagpieResult<SearchPage> {
        Err(TransportError::new(TransportErrorKind::NotFound).into())
    }

    async fn video_detail(&self, _: &ItemId) -> MagpieResult<MetadataRecord> {
        Err(TransportError::new(TransportErrorKind::NotFound).into())
    }

    async fn stream_sources(&self, _: &ItemId, _quality: u32) -> MagpieResult<StreamSources> {
        Ok(StreamSources {
            quality: self.granted_quality,
            video: StreamSource {
                url: "video".to_string(),
                byte_length: Some(self.video.len() as u64),
            },
            audio: StreamSource {
                url: "audio".to_string(),
                byte_length: Some(self.audio.len() as u64),
            },
        })
    }

    async fn fetch_range(&self, url: &str, offset: u64) -> MagpieResult<ByteStream> {
        self.offsets
            .lock()
            .unwrap()
            .push((url.to_string(), offset));
        let buffer = match url {
            "video" => &self.video,
            _ => &self.audio,
        };
        let mut body = buffer[offset as usize..].to_vec();
        body.truncate(body.len().saturating_sub(self.shortfall));
        let total = buffer.len() as u64;
        Ok(ByteStream {
            total_length: Some(total),
            stream: Box::pin(stream::iter(
                body.chunks(4)
                    .map(|c| Ok(Bytes::copy_from_slice(c)))
                    .collect::<Vec<_>>(),
            )),
        })
    }
}

/// Muxer that concatenates the two partials.
struct ConcatMuxer;

#[async_trait]
impl Muxer for ConcatMuxer {
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> MagpieResult<()> {
        let mut body = std::fs::read(video).unwrap();
        body.extend(std::fs::read(audio).unwrap());
        std::fs::write(output, body).unwrap();
        Ok(())
    }
}

/// Muxer that always fails.
struct BrokenMuxer;

#[async_trait]
impl Muxer for BrokenMuxer {
    async fn mux(&self, _: &Path, _: &Path, _: &Path) -> MagpieResult<()> {
        Err(DownloadError::new(DownloadErrorKind::Merge {
            tool: "ffmpeg".to_string(),
            exit_code: Some(1),
            stderr_tail: "Invalid data found".to_string(),
        })
        .into())
    }
}

fn config() -> DownloadConfig {
    DownloadConfig {
        default_quality: 64,
        concurrent_limit: 1,
        retry_times: 1,
        chunk_size: 64,
        max_size_gb: 0.0,
        max_duration_on_download: 0,
        ffmpeg_path: "ffmpeg".to_string(),
        ffprobe_path: "ffprobe".to_string(),
    }
}

fn downloader(
    dir: &TempDir,
    remote: Arc<StreamRemote>,
    muxer: Arc<dyn Muxer>,
) -> Downloader {
    Downloader::new(remote, muxer, dir.path().to_path_buf(), config())
}

#[tokio::test]
async fn test_fresh_download_muxes_and_cleans_partials() {
    let dir = TempDir::new().unwrap();
    let remote = Arc::new(StreamRemote::new(b"VIDEO-BYTES", b"AUDIO"));
    let dl = downloader(&dir, remote.clone(), Arc::new(ConcatMuxer));
    let id = ItemId::new("BV1a").unwrap();

    let outcome = dl.download(&id, 0, &CancelToken::new()).await.unwrap();
    assert_eq!(
        outcome,
        DownloadOutcome {
            ext: "mp4".to_string(),
            quality: 64,
            downgraded: false,
        }
    );

    let media = std::fs::read(dir.path().join("BV1a.mp4")).unwrap();
    assert_eq!(media, b"VIDEO-BYTESAUDIO");
    assert!(!dir.path().join("BV1a.video.part").exists());
    assert!(!dir.path().join("BV1a.audio.part").exists());

    // Both transfers started from offset zero.
    let offsets = remote.offsets.lock().unwrap().clone();
    assert_eq!(offsets, vec![("video".to_string(), 0), ("audio".to_string(), 0)]);
}

#[tokio::test]
async fn test_resume_continues_from_partial_size() {
    let dir = TempDir::new().unwrap();
    let remote = Arc::new(StreamRemote::new(b"0123456789", b"AUDIO"));
    let dl = downloader(&dir, remote.clone(), Arc::new(ConcatMuxer));
    let id = ItemId::new("BV1a").unwrap();

    // 40% of the video stream survived a previous run.
    std::fs::write(dir.path().join("BV1a.video.part"), b"0123").unwrap();

    dl.download(&id, 0, &CancelToken::new()).await.unwrap();

    let offsets = remote.offsets.lock().unwrap().clone();
    assert!(offsets.contains(&("video".to_string(), 4)));
    // The muxed result matches what a fresh run would produce.
    let media = std::fs::read(dir.path().join("BV1a.mp4")).unwrap();
    assert_eq!(media, b"0123456789AUDIO");
}

#[tokio::test]
async fn test_length_mismatch_deletes_partial_and_fails() {
    let dir = TempDir::new().unwrap();
    let mut remote = StreamRemote::new(b"0123456789", b"AUDIO");
    remote.shortfall = 3;
    let dl = downloader(&dir, Arc::new(remote), Arc::new(ConcatMuxer));
    let id = ItemId::new("BV1a").unwrap();

    let err = dl.download(&id, 0, &CancelToken::new()).await.unwrap_err();
    assert!(err.to_string().contains("Length mismatch"));
    // The deleted partial is not left behind for the next run to resume
    // from a poisoned offset.
    assert!(!dir.path().join("BV1a.video.part").exists());
}

#[tokio::test]
async fn test_mux_failure_retains_partials() {
    let dir = TempDir::new().unwrap();
    let remote = Arc::new(StreamRemote::new(b"VIDEO", b"AUDIO"));
    let dl = downloader(&dir, remote, Arc::new(BrokenMuxer));
    let id = ItemId::new("BV1a").unwrap();

    let err = dl.download(&id, 0, &CancelToken::new()).await.unwrap_err();
    assert!(err.to_string().contains("ffmpeg"));
    assert!(dir.path().join("BV1a.video.part").exists());
    assert!(dir.path().join("BV1a.audio.part").exists());
}

#[tokio::test]
async fn test_quality_downgrade_is_reported() {
    let dir = TempDir::new().unwrap();
    let mut remote = StreamRemote::new(b"V", b"A");
    // Nothing at or below the requested code; the remote granted the
    // lowest available, which is above it.
    remote.granted_quality = 80;
    let dl = downloader(&dir, Arc::new(remote), Arc::new(ConcatMuxer));
    let id = ItemId::new("BV1a").unwrap();

    let outcome = dl.download(&id, 0, &CancelToken::new()).await.unwrap();
    assert!(outcome.downgraded);
    assert_eq!(outcome.quality, 80);
}
