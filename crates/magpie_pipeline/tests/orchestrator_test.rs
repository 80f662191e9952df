//! End-to-end tests for the acquisition pipeline, against an in-memory
//! remote.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures_util::stream;
use magpie_core::{
    BasicInfo, CancelToken, Candidate, CrawlInfo, CrawlerConfig, DownloadConfig, ItemId,
    MetadataRecord, NetworkConfig, OwnerInfo, PipelineConfig, QualityWeights, SearchConfig,
    StatsInfo, StorageConfig,
};
use magpie_dataset::DatasetStore;
use magpie_error::{MagpieResult, TransportError, TransportErrorKind};
use magpie_interface::{
    ByteStream, Credential, Muxer, RemoteIdentity, RemoteService, SearchPage, StreamSource,
    StreamSources,
};
use magpie_pipeline::Orchestrator;
use magpie_session::{CredentialStore, SessionManager, StaticCredentialSource};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const VIDEO_BODY: &[u8] = b"VIDEO-PAYLOAD";
const AUDIO_BODY: &[u8] = b"AUD";

#[derive(Clone)]
struct FakeItem {
    id: String,
    duration: u64,
    /// Detail calls answer NotFound
    vanished: bool,
    /// Detail calls answer a remote error code
    broken: bool,
}

impl FakeItem {
    fn new(id: &str, duration: u64) -> Self {
        Self {
            id: id.to_string(),
            duration,
            vanished: false,
            broken: false,
        }
    }
}

struct FakeRemote {
    keywords: BTreeMap<String, Vec<FakeItem>>,
    detail_calls: Mutex<Vec<String>>,
}

impl FakeRemote {
    fn new(keywords: &[(&str, Vec<FakeItem>)]) -> Arc<Self> {
        Arc::new(Self {
            keywords: keywords
                .iter()
                .map(|(k, items)| (k.to_string(), items.clone()))
                .collect(),
            detail_calls: Mutex::new(Vec::new()),
        })
    }

    fn item(&self, item_id: &ItemId) -> Option<FakeItem> {
        self.keywords
            .values()
            .flatten()
            .find(|i| i.id == item_id.as_str())
            .cloned()
    }

    fn detail_calls_for(&self, id: &str) -> usize {
        self.detail_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == id)
            .count()
    }
}

#[async_trait]
impl RemoteService for FakeRemote {
    async fn verify_session(&self, _: &Credential) -> MagpieResult<Option<RemoteIdentity>> {
        Ok(Some(RemoteIdentity {
            uid: "7".to_string(),
            name: "tester".to_string(),
        }))
    }

    async fn search_page(
        &self,
        keyword: &str,
        page: u32,
        _page_size: u32,
    ) -> MagpieResult<SearchPage> {
        let items = self.keywords.get(keyword).cloned().unwrap_or_default();
        if page > 1 {
            return Ok(SearchPage {
                items: Vec::new(),
                has_more: false,
            });
        }
        Ok(SearchPage {
            items: items
                .iter()
                .map(|i| Candidate {
                    item_id: ItemId::new(i.id.clone()).unwrap(),
                    title: format!("video {}", i.id),
                    duration_seconds: i.duration,
                    publish_time: Utc::now(),
                    uploader_id: "42".to_string(),
                    uploader_name: "uploader".to_string(),
                    play_count: 100,
                    like_count: 10,
                    coin_count: None,
                    favorite_count: None,
                    keyword: keyword.to_string(),
                })
                .collect(),
            has_more: false,
        })
    }

    async fn video_detail(&self, item_id: &ItemId) -> MagpieResult<MetadataRecord> {
        self.detail_calls
            .lock()
            .unwrap()
            .push(item_id.as_str().to_string());
        let Some(item) = self.item(item_id) else {
            return Err(TransportError::new(TransportErrorKind::NotFound).into());
        };
        if item.vanished {
            return Err(TransportError::new(TransportErrorKind::NotFound).into());
        }
        if item.broken {
            return Err(TransportError::new(TransportErrorKind::Remote {
                code: -500,
                message: "backend unhappy".to_string(),
            })
            .into());
        }
        Ok(MetadataRecord {
            basic_info: BasicInfo {
                item_id: item_id.clone(),
                title: format!("video {}", item.id),
                description: String::new(),
                duration_seconds: item.duration,
                publish_time: Utc::now(),
                cover_url: String::new(),
            },
            stats: StatsInfo::default(),
            owner: OwnerInfo {
                uploader_id: "42".to_string(),
                uploader_name: "uploader".to_string(),
                avatar_url: String::new(),
            },
            pages: Vec::new(),
            tags: Vec::new(),
            crawl_info: CrawlInfo::now(),
        })
    }

    async fn stream_sources(&self, item_id: &ItemId, quality: u32) -> MagpieResult<StreamSources> {
        Ok(StreamSources {
            quality,
            video: StreamSource {
                url: format!("video/{item_id}"),
                byte_length: Some(VIDEO_BODY.len() as u64),
            },
            audio: StreamSource {
                url: format!("audio/{item_id}"),
                byte_length: Some(AUDIO_BODY.len() as u64),
            },
        })
    }

    async fn fetch_range(&self, url: &str, offset: u64) -> MagpieResult<ByteStream> {
        let body = if url.starts_with("video/") {
            VIDEO_BODY
        } else {
            AUDIO_BODY
        };
        let rest = body[offset as usize..].to_vec();
        Ok(ByteStream {
            total_length: Some(body.len() as u64),
            stream: Box::pin(stream::iter(vec![Ok(Bytes::from(rest))])),
        })
    }
}

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

fn config(root: &Path) -> CrawlerConfig {
    CrawlerConfig {
        network: NetworkConfig {
            request_interval: 0.001,
            random_offset: 0.0,
            max_retries: 1,
            retry_base_interval: 0.001,
            timeout: 5.0,
            user_agents: vec!["test-agent".to_string()],
            ua_rotate_interval: None,
            ua_rotate_requests: None,
            probe_urls: Vec::new(),
        },
        search: SearchConfig {
            page_size: 20,
            max_pages: 2,
            page_interval: [0.0, 0.0],
            min_view_count: 0,
            min_pubdate: None,
            max_pubdate: None,
            keyword_filters: Vec::new(),
            keyword_excludes: Vec::new(),
            min_duration: 0,
            max_duration: 0,
            quality_threshold: 0.0,
            quality_weights: QualityWeights {
                like: 1.0,
                coin: 2.0,
                favorite: 3.0,
            },
        },
        download: DownloadConfig {
            default_quality: 64,
            concurrent_limit: 2,
            retry_times: 1,
            chunk_size: 64,
            max_size_gb: 0.0,
            max_duration_on_download: 0,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        },
        storage: StorageConfig {
            metadata_dir: root.join("metadata"),
            media_dir: root.join("media"),
            index_file: root.join("metadata").join("index.json"),
            credential_file: root.join("credential.json"),
            update_index_on_save: true,
            index_fields: vec!["play_count".to_string()],
        },
        pipeline: PipelineConfig {
            metadata_workers: 2,
            resume: true,
            max_items: 0,
        },
    }
}

fn credential() -> Credential {
    let mut cookies = BTreeMap::new();
    cookies.insert("SESSDATA".to_string(), "token".to_string());
    Credential::from_cookies(cookies)
}

async fn orchestrator(
    remote: Arc<FakeRemote>,
    config: CrawlerConfig,
) -> (Orchestrator, Arc<DatasetStore>) {
    let store = Arc::new(DatasetStore::open(&config.storage).await.unwrap());
    let session = Arc::new(SessionManager::new(
        remote.clone(),
        Arc::new(StaticCredentialSource::new(credential())),
        CredentialStore::new(config.storage.credential_file.clone()),
        config.network.max_retries,
        config.network.retry_base_interval,
    ));
    let orchestrator = Orchestrator::new(
        remote,
        store.clone(),
        session,
        Arc::new(ConcatMuxer),
        None,
        config,
        CancelToken::new(),
    );
    (orchestrator, store)
}

#[tokio::test]
async fn test_fresh_run_commits_both_items() {
    let dir = TempDir::new().unwrap();
    let remote = FakeRemote::new(&[(
        "foo",
        vec![FakeItem::new("BVa", 30), FakeItem::new("BVb", 40)],
    )]);
    let (orchestrator, store) = orchestrator(remote, config(dir.path())).await;

    let report = orchestrator.run(vec!["foo".to_string()]).await.unwrap();

    assert_eq!(report.keywords_processed, 1);
    assert_eq!(report.candidates_seen, 2);
    assert_eq!(report.metadata_committed, 2);
    assert_eq!(report.downloads_committed, 2);
    assert!(report.errors_by_kind.is_empty());
    assert!(report.stages_halted.is_empty());

    let index = store.snapshot_index().await;
    assert_eq!(index.stats.total_count, 2);
    assert_eq!(index.stats.total_duration, 70);
    for id in ["BVa", "BVb"] {
        let id = ItemId::new(id).unwrap();
        assert!(store.get(&id).await.unwrap().is_some());
        assert!(store.has_media(&id).await);
        assert_eq!(
            index.videos.get(&id).unwrap().media_ext.as_deref(),
            Some("mp4")
        );
    }
    // The muxed file holds both streams.
    let media = std::fs::read(dir.path().join("media").join("BVa.mp4")).unwrap();
    assert_eq!(media.len(), VIDEO_BODY.len() + AUDIO_BODY.len());
}

#[tokio::test]
async fn test_pre_download_duration_filter() {
    let dir = TempDir::new().unwrap();
    let remote = FakeRemote::new(&[(
        "foo",
        vec![FakeItem::new("BVshort", 20), FakeItem::new("BVlong", 45)],
    )]);
    let mut cfg = config(dir.path());
    cfg.download.max_duration_on_download = 30;
    let (orchestrator, store) = orchestrator(remote, cfg).await;

    let report = orchestrator.run(vec!["foo".to_string()]).await.unwrap();

    assert_eq!(report.metadata_committed, 2);
    assert_eq!(report.downloads_committed, 1);
    assert_eq!(report.downloads_skipped_by_duration, 1);

    let index = store.snapshot_index().await;
    assert_eq!(index.videos.len(), 2);
    let short = ItemId::new("BVshort").unwrap();
    let long = ItemId::new("BVlong").unwrap();
    assert!(store.has_media(&short).await);
    assert!(!store.has_media(&long).await);
    assert_eq!(
        index.videos.get(&short).unwrap().media_ext.as_deref(),
        Some("mp4")
    );
    assert_eq!(index.videos.get(&long).unwrap().media_ext, None);
    // Both metadata files exist regardless of the skip.
    assert!(store.get(&long).await.unwrap().is_some());
}

#[tokio::test]
async fn test_resume_skips_complete_pairs() {
    let dir = TempDir::new().unwrap();
    let remote = FakeRemote::new(&[(
        "foo",
        vec![FakeItem::new("BVdone", 30), FakeItem::new("BVnew", 40)],
    )]);
    let cfg = config(dir.path());
    let (orchestrator, store) = orchestrator(remote.clone(), cfg).await;

    // BVdone already has a complete pair from a previous run.
    let done = remote
        .video_detail(&ItemId::new("BVdone").unwrap())
        .await
        .unwrap();
    store.put_metadata(&done).await.unwrap();
    std::fs::write(store.media_path(done.item_id(), "mp4"), b"old-media").unwrap();
    store.attach_media(done.item_id(), "mp4").await.unwrap();
    let seeding_calls = remote.detail_calls_for("BVdone");

    let report = orchestrator.run(vec!["foo".to_string()]).await.unwrap();

    // Metadata was not re-fetched for the finished item.
    assert_eq!(remote.detail_calls_for("BVdone"), seeding_calls);
    assert_eq!(report.skipped_existing, 1);
    assert_eq!(report.metadata_committed, 1);
    assert_eq!(report.downloads_committed, 1);
    // The old media file was not rewritten.
    assert_eq!(
        std::fs::read(store.media_path(done.item_id(), "mp4")).unwrap(),
        b"old-media"
    );
}

#[tokio::test]
async fn test_vanished_item_is_skipped_not_fatal() {
    let dir = TempDir::new().unwrap();
    let mut gone = FakeItem::new("BVgone", 30);
    gone.vanished = true;
    let remote = FakeRemote::new(&[("foo", vec![gone, FakeItem::new("BVok", 40)])]);
    let (orchestrator, store) = orchestrator(remote, config(dir.path())).await;

    let report = orchestrator.run(vec!["foo".to_string()]).await.unwrap();

    assert_eq!(report.metadata_committed, 1);
    assert_eq!(report.downloads_committed, 1);
    assert_eq!(report.errors_by_kind.get("NotFound"), Some(&1));
    assert!(report.stages_halted.is_empty());
    assert!(store.has_media(&ItemId::new("BVok").unwrap()).await);
}

#[tokio::test]
async fn test_persistent_remote_errors_trip_metadata_breaker() {
    let dir = TempDir::new().unwrap();
    let items: Vec<FakeItem> = (0..40)
        .map(|i| {
            let mut item = FakeItem::new(&format!("BVbad{i}"), 30);
            item.broken = true;
            item
        })
        .collect();
    let remote = FakeRemote::new(&[("foo", items)]);
    let (orchestrator, _store) = orchestrator(remote, config(dir.path())).await;

    let report = orchestrator.run(vec!["foo".to_string()]).await.unwrap();

    assert_eq!(report.metadata_committed, 0);
    assert!(report.stages_halted.contains(&"metadata".to_string()));
    assert!(report.errors_by_kind.get("RemoteError").copied().unwrap_or(0) >= 20);
}
