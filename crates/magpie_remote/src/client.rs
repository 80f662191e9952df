//! The reqwest-backed remote adapter.

use crate::convert;
use crate::wire::{Envelope, NavData, PlayData, SearchData, TagRow, ViewData};
use async_trait::async_trait;
use magpie_core::{ItemId, MetadataRecord};
use magpie_error::{
    DownloadError, DownloadErrorKind, FailureKind, MagpieResult, TransportError,
    TransportErrorKind,
};
use magpie_interface::{
    ByteStream, Credential, RemoteIdentity, RemoteService, SearchPage, StreamSource, StreamSources,
};
use magpie_transport::Transport;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Endpoint set of the remote web API.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// Base of the API host
    pub api_base: String,
    /// Referer installed on every request
    pub referer: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api_base: "https://api.bilibili.com".to_string(),
            referer: "https://www.bilibili.com".to_string(),
        }
    }
}

impl Endpoints {
    fn nav(&self) -> String {
        format!("{}/x/web-interface/nav", self.api_base)
    }

    fn search(&self) -> String {
        format!("{}/x/web-interface/search/type", self.api_base)
    }

    fn view(&self) -> String {
        format!("{}/x/web-interface/view", self.api_base)
    }

    fn tags(&self) -> String {
        format!("{}/x/tag/archive/tags", self.api_base)
    }

    fn play(&self) -> String {
        format!("{}/x/player/playurl", self.api_base)
    }
}

/// Remote adapter over the rate-limited transport.
///
/// One instance serves every pipeline stage; the transport underneath is
/// the shared chokepoint, so concurrent callers still honor the
/// process-wide request gate.
pub struct BiliClient {
    transport: Arc<Transport>,
    endpoints: Endpoints,
}

impl BiliClient {
    /// Create an adapter against the default endpoints.
    pub fn new(transport: Arc<Transport>) -> Self {
        Self::with_endpoints(transport, Endpoints::default())
    }

    /// Create an adapter against explicit endpoints.
    pub fn with_endpoints(transport: Arc<Transport>, endpoints: Endpoints) -> Self {
        transport.set_referer(Some(endpoints.referer.clone()));
        Self {
            transport,
            endpoints,
        }
    }

    /// Call an enveloped endpoint, folding service-level codes into
    /// transport kinds and unwrapping the payload.
    async fn call<D: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> MagpieResult<D> {
        let envelope: Envelope<D> = self
            .transport
            .get_json_checked(url, params, |e: &Envelope<D>| {
                check_envelope(e.code, &e.message)
            })
            .await?;
        envelope.data.ok_or_else(|| {
            TransportError::new(TransportErrorKind::Decode(
                "envelope carried no data".to_string(),
            ))
            .into()
        })
    }
}

/// Fold a service-level envelope code into a transport kind.
fn check_envelope(code: i64, message: &str) -> Result<(), TransportErrorKind> {
    match code {
        0 => Ok(()),
        -101 => Err(TransportErrorKind::AuthExpired),
        -412 | -799 => Err(TransportErrorKind::RateLimited { retry_after: None }),
        -404 | 62002 | 62004 => Err(TransportErrorKind::NotFound),
        _ => Err(TransportErrorKind::Remote {
            code,
            message: message.to_string(),
        }),
    }
}

#[async_trait]
impl RemoteService for BiliClient {
    #[instrument(skip(self, credential))]
    async fn verify_session(&self, credential: &Credential) -> MagpieResult<Option<RemoteIdentity>> {
        self.transport
            .set_session_cookies(Some(credential.cookie_header()));
        let nav: MagpieResult<NavData> = self.call(&self.endpoints.nav(), &[]).await;
        match nav {
            Ok(data) if data.is_login => Ok(Some(RemoteIdentity {
                uid: data.mid.to_string(),
                name: data.uname,
            })),
            Ok(_) => Ok(None),
            Err(e) if e.failure_kind() == FailureKind::AuthExpired => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self), fields(keyword = %keyword, page = page))]
    async fn search_page(
        &self,
        keyword: &str,
        page: u32,
        page_size: u32,
    ) -> MagpieResult<SearchPage> {
        let params = [
            ("search_type", "video".to_string()),
            ("keyword", keyword.to_string()),
            ("page", page.to_string()),
            ("page_size", page_size.to_string()),
            ("order", "totalrank".to_string()),
        ];
        let data: SearchData = self.call(&self.endpoints.search(), &params).await?;
        let items: Vec<_> = data
            .result
            .iter()
            .filter_map(|hit| {
                let candidate = convert::candidate_from_hit(hit, keyword);
                if candidate.is_none() {
                    debug!(title = %hit.title, "Dropping search row without usable id");
                }
                candidate
            })
            .collect();
        Ok(SearchPage {
            items,
            has_more: page < data.num_pages,
        })
    }

    #[instrument(skip(self), fields(item_id = %item_id))]
    async fn video_detail(&self, item_id: &ItemId) -> MagpieResult<MetadataRecord> {
        let params = [("bvid", item_id.as_str().to_string())];
        let view: ViewData = self.call(&self.endpoints.view(), &params).await?;

        // Tags come from a second call; a failure there degrades to an
        // untagged record rather than failing the item.
        let tags = match self
            .call::<Vec<TagRow>>(&self.endpoints.tags(), &params)
            .await
        {
            Ok(rows) => rows
                .into_iter()
                .map(|r| r.tag_name.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            Err(e) => {
                warn!(item_id = %item_id, error = %e, "Tag fetch failed, continuing untagged");
                Vec::new()
            }
        };

        convert::record_from_view(&view, tags).ok_or_else(|| {
            TransportError::new(TransportErrorKind::Decode(
                "detail payload carried no usable id".to_string(),
            ))
            .into()
        })
    }

    #[instrument(skip(self), fields(item_id = %item_id, quality = quality))]
    async fn stream_sources(&self, item_id: &ItemId, quality: u32) -> MagpieResult<StreamSources> {
        // The stream endpoint is keyed by the first segment's internal id.
        let view_params = [("bvid", item_id.as_str().to_string())];
        let view: ViewData = self.call(&self.endpoints.view(), &view_params).await?;
        let cid = view
            .pages
            .first()
            .map(|p| p.cid)
            .ok_or_else(|| {
                DownloadError::new(DownloadErrorKind::QualityUnavailable { requested: quality })
            })?;

        let params = [
            ("bvid", item_id.as_str().to_string()),
            ("cid", cid.to_string()),
            ("qn", quality.to_string()),
            ("fnval", "16".to_string()),
        ];
        let play: PlayData = self.call(&self.endpoints.play(), &params).await?;
        let dash = play.dash.ok_or_else(|| {
            DownloadError::new(DownloadErrorKind::QualityUnavailable { requested: quality })
        })?;

        // Highest variant at or below the requested code, else the lowest
        // present.
        let video = dash
            .video
            .iter()
            .filter(|t| t.id <= quality)
            .max_by_key(|t| t.id)
            .or_else(|| dash.video.iter().min_by_key(|t| t.id))
            .ok_or_else(|| {
                DownloadError::new(DownloadErrorKind::QualityUnavailable { requested: quality })
            })?;
        let audio = dash.audio.iter().max_by_key(|t| t.id).ok_or_else(|| {
            DownloadError::new(DownloadErrorKind::QualityUnavailable { requested: quality })
        })?;

        Ok(StreamSources {
            quality: video.id,
            video: StreamSource {
                url: video.base_url.clone(),
                byte_length: video.size,
            },
            audio: StreamSource {
                url: audio.base_url.clone(),
                byte_length: audio.size,
            },
        })
    }

    async fn fetch_range(&self, url: &str, offset: u64) -> MagpieResult<ByteStream> {
        self.transport.fetch_range(url, offset).await
    }
}

impl std::fmt::Debug for BiliClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BiliClient")
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}
