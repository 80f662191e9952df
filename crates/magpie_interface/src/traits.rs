//! Trait definitions for the remote service and external tools.

use crate::{ByteStream, Credential, RemoteIdentity, SearchPage, StreamSources};
use async_trait::async_trait;
use magpie_core::{ItemId, MetadataRecord};
use magpie_error::MagpieResult;
use std::path::Path;

/// The remote video service, as seen by the pipeline.
///
/// All methods route through the rate-limited transport; every call is a
/// suspension point. Implementations classify failures into the transport
/// error kinds so retry and aggregation behave uniformly.
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Issue a lightweight authenticated probe.
    ///
    /// Returns the account identity when the credential is recognized,
    /// `None` when the remote reports the session as expired.
    async fn verify_session(&self, credential: &Credential) -> MagpieResult<Option<RemoteIdentity>>;

    /// Fetch one page of keyword search results.
    ///
    /// `page` is one-based. The returned candidates carry `keyword` already
    /// filled in.
    async fn search_page(
        &self,
        keyword: &str,
        page: u32,
        page_size: u32,
    ) -> MagpieResult<SearchPage>;

    /// Fetch the normalized detail record for one item.
    async fn video_detail(&self, item_id: &ItemId) -> MagpieResult<MetadataRecord>;

    /// Resolve the stream pair for an item.
    ///
    /// Grants the highest quality at or below `quality`; when nothing at or
    /// below exists, grants the lowest available. Fails with
    /// `QualityUnavailable` only when the item has no streams at all.
    async fn stream_sources(&self, item_id: &ItemId, quality: u32) -> MagpieResult<StreamSources>;

    /// Open a ranged byte stream starting at `offset`.
    async fn fetch_range(&self, url: &str, offset: u64) -> MagpieResult<ByteStream>;
}

/// Out-of-band credential acquisition.
///
/// Interactive login (scanning a prompt, pasting a cookie string) is a
/// delegated capability; the session manager only drives the retry loop.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Acquire a fresh credential.
    async fn acquire(&self) -> MagpieResult<Credential>;
}

/// The external muxer.
#[async_trait]
pub trait Muxer: Send + Sync {
    /// Mux a downloaded video stream with its audio stream into `output`,
    /// copying codecs.
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> MagpieResult<()>;
}

/// The external media probe used when a metadata record lacks a duration.
#[async_trait]
pub trait MediaProber: Send + Sync {
    /// Duration of the media file in seconds, or `None` when the probe
    /// cannot determine one.
    async fn duration_seconds(&self, media: &Path) -> MagpieResult<Option<f64>>;
}
