//! Wire DTOs for the remote web API.
//!
//! Every field is optional or defaulted; normalization decides what is
//! required, not deserialization.

use serde::Deserialize;

/// The JSON envelope wrapping every API response.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    /// Service-level status; 0 is success
    #[serde(default)]
    pub code: i64,
    /// Human-readable status message
    #[serde(default)]
    pub message: String,
    /// Payload, present on success
    pub data: Option<T>,
}

/// Payload of the signed-in-identity probe.
#[derive(Debug, Deserialize)]
pub struct NavData {
    #[serde(default, rename = "isLogin")]
    pub is_login: bool,
    #[serde(default)]
    pub mid: u64,
    #[serde(default)]
    pub uname: String,
}

/// Payload of a typed search call.
#[derive(Debug, Deserialize)]
pub struct SearchData {
    #[serde(default, rename = "numPages")]
    pub num_pages: u32,
    #[serde(default)]
    pub result: Vec<SearchHit>,
}

/// One search result row.
///
/// The search surface reports `duration` as a clock string (`"12:34"`) and
/// decorates the title with `<em>` highlight markup; both are normalized in
/// `convert`.
#[derive(Debug, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub bvid: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub pubdate: i64,
    #[serde(default)]
    pub mid: i64,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub play: i64,
    #[serde(default)]
    pub like: i64,
}

/// Payload of the per-item detail call.
#[derive(Debug, Deserialize)]
pub struct ViewData {
    #[serde(default)]
    pub bvid: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub duration: i64,
    #[serde(default)]
    pub pubdate: i64,
    #[serde(default)]
    pub pic: String,
    #[serde(default)]
    pub stat: ViewStat,
    #[serde(default)]
    pub owner: ViewOwner,
    #[serde(default)]
    pub pages: Vec<ViewPage>,
}

/// Counters in the detail payload.
#[derive(Debug, Default, Deserialize)]
pub struct ViewStat {
    #[serde(default)]
    pub view: i64,
    #[serde(default)]
    pub like: i64,
    #[serde(default)]
    pub coin: i64,
    #[serde(default)]
    pub favorite: i64,
    #[serde(default)]
    pub share: i64,
    #[serde(default)]
    pub reply: i64,
}

/// Uploader block in the detail payload.
#[derive(Debug, Default, Deserialize)]
pub struct ViewOwner {
    #[serde(default)]
    pub mid: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub face: String,
}

/// One segment in the detail payload.
#[derive(Debug, Deserialize)]
pub struct ViewPage {
    #[serde(default)]
    pub cid: u64,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub part: String,
    #[serde(default)]
    pub duration: i64,
}

/// One tag row from the tag listing call.
#[derive(Debug, Deserialize)]
pub struct TagRow {
    #[serde(default)]
    pub tag_name: String,
}

/// Payload of the stream resolution call.
#[derive(Debug, Deserialize)]
pub struct PlayData {
    #[serde(default)]
    pub quality: u32,
    #[serde(default)]
    pub accept_quality: Vec<u32>,
    pub dash: Option<DashStreams>,
}

/// Segmented stream listings.
#[derive(Debug, Deserialize)]
pub struct DashStreams {
    #[serde(default)]
    pub video: Vec<DashTrack>,
    #[serde(default)]
    pub audio: Vec<DashTrack>,
}

/// One stream variant.
#[derive(Debug, Deserialize)]
pub struct DashTrack {
    /// Quality code of the track
    #[serde(default)]
    pub id: u32,
    #[serde(default, rename = "baseUrl")]
    pub base_url: String,
    /// Advertised byte size, when present
    #[serde(default)]
    pub size: Option<u64>,
}
