//! Persisted per-item metadata records.

use crate::{ItemId, METADATA_SCHEMA_VERSION};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The persisted descriptive document for one item.
///
/// One record is written per `ItemId` under the metadata directory. Records
/// are overwritten on re-crawl of the same id and deleted only by
/// maintenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Identifiers, title, duration, publish time
    pub basic_info: BasicInfo,
    /// Counters at crawl time
    pub stats: StatsInfo,
    /// Uploader identifiers and display fields
    pub owner: OwnerInfo,
    /// Segments for multi-segment items
    #[serde(default)]
    pub pages: Vec<PageInfo>,
    /// Tag names attached to the item
    #[serde(default)]
    pub tags: Vec<String>,
    /// When and how the record was captured
    pub crawl_info: CrawlInfo,
}

impl MetadataRecord {
    /// Duration of the item in whole seconds.
    pub fn duration_seconds(&self) -> u64 {
        self.basic_info.duration_seconds
    }

    /// The item's primary key.
    pub fn item_id(&self) -> &ItemId {
        &self.basic_info.item_id
    }
}

/// Identity and descriptive fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicInfo {
    /// Stable identifier of the item
    pub item_id: ItemId,
    /// Item title
    pub title: String,
    /// Long-form description
    #[serde(default)]
    pub description: String,
    /// Duration in whole seconds
    pub duration_seconds: u64,
    /// When the item was published
    pub publish_time: DateTime<Utc>,
    /// Cover image URL
    #[serde(default)]
    pub cover_url: String,
}

/// Counters captured at crawl time. All values are clamped to be
/// non-negative during normalization.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatsInfo {
    /// Play counter
    #[serde(default)]
    pub play_count: u64,
    /// Like counter
    #[serde(default)]
    pub like_count: u64,
    /// Coin counter
    #[serde(default)]
    pub coin_count: u64,
    /// Favorite counter
    #[serde(default)]
    pub favorite_count: u64,
    /// Share counter
    #[serde(default)]
    pub share_count: u64,
    /// Comment counter
    #[serde(default)]
    pub comment_count: u64,
}

/// Uploader identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerInfo {
    /// Uploader identifier on the remote service
    pub uploader_id: String,
    /// Uploader display name
    #[serde(default)]
    pub uploader_name: String,
    /// Uploader avatar URL
    #[serde(default)]
    pub avatar_url: String,
}

/// One segment of a multi-segment item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    /// Internal segment identifier used by the stream endpoints
    pub internal_id: u64,
    /// One-based position of the segment
    pub page_number: u32,
    /// Segment title
    #[serde(default)]
    pub title: String,
    /// Segment duration in whole seconds
    pub duration_seconds: u64,
}

/// Provenance of the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlInfo {
    /// When the record was captured
    pub recorded_at: DateTime<Utc>,
    /// Schema version the record was written with
    pub schema_version: u32,
}

impl CrawlInfo {
    /// A crawl stamp for a record captured right now.
    pub fn now() -> Self {
        Self {
            recorded_at: Utc::now(),
            schema_version: METADATA_SCHEMA_VERSION,
        }
    }
}
