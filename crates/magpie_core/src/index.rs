//! The master index document.

use crate::{ItemId, MetadataRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The process-wide document enumerating the dataset.
///
/// The index is always written atomically (temp file + rename); a concurrent
/// reader sees either the old or the new complete document. Unknown
/// top-level fields of a loaded index are captured in `extra` and preserved
/// on rewrite; unknown fields inside entries are ignored on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    /// One entry per item in the dataset
    #[serde(default)]
    pub videos: BTreeMap<ItemId, IndexEntry>,
    /// Aggregate statistics, recomputed on every mutation
    pub stats: IndexStats,
    /// Unknown top-level fields preserved across rewrites
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl IndexDocument {
    /// An empty index with zeroed statistics.
    pub fn empty() -> Self {
        Self {
            videos: BTreeMap::new(),
            stats: IndexStats {
                total_count: 0,
                total_duration: 0,
                last_updated: Utc::now(),
            },
            extra: serde_json::Map::new(),
        }
    }

    /// Recompute `stats` from the entry map and stamp `last_updated`.
    ///
    /// Must be called before every persist so that
    /// `total_count == |videos|` and `total_duration == Σ duration` hold on
    /// disk.
    pub fn recompute_stats(&mut self) {
        self.stats.total_count = self.videos.len() as u64;
        self.stats.total_duration = self.videos.values().map(|e| e.duration).sum();
        self.stats.last_updated = Utc::now();
    }
}

impl Default for IndexDocument {
    fn default() -> Self {
        Self::empty()
    }
}

/// Aggregate dataset statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of entries in the index
    pub total_count: u64,
    /// Sum of entry durations in seconds
    pub total_duration: u64,
    /// When the index was last written
    pub last_updated: DateTime<Utc>,
}

/// Projection of a [`MetadataRecord`] retained in the index.
///
/// The identity fields are always present; the counters and tags are
/// included only when listed in the configured projection field set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Stable identifier of the item
    pub item_id: ItemId,
    /// Item title
    pub title: String,
    /// Duration in whole seconds
    pub duration: u64,
    /// When the item was published
    pub publish_time: DateTime<Utc>,
    /// Uploader display name
    pub uploader_name: String,
    /// Play counter, when projected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub play_count: Option<u64>,
    /// Like counter, when projected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub like_count: Option<u64>,
    /// Tag names, when projected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Extension of the attached media file, once one exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_ext: Option<String>,
}

impl IndexEntry {
    /// Project a metadata record into an index entry.
    ///
    /// `fields` selects the optional projections (`play_count`,
    /// `like_count`, `tags`). The media extension is not part of the
    /// projection; it is recorded separately when media is attached.
    pub fn project(record: &MetadataRecord, fields: &[String]) -> Self {
        let wants = |name: &str| fields.iter().any(|f| f == name);
        Self {
            item_id: record.basic_info.item_id.clone(),
            title: record.basic_info.title.clone(),
            duration: record.basic_info.duration_seconds,
            publish_time: record.basic_info.publish_time,
            uploader_name: record.owner.uploader_name.clone(),
            play_count: wants("play_count").then_some(record.stats.play_count),
            like_count: wants("like_count").then_some(record.stats.like_count),
            tags: wants("tags").then(|| record.tags.clone()),
            media_ext: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BasicInfo, CrawlInfo, OwnerInfo, StatsInfo};

    fn record(id: &str, duration: u64) -> MetadataRecord {
        MetadataRecord {
            basic_info: BasicInfo {
                item_id: ItemId::new(id).unwrap(),
                title: format!("video {id}"),
                description: String::new(),
                duration_seconds: duration,
                publish_time: Utc::now(),
                cover_url: String::new(),
            },
            stats: StatsInfo {
                play_count: 100,
                like_count: 10,
                ..Default::default()
            },
            owner: OwnerInfo {
                uploader_id: "42".to_string(),
                uploader_name: "uploader".to_string(),
                avatar_url: String::new(),
            },
            pages: Vec::new(),
            tags: vec!["music".to_string()],
            crawl_info: CrawlInfo::now(),
        }
    }

    #[test]
    fn test_recompute_stats_matches_entries() {
        let mut doc = IndexDocument::empty();
        let fields = vec!["play_count".to_string()];
        for (id, duration) in [("a1", 30), ("b2", 45)] {
            let r = record(id, duration);
            doc.videos.insert(
                r.basic_info.item_id.clone(),
                IndexEntry::project(&r, &fields),
            );
        }
        doc.recompute_stats();
        assert_eq!(doc.stats.total_count, 2);
        assert_eq!(doc.stats.total_duration, 75);
    }

    #[test]
    fn test_projection_respects_field_list() {
        let r = record("a1", 30);
        let entry = IndexEntry::project(&r, &["tags".to_string()]);
        assert_eq!(entry.play_count, None);
        assert_eq!(entry.like_count, None);
        assert_eq!(entry.tags.as_deref(), Some(&["music".to_string()][..]));
    }

    #[test]
    fn test_unknown_top_level_fields_survive_round_trip() {
        let raw = r#"{
            "videos": {},
            "stats": {"total_count": 0, "total_duration": 0, "last_updated": "2024-01-01T00:00:00Z"},
            "generator": "magpie 0.1"
        }"#;
        let doc: IndexDocument = serde_json::from_str(raw).unwrap();
        assert_eq!(
            doc.extra.get("generator").and_then(|v| v.as_str()),
            Some("magpie 0.1")
        );
        let rewritten = serde_json::to_string(&doc).unwrap();
        assert!(rewritten.contains("generator"));
    }
}
