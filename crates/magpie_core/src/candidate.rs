//! Search candidates.

use crate::ItemId;
use chrono::{DateTime, Utc};

/// An item discovered by search, not yet persisted.
///
/// Candidates live in memory only: they are either dropped (duplicate or
/// filter reject) or promoted into a metadata record by the collector.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Stable identifier of the item
    pub item_id: ItemId,
    /// Title as returned by the remote
    pub title: String,
    /// Duration in whole seconds
    pub duration_seconds: u64,
    /// When the item was published
    pub publish_time: DateTime<Utc>,
    /// Uploader identifier
    pub uploader_id: String,
    /// Uploader display name
    pub uploader_name: String,
    /// Play counter at search time
    pub play_count: u64,
    /// Like counter at search time
    pub like_count: u64,
    /// Coin counter, when the search surface reports it
    pub coin_count: Option<u64>,
    /// Favorite counter, when the search surface reports it
    pub favorite_count: Option<u64>,
    /// The keyword whose search produced this candidate
    pub keyword: String,
}
