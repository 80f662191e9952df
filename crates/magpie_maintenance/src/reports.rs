//! Maintenance reports.

use magpie_core::{IndexStats, ItemId};

/// Orphan analysis across the three artifact sets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchReport {
    /// Metadata file exists, no media file
    pub metadata_only: Vec<ItemId>,
    /// Media file exists, no metadata file
    pub media_only: Vec<ItemId>,
    /// Index entry exists, neither file does
    pub index_only: Vec<ItemId>,
    /// Both files exist, no index entry
    pub missing_from_index: Vec<ItemId>,
}

impl MatchReport {
    /// Whether the dataset is fully consistent.
    pub fn is_clean(&self) -> bool {
        self.metadata_only.is_empty()
            && self.media_only.is_empty()
            && self.index_only.is_empty()
            && self.missing_from_index.is_empty()
    }
}

/// One item planned for removal by the duration filter.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRemoval {
    /// The item to remove
    pub item_id: ItemId,
    /// Its determined duration in seconds
    pub duration_seconds: u64,
}

/// Result of a duration-filter pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterReport {
    /// Items over the limit, planned (and, unless dry-run, executed)
    pub planned: Vec<PlannedRemoval>,
    /// Items whose duration could not be determined; listed, never removed
    pub undetermined: Vec<ItemId>,
    /// How many items were actually removed (always 0 under dry-run)
    pub removed: usize,
    /// Whether this pass was inspection-only
    pub dry_run: bool,
}

/// Flags selecting what a clean pass targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanOptions {
    /// Delete media files that have no metadata file
    pub clean_media_orphans: bool,
    /// Delete metadata files that have no media file
    pub clean_metadata_orphans: bool,
    /// Drop index entries that have neither file
    pub update_index: bool,
    /// Report only, mutate nothing
    pub dry_run: bool,
}

/// Result of a clean pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanReport {
    /// Media-only orphans targeted
    pub media_removed: Vec<ItemId>,
    /// Metadata-only orphans targeted
    pub metadata_removed: Vec<ItemId>,
    /// Index-only orphans targeted
    pub index_removed: Vec<ItemId>,
    /// Whether this pass was inspection-only
    pub dry_run: bool,
}

/// Result of an index synchronization.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    /// Entries dropped because neither artifact exists
    pub removed: Vec<ItemId>,
    /// Complete pairs that gained an entry
    pub added: Vec<ItemId>,
    /// Statistics of the synchronized index
    pub stats: IndexStats,
    /// Whether this pass was inspection-only
    pub dry_run: bool,
}
