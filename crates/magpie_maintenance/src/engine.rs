//! The maintenance engine.

use crate::reports::{
    CleanOptions, CleanReport, FilterReport, MatchReport, PlannedRemoval, SyncReport,
};
use magpie_core::ItemId;
use magpie_dataset::DatasetStore;
use magpie_error::MagpieResult;
use magpie_interface::MediaProber;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Offline maintenance over the dataset store.
///
/// The engine never runs the network stages; its only collaborators are
/// the store and, for the duration filter, the external media probe.
pub struct MaintenanceEngine {
    store: Arc<DatasetStore>,
    prober: Option<Arc<dyn MediaProber>>,
}

impl MaintenanceEngine {
    /// Wire an engine. The prober is optional; without one, items lacking
    /// a metadata duration are reported as undetermined.
    pub fn new(store: Arc<DatasetStore>, prober: Option<Arc<dyn MediaProber>>) -> Self {
        Self { store, prober }
    }

    /// Compute the four orphan categories.
    #[instrument(skip(self))]
    pub async fn analyze(&self) -> MagpieResult<MatchReport> {
        let metadata: BTreeSet<ItemId> = self.store.list_metadata_ids().await?.into_iter().collect();
        let media: BTreeMap<ItemId, String> = self.store.list_media().await?.into_iter().collect();
        let index: BTreeSet<ItemId> = self
            .store
            .snapshot_index()
            .await
            .videos
            .into_keys()
            .collect();

        let mut report = MatchReport::default();
        for id in &metadata {
            if !media.contains_key(id) {
                report.metadata_only.push(id.clone());
            }
        }
        for id in media.keys() {
            if !metadata.contains(id) {
                report.media_only.push(id.clone());
            }
        }
        for id in &index {
            if !metadata.contains(id) && !media.contains_key(id) {
                report.index_only.push(id.clone());
            }
        }
        for id in &metadata {
            if media.contains_key(id) && !index.contains(id) {
                report.missing_from_index.push(id.clone());
            }
        }
        info!(
            metadata_only = report.metadata_only.len(),
            media_only = report.media_only.len(),
            index_only = report.index_only.len(),
            missing_from_index = report.missing_from_index.len(),
            "Orphan analysis complete"
        );
        Ok(report)
    }

    /// Plan (and, unless `dry_run`, execute) removal of every item whose
    /// duration exceeds `max_seconds`.
    ///
    /// Duration source preference: the metadata record's duration field,
    /// then the external media probe over the media file. Items whose
    /// duration cannot be determined are listed but never removed.
    #[instrument(skip(self))]
    pub async fn filter_by_duration(
        &self,
        max_seconds: u64,
        dry_run: bool,
    ) -> MagpieResult<FilterReport> {
        let mut report = FilterReport {
            dry_run,
            ..Default::default()
        };

        for item_id in self.store.list_metadata_ids().await? {
            let duration = self.determine_duration(&item_id).await?;
            match duration {
                Some(seconds) if seconds > max_seconds => {
                    report.planned.push(PlannedRemoval {
                        item_id,
                        duration_seconds: seconds,
                    });
                }
                Some(_) => {}
                None => {
                    warn!(item_id = %item_id, "Duration undetermined, keeping item");
                    report.undetermined.push(item_id);
                }
            }
        }

        if !dry_run && !report.planned.is_empty() {
            let ids: Vec<ItemId> = report.planned.iter().map(|p| p.item_id.clone()).collect();
            let removal = self.store.remove(&ids).await?;
            report.removed = removal.removed.len();
        }
        info!(
            planned = report.planned.len(),
            removed = report.removed,
            dry_run,
            "Duration filter complete"
        );
        Ok(report)
    }

    /// Remove the orphan categories selected by `options`.
    ///
    /// Each flag targets exactly one category; `update_index` drops
    /// index-only entries in the same pass.
    #[instrument(skip(self))]
    pub async fn clean(&self, options: CleanOptions) -> MagpieResult<CleanReport> {
        let analysis = self.analyze().await?;
        let mut report = CleanReport {
            dry_run: options.dry_run,
            ..Default::default()
        };

        if options.clean_media_orphans {
            report.media_removed = analysis.media_only.clone();
        }
        if options.clean_metadata_orphans {
            report.metadata_removed = analysis.metadata_only.clone();
        }
        if options.update_index {
            report.index_removed = analysis.index_only.clone();
        }
        if options.dry_run {
            return Ok(report);
        }

        for item_id in &report.media_removed {
            if let Some((path, _)) = self.store.find_media_file(item_id).await {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    warn!(path = %path.display(), error = %e, "Failed to remove media orphan");
                }
            }
        }
        for item_id in &report.metadata_removed {
            let path = self.store.metadata_path(item_id);
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %e, "Failed to remove metadata orphan");
            }
        }
        if !report.index_removed.is_empty() {
            let mut index = self.store.snapshot_index().await;
            for item_id in &report.index_removed {
                index.videos.remove(item_id);
            }
            self.store.replace_index(index).await?;
        }
        info!(
            media = report.media_removed.len(),
            metadata = report.metadata_removed.len(),
            index = report.index_removed.len(),
            "Clean complete"
        );
        Ok(report)
    }

    /// Reconcile the index with the artifacts on disk.
    ///
    /// Drops entries whose id has neither artifact, adds entries for
    /// complete pairs that lack one (derived from the metadata file), and
    /// recomputes the statistics. Idempotent: a second run with no
    /// intervening change mutates nothing.
    #[instrument(skip(self))]
    pub async fn sync_index(&self, dry_run: bool) -> MagpieResult<SyncReport> {
        let metadata: BTreeSet<ItemId> = self.store.list_metadata_ids().await?.into_iter().collect();
        let media: BTreeMap<ItemId, String> = self.store.list_media().await?.into_iter().collect();
        let mut index = self.store.snapshot_index().await;

        let removed: Vec<ItemId> = index
            .videos
            .keys()
            .filter(|id| !metadata.contains(*id) && !media.contains_key(*id))
            .cloned()
            .collect();
        for id in &removed {
            index.videos.remove(id);
        }

        let mut added = Vec::new();
        for (id, ext) in &media {
            if !metadata.contains(id) || index.videos.contains_key(id) {
                continue;
            }
            let Some(record) = self.store.get(id).await? else {
                continue;
            };
            let mut entry = self.store.project_entry(&record);
            entry.media_ext = Some(ext.clone());
            index.videos.insert(id.clone(), entry);
            added.push(id.clone());
        }

        index.recompute_stats();
        let stats = index.stats.clone();
        if !dry_run && !(removed.is_empty() && added.is_empty()) {
            self.store.replace_index(index).await?;
        }
        info!(
            removed = removed.len(),
            added = added.len(),
            dry_run,
            "Index synchronized"
        );
        Ok(SyncReport {
            removed,
            added,
            stats,
            dry_run,
        })
    }

    /// Best available duration for an item, in whole seconds.
    async fn determine_duration(&self, item_id: &ItemId) -> MagpieResult<Option<u64>> {
        if let Some(record) = self.store.get(item_id).await? {
            if record.duration_seconds() > 0 {
                return Ok(Some(record.duration_seconds()));
            }
        }
        let Some(prober) = &self.prober else {
            return Ok(None);
        };
        let Some((path, _)) = self.store.find_media_file(item_id).await else {
            return Ok(None);
        };
        Ok(prober
            .duration_seconds(&path)
            .await?
            .map(|secs| secs.round() as u64))
    }
}

impl std::fmt::Debug for MaintenanceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaintenanceEngine")
            .field("prober", &self.prober.is_some())
            .finish_non_exhaustive()
    }
}
