//! The dataset store.

use crate::atomic::atomic_write_json;
use magpie_core::{IndexDocument, IndexEntry, IndexStats, ItemId, MetadataRecord, StorageConfig};
use magpie_error::{DatasetError, DatasetErrorKind, JsonError, MagpieResult};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// Whether `put_metadata` created a new record or overwrote one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// First record for this item
    Created,
    /// Existing record overwritten
    Updated,
}

/// Result of a batch removal.
///
/// Missing artifacts are reported, not treated as failures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemovalReport {
    /// Items whose artifacts were removed (at least one artifact existed)
    pub removed: Vec<ItemId>,
    /// Items that had no metadata file
    pub missing_metadata: Vec<ItemId>,
    /// Items that had no media file
    pub missing_media: Vec<ItemId>,
    /// Items that had no index entry
    pub missing_index: Vec<ItemId>,
}

/// Owner of the on-disk layout and the three-way invariant between
/// metadata files, media files, and the index document.
///
/// All operations that mutate the index take the single writer lock;
/// readers proceed concurrently with each other but not with writers.
pub struct DatasetStore {
    metadata_dir: PathBuf,
    media_dir: PathBuf,
    index_path: PathBuf,
    update_index_on_save: bool,
    index_fields: Vec<String>,
    index: RwLock<IndexDocument>,
}

impl DatasetStore {
    /// Open (and create, if needed) the dataset at the configured layout.
    ///
    /// An existing index document is loaded; a missing one starts empty. A
    /// corrupt index is quarantined by starting empty - `sync_index` can
    /// rebuild it from the artifacts.
    #[instrument(skip(config))]
    pub async fn open(config: &StorageConfig) -> MagpieResult<Self> {
        for dir in [&config.metadata_dir, &config.media_dir] {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                DatasetError::new(DatasetErrorKind::DirectoryCreation(format!(
                    "{}: {}",
                    dir.display(),
                    e
                )))
            })?;
        }
        if let Some(parent) = config.index_file.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                DatasetError::new(DatasetErrorKind::DirectoryCreation(format!(
                    "{}: {}",
                    parent.display(),
                    e
                )))
            })?;
        }

        let index = match tokio::fs::read(&config.index_file).await {
            Ok(raw) => match serde_json::from_slice::<IndexDocument>(&raw) {
                Ok(doc) => {
                    info!(
                        entries = doc.videos.len(),
                        path = %config.index_file.display(),
                        "Loaded index"
                    );
                    doc
                }
                Err(e) => {
                    warn!(error = %e, "Index document is corrupt, starting empty");
                    IndexDocument::empty()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => IndexDocument::empty(),
            Err(e) => {
                return Err(DatasetError::new(DatasetErrorKind::FileRead(format!(
                    "{}: {}",
                    config.index_file.display(),
                    e
                )))
                .into());
            }
        };

        Ok(Self {
            metadata_dir: config.metadata_dir.clone(),
            media_dir: config.media_dir.clone(),
            index_path: config.index_file.clone(),
            update_index_on_save: config.update_index_on_save,
            index_fields: config.index_fields.clone(),
            index: RwLock::new(index),
        })
    }

    /// The media directory, for collaborators that stage files into it.
    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    /// Project a record into an index entry using the configured field set.
    pub fn project_entry(&self, record: &MetadataRecord) -> IndexEntry {
        IndexEntry::project(record, &self.index_fields)
    }

    /// Path of the metadata file for an item.
    pub fn metadata_path(&self, item_id: &ItemId) -> PathBuf {
        self.metadata_dir.join(format!("{}.json", item_id))
    }

    /// Path of the media file for an item with the given extension.
    pub fn media_path(&self, item_id: &ItemId, ext: &str) -> PathBuf {
        self.media_dir.join(format!("{}.{}", item_id, ext))
    }

    /// Commit a metadata record.
    ///
    /// Writes the metadata file atomically, then (when
    /// `update_index_on_save` is set) updates the item's index entry and
    /// persists the index in the same logical commit. A prior media
    /// attachment on the entry survives the overwrite.
    #[instrument(skip(self, record), fields(item_id = %record.item_id()))]
    pub async fn put_metadata(&self, record: &MetadataRecord) -> MagpieResult<PutOutcome> {
        let path = self.metadata_path(record.item_id());
        let existed = tokio::fs::try_exists(&path).await.unwrap_or(false);
        atomic_write_json(&path, record).await?;
        debug!(existed, "Wrote metadata file");

        if self.update_index_on_save {
            self.commit_entry(record).await?;
        }

        Ok(if existed {
            PutOutcome::Updated
        } else {
            PutOutcome::Created
        })
    }

    /// Record the existence of `<media_dir>/<ItemID>.<ext>` in the index.
    ///
    /// # Errors
    ///
    /// `MetadataMissing` when the item has no metadata file; `CommitFailed`
    /// when the index cannot be persisted (in-memory state rolls back).
    #[instrument(skip(self), fields(item_id = %item_id, ext = ext))]
    pub async fn attach_media(&self, item_id: &ItemId, ext: &str) -> MagpieResult<()> {
        let record = self.get(item_id).await?.ok_or_else(|| {
            DatasetError::new(DatasetErrorKind::MetadataMissing(item_id.to_string()))
        })?;

        let mut index = self.index.write().await;
        let prior = index.videos.get(item_id).cloned();
        let mut entry = match prior.clone() {
            Some(entry) => entry,
            None => IndexEntry::project(&record, &self.index_fields),
        };
        entry.media_ext = Some(ext.to_string());
        index.videos.insert(item_id.clone(), entry);
        index.recompute_stats();

        if let Err(e) = atomic_write_json(&self.index_path, &*index).await {
            rollback(&mut index, item_id, prior);
            return Err(DatasetError::new(DatasetErrorKind::CommitFailed(e.to_string())).into());
        }
        Ok(())
    }

    /// Load the metadata record for an item, if present.
    pub async fn get(&self, item_id: &ItemId) -> MagpieResult<Option<MetadataRecord>> {
        let path = self.metadata_path(item_id);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(DatasetError::new(DatasetErrorKind::FileRead(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
                .into());
            }
        };
        let record = serde_json::from_slice(&raw)
            .map_err(|e| JsonError::new(format!("{}: {}", path.display(), e)))?;
        Ok(Some(record))
    }

    /// Whether a media file exists for the item.
    pub async fn has_media(&self, item_id: &ItemId) -> bool {
        self.find_media_file(item_id).await.is_some()
    }

    /// Locate the media file for an item by stem, returning its path and
    /// extension. Partial and temp files are not media.
    pub async fn find_media_file(&self, item_id: &ItemId) -> Option<(PathBuf, String)> {
        let mut entries = tokio::fs::read_dir(&self.media_dir).await.ok()?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
                continue;
            };
            if stem == item_id.as_str() && ext != "part" && ext != "tmp" {
                return Some((path.clone(), ext.to_string()));
            }
        }
        None
    }

    /// Remove metadata file, media file, and index entry for each id.
    ///
    /// Per item the ordering is media file, then metadata file, then index
    /// entry; the index is persisted once at the end of the batch. A crash
    /// mid-batch leaves index-only orphans that the next `sync_index`
    /// removes.
    #[instrument(skip(self, item_ids), fields(count = item_ids.len()))]
    pub async fn remove(&self, item_ids: &[ItemId]) -> MagpieResult<RemovalReport> {
        let mut report = RemovalReport::default();
        let mut index = self.index.write().await;
        let snapshot = index.clone();

        for item_id in item_ids {
            let mut any = false;

            match self.find_media_file(item_id).await {
                Some((path, _)) => {
                    remove_file(&path).await?;
                    any = true;
                }
                None => report.missing_media.push(item_id.clone()),
            }

            let metadata_path = self.metadata_path(item_id);
            match tokio::fs::remove_file(&metadata_path).await {
                Ok(()) => any = true,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    report.missing_metadata.push(item_id.clone());
                }
                Err(e) => {
                    return Err(DatasetError::new(DatasetErrorKind::FileWrite(format!(
                        "remove {}: {}",
                        metadata_path.display(),
                        e
                    )))
                    .into());
                }
            }

            if index.videos.remove(item_id).is_some() {
                any = true;
            } else {
                report.missing_index.push(item_id.clone());
            }

            if any {
                report.removed.push(item_id.clone());
            }
        }

        index.recompute_stats();
        if let Err(e) = atomic_write_json(&self.index_path, &*index).await {
            *index = snapshot;
            return Err(DatasetError::new(DatasetErrorKind::CommitFailed(e.to_string())).into());
        }
        info!(removed = report.removed.len(), "Removal committed");
        Ok(report)
    }

    /// A point-in-time copy of the index document.
    pub async fn snapshot_index(&self) -> IndexDocument {
        self.index.read().await.clone()
    }

    /// Read the index document back from disk, bypassing the in-memory
    /// copy. A missing file yields an empty document.
    pub async fn load_index(&self) -> MagpieResult<IndexDocument> {
        let raw = match tokio::fs::read(&self.index_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(IndexDocument::empty());
            }
            Err(e) => {
                return Err(DatasetError::new(DatasetErrorKind::FileRead(format!(
                    "{}: {}",
                    self.index_path.display(),
                    e
                )))
                .into());
            }
        };
        let document = serde_json::from_slice(&raw)
            .map_err(|e| JsonError::new(format!("{}: {}", self.index_path.display(), e)))?;
        Ok(document)
    }

    /// Current aggregate statistics.
    pub async fn stats(&self) -> IndexStats {
        self.index.read().await.stats.clone()
    }

    /// Replace the whole index document, persisting atomically.
    ///
    /// Used by maintenance reconciliation. Rolls back in memory when the
    /// persist fails.
    pub async fn replace_index(&self, mut document: IndexDocument) -> MagpieResult<()> {
        document.recompute_stats();
        let mut index = self.index.write().await;
        let snapshot = index.clone();
        *index = document;
        if let Err(e) = atomic_write_json(&self.index_path, &*index).await {
            *index = snapshot;
            return Err(DatasetError::new(DatasetErrorKind::CommitFailed(e.to_string())).into());
        }
        Ok(())
    }

    /// Item ids that have a metadata file on disk.
    pub async fn list_metadata_ids(&self) -> MagpieResult<Vec<ItemId>> {
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.metadata_dir).await.map_err(|e| {
            DatasetError::new(DatasetErrorKind::FileRead(format!(
                "{}: {}",
                self.metadata_dir.display(),
                e
            )))
        })?;
        while let Some(entry) = entries.next_entry().await.map_err(map_scan_error)? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") || path == self.index_path
            {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match ItemId::new(stem) {
                Ok(id) => ids.push(id),
                Err(_) => debug!(path = %path.display(), "Skipping non-item file"),
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Item ids that have a media file on disk, with their extensions.
    pub async fn list_media(&self) -> MagpieResult<Vec<(ItemId, String)>> {
        let mut found = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.media_dir).await.map_err(|e| {
            DatasetError::new(DatasetErrorKind::FileRead(format!(
                "{}: {}",
                self.media_dir.display(),
                e
            )))
        })?;
        while let Some(entry) = entries.next_entry().await.map_err(map_scan_error)? {
            let path = entry.path();
            let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
                continue;
            };
            if ext == "part" || ext == "tmp" {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Ok(id) = ItemId::new(stem) {
                found.push((id, ext.to_string()));
            }
        }
        found.sort();
        Ok(found)
    }

    /// Total bytes of media currently on disk, including partial files.
    pub async fn dataset_size_bytes(&self) -> u64 {
        let mut total = 0;
        let Ok(mut entries) = tokio::fs::read_dir(&self.media_dir).await else {
            return 0;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            if let Ok(meta) = entry.metadata().await {
                if meta.is_file() {
                    total += meta.len();
                }
            }
        }
        total
    }

    /// Commit one entry update under the writer lock.
    async fn commit_entry(&self, record: &MetadataRecord) -> MagpieResult<()> {
        let item_id = record.item_id();
        let mut index = self.index.write().await;
        let prior = index.videos.get(item_id).cloned();

        let mut entry = IndexEntry::project(record, &self.index_fields);
        entry.media_ext = prior.as_ref().and_then(|p| p.media_ext.clone());
        index.videos.insert(item_id.clone(), entry);
        index.recompute_stats();

        if let Err(e) = atomic_write_json(&self.index_path, &*index).await {
            rollback(&mut index, item_id, prior);
            return Err(DatasetError::new(DatasetErrorKind::CommitFailed(e.to_string())).into());
        }
        Ok(())
    }
}

impl std::fmt::Debug for DatasetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetStore")
            .field("metadata_dir", &self.metadata_dir)
            .field("media_dir", &self.media_dir)
            .field("index_path", &self.index_path)
            .finish_non_exhaustive()
    }
}

/// Undo an entry mutation and restore consistent stats.
fn rollback(index: &mut IndexDocument, item_id: &ItemId, prior: Option<IndexEntry>) {
    match prior {
        Some(entry) => index.videos.insert(item_id.clone(), entry),
        None => index.videos.remove(item_id),
    };
    index.recompute_stats();
}

async fn remove_file(path: &Path) -> MagpieResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DatasetError::new(DatasetErrorKind::FileWrite(format!(
            "remove {}: {}",
            path.display(),
            e
        )))
        .into()),
    }
}

fn map_scan_error(e: std::io::Error) -> DatasetError {
    DatasetError::new(DatasetErrorKind::FileRead(format!("directory scan: {}", e)))
}
