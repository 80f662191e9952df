//! Per-item metadata collection for the magpie crawler.
//!
//! The collector turns an `ItemId` into a committed metadata record: fetch
//! the detail document through the remote capability, normalize and
//! validate it, and delegate persistence to the dataset store. Collection
//! is idempotent - re-collecting an id overwrites its file and updates its
//! index entry in a single logical commit.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use magpie_core::{ItemId, MetadataRecord};
use magpie_dataset::{DatasetStore, PutOutcome};
use magpie_error::{MagpieResult, MetadataError, MetadataErrorKind};
use magpie_interface::RemoteService;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Fetches, validates, and commits metadata records.
pub struct Collector {
    remote: Arc<dyn RemoteService>,
    store: Arc<DatasetStore>,
}

impl Collector {
    /// Wire a collector from its collaborators.
    pub fn new(remote: Arc<dyn RemoteService>, store: Arc<DatasetStore>) -> Self {
        Self { remote, store }
    }

    /// Collect one item: detail fetch, normalize, validate, commit.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn collect(&self, item_id: &ItemId) -> MagpieResult<(MetadataRecord, PutOutcome)> {
        let mut record = self.remote.video_detail(item_id).await?;
        normalize(&mut record);
        validate(item_id, &record)?;
        let outcome = self.store.put_metadata(&record).await?;
        debug!(?outcome, "Metadata committed");
        Ok((record, outcome))
    }
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector").finish_non_exhaustive()
    }
}

/// Trim string fields in place.
///
/// The adapter already trims what it maps, but records are also composed by
/// fakes and future adapters; the collector is the guarantee point.
fn normalize(record: &mut MetadataRecord) {
    for field in [
        &mut record.basic_info.title,
        &mut record.basic_info.description,
        &mut record.basic_info.cover_url,
        &mut record.owner.uploader_id,
        &mut record.owner.uploader_name,
    ] {
        let trimmed = field.trim();
        if trimmed.len() != field.len() {
            *field = trimmed.to_string();
        }
    }
    record.tags.retain(|t| !t.trim().is_empty());
}

/// Reject records missing the required fields.
fn validate(requested: &ItemId, record: &MetadataRecord) -> MagpieResult<()> {
    if record.item_id() != requested {
        return Err(MetadataError::new(MetadataErrorKind::InvalidField {
            field: "item_id".to_string(),
            reason: format!(
                "detail payload is for '{}', requested '{}'",
                record.item_id(),
                requested
            ),
        })
        .into());
    }
    if record.basic_info.title.is_empty() {
        return Err(MetadataError::new(MetadataErrorKind::MissingField("title".to_string())).into());
    }
    if record.basic_info.duration_seconds == 0 {
        return Err(MetadataError::new(MetadataErrorKind::InvalidField {
            field: "duration".to_string(),
            reason: "must be positive".to_string(),
        })
        .into());
    }
    if record.owner.uploader_id.is_empty() {
        return Err(
            MetadataError::new(MetadataErrorKind::MissingField("owner.uploader_id".to_string()))
                .into(),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use magpie_core::{BasicInfo, CrawlInfo, OwnerInfo, StatsInfo};

    fn record(id: &str) -> MetadataRecord {
        MetadataRecord {
            basic_info: BasicInfo {
                item_id: ItemId::new(id).unwrap(),
                title: "  a title  ".to_string(),
                description: "desc".to_string(),
                duration_seconds: 120,
                publish_time: Utc::now(),
                cover_url: String::new(),
            },
            stats: StatsInfo::default(),
            owner: OwnerInfo {
                uploader_id: "42".to_string(),
                uploader_name: "name".to_string(),
                avatar_url: String::new(),
            },
            pages: Vec::new(),
            tags: vec!["ok".to_string(), "  ".to_string()],
            crawl_info: CrawlInfo::now(),
        }
    }

    #[test]
    fn test_normalize_trims_and_prunes() {
        let mut r = record("BV1a");
        normalize(&mut r);
        assert_eq!(r.basic_info.title, "a title");
        assert_eq!(r.tags, vec!["ok".to_string()]);
    }

    #[test]
    fn test_validate_accepts_complete_record() {
        let mut r = record("BV1a");
        normalize(&mut r);
        assert!(validate(&ItemId::new("BV1a").unwrap(), &r).is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_requireds() {
        let id = ItemId::new("BV1a").unwrap();

        let mut r = record("BV1a");
        r.basic_info.title = String::new();
        assert!(validate(&id, &r).is_err());

        let mut r = record("BV1a");
        r.basic_info.duration_seconds = 0;
        assert!(validate(&id, &r).is_err());

        let mut r = record("BV1a");
        r.owner.uploader_id = String::new();
        assert!(validate(&id, &r).is_err());

        let r = record("BV9z");
        assert!(validate(&id, &r).is_err());
    }
}
