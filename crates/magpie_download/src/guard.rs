//! Disk-space guard.

use magpie_error::{DownloadError, DownloadErrorKind, MagpieResult};
use std::path::Path;
use sysinfo::Disks;

/// Chunks of headroom required before a download may start.
const HEADROOM_CHUNKS: u64 = 16;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Verify there is room for another download.
///
/// Requires `chunk_size * 16` bytes of free space on the media volume and,
/// when `max_size_gb` is positive, the same headroom under the cumulative
/// dataset size cap. Fails with `DiskFull`; the pipeline treats that as
/// non-fatal for metadata.
pub fn check_disk(
    media_dir: &Path,
    chunk_size: u64,
    max_size_gb: f64,
    dataset_bytes: u64,
) -> MagpieResult<()> {
    let needed = chunk_size.saturating_mul(HEADROOM_CHUNKS);

    if let Some(available) = available_space(media_dir) {
        if available < needed {
            return Err(
                DownloadError::new(DownloadErrorKind::DiskFull { needed, available }).into(),
            );
        }
    }

    if max_size_gb > 0.0 {
        let cap = (max_size_gb * GIB) as u64;
        let remaining = cap.saturating_sub(dataset_bytes);
        if remaining < needed {
            return Err(DownloadError::new(DownloadErrorKind::DiskFull {
                needed,
                available: remaining,
            })
            .into());
        }
    }
    Ok(())
}

/// Free bytes on the volume holding `path`, when determinable.
fn available_space(path: &Path) -> Option<u64> {
    let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .filter(|disk| path.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| disk.available_space())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_chunk_passes() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(check_disk(dir.path(), 1024, 0.0, 0).is_ok());
    }

    #[test]
    fn test_size_cap_trips_disk_full() {
        let dir = tempfile::TempDir::new().unwrap();
        // Cap of ~1 MiB already consumed by the dataset.
        let result = check_disk(dir.path(), 1024 * 1024, 0.001, 10 * 1024 * 1024);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_cap_is_uncapped() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(check_disk(dir.path(), 1024, 0.0, u64::MAX).is_ok());
    }
}
