//! Durable atomic file writes.

use magpie_error::{DatasetError, DatasetErrorKind, JsonError, MagpieResult};
use serde::Serialize;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Write a pretty-printed JSON document atomically.
///
/// Serializes into a temp file in the same directory, fsyncs it, renames it
/// over the canonical path, and fsyncs the directory. A concurrent reader
/// sees either the old or the new complete document, never a partial one.
pub async fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> MagpieResult<()> {
    let body = serde_json::to_vec_pretty(value)
        .map_err(|e| JsonError::new(format!("{}: {}", path.display(), e)))?;
    atomic_write_bytes(path, &body).await
}

async fn atomic_write_bytes(path: &Path, body: &[u8]) -> MagpieResult<()> {
    let temp_path = path.with_extension("tmp");
    let write = async {
        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(body).await?;
        file.sync_all().await?;
        Ok::<_, std::io::Error>(())
    };
    write.await.map_err(|e| {
        DatasetError::new(DatasetErrorKind::FileWrite(format!(
            "{}: {}",
            temp_path.display(),
            e
        )))
    })?;

    tokio::fs::rename(&temp_path, path).await.map_err(|e| {
        DatasetError::new(DatasetErrorKind::FileWrite(format!(
            "rename {} to {}: {}",
            temp_path.display(),
            path.display(),
            e
        )))
    })?;

    #[cfg(unix)]
    if let Some(parent) = path.parent() {
        let parent = parent.to_path_buf();
        tokio::task::spawn_blocking(move || std::fs::File::open(&parent)?.sync_all())
            .await
            .map_err(|e| {
                DatasetError::new(DatasetErrorKind::FileWrite(format!("dir fsync join: {}", e)))
            })?
            .map_err(|e| {
                DatasetError::new(DatasetErrorKind::FileWrite(format!("dir fsync: {}", e)))
            })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_replaces_whole_document() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("doc.json");
        atomic_write_json(&path, &serde_json::json!({"v": 1}))
            .await
            .unwrap();
        atomic_write_json(&path, &serde_json::json!({"v": 2}))
            .await
            .unwrap();
        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["v"], 2);
        // No temp file left behind.
        assert!(!dir.path().join("doc.tmp").exists());
    }
}
