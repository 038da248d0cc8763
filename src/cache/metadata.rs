//! Metadata Persistence
//!
//! Reads and writes the full entry table kept in `<cache_dir>/metadata.json`.
//! Every write replaces the file through a rename, so a crash mid-write
//! leaves the previous table intact.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::cache::{CacheEntry, StorageError};

pub const METADATA_FILE: &str = "metadata.json";

pub fn metadata_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(METADATA_FILE)
}

/// Loads persisted entries.
///
/// A missing file is a fresh cache and yields an empty list.
pub fn load(cache_dir: &Path) -> Result<Vec<CacheEntry>, StorageError> {
    let path = metadata_path(cache_dir);
    let data = match fs::read(&path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StorageError::io("read", path, e)),
    };

    Ok(serde_json::from_slice(&data)?)
}

/// Serializes `entries` and atomically replaces the metadata file.
pub async fn save(cache_dir: &Path, entries: &[&CacheEntry]) -> Result<(), StorageError> {
    let data = serde_json::to_vec_pretty(entries)?;

    let path = metadata_path(cache_dir);
    let tmp_path = cache_dir.join(format!("{}.tmp", METADATA_FILE));

    write_synced(&tmp_path, &data).await?;

    if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(StorageError::io("rename", path, e));
    }

    Ok(())
}

/// Writes `data` and flushes it to stable storage before returning.
async fn write_synced(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| StorageError::io("create", path, e))?;
    file.write_all(data)
        .await
        .map_err(|e| StorageError::io("write", path, e))?;
    file.sync_all()
        .await
        .map_err(|e| StorageError::io("sync", path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let entries = load(dir.path()).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_load_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(metadata_path(dir.path()), b"{not json").unwrap();

        assert!(matches!(load(dir.path()), Err(StorageError::Metadata(_))));
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let a = CacheEntry::new("b/a.txt", "aaa_a.txt", 3);
        let b = CacheEntry::new("b/b.txt", "bbb_b.txt", 5);

        save(dir.path(), &[&a, &b]).await.unwrap();
        let loaded = load(dir.path()).unwrap();

        assert_eq!(loaded, vec![a, b]);
        assert!(!dir.path().join("metadata.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_save_replaces_previous_table() {
        let dir = tempfile::tempdir().unwrap();
        let a = CacheEntry::new("b/a.txt", "aaa_a.txt", 3);
        let b = CacheEntry::new("b/b.txt", "bbb_b.txt", 5);

        save(dir.path(), &[&a, &b]).await.unwrap();
        save(dir.path(), &[&b]).await.unwrap();

        assert_eq!(load(dir.path()).unwrap(), vec![b]);
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_table() {
        let dir = tempfile::tempdir().unwrap();
        let a = CacheEntry::new("b/a.txt", "aaa_a.txt", 3);
        let b = CacheEntry::new("b/b.txt", "bbb_b.txt", 5);
        save(dir.path(), &[&a]).await.unwrap();

        // the temp path is occupied, so the new table never reaches disk
        fs::create_dir(dir.path().join("metadata.json.tmp")).unwrap();
        let err = save(dir.path(), &[&a, &b]).await.unwrap_err();

        assert!(matches!(err, StorageError::Io { op: "create", .. }));
        assert_eq!(load(dir.path()).unwrap(), vec![a]);
    }

    #[tokio::test]
    async fn test_save_truncates_leftover_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("metadata.json.tmp"), vec![b'x'; 4096]).unwrap();
        let a = CacheEntry::new("b/a.txt", "aaa_a.txt", 3);

        save(dir.path(), &[&a]).await.unwrap();

        assert_eq!(load(dir.path()).unwrap(), vec![a]);
    }
}
