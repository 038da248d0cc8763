//! Cache Store Module
//!
//! Disk-backed LRU cache: object bytes live under `files/`, an in-memory
//! index tracks entries and recency, and the entry table is persisted to
//! `metadata.json` after every write.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::stats::Counters;
use crate::cache::{metadata, naming, CacheEntry, CacheStats, LruTracker, StorageError};

/// Subdirectory of the cache root holding object files.
pub const FILES_DIR: &str = "files";

/// Name prefix of staging files; never produced by [`naming::local_name`].
const STAGING_PREFIX: &str = ".incoming-";

const COPY_BUF_SIZE: usize = 64 * 1024;

// == Cache Index ==
/// In-memory state guarded by the store's lock.
#[derive(Debug, Default)]
struct CacheIndex {
    entries: HashMap<String, CacheEntry>,
    lru: LruTracker,
    current_size: u64,
    counters: Counters,
}

impl CacheIndex {
    /// Rebuilds the index from persisted entries, keeping only those whose
    /// file still exists and refreshing their size from disk.
    fn recover(files_dir: &Path, persisted: Vec<CacheEntry>) -> Self {
        let total = persisted.len();
        let mut survivors: HashMap<String, CacheEntry> = HashMap::with_capacity(total);

        for mut entry in persisted {
            if !is_plain_file_name(&entry.local_name) {
                warn!(key = %entry.key, filename = %entry.local_name, "Ignoring entry with invalid file name");
                continue;
            }

            let path = files_dir.join(&entry.local_name);
            match fs::metadata(&path) {
                Ok(meta) if meta.is_file() => entry.size = meta.len(),
                _ => {
                    debug!(key = %entry.key, "Cached file missing, dropping entry");
                    continue;
                }
            }

            if let Some(existing) = survivors.get(&entry.key) {
                if existing.last_access >= entry.last_access {
                    continue;
                }
            }
            survivors.insert(entry.key.clone(), entry);
        }

        // Most recent first, ties broken by key so startup order is reproducible
        let mut ordered: Vec<CacheEntry> = survivors.into_values().collect();
        ordered.sort_by(|a, b| {
            b.last_access
                .cmp(&a.last_access)
                .then_with(|| a.key.cmp(&b.key))
        });

        // one owner per file: the most recently used key keeps it
        let mut claimed: HashSet<String> = HashSet::with_capacity(ordered.len());
        ordered.retain(|entry| {
            let first = claimed.insert(entry.local_name.clone());
            if !first {
                debug!(key = %entry.key, filename = %entry.local_name, "File claimed by a newer entry, dropping");
            }
            first
        });

        let mut index = Self::default();
        for entry in ordered.into_iter().rev() {
            index.insert(entry);
        }

        if index.entries.len() < total {
            info!(
                kept = index.entries.len(),
                dropped = total - index.entries.len(),
                "Dropped stale cache entries during recovery"
            );
        }

        index
    }

    fn insert(&mut self, entry: CacheEntry) {
        self.current_size += entry.size;
        self.lru.touch(&entry.key);
        self.entries.insert(entry.key.clone(), entry);
    }

    /// Drops a key from the bookkeeping without touching its file.
    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        self.lru.remove(key);
        let entry = self.entries.remove(key)?;
        self.current_size -= entry.size;
        Some(entry)
    }

    /// Entries in most-recently-used order.
    fn ordered_entries(&self) -> Vec<&CacheEntry> {
        self.lru
            .most_recent_first()
            .filter_map(|key| self.entries.get(key))
            .collect()
    }
}

// == Staged Object ==
/// An incoming object fully written to a temporary file in `files/`.
///
/// Dropping it without [`DiskCache::commit`] deletes the temporary file.
#[derive(Debug)]
pub struct StagedObject {
    file: NamedTempFile,
    size: u64,
}

impl StagedObject {
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

// == Disk Cache ==
/// Disk-backed LRU cache with crash-safe persistence.
///
/// A single readers-writer lock guards the index. Byte copies happen in
/// [`DiskCache::stage`] without the lock; the lock only covers bookkeeping,
/// eviction, the final rename and the metadata write.
#[derive(Debug)]
pub struct DiskCache {
    cache_dir: PathBuf,
    files_dir: PathBuf,
    max_bytes: u64,
    index: RwLock<CacheIndex>,
}

impl DiskCache {
    // == Constructor ==
    /// Opens the cache rooted at `cache_dir`, recovering state left by a
    /// previous run.
    ///
    /// Unreadable or malformed metadata is logged and the cache starts empty;
    /// only failing to create the directories is an error.
    pub fn open(cache_dir: impl Into<PathBuf>, max_bytes: u64) -> Result<Self, StorageError> {
        let cache_dir = cache_dir.into();
        let files_dir = cache_dir.join(FILES_DIR);
        fs::create_dir_all(&files_dir)
            .map_err(|e| StorageError::io("create directory", &files_dir, e))?;

        remove_staging_files(&files_dir);

        let persisted = match metadata::load(&cache_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Failed to load cache metadata, starting with an empty cache");
                Vec::new()
            }
        };

        let index = CacheIndex::recover(&files_dir, persisted);
        info!(
            cache_dir = %cache_dir.display(),
            entries = index.entries.len(),
            bytes = index.current_size,
            max_bytes,
            "Disk cache opened"
        );

        Ok(Self {
            cache_dir,
            files_dir,
            max_bytes,
            index: RwLock::new(index),
        })
    }

    // == Get ==
    /// Returns the file path for `key`, recording a hit or a miss.
    ///
    /// An entry whose file disappeared from disk is dropped and counts as a miss.
    pub async fn get(&self, key: &str) -> Option<PathBuf> {
        self.lookup(key, true).await
    }

    // == Peek ==
    /// Like [`DiskCache::get`] but leaves the hit/miss counters alone.
    pub async fn peek(&self, key: &str) -> Option<PathBuf> {
        self.lookup(key, false).await
    }

    async fn lookup(&self, key: &str, record: bool) -> Option<PathBuf> {
        let mut index = self.index.write().await;

        let Some(local_name) = index.entries.get(key).map(|e| e.local_name.clone()) else {
            if record {
                index.counters.record_miss();
            }
            return None;
        };

        let path = self.files_dir.join(local_name);
        if let Err(e) = tokio::fs::metadata(&path).await {
            if e.kind() == ErrorKind::NotFound {
                warn!(key, "Cached file deleted externally, dropping entry");
                index.remove(key);
                if record {
                    index.counters.record_miss();
                }
                return None;
            }
        }

        if let Some(entry) = index.entries.get_mut(key) {
            entry.touch();
        }
        index.lru.touch(key);
        if record {
            index.counters.record_hit();
        }

        Some(path)
    }

    // == Put ==
    /// Stores the full contents of `reader` under `key`, replacing any
    /// previous entry, and returns the final file path.
    pub async fn put<R>(&self, key: &str, reader: R) -> Result<PathBuf, StorageError>
    where
        R: AsyncRead + Unpin,
    {
        let staged = self.stage(reader).await?;
        self.commit(key, staged).await
    }

    // == Stage ==
    /// Copies `reader` into a new temporary file in `files/`.
    ///
    /// Runs without the index lock. Read errors from `reader` surface as
    /// [`StorageError::Stream`], write errors as [`StorageError::Io`].
    pub async fn stage<R>(&self, mut reader: R) -> Result<StagedObject, StorageError>
    where
        R: AsyncRead + Unpin,
    {
        let tmp = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(".tmp")
            .tempfile_in(&self.files_dir)
            .map_err(|e| StorageError::io("create temp file in", &self.files_dir, e))?;

        let handle = tmp
            .as_file()
            .try_clone()
            .map_err(|e| StorageError::io("open", tmp.path(), e))?;
        let mut file = tokio::fs::File::from_std(handle);

        let mut buf = vec![0u8; COPY_BUF_SIZE];
        let mut size: u64 = 0;
        loop {
            let n = reader.read(&mut buf).await.map_err(StorageError::Stream)?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n])
                .await
                .map_err(|e| StorageError::io("write", tmp.path(), e))?;
            size += n as u64;
        }

        file.flush()
            .await
            .map_err(|e| StorageError::io("flush", tmp.path(), e))?;
        file.sync_all()
            .await
            .map_err(|e| StorageError::io("sync", tmp.path(), e))?;

        debug!(path = %tmp.path().display(), size, "Staged incoming object");
        Ok(StagedObject { file: tmp, size })
    }

    // == Commit ==
    /// Installs a staged object as the entry for `key`.
    ///
    /// Under the write lock: drops the previous entry for `key`, evicts
    /// least-recently-used entries until the object fits, renames the staged
    /// file into place, indexes it as most recently used and persists the
    /// entry table. An object larger than the capacity empties the cache and
    /// is stored anyway.
    pub async fn commit(&self, key: &str, staged: StagedObject) -> Result<PathBuf, StorageError> {
        let local_name = naming::local_name(key);
        let final_path = self.files_dir.join(&local_name);
        let size = staged.size;

        let mut index = self.index.write().await;

        // the rename below overwrites the replaced file in place
        let replaced = index.remove(key);

        self.evict_for(&mut index, size);

        let persisted = staged.file.persist(&final_path);

        // entries recovered from older metadata may live under another name
        if let Some(old) = replaced.as_ref().filter(|e| e.local_name != local_name) {
            let old_path = self.files_dir.join(&old.local_name);
            if let Err(e) = fs::remove_file(&old_path) {
                if e.kind() != ErrorKind::NotFound {
                    warn!(path = %old_path.display(), error = %e, "Failed to delete replaced file");
                }
            }
        }

        if let Err(e) = persisted {
            if replaced.is_some() {
                let _ = fs::remove_file(&final_path);
            }
            return Err(StorageError::io("rename into", final_path, e.error));
        }

        index.insert(CacheEntry::new(key, local_name, size));
        if index.current_size > self.max_bytes {
            warn!(key, size, max_bytes = self.max_bytes, "Object exceeds cache capacity");
        }

        let entries = index.ordered_entries();
        if let Err(e) = metadata::save(&self.cache_dir, &entries).await {
            warn!(error = %e, "Failed to persist cache metadata");
        }

        debug!(key, size, replaced = replaced.is_some(), "Stored object in cache");
        Ok(final_path)
    }

    /// Evicts least-recently-used entries until `incoming` bytes fit or the
    /// cache is empty.
    fn evict_for(&self, index: &mut CacheIndex, incoming: u64) {
        while index.current_size + incoming > self.max_bytes {
            let Some(key) = index.lru.evict_oldest() else {
                break;
            };
            let Some(entry) = index.remove(&key) else {
                continue;
            };

            let path = self.files_dir.join(&entry.local_name);
            if let Err(e) = fs::remove_file(&path) {
                if e.kind() != ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Failed to delete evicted file");
                }
            }
            index.counters.record_eviction();
            info!(key = %entry.key, size = entry.size, "Evicted cache entry");
        }
    }

    // == Stats ==
    /// Returns a snapshot of counters and occupancy.
    pub async fn stats(&self) -> CacheStats {
        let index = self.index.read().await;
        CacheStats {
            hits: index.counters.hits,
            misses: index.counters.misses,
            evictions: index.counters.evictions,
            total_bytes: index.current_size,
            max_bytes: self.max_bytes,
            entry_count: index.entries.len(),
            cache_dir: self.cache_dir.clone(),
        }
    }

    pub async fn len(&self) -> usize {
        self.index.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn files_dir(&self) -> &Path {
        &self.files_dir
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }
}

/// Deletes staging files left behind by writes interrupted in a previous run.
fn remove_staging_files(files_dir: &Path) {
    let Ok(read_dir) = fs::read_dir(files_dir) else {
        return;
    };
    for entry in read_dir.flatten() {
        if entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX) {
            let path = entry.path();
            debug!(path = %path.display(), "Removing stale staging file");
            let _ = fs::remove_file(&path);
        }
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}
