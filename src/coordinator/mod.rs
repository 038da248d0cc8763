//! Request Coordinator
//!
//! Serves a key from the disk cache, or downloads it, stores it and serves
//! the stored file:
//!
//! `LOOKUP -> HIT -> SERVE` or `LOOKUP -> MISS -> FETCH -> STORE -> SERVE`.
//!
//! Any failure ends the request; there are no retries. Concurrent misses for
//! the same key share one download.

mod inflight;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::backend::{parse_key, BackendError, Fetcher};
use crate::cache::{CacheStats, DiskCache, StagedObject};
use crate::error::{ProxyError, Result};

pub use inflight::InflightRegistry;

/// Default upper bound for one download, independent of object size.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(300);

/// Outcome of a successful request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedObject {
    /// Cached file to serve
    pub path: PathBuf,
    /// Whether the object was already cached when the request arrived
    pub hit: bool,
}

pub struct RequestCoordinator {
    cache: Arc<DiskCache>,
    fetcher: Arc<dyn Fetcher>,
    inflight: InflightRegistry,
    fetch_timeout: Duration,
}

impl RequestCoordinator {
    pub fn new(cache: Arc<DiskCache>, fetcher: Arc<dyn Fetcher>, fetch_timeout: Duration) -> Self {
        Self {
            cache,
            fetcher,
            inflight: InflightRegistry::new(),
            fetch_timeout,
        }
    }

    /// Returns the cached file for `key`, downloading it on a miss.
    ///
    /// Download failures (including timeouts and invalid keys) map to
    /// not-found errors; local storage failures to internal errors.
    pub async fn fetch(&self, key: &str) -> Result<ServedObject> {
        let started = Instant::now();

        if let Some(path) = self.cache.get(key).await {
            info!(key, elapsed_ms = started.elapsed().as_millis() as u64, "Cache hit");
            return Ok(ServedObject { path, hit: true });
        }

        parse_key(key)?;

        let _slot = self.inflight.acquire(key).await;

        // another request may have stored it while we waited
        if let Some(path) = self.cache.peek(key).await {
            debug!(key, "Served from a concurrent download");
            return Ok(ServedObject { path, hit: false });
        }

        info!(key, "Cache miss, downloading");
        let staged = match self.download(key).await {
            Ok(staged) => staged,
            Err(e) => {
                let transient = matches!(&e, ProxyError::Backend(b) if b.is_transient());
                warn!(key, error = %e, transient, "Download failed");
                return Err(e);
            }
        };

        let size = staged.size();
        let path = self.cache.commit(key, staged).await?;
        info!(
            key,
            size,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Downloaded and cached object"
        );

        Ok(ServedObject { path, hit: false })
    }

    /// Downloads `key` into a staged file, bounded by the fetch timeout.
    async fn download(&self, key: &str) -> Result<StagedObject> {
        let transfer = async {
            let body = self.fetcher.download(key).await?;
            let advertised = body.content_length;
            debug!(key, content_length = advertised, "Download started");

            let staged = self.cache.stage(body.reader).await?;
            if advertised > 0 && staged.size() != advertised {
                return Err(ProxyError::from(BackendError::Transient(format!(
                    "received {} of {} bytes for {}",
                    staged.size(),
                    advertised,
                    key
                ))));
            }
            Ok::<_, ProxyError>(staged)
        };

        match tokio::time::timeout(self.fetch_timeout, transfer).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(self.fetch_timeout.as_secs()).into()),
        }
    }

    pub async fn stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    pub fn cache(&self) -> &Arc<DiskCache> {
        &self.cache
    }

    /// Keys with a download in progress or awaited.
    pub fn inflight(&self) -> usize {
        self.inflight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ObjectBody;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Context, Poll};
    use tempfile::TempDir;
    use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

    /// Reader that never produces data.
    struct Stalled;

    impl AsyncRead for Stalled {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Pending
        }
    }

    #[derive(Default)]
    struct StubFetcher {
        objects: HashMap<String, Vec<u8>>,
        calls: AtomicUsize,
        delay: Duration,
        stall_after: Option<usize>,
        advertise: Option<u64>,
    }

    impl StubFetcher {
        fn with_object(mut self, key: &str, data: &[u8]) -> Self {
            self.objects.insert(key.into(), data.to_vec());
            self
        }
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn download(&self, key: &str) -> std::result::Result<ObjectBody, BackendError> {
            parse_key(key)?;
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;

            let data = self
                .objects
                .get(key)
                .cloned()
                .ok_or_else(|| BackendError::NotFound(key.into()))?;
            let len = self.advertise.unwrap_or(data.len() as u64);
            Ok(match self.stall_after {
                Some(n) => ObjectBody::new(Cursor::new(data[..n].to_vec()).chain(Stalled), len),
                None => ObjectBody::new(Cursor::new(data), len),
            })
        }
    }

    fn coordinator(fetcher: StubFetcher, timeout: Duration) -> (TempDir, Arc<StubFetcher>, RequestCoordinator) {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(DiskCache::open(dir.path(), 10_000).unwrap());
        let fetcher = Arc::new(fetcher);
        let coordinator = RequestCoordinator::new(cache, fetcher.clone(), timeout);
        (dir, fetcher, coordinator)
    }

    fn staging_files(cache: &DiskCache) -> usize {
        std::fs::read_dir(cache.files_dir())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count()
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let stub = StubFetcher::default().with_object("b/app.apk", b"apk-bytes");
        let (_dir, fetcher, coordinator) = coordinator(stub, DEFAULT_FETCH_TIMEOUT);

        let first = coordinator.fetch("b/app.apk").await.unwrap();
        let second = coordinator.fetch("b/app.apk").await.unwrap();

        assert!(!first.hit);
        assert!(second.hit);
        assert_eq!(first.path, second.path);
        assert_eq!(std::fs::read(&second.path).unwrap(), b"apk-bytes");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        let stats = coordinator.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_bytes, 9);
    }

    #[tokio::test]
    async fn test_invalid_key_rejected_before_download() {
        let (_dir, fetcher, coordinator) = coordinator(StubFetcher::default(), DEFAULT_FETCH_TIMEOUT);

        let err = coordinator.fetch("nobucket").await.unwrap_err();

        assert!(matches!(err, ProxyError::InvalidKey(_)));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let (_dir, _fetcher, coordinator) = coordinator(StubFetcher::default(), DEFAULT_FETCH_TIMEOUT);

        let err = coordinator.fetch("b/missing").await.unwrap_err();

        assert!(matches!(err, ProxyError::NotFound(_)));
        assert!(coordinator.cache().is_empty().await);
        assert_eq!(coordinator.inflight(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_download() {
        let stub = StubFetcher {
            delay: Duration::from_millis(100),
            ..Default::default()
        }
        .with_object("b/big.bin", &[9u8; 4096]);
        let (_dir, fetcher, coordinator) = coordinator(stub, DEFAULT_FETCH_TIMEOUT);
        let coordinator = Arc::new(coordinator);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let coordinator = Arc::clone(&coordinator);
            handles.push(tokio::spawn(async move {
                coordinator.fetch("b/big.bin").await.unwrap()
            }));
        }
        let mut paths = Vec::new();
        for handle in handles {
            paths.push(handle.await.unwrap().path);
        }

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(paths.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(coordinator.stats().await.entry_count, 1);
        assert_eq!(coordinator.inflight(), 0);
    }

    #[tokio::test]
    async fn test_timeout_leaves_no_partial_file() {
        let stub = StubFetcher {
            stall_after: Some(100),
            ..Default::default()
        }
        .with_object("b/slow.bin", &[1u8; 1000]);
        let (_dir, _fetcher, coordinator) = coordinator(stub, Duration::from_millis(50));

        let err = coordinator.fetch("b/slow.bin").await.unwrap_err();

        assert!(matches!(err, ProxyError::Backend(BackendError::Timeout(_))));
        assert_eq!(err.status_code(), axum::http::StatusCode::NOT_FOUND);
        assert!(coordinator.cache().is_empty().await);
        assert_eq!(staging_files(coordinator.cache()), 0);
    }

    #[tokio::test]
    async fn test_truncated_body_is_rejected() {
        let stub = StubFetcher {
            advertise: Some(500),
            ..Default::default()
        }
        .with_object("b/short.bin", &[1u8; 200]);
        let (_dir, _fetcher, coordinator) = coordinator(stub, DEFAULT_FETCH_TIMEOUT);

        let err = coordinator.fetch("b/short.bin").await.unwrap_err();

        assert!(matches!(err, ProxyError::Backend(BackendError::Transient(_))));
        assert!(coordinator.cache().is_empty().await);
        assert_eq!(staging_files(coordinator.cache()), 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_internal_error() {
        let stub = StubFetcher::default().with_object("b/blocked.bin", b"payload");
        let (_dir, fetcher, coordinator) = coordinator(stub, DEFAULT_FETCH_TIMEOUT);

        // a non-empty directory at the destination makes the final rename fail
        let target = coordinator
            .cache()
            .files_dir()
            .join(crate::cache::naming::local_name("b/blocked.bin"));
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("occupied"), b"x").unwrap();

        let err = coordinator.fetch("b/blocked.bin").await.unwrap_err();

        assert!(matches!(err, ProxyError::Storage(_)));
        assert_eq!(err.status_code(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(coordinator.cache().is_empty().await);
        assert_eq!(coordinator.stats().await.total_bytes, 0);
        assert_eq!(staging_files(coordinator.cache()), 0);
        assert_eq!(coordinator.inflight(), 0);
    }

    #[tokio::test]
    async fn test_unknown_length_is_accepted() {
        let stub = StubFetcher {
            advertise: Some(0),
            ..Default::default()
        }
        .with_object("b/stream", b"chunked");
        let (_dir, _fetcher, coordinator) = coordinator(stub, DEFAULT_FETCH_TIMEOUT);

        let served = coordinator.fetch("b/stream").await.unwrap();
        assert_eq!(std::fs::read(served.path).unwrap(), b"chunked");
    }
}
