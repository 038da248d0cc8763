//! Region-aware object fetching.
//!
//! [`RegionAwareFetcher`] resolves each bucket's region once through the
//! storage service's location API, remembers it, and issues every later
//! request against a client pinned to that region.

use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::backend::{parse_key, BackendError};

/// Region used to query bucket locations and for buckets reporting no
/// location constraint.
pub const BOOTSTRAP_REGION: &str = "us-east-1";

/// Streaming object body.
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// A downloaded object: its byte stream and advertised length.
pub struct ObjectBody {
    pub reader: ObjectReader,
    /// Length advertised by the backend, 0 when omitted
    pub content_length: u64,
}

impl ObjectBody {
    pub fn new(reader: impl AsyncRead + Send + 'static, content_length: u64) -> Self {
        Self {
            reader: Box::pin(reader),
            content_length,
        }
    }
}

impl fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBody")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

// == Fetcher ==
/// Downloads objects addressed by cache key (`<bucket>/<path>`).
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn download(&self, key: &str) -> Result<ObjectBody, BackendError>;
}

// == Object Store ==
/// Raw storage service operations used by [`RegionAwareFetcher`].
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Queries the bucket's location constraint from [`BOOTSTRAP_REGION`].
    ///
    /// May return an empty string for buckets in the default region.
    async fn bucket_location(&self, bucket: &str) -> Result<String, BackendError>;

    /// Starts a streaming download from a client pinned to `region`.
    async fn get_object(
        &self,
        region: &str,
        bucket: &str,
        key: &str,
    ) -> Result<ObjectBody, BackendError>;
}

// == Region Aware Fetcher ==
pub struct RegionAwareFetcher<S> {
    store: S,
    /// bucket -> region, filled on first access and never evicted
    regions: RwLock<HashMap<String, String>>,
}

impl<S: ObjectStore> RegionAwareFetcher<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            regions: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the bucket's region, querying the store only on first use.
    ///
    /// Concurrent first lookups may both query; the first answer stored wins.
    pub async fn resolve_region(&self, bucket: &str) -> Result<String, BackendError> {
        if let Some(region) = self.regions.read().await.get(bucket) {
            return Ok(region.clone());
        }

        let location = self.store.bucket_location(bucket).await?;
        let resolved = normalize_location(&location);

        let mut regions = self.regions.write().await;
        let region = regions
            .entry(bucket.to_string())
            .or_insert(resolved)
            .clone();

        info!(bucket, region = %region, "Resolved bucket region");
        Ok(region)
    }

    /// Region already resolved for `bucket`, if any.
    pub async fn cached_region(&self, bucket: &str) -> Option<String> {
        self.regions.read().await.get(bucket).cloned()
    }

    pub async fn known_buckets(&self) -> usize {
        self.regions.read().await.len()
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[async_trait]
impl<S: ObjectStore> Fetcher for RegionAwareFetcher<S> {
    async fn download(&self, key: &str) -> Result<ObjectBody, BackendError> {
        let location = parse_key(key)?;
        let region = self.resolve_region(&location.bucket).await?;

        debug!(
            bucket = %location.bucket,
            object_key = %location.object_key,
            region = %region,
            "Fetching object"
        );
        self.store
            .get_object(&region, &location.bucket, &location.object_key)
            .await
    }
}

/// Maps a location constraint to a region name.
///
/// Empty means the bootstrap region; `EU` is the legacy alias of `eu-west-1`.
pub fn normalize_location(location: &str) -> String {
    match location.trim() {
        "" => BOOTSTRAP_REGION.to_string(),
        "EU" => "eu-west-1".to_string(),
        region => region.to_string(),
    }
}
