//! Amazon S3 implementation of [`ObjectStore`].

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::Client;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::backend::{BackendError, ObjectBody, ObjectStore, BOOTSTRAP_REGION};

/// S3 access with one client per region.
///
/// Location queries go through a client pinned to [`BOOTSTRAP_REGION`];
/// object downloads use a client built for the bucket's own region, created
/// on first use and reused afterwards.
pub struct S3ObjectStore {
    base: SdkConfig,
    bootstrap: Client,
    clients: RwLock<HashMap<String, Client>>,
}

impl S3ObjectStore {
    pub fn new(base: SdkConfig) -> Self {
        let bootstrap = build_client(&base, BOOTSTRAP_REGION);
        Self {
            base,
            bootstrap,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the client pinned to `region`, building it if needed.
    async fn client_for(&self, region: &str) -> Client {
        if let Some(client) = self.clients.read().await.get(region) {
            return client.clone();
        }

        let mut clients = self.clients.write().await;
        clients
            .entry(region.to_string())
            .or_insert_with(|| {
                debug!(region, "Creating region-pinned S3 client");
                build_client(&self.base, region)
            })
            .clone()
    }
}

fn build_client(base: &SdkConfig, region: &str) -> Client {
    let config = aws_sdk_s3::config::Builder::from(base)
        .region(Region::new(region.to_string()))
        .build();
    Client::from_conf(config)
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self))]
    async fn bucket_location(&self, bucket: &str) -> Result<String, BackendError> {
        let output = self
            .bootstrap
            .get_bucket_location()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| match classify(bucket, e) {
                err @ (BackendError::NotFound(_) | BackendError::AccessDenied(_)) => err,
                other => BackendError::RegionResolution {
                    bucket: bucket.to_string(),
                    reason: other.to_string(),
                },
            })?;

        Ok(output
            .location_constraint()
            .map(|c| c.as_str().to_string())
            .unwrap_or_default())
    }

    #[instrument(skip(self))]
    async fn get_object(
        &self,
        region: &str,
        bucket: &str,
        key: &str,
    ) -> Result<ObjectBody, BackendError> {
        let client = self.client_for(region).await;
        let output = client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(&format!("{}/{}", bucket, key), e))?;

        let content_length = output
            .content_length()
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0);

        Ok(ObjectBody::new(output.body.into_async_read(), content_length))
    }
}

/// Maps an SDK failure onto a [`BackendError`] kind.
fn classify<E>(target: &str, err: SdkError<E>) -> BackendError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::ServiceError(service) => {
            let status = service.raw().status().as_u16();
            match (status, service.err().code()) {
                (404, _) | (_, Some("NoSuchKey" | "NoSuchBucket" | "NotFound")) => {
                    BackendError::NotFound(target.to_string())
                }
                (401 | 403, _) | (_, Some("AccessDenied" | "AllAccessDisabled")) => {
                    BackendError::AccessDenied(target.to_string())
                }
                (500..=599, _) => BackendError::Transient(message),
                _ => BackendError::Service(message),
            }
        }
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            BackendError::Transient(message)
        }
        _ => BackendError::Service(message),
    }
}
