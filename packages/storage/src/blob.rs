// ABOUTME: Blob store adapter for file content above the inline threshold
// ABOUTME: S3-compatible backend (AWS, R2, MinIO) with transient-failure retry

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::{debug, info};

use atelier_config::StorageConfig;

use crate::error::{Result, StorageError};

/// Put/get/delete of opaque content keys in an external byte store
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, data: Bytes) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Bytes>;
    async fn delete(&self, key: &str) -> Result<()>;
}

/// S3-backed blob store
#[derive(Debug, Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3BlobStore {
    /// Build a client from the environment credential chain.
    ///
    /// A custom endpoint makes this work against any S3-compatible service
    /// (Cloudflare R2, MinIO) the deployment points at.
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        let bucket = config
            .blob_bucket
            .clone()
            .ok_or_else(|| StorageError::Blob("blob bucket not configured".to_string()))?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.blob_region.clone()));
        if let Some(endpoint) = &config.blob_endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;
        let client = Client::new(&sdk_config);

        // Verify reachability before handing the store out
        client
            .head_bucket()
            .bucket(&bucket)
            .send()
            .await
            .map_err(|e| {
                StorageError::BackendUnavailable(format!("blob bucket check failed: {}", e))
            })?;

        info!("Connected to blob store bucket {}", bucket);
        Ok(Self {
            client,
            bucket,
            prefix: config.blob_prefix.clone(),
        })
    }

    fn object_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

/// Retry transient failures with bounded exponential back-off
async fn with_retry<F, T, Fut>(operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    use backoff::{future::retry, ExponentialBackoff};

    let policy = ExponentialBackoff {
        max_elapsed_time: Some(std::time::Duration::from_secs(15)),
        ..Default::default()
    };

    retry(policy, || async {
        match operation().await {
            Ok(result) => Ok(result),
            Err(e @ StorageError::BackendUnavailable(_)) => Err(backoff::Error::transient(e)),
            Err(e) => Err(backoff::Error::permanent(e)),
        }
    })
    .await
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        let object_key = self.object_key(key);
        debug!("Putting blob object {} ({} bytes)", object_key, data.len());

        let client = self.client.clone();
        let bucket = self.bucket.clone();

        with_retry(|| {
            let client = client.clone();
            let bucket = bucket.clone();
            let object_key = object_key.clone();
            let data = data.clone();

            async move {
                client
                    .put_object()
                    .bucket(&bucket)
                    .key(&object_key)
                    .body(data.into())
                    .content_type("application/octet-stream")
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|e| classify_sdk_error("put", &e.to_string()))
            }
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let object_key = self.object_key(key);
        debug!("Getting blob object {}", object_key);

        let client = self.client.clone();
        let bucket = self.bucket.clone();

        let body = with_retry(|| {
            let client = client.clone();
            let bucket = bucket.clone();
            let object_key = object_key.clone();

            async move {
                client
                    .get_object()
                    .bucket(&bucket)
                    .key(&object_key)
                    .send()
                    .await
                    .map_err(|e| {
                        if e.to_string().contains("NoSuchKey") {
                            StorageError::ReadFailed(format!("blob object missing: {}", object_key))
                        } else {
                            classify_sdk_error("get", &e.to_string())
                        }
                    })
            }
        })
        .await?;

        let collected = body
            .body
            .collect()
            .await
            .map_err(|e| StorageError::BackendUnavailable(format!("blob body read: {}", e)))?;

        Ok(collected.into_bytes())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let object_key = self.object_key(key);
        debug!("Deleting blob object {}", object_key);

        let client = self.client.clone();
        let bucket = self.bucket.clone();

        with_retry(|| {
            let client = client.clone();
            let bucket = bucket.clone();
            let object_key = object_key.clone();

            async move {
                client
                    .delete_object()
                    .bucket(&bucket)
                    .key(&object_key)
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|e| classify_sdk_error("delete", &e.to_string()))
            }
        })
        .await
    }
}

/// Timeouts and connection drops are retried; everything else is surfaced as-is
fn classify_sdk_error(op: &str, message: &str) -> StorageError {
    if message.contains("timeout") || message.contains("connection") || message.contains("dispatch")
    {
        StorageError::BackendUnavailable(format!("blob {}: {}", op, message))
    } else {
        StorageError::Blob(format!("blob {}: {}", op, message))
    }
}
