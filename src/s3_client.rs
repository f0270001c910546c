//! `ObjectStore` backed by the AWS SDK, using the ambient credential chain.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::SdkError;
use bytes::Bytes;
use tokio::sync::OnceCell;
use tracing::instrument;

use crate::storage::{ObjectStore, StorageError, StorageResult};

/// The SDK client is built on first use, so commands that never touch S3
/// never resolve a region or credentials.
#[derive(Default)]
pub struct S3Client {
    client: OnceCell<Client>,
}

impl std::fmt::Debug for S3Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Client").finish_non_exhaustive()
    }
}

impl S3Client {
    pub fn new() -> Self {
        Self::default()
    }

    /// Region and credentials come from the usual AWS environment variables,
    /// profiles and instance metadata.
    async fn client(&self) -> &Client {
        self.client
            .get_or_init(|| async {
                let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
                Client::new(&config)
            })
            .await
    }

    fn map_sdk_error<E>(err: SdkError<E>, bucket: &str, key: &str) -> StorageError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        if let SdkError::ServiceError(ref service_err) = err {
            if service_err.raw().status().as_u16() == 404 {
                return StorageError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                };
            }
        }
        StorageError::S3(Box::new(err))
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    #[instrument(skip(self))]
    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
        let output = self
            .client()
            .await
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, bucket, key))?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::S3(Box::new(e)))?
            .into_bytes();

        Ok(body)
    }

    #[instrument(skip(self))]
    async fn get_object_metadata(
        &self,
        bucket: &str,
        key: &str,
    ) -> StorageResult<HashMap<String, String>> {
        let output = self
            .client()
            .await
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, bucket, key))?;

        Ok(output.metadata().cloned().unwrap_or_default())
    }

    #[instrument(skip(self))]
    async fn list_buckets(&self) -> StorageResult<Vec<String>> {
        let output = self
            .client()
            .await
            .list_buckets()
            .send()
            .await
            .map_err(|e| StorageError::S3(Box::new(e)))?;

        Ok(output
            .buckets()
            .iter()
            .filter_map(|bucket| bucket.name().map(str::to_string))
            .collect())
    }

    #[instrument(skip(self))]
    async fn bucket_tag_keys(&self, bucket: &str) -> StorageResult<Vec<String>> {
        let output = self
            .client()
            .await
            .get_bucket_tagging()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, bucket, "?tagging"))?;

        Ok(output
            .tag_set()
            .iter()
            .map(|tag| tag.key().to_string())
            .collect())
    }
}
