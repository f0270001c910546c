//! Object storage seen by the resolver: a read-only view of S3 plus an
//! in-memory stand-in.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::error::{CdflowError, Result};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("S3 error: {0}")]
    S3(#[from] Box<dyn std::error::Error + Send + Sync>),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<Bytes>;

    /// User metadata attached to the object.
    async fn get_object_metadata(
        &self,
        bucket: &str,
        key: &str,
    ) -> StorageResult<HashMap<String, String>>;

    async fn list_buckets(&self) -> StorageResult<Vec<String>>;

    async fn bucket_tag_keys(&self, bucket: &str) -> StorageResult<Vec<String>>;
}

#[async_trait]
impl<T: ObjectStore + ?Sized> ObjectStore for Arc<T> {
    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
        (**self).get_object(bucket, key).await
    }

    async fn get_object_metadata(
        &self,
        bucket: &str,
        key: &str,
    ) -> StorageResult<HashMap<String, String>> {
        (**self).get_object_metadata(bucket, key).await
    }

    async fn list_buckets(&self) -> StorageResult<Vec<String>> {
        (**self).list_buckets().await
    }

    async fn bucket_tag_keys(&self, bucket: &str) -> StorageResult<Vec<String>> {
        (**self).bucket_tag_keys(bucket).await
    }
}

/// A `(bucket, key)` pair taken from an `s3://bucket/key` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLocator {
    pub bucket: String,
    pub key: String,
}

impl StorageLocator {
    pub fn parse(url: &str) -> Result<Self> {
        let (bucket, key) = url
            .strip_prefix("s3://")
            .and_then(|rest| rest.split_once('/'))
            .ok_or_else(|| CdflowError::InvalidUrl(url.to_string()))?;
        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }
}

impl std::fmt::Display for StorageLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

pub fn parse_storage_url(url: &str) -> Result<StorageLocator> {
    StorageLocator::parse(url)
}

type ObjectId = (String, String);

/// In-memory store that remembers every object it was asked for.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: HashMap<ObjectId, Bytes>,
    metadata: HashMap<ObjectId, HashMap<String, String>>,
    bucket_tags: HashMap<String, Vec<String>>,
    requests: Mutex<Vec<ObjectId>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(mut self, bucket: &str, key: &str, body: impl Into<Bytes>) -> Self {
        self.objects
            .insert((bucket.to_string(), key.to_string()), body.into());
        self
    }

    pub fn with_metadata<K, V>(
        mut self,
        bucket: &str,
        key: &str,
        metadata: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let metadata = metadata
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.metadata
            .insert((bucket.to_string(), key.to_string()), metadata);
        self
    }

    pub fn with_tagged_bucket(mut self, bucket: &str, tag_keys: &[&str]) -> Self {
        self.bucket_tags.insert(
            bucket.to_string(),
            tag_keys.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    /// `(bucket, key)` of every object and metadata read, in order.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn record(&self, bucket: &str, key: &str) -> ObjectId {
        let id = (bucket.to_string(), key.to_string());
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(id.clone());
        id
    }

    fn not_found(bucket: &str, key: &str) -> StorageError {
        StorageError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
        let id = self.record(bucket, key);
        self.objects
            .get(&id)
            .cloned()
            .ok_or_else(|| Self::not_found(bucket, key))
    }

    async fn get_object_metadata(
        &self,
        bucket: &str,
        key: &str,
    ) -> StorageResult<HashMap<String, String>> {
        let id = self.record(bucket, key);
        self.metadata
            .get(&id)
            .cloned()
            .ok_or_else(|| Self::not_found(bucket, key))
    }

    async fn list_buckets(&self) -> StorageResult<Vec<String>> {
        let buckets: BTreeSet<String> = self
            .bucket_tags
            .keys()
            .cloned()
            .chain(self.objects.keys().map(|(bucket, _)| bucket.clone()))
            .chain(self.metadata.keys().map(|(bucket, _)| bucket.clone()))
            .collect();
        Ok(buckets.into_iter().collect())
    }

    async fn bucket_tag_keys(&self, bucket: &str) -> StorageResult<Vec<String>> {
        self.bucket_tags
            .get(bucket)
            .cloned()
            .ok_or_else(|| Self::not_found(bucket, "?tagging"))
    }
}
