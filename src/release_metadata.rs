use std::collections::HashMap;

use tracing::info;

use crate::error::{CdflowError, Result};
use crate::release_key::release_key;
use crate::storage::ObjectStore;

/// Metadata field naming the command image a release was built with.
pub const IMAGE_DIGEST_FIELD: &str = "cdflow_image_digest";

/// Metadata stored on a release bundle object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseMetadata {
    pub bucket: String,
    pub key: String,
    pub fields: HashMap<String, String>,
}

impl ReleaseMetadata {
    pub fn image_digest(&self) -> Result<&str> {
        self.fields
            .get(IMAGE_DIGEST_FIELD)
            .map(String::as_str)
            .ok_or_else(|| CdflowError::MissingImageDigest {
                bucket: self.bucket.clone(),
                key: self.key.clone(),
            })
    }
}

/// Reads the metadata of `component` at `version`. `team` selects the
/// team-scoped key; pass `None` for the classic layout.
pub async fn fetch_release_metadata(
    store: &dyn ObjectStore,
    bucket: &str,
    component: &str,
    version: &str,
    team: Option<&str>,
) -> Result<ReleaseMetadata> {
    let key = release_key(team, component, version);
    info!(bucket, key = %key, "fetching release metadata");
    let fields = store.get_object_metadata(bucket, &key).await?;
    Ok(ReleaseMetadata {
        bucket: bucket.to_string(),
        key,
        fields,
    })
}
