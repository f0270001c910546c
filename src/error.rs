use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum CdflowError {
    #[error(
        "could not infer the component name from `git config remote.origin.url`; \
         add a remote with `git remote add origin <url>` or pass `--component <name>`"
    )]
    GitRemote,

    #[error("invalid account scheme URL '{0}', expected s3://<bucket>/<key>")]
    InvalidUrl(String),

    #[error("--platform-config <path> is required (at least once, each with a value)")]
    MissingPlatformConfig,

    #[error("account scheme from {0} has no release-bucket")]
    MissingReleaseBucket(String),

    #[error("no version given for '{0}'")]
    MissingVersion(String),

    #[error("release metadata at {bucket}/{key} has no cdflow_image_digest")]
    MissingImageDigest { bucket: String, key: String },

    #[error("manifest field '{0}' is required for this account scheme source")]
    MissingManifestField(&'static str),

    #[error("more than one bucket is tagged '{0}'")]
    MultipleBuckets(String),

    #[error("no bucket is tagged '{0}'")]
    MissingBucket(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to read manifest {path}: {reason}")]
    Manifest { path: String, reason: String },

    #[error("failed to parse account scheme at {url}: {source}")]
    SchemeParse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("container error: {0}")]
    Container(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CdflowError>;
