use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// The subset of `docker image inspect` output the wrapper reads.
#[derive(Debug, Serialize, Deserialize)]
pub struct Image {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "RepoDigests", default)]
    pub repo_digests: Vec<String>,
    #[serde(rename = "RepoTags", default)]
    pub repo_tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub source: PathBuf,
    pub target: PathBuf,
    pub read_only: bool,
}

impl Mount {
    /// Mounted at the same path inside the container.
    pub fn same_path(path: impl Into<PathBuf>, read_only: bool) -> Self {
        let path = path.into();
        Self {
            target: path.clone(),
            source: path,
            read_only,
        }
    }

    pub fn volume_arg(&self) -> String {
        let mode = if self.read_only { ":ro" } else { "" };
        format!("{}:{}{}", self.source.display(), self.target.display(), mode)
    }
}

/// Everything needed to run one cdflow command in a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: String,
    pub command: Vec<String>,
    pub mounts: Vec<Mount>,
    pub environment: BTreeMap<String, String>,
    pub working_dir: PathBuf,
    pub tty: bool,
}
