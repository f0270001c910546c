use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{CdflowError, Result};

/// The project's `cdflow.yml`. Only the fields the wrapper needs are read;
/// the rest belongs to the command image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Manifest {
    #[serde(default)]
    pub account_scheme_url: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub account_prefix: Option<String>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let name = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|e| CdflowError::Manifest {
            path: name.clone(),
            reason: e.to_string(),
        })?;
        Self::parse_named(&content, &name)
    }

    /// Like [`Manifest::load`], but a missing file reads as an empty manifest.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "no manifest, using defaults");
            Ok(Self::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        Self::parse_named(content, "<inline>")
    }

    fn parse_named(content: &str, name: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| CdflowError::Manifest {
            path: name.to_string(),
            reason: e.to_string(),
        })
    }
}
