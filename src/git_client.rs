use std::process::Command;

use tracing::{debug, info};

use crate::args::ParsedArgs;
use crate::error::{CdflowError, Result};

/// Where a component name comes from when `--component` is not given.
pub trait RemoteUrlSource {
    fn remote_url(&self) -> Result<String>;
}

/// Reads `remote.origin.url` from the repository in the current directory.
pub struct GitClient;

impl RemoteUrlSource for GitClient {
    fn remote_url(&self) -> Result<String> {
        let output = Command::new("git")
            .args(["config", "remote.origin.url"])
            .output()
            .map_err(|e| {
                debug!(error = %e, "failed to spawn git");
                CdflowError::GitRemote
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!(stderr = %stderr.trim(), "git config remote.origin.url failed");
            return Err(CdflowError::GitRemote);
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

pub fn resolve_component_name(args: &ParsedArgs, remote: &dyn RemoteUrlSource) -> Result<String> {
    if let Some(component) = args.component() {
        info!(component, "using component from command line");
        return Ok(component.to_string());
    }

    let url = remote.remote_url()?;
    let component = component_from_remote_url(&url);
    info!(component = %component, remote = %url.trim(), "inferred component from git remote");
    Ok(component)
}

/// `git@github.com:org/widget.git\n` -> `widget`.
pub fn component_from_remote_url(url: &str) -> String {
    let trimmed = url.trim().trim_matches(|c| matches!(c, '\t' | '\n' | ' ' | '/'));
    let name = trimmed.rsplit('/').next().unwrap_or(trimmed);
    name.strip_suffix(".git").unwrap_or(name).to_string()
}
