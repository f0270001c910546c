//! Scans the forwarded command line for the handful of flags the wrapper
//! cares about. Everything else is left for the command image to interpret.

use std::path::{Component, Path, PathBuf};

use crate::error::{CdflowError, Result};

const PLATFORM_CONFIG_FLAG: &str = "--platform-config";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedArgs {
    positionals: Vec<String>,
    component: Option<String>,
    platform_configs: Vec<String>,
    platform_config_without_value: bool,
    verbose: bool,
}

impl ParsedArgs {
    /// Strips known flags (and the values they take) before positionals are
    /// counted, so `-c widget deploy aslive 42` and `deploy aslive 42 -c widget`
    /// agree on the version.
    pub fn parse<S: AsRef<str>>(argv: &[S]) -> Self {
        let mut parsed = ParsedArgs::default();
        let mut tokens = argv.iter().map(<S as AsRef<str>>::as_ref);

        while let Some(token) = tokens.next() {
            match token {
                // consumed by the command image, but never a positional
                "-p" | "--plan-only" => {}
                "-v" | "--verbose" => parsed.verbose = true,
                "-c" | "--component" => {
                    if let Some(value) = tokens.next() {
                        parsed.component = Some(value.to_string());
                    }
                }
                PLATFORM_CONFIG_FLAG => match tokens.next() {
                    Some(value) => parsed.platform_configs.push(value.to_string()),
                    None => parsed.platform_config_without_value = true,
                },
                _ => match token
                    .strip_prefix(PLATFORM_CONFIG_FLAG)
                    .and_then(|rest| rest.strip_prefix('='))
                {
                    Some("") => parsed.platform_config_without_value = true,
                    Some(value) => parsed.platform_configs.push(value.to_string()),
                    None => parsed.positionals.push(token.to_string()),
                },
            }
        }

        parsed
    }

    pub fn command(&self) -> Option<&str> {
        self.positionals.first().map(String::as_str)
    }

    /// `release <version>` or `deploy <env> <version>`; anything else has none.
    pub fn version(&self) -> Option<&str> {
        let index = match self.command()? {
            "release" => 1,
            "deploy" => 2,
            _ => return None,
        };
        self.positionals.get(index).map(String::as_str)
    }

    /// Value of the last `-c`/`--component` seen.
    pub fn component(&self) -> Option<&str> {
        self.component.as_deref()
    }

    pub fn component_override_present(&self) -> bool {
        self.component.is_some()
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Every `--platform-config` value in order of appearance, made absolute
    /// against `cwd`.
    pub fn platform_config_paths(&self, cwd: &Path) -> Result<Vec<PathBuf>> {
        if self.platform_config_without_value || self.platform_configs.is_empty() {
            return Err(CdflowError::MissingPlatformConfig);
        }
        Ok(self
            .platform_configs
            .iter()
            .map(|path| absolutize(cwd, path))
            .collect())
    }

    /// The `--platform-config` values that carry a path, made absolute.
    /// Occurrences without a value are skipped.
    pub fn given_platform_config_paths(&self, cwd: &Path) -> Vec<PathBuf> {
        self.platform_configs
            .iter()
            .map(|path| absolutize(cwd, path))
            .collect()
    }
}

/// Lexical equivalent of `abspath`: no filesystem access, `..` pops.
fn absolutize(cwd: &Path, path: &str) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in cwd.join(path).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
