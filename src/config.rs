use crate::account_scheme::AccountSchemeSource;
use crate::cli::CLI;
use crate::error::{CdflowError, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

pub const DEFAULT_IMAGE: &str = "mergermarket/cdflow-commands:latest";
pub const DEFAULT_MANIFEST: &str = "cdflow.yml";

/// Caller environment passed through to the command container when set.
pub const FORWARDED_ENV: [&str; 5] = [
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_SESSION_TOKEN",
    "FASTLY_API_KEY",
    "ROLE_SESSION_NAME",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub image: String,
    pub manifest_path: PathBuf,
    pub account_scheme_source: AccountSchemeSource,
    pub project_root: PathBuf,
    pub forwarded_env: BTreeMap<String, String>,
    pub tty: bool,
}

impl Config {
    pub fn from_env_and_cli(
        cli: &CLI,
        env: &HashMap<String, String>,
        project_root: PathBuf,
    ) -> Result<Self> {
        // Priority: CLI args > environment > default
        let image = cli
            .image
            .clone()
            .or_else(|| env.get("CDFLOW_IMAGE_ID").cloned())
            .unwrap_or_else(|| DEFAULT_IMAGE.to_string());

        let manifest = cli
            .manifest
            .clone()
            .or_else(|| env.get("CDFLOW_MANIFEST").cloned())
            .unwrap_or_else(|| DEFAULT_MANIFEST.to_string());

        let account_scheme_source = match cli.account_scheme_source {
            Some(source) => source,
            None => match env.get("CDFLOW_ACCOUNT_SCHEME_SOURCE") {
                Some(value) => value.parse().map_err(|e| {
                    CdflowError::Config(format!("CDFLOW_ACCOUNT_SCHEME_SOURCE: {e}"))
                })?,
                None => AccountSchemeSource::default(),
            },
        };

        let forwarded_env = FORWARDED_ENV
            .iter()
            .filter_map(|name| env.get(*name).map(|value| (name.to_string(), value.clone())))
            .collect();

        Ok(Config {
            image,
            manifest_path: project_root.join(manifest),
            account_scheme_source,
            project_root,
            forwarded_env,
            tty: false,
        })
    }

    pub fn show_configuration_help() {
        println!("Configuration options (before the cdflow command):");
        println!("  1. Command line flags:");
        println!(
            "     cdflow --manifest cdflow.yml --image {DEFAULT_IMAGE} --account-scheme-source explicit-url deploy aslive 42"
        );
        println!();
        println!("  2. Environment variables:");
        println!("     CDFLOW_MANIFEST=cdflow.yml");
        println!("     CDFLOW_IMAGE_ID={DEFAULT_IMAGE}");
        println!("     CDFLOW_ACCOUNT_SCHEME_SOURCE=explicit-url|prefix-convention|tag-discovery");
        println!();
        println!("Command line flags take precedence over environment variables.");
    }
}
