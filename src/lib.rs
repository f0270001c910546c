pub mod account_scheme;
pub mod args;
pub mod cli;
pub mod config;
pub mod deployment_manager;
pub mod docker_client;
pub mod error;
pub mod git_client;
pub mod manifest;
pub mod release_key;
pub mod release_metadata;
pub mod s3_client;
pub mod storage;
pub mod types;

use args::ParsedArgs;
use clap::Parser;
use cli::dispatch;
pub use cli::CLI;
pub use error::{CdflowError, Result};
use tracing_subscriber::EnvFilter;

pub async fn run() -> i32 {
    let cli = CLI::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if ParsedArgs::parse(&cli.args).verbose() {
            EnvFilter::new("info")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    dispatch(cli).await
}
