use crate::account_scheme::AccountSchemeSource;
use crate::config::Config;
use crate::deployment_manager::DeploymentManager;
use crate::docker_client::DockerClient;
use crate::git_client::GitClient;
use crate::s3_client::S3Client;
use clap::Parser;
use std::collections::HashMap;
use std::io::IsTerminal;

/// Wrapper options go before the command word; everything from the command
/// word on is handed to the command image untouched.
#[derive(Parser, Debug)]
#[command(
    name = "cdflow",
    about = "Runs cdflow commands in the command image pinned by each release",
    disable_help_flag = true,
    disable_version_flag = true
)]
pub struct CLI {
    #[arg(long, value_name = "PATH", help = "Project manifest [default: cdflow.yml]")]
    pub manifest: Option<String>,
    #[arg(long, value_name = "IMAGE", help = "Command image for release and other commands")]
    pub image: Option<String>,
    #[arg(long, value_enum, help = "Where deploys look up the account scheme")]
    pub account_scheme_source: Option<AccountSchemeSource>,
    #[arg(
        value_name = "COMMAND",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub args: Vec<String>,
}

/// Runs one invocation and returns the process exit code.
pub async fn dispatch(cli: CLI) -> i32 {
    let env: HashMap<String, String> = std::env::vars().collect();
    let project_root = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("Error: cannot determine working directory: {}", e);
            return 1;
        }
    };

    let mut config = match Config::from_env_and_cli(&cli, &env, project_root) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            println!();
            Config::show_configuration_help();
            return 1;
        }
    };
    config.tty = std::io::stdin().is_terminal() && std::io::stdout().is_terminal();

    let manager = DeploymentManager::new(
        config,
        Box::new(S3Client::new()),
        Box::new(GitClient),
        Box::new(DockerClient::default()),
    );

    match manager.run(&cli.args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}
