use tracing::info;

use crate::account_scheme::AccountSchemeSource;
use crate::args::ParsedArgs;
use crate::config::Config;
use crate::docker_client::ContainerRunner;
use crate::error::{CdflowError, Result};
use crate::git_client::{RemoteUrlSource, resolve_component_name};
use crate::manifest::Manifest;
use crate::release_metadata::fetch_release_metadata;
use crate::storage::ObjectStore;
use crate::types::{ContainerSpec, Mount};

pub const DOCKER_SOCKET: &str = "/var/run/docker.sock";

pub struct DeploymentManager {
    config: Config,
    store: Box<dyn ObjectStore>,
    git: Box<dyn RemoteUrlSource>,
    docker: Box<dyn ContainerRunner>,
}

impl DeploymentManager {
    pub fn new(
        config: Config,
        store: Box<dyn ObjectStore>,
        git: Box<dyn RemoteUrlSource>,
        docker: Box<dyn ContainerRunner>,
    ) -> Self {
        Self {
            config,
            store,
            git,
            docker,
        }
    }

    /// Picks the image for the command in `argv`, runs it, and returns the
    /// container's exit code.
    pub async fn run(&self, argv: &[String]) -> Result<i32> {
        let spec = self.container_spec(argv).await?;
        self.docker.run(&spec)
    }

    pub async fn container_spec(&self, argv: &[String]) -> Result<ContainerSpec> {
        let args = ParsedArgs::parse(argv);
        let mut environment = self.config.forwarded_env.clone();

        let (image, platform_configs) = match args.command() {
            Some("deploy") => (
                self.image_id_for_deploy(&args).await?,
                args.given_platform_config_paths(&self.config.project_root),
            ),
            Some("release") => {
                let platform_configs = args.platform_config_paths(&self.config.project_root)?;
                let digest = self.image_id_for_release()?;
                environment.insert("CDFLOW_IMAGE_DIGEST".to_string(), digest);
                (self.config.image.clone(), platform_configs)
            }
            _ => (
                self.config.image.clone(),
                args.given_platform_config_paths(&self.config.project_root),
            ),
        };

        let mut mounts = vec![
            Mount::same_path(&self.config.project_root, false),
            Mount::same_path(DOCKER_SOCKET, true),
        ];
        mounts.extend(
            platform_configs
                .into_iter()
                .map(|path| Mount::same_path(path, true)),
        );

        Ok(ContainerSpec {
            image,
            command: argv.to_vec(),
            mounts,
            environment,
            working_dir: self.config.project_root.clone(),
            tty: self.config.tty,
        })
    }

    /// The command image digest recorded in the release being deployed.
    pub async fn image_id_for_deploy(&self, args: &ParsedArgs) -> Result<String> {
        let component = resolve_component_name(args, &*self.git)?;
        let version = args
            .version()
            .ok_or_else(|| CdflowError::MissingVersion("deploy".to_string()))?;
        let manifest = match self.config.account_scheme_source {
            // discovery only needs the bucket tags
            AccountSchemeSource::TagDiscovery => {
                Manifest::load_or_default(&self.config.manifest_path)?
            }
            _ => Manifest::load(&self.config.manifest_path)?,
        };

        let scheme = self
            .config
            .account_scheme_source
            .resolve(
                &*self.store,
                &manifest,
                &component,
                args.component_override_present(),
            )
            .await?;
        let bucket = scheme.release_bucket()?;

        let metadata = fetch_release_metadata(
            &*self.store,
            bucket,
            &component,
            version,
            scheme.metadata_team(manifest.team.as_deref()),
        )
        .await?;
        let digest = metadata.image_digest()?;

        info!(component = %component, version, image = digest, "resolved release image");
        Ok(digest.to_string())
    }

    /// Digest of the configured command image, recorded into the release.
    pub fn image_id_for_release(&self) -> Result<String> {
        let digest = self.docker.image_digest(&self.config.image)?;
        info!(image = %self.config.image, digest = %digest, "pinned command image");
        Ok(digest)
    }
}
