use std::process::Command;

use tracing::{debug, info, warn};

use crate::error::{CdflowError, Result};
use crate::types::{ContainerSpec, Image};

/// Runs the command image. Output is streamed straight to the terminal.
pub trait ContainerRunner {
    /// Repo digest (`name@sha256:...`) of `image`, pulling it first.
    fn image_digest(&self, image: &str) -> Result<String>;

    /// Runs the container to completion and returns its exit code.
    fn run(&self, spec: &ContainerSpec) -> Result<i32>;
}

/// `ContainerRunner` driving the `docker` CLI.
pub struct DockerClient {
    docker_bin: String,
}

impl Default for DockerClient {
    fn default() -> Self {
        Self::new("docker".to_string())
    }
}

impl DockerClient {
    pub fn new(docker_bin: String) -> Self {
        Self { docker_bin }
    }

    fn inspect(&self, image: &str) -> Result<Image> {
        let output = Command::new(&self.docker_bin)
            .args(["image", "inspect", image])
            .output()?;

        if !output.status.success() {
            return Err(CdflowError::Container(format!(
                "docker image inspect {} failed: {}",
                image,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let images: Vec<Image> = serde_json::from_slice(&output.stdout)
            .map_err(|e| CdflowError::Container(format!("unreadable inspect output: {e}")))?;
        images
            .into_iter()
            .next()
            .ok_or_else(|| CdflowError::Container(format!("image {image} not found")))
    }
}

impl ContainerRunner for DockerClient {
    fn image_digest(&self, image: &str) -> Result<String> {
        info!(image, "pulling command image");
        let pull = Command::new(&self.docker_bin)
            .args(["pull", "--quiet", image])
            .output()?;
        if !pull.status.success() {
            // pinned images may only exist locally
            let stderr = String::from_utf8_lossy(&pull.stderr);
            warn!(image, stderr = %stderr.trim(), "pull failed, using local image");
        }

        let inspected = self.inspect(image)?;
        debug!(id = %inspected.id, tags = ?inspected.repo_tags, "inspected image");
        inspected
            .repo_digests
            .into_iter()
            .next()
            .ok_or_else(|| CdflowError::Container(format!("image {image} has no repo digest")))
    }

    fn run(&self, spec: &ContainerSpec) -> Result<i32> {
        let mut command = Command::new(&self.docker_bin);
        command.args(docker_run_args(spec));
        for (name, value) in &spec.environment {
            command.env(name, value);
        }

        info!(image = %spec.image, command = ?spec.command, "running container");
        let status = command.status()?;
        Ok(status.code().unwrap_or(1))
    }
}

/// Arguments for `docker run`. Environment values are passed by name only so
/// credentials never appear in the process list.
pub fn docker_run_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = vec!["run".to_string(), "--rm".to_string(), "-i".to_string()];
    if spec.tty {
        args.push("-t".to_string());
    }
    for mount in &spec.mounts {
        args.push("-v".to_string());
        args.push(mount.volume_arg());
    }
    args.push("-w".to_string());
    args.push(spec.working_dir.display().to_string());
    for name in spec.environment.keys() {
        args.push("-e".to_string());
        args.push(name.clone());
    }
    args.push(spec.image.clone());
    args.extend(spec.command.iter().cloned());
    args
}
