use cdflow::CLI;
use cdflow::config::Config;
use cdflow::deployment_manager::DeploymentManager;
use cdflow::docker_client::ContainerRunner;
use cdflow::error::{CdflowError, Result};
use cdflow::git_client::RemoteUrlSource;
use cdflow::storage::{MemoryStore, StorageError};
use cdflow::types::{ContainerSpec, Mount};
use clap::Parser;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::{TempDir, tempdir};

const DIGEST: &str = "mergermarket/cdflow-commands@sha256:0123abcd";

struct FixedRemote(Option<&'static str>);

impl RemoteUrlSource for FixedRemote {
    fn remote_url(&self) -> Result<String> {
        self.0.map(String::from).ok_or(CdflowError::GitRemote)
    }
}

#[derive(Clone)]
struct RecordingRunner {
    specs: Arc<Mutex<Vec<ContainerSpec>>>,
    pulled: Arc<Mutex<Vec<String>>>,
    exit_code: i32,
}

impl RecordingRunner {
    fn new(exit_code: i32) -> Self {
        Self {
            specs: Arc::default(),
            pulled: Arc::default(),
            exit_code,
        }
    }

    fn specs(&self) -> Vec<ContainerSpec> {
        self.specs.lock().unwrap().clone()
    }
}

impl ContainerRunner for RecordingRunner {
    fn image_digest(&self, image: &str) -> Result<String> {
        self.pulled.lock().unwrap().push(image.to_string());
        Ok(format!("{image}@sha256:feed"))
    }

    fn run(&self, spec: &ContainerSpec) -> Result<i32> {
        self.specs.lock().unwrap().push(spec.clone());
        Ok(self.exit_code)
    }
}

fn project(manifest: &str) -> TempDir {
    let dir = tempdir().unwrap();
    let mut file = File::create(dir.path().join("cdflow.yml")).unwrap();
    write!(file, "{manifest}").unwrap();
    dir
}

fn manager(
    root: &Path,
    store: Arc<MemoryStore>,
    remote: Option<&'static str>,
    runner: &RecordingRunner,
    wrapper_args: &[&str],
) -> DeploymentManager {
    let cli = CLI::parse_from(std::iter::once("cdflow").chain(wrapper_args.iter().copied()));
    let env = HashMap::from([("AWS_ACCESS_KEY_ID".to_string(), "id".to_string())]);
    let config = Config::from_env_and_cli(&cli, &env, root.to_path_buf()).unwrap();
    DeploymentManager::new(
        config,
        Box::new(store),
        Box::new(FixedRemote(remote)),
        Box::new(runner.clone()),
    )
}

fn argv(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

fn forwarding_store() -> MemoryStore {
    MemoryStore::new()
        .with_object(
            "acme-account-resources",
            "account-scheme.json",
            r#"{
                "release-bucket": "old-releases",
                "upgrade-account-scheme": {
                    "team-whitelist": [],
                    "component-whitelist": ["widget"],
                    "new-url": "s3://nb/nk"
                }
            }"#,
        )
        .with_object("nb", "nk", r#"{"release-bucket": "new-releases"}"#)
        .with_metadata(
            "new-releases",
            "t/widget/widget-42.zip",
            [("cdflow_image_digest", DIGEST)],
        )
        .with_metadata(
            "old-releases",
            "t/widget/widget-42.zip",
            [("cdflow_image_digest", "old@sha256:1")],
        )
}

const MANIFEST: &str = "account-scheme-url: s3://acme-account-resources/account-scheme.json\nteam: t\n";

#[tokio::test]
async fn test_deploy_follows_upgrade_and_runs_release_image() {
    let dir = project(MANIFEST);
    let store = Arc::new(forwarding_store());
    let runner = RecordingRunner::new(0);
    let manager = manager(
        dir.path(),
        store.clone(),
        Some("git@github.com:org/widget.git\n"),
        &runner,
        &[],
    );

    let exit_code = manager.run(&argv(&["deploy", "aslive", "42"])).await.unwrap();
    assert_eq!(exit_code, 0);

    let specs = runner.specs();
    assert_eq!(specs.len(), 1);
    assert_eq!(specs[0].image, DIGEST);
    assert_eq!(specs[0].command, argv(&["deploy", "aslive", "42"]));
    assert_eq!(specs[0].working_dir, dir.path());
    assert_eq!(
        specs[0].mounts,
        vec![
            Mount::same_path(dir.path(), false),
            Mount::same_path("/var/run/docker.sock", true),
        ]
    );
    assert_eq!(specs[0].environment.get("AWS_ACCESS_KEY_ID").map(String::as_str), Some("id"));

    assert_eq!(
        store.requests(),
        vec![
            (
                "acme-account-resources".to_string(),
                "account-scheme.json".to_string()
            ),
            ("nb".to_string(), "nk".to_string()),
            ("new-releases".to_string(), "t/widget/widget-42.zip".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_deploy_with_explicit_component_skips_upgrade() {
    let dir = project(MANIFEST);
    let store = Arc::new(forwarding_store());
    let runner = RecordingRunner::new(0);
    let manager = manager(dir.path(), store.clone(), None, &runner, &[]);

    manager
        .run(&argv(&["deploy", "aslive", "--component", "widget", "42"]))
        .await
        .unwrap();

    assert_eq!(runner.specs()[0].image, "old@sha256:1");
    assert!(!store.requests().iter().any(|(bucket, _)| bucket == "nb"));
}

#[tokio::test]
async fn test_deploy_classic_metadata_handling_uses_classic_key() {
    let dir = project(MANIFEST);
    let store = Arc::new(
        MemoryStore::new()
            .with_object(
                "acme-account-resources",
                "account-scheme.json",
                r#"{"release-bucket": "releases", "classic-metadata-handling": true}"#,
            )
            .with_metadata("releases", "widget/widget-42.zip", [("cdflow_image_digest", DIGEST)]),
    );
    let runner = RecordingRunner::new(0);
    let manager = manager(dir.path(), store.clone(), None, &runner, &[]);

    manager
        .run(&argv(&["deploy", "aslive", "42", "-c", "widget"]))
        .await
        .unwrap();

    assert_eq!(runner.specs()[0].image, DIGEST);
    assert_eq!(
        store.requests().last().unwrap(),
        &("releases".to_string(), "widget/widget-42.zip".to_string())
    );
}

#[tokio::test]
async fn test_deploy_without_team_uses_classic_key() {
    let dir = project("account-scheme-url: s3://acme-account-resources/account-scheme.json\n");
    let store = Arc::new(
        MemoryStore::new()
            .with_object(
                "acme-account-resources",
                "account-scheme.json",
                r#"{"release-bucket": "releases"}"#,
            )
            .with_metadata("releases", "widget/widget-42.zip", [("cdflow_image_digest", DIGEST)]),
    );
    let runner = RecordingRunner::new(0);
    let manager = manager(dir.path(), store, Some("https://github.com/org/widget"), &runner, &[]);

    manager.run(&argv(&["deploy", "aslive", "42"])).await.unwrap();
    assert_eq!(runner.specs()[0].image, DIGEST);
}

#[tokio::test]
async fn test_deploy_via_tag_discovery() {
    let dir = project("team: t\n");
    let store = Arc::new(
        MemoryStore::new()
            .with_tagged_bucket("releases", &["cdflow-releases"])
            .with_tagged_bucket("logs", &["team"])
            .with_metadata("releases", "widget/widget-42.zip", [("cdflow_image_digest", DIGEST)]),
    );
    let runner = RecordingRunner::new(0);
    let manager = manager(
        dir.path(),
        store,
        Some("git@github.com:org/widget.git"),
        &runner,
        &["--account-scheme-source", "tag-discovery"],
    );

    manager.run(&argv(&["deploy", "aslive", "42"])).await.unwrap();
    assert_eq!(runner.specs()[0].image, DIGEST);
}

#[tokio::test]
async fn test_tag_discovery_without_manifest_file() {
    let dir = tempdir().unwrap();
    let store = Arc::new(
        MemoryStore::new()
            .with_tagged_bucket("releases", &["cdflow-releases"])
            .with_metadata("releases", "widget/widget-42.zip", [("cdflow_image_digest", DIGEST)]),
    );
    let runner = RecordingRunner::new(0);
    let manager = manager(
        dir.path(),
        store,
        Some("git@github.com:org/widget.git"),
        &runner,
        &["--account-scheme-source", "tag-discovery"],
    );

    manager.run(&argv(&["deploy", "aslive", "42"])).await.unwrap();
    assert_eq!(runner.specs()[0].image, DIGEST);
}

#[tokio::test]
async fn test_explicit_url_without_manifest_file_is_manifest_error() {
    let dir = tempdir().unwrap();
    let runner = RecordingRunner::new(0);
    let manager = manager(dir.path(), Arc::new(forwarding_store()), None, &runner, &[]);

    let err = manager
        .run(&argv(&["deploy", "aslive", "42", "-c", "widget"]))
        .await
        .unwrap_err();
    assert!(matches!(err, CdflowError::Manifest { .. }));
}

#[tokio::test]
async fn test_deploy_mounts_given_platform_configs_read_only() {
    let dir = project(MANIFEST);
    let runner = RecordingRunner::new(0);
    let manager = manager(dir.path(), Arc::new(forwarding_store()), None, &runner, &[]);

    manager
        .run(&argv(&[
            "deploy",
            "--platform-config",
            "good",
            "aslive",
            "42",
            "-c",
            "widget",
            "--platform-config",
        ]))
        .await
        .unwrap();

    assert_eq!(
        runner.specs()[0].mounts,
        vec![
            Mount::same_path(dir.path(), false),
            Mount::same_path("/var/run/docker.sock", true),
            Mount::same_path(dir.path().join("good"), true),
        ]
    );
}

#[tokio::test]
async fn test_deploy_without_remote_is_git_remote_error() {
    let dir = project(MANIFEST);
    let runner = RecordingRunner::new(0);
    let manager = manager(dir.path(), Arc::new(forwarding_store()), None, &runner, &[]);

    let err = manager.run(&argv(&["deploy", "aslive", "42"])).await.unwrap_err();
    assert!(matches!(err, CdflowError::GitRemote));
    assert!(runner.specs().is_empty());
}

#[tokio::test]
async fn test_deploy_without_version() {
    let dir = project(MANIFEST);
    let runner = RecordingRunner::new(0);
    let manager = manager(dir.path(), Arc::new(forwarding_store()), None, &runner, &[]);

    let err = manager.run(&argv(&["deploy", "aslive", "-c", "widget"])).await.unwrap_err();
    assert!(matches!(err, CdflowError::MissingVersion(_)));
}

#[tokio::test]
async fn test_deploy_unknown_release_is_not_found() {
    let dir = project(MANIFEST);
    let runner = RecordingRunner::new(0);
    let manager = manager(dir.path(), Arc::new(forwarding_store()), None, &runner, &[]);

    let err = manager
        .run(&argv(&["deploy", "aslive", "43", "-c", "widget"]))
        .await
        .unwrap_err();
    assert!(matches!(err, CdflowError::Storage(StorageError::NotFound { .. })));
    assert!(runner.specs().is_empty());
}

#[tokio::test]
async fn test_deploy_scheme_without_release_bucket() {
    let dir = project(MANIFEST);
    let store = Arc::new(MemoryStore::new().with_object(
        "acme-account-resources",
        "account-scheme.json",
        r#"{"classic-metadata-handling": true}"#,
    ));
    let runner = RecordingRunner::new(0);
    let manager = manager(dir.path(), store, None, &runner, &[]);

    let err = manager
        .run(&argv(&["deploy", "aslive", "42", "-c", "widget"]))
        .await
        .unwrap_err();
    assert!(matches!(err, CdflowError::MissingReleaseBucket(_)));
}

#[tokio::test]
async fn test_release_pins_command_image_digest() {
    let dir = project("");
    let store = Arc::new(MemoryStore::new());
    let runner = RecordingRunner::new(3);
    let manager = manager(
        dir.path(),
        store.clone(),
        None,
        &runner,
        &["--image", "example/commands:pinned"],
    );

    let exit_code = manager
        .run(&argv(&["release", "--platform-config", "platform/aslive", "42"]))
        .await
        .unwrap();
    assert_eq!(exit_code, 3);

    let specs = runner.specs();
    assert_eq!(specs[0].image, "example/commands:pinned");
    assert_eq!(
        specs[0].environment.get("CDFLOW_IMAGE_DIGEST").map(String::as_str),
        Some("example/commands:pinned@sha256:feed")
    );
    assert_eq!(
        specs[0].mounts.last(),
        Some(&Mount::same_path(dir.path().join("platform/aslive"), true))
    );
    assert!(store.requests().is_empty());
}

#[tokio::test]
async fn test_release_requires_platform_config() {
    let dir = project("");
    let runner = RecordingRunner::new(0);
    let manager = manager(dir.path(), Arc::new(MemoryStore::new()), None, &runner, &[]);

    let err = manager.run(&argv(&["release", "42"])).await.unwrap_err();
    assert!(matches!(err, CdflowError::MissingPlatformConfig));
    assert!(runner.pulled.lock().unwrap().is_empty());
    assert!(runner.specs().is_empty());
}

#[tokio::test]
async fn test_other_commands_use_command_image() {
    let dir = project("");
    let store = Arc::new(MemoryStore::new());
    let runner = RecordingRunner::new(0);
    let manager = manager(dir.path(), store.clone(), None, &runner, &[]);

    manager.run(&argv(&["shell", "aslive", "-v"])).await.unwrap();

    let specs = runner.specs();
    assert_eq!(specs[0].image, "mergermarket/cdflow-commands:latest");
    assert!(!specs[0].environment.contains_key("CDFLOW_IMAGE_DIGEST"));
    assert!(store.requests().is_empty());
}
