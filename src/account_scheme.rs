//! Locating the account scheme: the document that says which bucket holds
//! releases and how their metadata keys are laid out.
//!
//! Explicit scheme URLs may carry an `upgrade-account-scheme` record that
//! forwards whitelisted teams or components to a newer scheme. Forwarding is
//! followed at most once; the forwarded document's own upgrade record is
//! never consulted.

use std::str::FromStr;

use clap::ValueEnum;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{CdflowError, Result};
use crate::manifest::Manifest;
use crate::storage::{ObjectStore, StorageLocator};

/// Tag key marking the release bucket under tag discovery.
pub const RELEASES_TAG: &str = "cdflow-releases";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AccountScheme {
    #[serde(default)]
    pub release_bucket: Option<String>,
    #[serde(default)]
    pub classic_metadata_handling: bool,
    #[serde(default)]
    pub upgrade_account_scheme: Option<UpgradeRecord>,
    /// Where this scheme was read from or how it was derived.
    #[serde(skip)]
    pub location: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UpgradeRecord {
    #[serde(default)]
    pub team_whitelist: Vec<String>,
    #[serde(default)]
    pub component_whitelist: Vec<String>,
    pub new_url: String,
}

impl UpgradeRecord {
    pub fn applies_to(&self, team: Option<&str>, component: &str) -> bool {
        team.is_some_and(|team| self.team_whitelist.iter().any(|t| t == team))
            || self.component_whitelist.iter().any(|c| c == component)
    }
}

impl AccountScheme {
    pub fn release_bucket(&self) -> Result<&str> {
        self.release_bucket
            .as_deref()
            .ok_or_else(|| CdflowError::MissingReleaseBucket(self.location.clone()))
    }

    /// The team to address release metadata under, or `None` for the classic
    /// layout.
    pub fn metadata_team<'a>(&self, team: Option<&'a str>) -> Option<&'a str> {
        if self.classic_metadata_handling {
            None
        } else {
            team
        }
    }
}

async fn fetch_scheme(store: &dyn ObjectStore, url: &str) -> Result<AccountScheme> {
    let locator = StorageLocator::parse(url)?;
    debug!(bucket = %locator.bucket, key = %locator.key, "fetching account scheme");
    let body = store.get_object(&locator.bucket, &locator.key).await?;
    let mut scheme: AccountScheme =
        serde_json::from_slice(&body).map_err(|source| CdflowError::SchemeParse {
            url: url.to_string(),
            source,
        })?;
    scheme.location = locator.to_string();
    Ok(scheme)
}

/// Fetches the scheme at `url`, following its upgrade record once when the
/// team or component is whitelisted. An explicit component override on the
/// command line disables forwarding.
pub async fn resolve_account_scheme(
    store: &dyn ObjectStore,
    url: &str,
    team: Option<&str>,
    component: &str,
    component_override_present: bool,
) -> Result<AccountScheme> {
    let scheme = fetch_scheme(store, url).await?;

    let Some(upgrade) = &scheme.upgrade_account_scheme else {
        return Ok(scheme);
    };
    if component_override_present {
        debug!("component given explicitly, not following account scheme upgrade");
        return Ok(scheme);
    }
    if !upgrade.applies_to(team, component) {
        return Ok(scheme);
    }

    info!(from = url, to = %upgrade.new_url, "following account scheme upgrade");
    fetch_scheme(store, &upgrade.new_url).await
}

/// How the account scheme for a deploy is found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum AccountSchemeSource {
    /// `account-scheme-url` from the manifest, with upgrade forwarding.
    #[default]
    ExplicitUrl,
    /// Release bucket named after the manifest's `account-prefix`.
    PrefixConvention,
    /// The single bucket tagged `cdflow-releases`.
    TagDiscovery,
}

impl FromStr for AccountSchemeSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}

impl AccountSchemeSource {
    pub async fn resolve(
        self,
        store: &dyn ObjectStore,
        manifest: &Manifest,
        component: &str,
        component_override_present: bool,
    ) -> Result<AccountScheme> {
        match self {
            Self::ExplicitUrl => {
                let url = manifest
                    .account_scheme_url
                    .as_deref()
                    .ok_or(CdflowError::MissingManifestField("account-scheme-url"))?;
                resolve_account_scheme(
                    store,
                    url,
                    manifest.team.as_deref(),
                    component,
                    component_override_present,
                )
                .await
            }
            Self::PrefixConvention => {
                let prefix = manifest
                    .account_prefix
                    .as_deref()
                    .ok_or(CdflowError::MissingManifestField("account-prefix"))?;
                Ok(AccountScheme {
                    release_bucket: Some(format!("{prefix}-{RELEASES_TAG}")),
                    location: format!("account prefix '{prefix}'"),
                    ..AccountScheme::default()
                })
            }
            Self::TagDiscovery => {
                let bucket = discover_release_bucket(store).await?;
                Ok(AccountScheme {
                    release_bucket: Some(bucket),
                    classic_metadata_handling: true,
                    location: format!("bucket tagged '{RELEASES_TAG}'"),
                    ..AccountScheme::default()
                })
            }
        }
    }
}

async fn discover_release_bucket(store: &dyn ObjectStore) -> Result<String> {
    let mut tagged = Vec::new();
    for bucket in store.list_buckets().await? {
        match store.bucket_tag_keys(&bucket).await {
            Ok(keys) if keys.iter().any(|k| k == RELEASES_TAG) => tagged.push(bucket),
            Ok(_) => {}
            // untaggable or tagless buckets are simply not candidates
            Err(e) => debug!(bucket = %bucket, error = %e, "no tags readable"),
        }
    }

    match tagged.len() {
        0 => Err(CdflowError::MissingBucket(RELEASES_TAG.to_string())),
        1 => Ok(tagged.remove(0)),
        _ => Err(CdflowError::MultipleBuckets(RELEASES_TAG.to_string())),
    }
}
