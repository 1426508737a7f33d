// ABOUTME: Configuration for image build/publish and the application Helm release.
// ABOUTME: The registry credential is read from an environment variable at run time.

use super::EnvValue;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Registry location, e.g. `ghcr.io/org/app`. Takes precedence over `url_output`.
    pub url: Option<String>,
    /// Provisioning output holding the registry location.
    pub url_output: Option<String>,
    pub username: String,
    /// Environment variable holding the registry password or token.
    pub credential_env: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: None,
            url_output: Some("ecr_repository_url".to_string()),
            username: "AWS".to_string(),
            credential_env: "REGISTRY_PASSWORD".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub context: PathBuf,
    pub dockerfile: Option<PathBuf>,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            context: PathBuf::from("."),
            dockerfile: None,
            timeout: Duration::from_secs(20 * 60),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReleaseConfig {
    /// Chart path or `repo/chart` reference.
    pub chart: String,
    pub values: Vec<PathBuf>,
    /// Extra `--set` overrides.
    pub set: BTreeMap<String, EnvValue>,
    /// Rendered as `features.<name>=<bool>`.
    pub features: BTreeMap<String, bool>,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Pod selector to wait on. Defaults to the Helm instance label.
    pub selector: Option<String>,
    /// Revisions requested from `helm history`.
    pub history_max: u32,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            chart: "chart".to_string(),
            values: Vec::new(),
            set: BTreeMap::new(),
            features: BTreeMap::new(),
            timeout: Duration::from_secs(300),
            selector: None,
            history_max: 10,
        }
    }
}
