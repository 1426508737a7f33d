// ABOUTME: Configuration types and parsing for rollout.yml.
// ABOUTME: Handles YAML parsing, defaults for every stage, and environment merging.

mod deserialize;
mod env_value;
mod init;
mod platform;
mod release;
mod tools;
mod verify;

pub use env_value::{EnvValue, resolve_env_map};
pub use init::init_config;
pub use platform::{ClusterConfig, InfrastructureConfig, IngressConfig, MonitoringConfig};
pub use release::{BuildConfig, RegistryConfig, ReleaseConfig};
pub use tools::{RetryConfig, ToolsConfig};
pub use verify::VerifyConfig;

use crate::error::{Error, Result};
use crate::types::{ImageRef, ReleaseName};
use deserialize::{deserialize_image_ref, deserialize_release_name};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "rollout.yml";
pub const CONFIG_FILENAME_ALT: &str = "rollout.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".rollout/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Project name, also the Helm release name of the application.
    #[serde(deserialize_with = "deserialize_release_name")]
    pub project: ReleaseName,

    /// Image built locally and released.
    #[serde(deserialize_with = "deserialize_image_ref")]
    pub image: ImageRef,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_environment")]
    pub environment: String,

    /// Default timeout for any single tool invocation.
    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command_timeout: Duration,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub infrastructure: InfrastructureConfig,

    #[serde(default)]
    pub cluster: ClusterConfig,

    #[serde(default)]
    pub ingress: IngressConfig,

    #[serde(default)]
    pub monitoring: MonitoringConfig,

    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub release: ReleaseConfig,

    #[serde(default)]
    pub verify: VerifyConfig,

    #[serde(default)]
    pub environments: HashMap<String, EnvironmentOverride>,

    /// Directory the configuration was loaded from. Relative paths resolve here.
    #[serde(skip)]
    pub root: PathBuf,
}

/// Per-environment overrides merged over the base configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct EnvironmentOverride {
    #[serde(default)]
    pub namespace: Option<String>,

    /// Extra values files, applied after the base ones.
    #[serde(default)]
    pub values: Vec<PathBuf>,

    #[serde(default)]
    pub set: BTreeMap<String, EnvValue>,

    #[serde(default)]
    pub features: BTreeMap<String, bool>,

    #[serde(default)]
    pub registry_url: Option<String>,
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_environment() -> String {
    "staging".to_string()
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(600)
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;
        config.root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        // `.rollout/config.yml` belongs to the project one level up.
        if config.root.ends_with(".rollout")
            && let Some(parent) = config.root.parent()
        {
            config.root = parent.to_path_buf();
        }
        Ok(config)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Load from an explicit path, or discover in `dir`.
    pub fn resolve(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => Self::discover(dir),
        }
    }

    pub fn for_environment(&self, name: &str) -> Result<Config> {
        let overrides = self
            .environments
            .get(name)
            .ok_or_else(|| Error::UnknownEnvironment(name.to_string()))?;

        let mut merged = self.clone();
        merged.environment = name.to_string();

        if let Some(ref namespace) = overrides.namespace {
            merged.namespace = namespace.clone();
        }

        merged
            .release
            .values
            .extend(overrides.values.iter().cloned());

        for (k, v) in &overrides.set {
            merged.release.set.insert(k.clone(), v.clone());
        }

        for (k, v) in &overrides.features {
            merged.release.features.insert(k.clone(), *v);
        }

        if overrides.registry_url.is_some() {
            merged.registry.url = overrides.registry_url.clone();
        }

        Ok(merged)
    }

    /// Resolve a configured path against the project root.
    pub fn path(&self, relative: &Path) -> PathBuf {
        if relative.is_absolute() {
            relative.to_path_buf()
        } else {
            self.root.join(relative)
        }
    }

    /// Service that verification tunnels into. Defaults to the project name.
    pub fn verify_service(&self) -> &str {
        self.verify
            .service
            .as_deref()
            .unwrap_or(self.project.as_str())
    }

    /// Pod selector for the application release.
    pub fn release_selector(&self) -> String {
        self.release
            .selector
            .clone()
            .unwrap_or_else(|| self.project.instance_selector())
    }

    fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(Error::InvalidConfig(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.verify.deadline.is_zero() {
            return Err(Error::InvalidConfig(
                "verify.deadline must be greater than zero".to_string(),
            ));
        }
        if self.verify.local_port == self.monitoring.local_port {
            return Err(Error::InvalidConfig(format!(
                "verify.local_port and monitoring.local_port are both {}",
                self.verify.local_port
            )));
        }
        Ok(())
    }

    pub fn template() -> Self {
        Config {
            project: ReleaseName::new("demo-app").expect("template name is valid"),
            image: ImageRef::parse("demo-app:latest").expect("template image is valid"),
            namespace: "demo".to_string(),
            environment: default_environment(),
            command_timeout: default_command_timeout(),
            tools: ToolsConfig::default(),
            retry: RetryConfig::default(),
            infrastructure: InfrastructureConfig::default(),
            cluster: ClusterConfig::default(),
            ingress: IngressConfig::default(),
            monitoring: MonitoringConfig::default(),
            registry: RegistryConfig::default(),
            build: BuildConfig::default(),
            release: ReleaseConfig::default(),
            verify: VerifyConfig::default(),
            environments: HashMap::new(),
            root: PathBuf::from("."),
        }
    }
}
