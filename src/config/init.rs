// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates a commented rollout.yml template.

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{ImageRef, ReleaseName};

use super::{CONFIG_FILENAME, Config};

pub fn init_config(
    dir: &Path,
    project: Option<&str>,
    image: Option<&str>,
    force: bool,
) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let mut config = Config::template();

    if let Some(p) = project {
        config.project = ReleaseName::new(p).map_err(|e| Error::InvalidConfig(e.to_string()))?;
    }

    if let Some(i) = image {
        config.image = ImageRef::parse(i).map_err(|e| Error::InvalidConfig(e.to_string()))?;
    }

    let yaml = generate_template_yaml(&config);
    std::fs::write(&config_path, yaml)?;

    Ok(())
}

fn generate_template_yaml(config: &Config) -> String {
    format!(
        r#"project: {project}
image: {image}
namespace: {namespace}
environment: {environment}

infrastructure:
  dir: terraform

registry:
  # Location to publish to; falls back to the `ecr_repository_url` output.
  # url: ghcr.io/my-org/{project}
  credential_env: REGISTRY_PASSWORD

release:
  chart: helm/{project}
  features: {{}}

verify:
  health_path: /health
  health_token: healthy
  endpoints: []

# environments:
#   production:
#     namespace: {project}-prod
"#,
        project = config.project,
        image = config.image,
        namespace = config.namespace,
        environment = config.environment,
    )
}
