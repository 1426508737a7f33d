// ABOUTME: image-build-and-publish: docker build, tag, and push to the resolved registry.
// ABOUTME: Without a registry credential the push is skipped with a warning.

use async_trait::async_trait;
use std::path::PathBuf;

use super::{path_arg, tool};
use crate::config::{Config, RegistryConfig};
use crate::diagnostics::Warning;
use crate::invoke::Invocation;
use crate::stage::{PipelineState, Stage, StageAction, StageContext, StageError, StageId};
use crate::types::ImageRef;

pub(super) fn stage(config: &Config) -> Stage {
    let dockerfile = config
        .build
        .dockerfile
        .as_ref()
        .map(|path| path_arg(config, path));

    Stage::new(StageId::ImageBuildAndPublish).action(BuildAndPublish {
        base: tool(config, &config.tools.docker),
        build_timeout: config.build.timeout,
        context: config.path(&config.build.context),
        dockerfile,
        image: config.image.clone(),
        registry: config.registry.clone(),
    })
}

/// Where the built image should be published.
///
/// A configured `registry.url` wins; otherwise the provisioning output named
/// by `registry.url_output` is used.
pub fn resolve_publish_target(
    image: &ImageRef,
    registry: &RegistryConfig,
    state: &PipelineState,
) -> Result<ImageRef, StageError> {
    let location = match (&registry.url, &registry.url_output) {
        (Some(url), _) => url.clone(),
        (None, Some(key)) => state
            .output(key)
            .map(str::to_string)
            .ok_or_else(|| StageError::Prerequisite {
                stage: StageId::ImageBuildAndPublish,
                requirement: format!("provisioning output '{}' or registry.url", key),
            })?,
        (None, None) => {
            return Err(StageError::Configuration {
                message: "registry.url or registry.url_output must be set".to_string(),
            });
        }
    };

    image
        .retarget(&location)
        .map_err(|e| StageError::Configuration {
            message: format!("invalid registry location '{}': {}", location, e),
        })
}

struct BuildAndPublish {
    base: Invocation,
    build_timeout: std::time::Duration,
    context: PathBuf,
    dockerfile: Option<String>,
    image: ImageRef,
    registry: RegistryConfig,
}

impl BuildAndPublish {
    fn docker(&self) -> Invocation {
        self.base.clone()
    }
}

#[async_trait]
impl StageAction for BuildAndPublish {
    fn describe(&self) -> String {
        format!("build and publish {}", self.image)
    }

    async fn run(&self, ctx: &mut StageContext<'_>) -> Result<(), StageError> {
        let target = resolve_publish_target(&self.image, &self.registry, &*ctx.state)?;
        let local = self.image.to_string();
        let remote = target.to_string();

        let mut build = self
            .docker()
            .timeout(self.build_timeout)
            .args(["build".to_string(), "-t".to_string(), local.clone()]);
        if let Some(dockerfile) = &self.dockerfile {
            build = build.args(["-f".to_string(), dockerfile.clone()]);
        }
        let build = build.arg(self.context.display().to_string());
        ctx.invoke(&build).await?;

        let tag = self.docker().args(["tag".to_string(), local, remote.clone()]);
        ctx.invoke(&tag).await?;

        let credential = std::env::var(&self.registry.credential_env)
            .ok()
            .filter(|value| !value.is_empty());
        let Some(password) = credential else {
            ctx.warn(Warning::missing_credential(format!(
                "{} is not set; built {} but did not push it",
                self.registry.credential_env, remote
            )));
            return Ok(());
        };

        let mut login = self
            .docker()
            .args(["login", "--username", self.registry.username.as_str()])
            .arg("--password-stdin")
            .stdin(password.clone())
            .secret(password);
        if let Some(host) = target.registry() {
            login = login.arg(host);
        }
        ctx.invoke(&login).await?;

        let push = self
            .docker()
            .timeout(self.build_timeout)
            .args(["push".to_string(), remote.clone()]);
        ctx.invoke(&push).await?;

        tracing::info!("Published {}", remote);
        ctx.state.image = Some(target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::ProvisioningOutputs;

    fn image() -> ImageRef {
        ImageRef::parse("demo-app:1.4.0").unwrap()
    }

    #[test]
    fn configured_url_wins_over_output() {
        let registry = RegistryConfig {
            url: Some("ghcr.io/acme/demo-app".to_string()),
            ..Default::default()
        };
        let mut state = PipelineState::new();
        state.outputs = Some(
            [(
                "ecr_repository_url".to_string(),
                "1.dkr.ecr.eu-west-1.amazonaws.com/demo".to_string(),
            )]
            .into_iter()
            .collect::<ProvisioningOutputs>(),
        );

        let target = resolve_publish_target(&image(), &registry, &state).unwrap();
        assert_eq!(target.to_string(), "ghcr.io/acme/demo-app:1.4.0");
    }

    #[test]
    fn falls_back_to_provisioning_output() {
        let registry = RegistryConfig::default();
        let mut state = PipelineState::new();
        state.outputs = Some(
            [(
                "ecr_repository_url".to_string(),
                "1.dkr.ecr.eu-west-1.amazonaws.com/demo".to_string(),
            )]
            .into_iter()
            .collect(),
        );

        let target = resolve_publish_target(&image(), &registry, &state).unwrap();
        assert_eq!(target.registry(), Some("1.dkr.ecr.eu-west-1.amazonaws.com"));
        assert_eq!(target.tag(), Some("1.4.0"));
    }

    #[test]
    fn missing_output_is_a_prerequisite_failure() {
        let state = PipelineState::new();
        let err = resolve_publish_target(&image(), &RegistryConfig::default(), &state).unwrap_err();
        assert_eq!(err.kind(), crate::stage::FailureKind::Prerequisite);
    }
}
