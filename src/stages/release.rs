// ABOUTME: application-release: helm upgrade --install with the value overlay.
// ABOUTME: Deploys the published image when there is one, otherwise the configured image.

use async_trait::async_trait;
use std::path::Path;

use super::{path_arg, pods_ready, tool};
use crate::config::Config;
use crate::stage::{Stage, StageAction, StageContext, StageError, StageId};
use crate::types::ImageRef;

pub(super) fn stage(config: &Config) -> Stage {
    let (probe, check) = pods_ready(
        config,
        &config.namespace,
        &config.release_selector(),
        config.release.timeout,
    );
    Stage::new(StageId::ApplicationRelease)
        .action(HelmRelease {
            config: config.clone(),
        })
        .post_check(probe, check)
}

/// The `helm upgrade --install` command for the application.
///
/// Overlay order: image, environment, feature flags, extra `set` values,
/// then values files. Values read from the environment are masked in logs.
pub fn release_invocation(
    config: &Config,
    image: &ImageRef,
) -> Result<crate::invoke::Invocation, StageError> {
    let release = &config.release;
    let chart = if config.path(Path::new(&release.chart)).exists() {
        path_arg(config, Path::new(&release.chart))
    } else {
        release.chart.clone()
    };

    let mut invocation = tool(config, &config.tools.helm)
        .timeout(release.timeout + config.command_timeout)
        .args([
            "upgrade".to_string(),
            "--install".to_string(),
            config.project.to_string(),
            chart,
            "-n".to_string(),
            config.namespace.clone(),
            "--create-namespace".to_string(),
        ])
        .args(set(format!("image.repository={}", image.repository())))
        .args(set(format!(
            "image.tag={}",
            image.tag().unwrap_or("latest")
        )))
        .args(set(format!("environment={}", config.environment)));

    for (name, enabled) in &release.features {
        invocation = invocation.args(set(format!("features.{}={}", name, enabled)));
    }

    for (key, value) in &release.set {
        let resolved = value.resolve().map_err(|e| StageError::Configuration {
            message: format!("release.set.{}: {}", key, e),
        })?;
        if value.is_from_env() {
            invocation = invocation.secret(resolved.clone());
        }
        invocation = invocation.args(set(format!("{}={}", key, resolved)));
    }

    for values in &release.values {
        invocation = invocation.args(["-f".to_string(), path_arg(config, values)]);
    }

    Ok(invocation.args([
        "--wait".to_string(),
        format!("--timeout={}s", release.timeout.as_secs()),
        format!("--history-max={}", release.history_max),
    ]))
}

fn set(assignment: String) -> [String; 2] {
    ["--set".to_string(), assignment]
}

struct HelmRelease {
    config: Config,
}

#[async_trait]
impl StageAction for HelmRelease {
    fn describe(&self) -> String {
        format!("helm upgrade --install {}", self.config.project)
    }

    async fn run(&self, ctx: &mut StageContext<'_>) -> Result<(), StageError> {
        let image = ctx
            .state
            .image
            .clone()
            .unwrap_or_else(|| self.config.image.clone());
        let invocation = release_invocation(&self.config, &image)?;
        ctx.invoke(&invocation).await?;
        tracing::info!("Released {} with {}", self.config.project, image);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvValue;

    #[test]
    fn overlay_carries_image_environment_and_features() {
        let mut config = Config::template();
        config.release.chart = "bitnami/nginx".to_string();
        config.release.features.insert("payments".to_string(), true);
        let image = ImageRef::parse("ghcr.io/acme/demo-app:2.0.0").unwrap();

        let invocation = release_invocation(&config, &image).unwrap();
        let line = invocation.to_string();

        assert!(line.starts_with("helm upgrade --install demo-app bitnami/nginx -n demo"));
        assert!(line.contains("--set image.repository=ghcr.io/acme/demo-app"));
        assert!(line.contains("--set image.tag=2.0.0"));
        assert!(line.contains("--set environment=staging"));
        assert!(line.contains("--set features.payments=true"));
        assert!(line.contains("--wait --timeout=300s"));
    }

    #[test]
    fn env_sourced_values_are_masked() {
        temp_env::with_var("ROLLOUT_TEST_DB_PASSWORD", Some("hunter2"), || {
            let mut config = Config::template();
            config.release.set.insert(
                "db.password".to_string(),
                EnvValue::FromEnv {
                    var: "ROLLOUT_TEST_DB_PASSWORD".to_string(),
                    default: None,
                },
            );
            let invocation = release_invocation(&config, &config.image).unwrap();

            assert!(invocation.args.contains(&"db.password=hunter2".to_string()));
            assert!(!invocation.to_string().contains("hunter2"));
        });
    }

    #[test]
    fn missing_env_value_is_a_configuration_error() {
        temp_env::with_var_unset("ROLLOUT_TEST_MISSING", || {
            let mut config = Config::template();
            config.release.set.insert(
                "token".to_string(),
                EnvValue::FromEnv {
                    var: "ROLLOUT_TEST_MISSING".to_string(),
                    default: None,
                },
            );
            let err = release_invocation(&config, &config.image).unwrap_err();
            assert_eq!(err.kind(), crate::stage::FailureKind::Configuration);
        });
    }
}
