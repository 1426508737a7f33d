// ABOUTME: The standard rollout catalogue: eight stages built from configuration.
// ABOUTME: Shared helpers for tool invocations, pod readiness checks, and stage prerequisites.

mod cluster;
mod image;
mod infrastructure;
mod ingress;
mod monitoring;
mod release;
mod verify;

pub use image::resolve_publish_target;
pub use release::release_invocation;
pub use verify::{HistoryEntry, MetricSample, latest_revision, parse_exposition, parse_history};

use async_trait::async_trait;
use std::path::Path;

use crate::config::Config;
use crate::invoke::Invocation;
use crate::readiness::ReadinessCheck;
use crate::stage::{ProbeSpec, Stage, StageAction, StageContext, StageError, StageId};

/// Build every stage in catalogue order.
pub fn catalogue(config: &Config) -> Vec<Stage> {
    vec![
        infrastructure::stage(config),
        cluster::stage(config),
        ingress::controller_stage(config),
        monitoring::stage(config),
        image::stage(config),
        release::stage(config),
        ingress::rule_stage(config),
        verify::stage(config),
    ]
}

/// A tool invocation bounded by the default command timeout.
pub(crate) fn tool(config: &Config, program: &str) -> Invocation {
    Invocation::new(program).timeout(config.command_timeout)
}

pub(crate) fn path_arg(config: &Config, path: &Path) -> String {
    config.path(path).display().to_string()
}

/// `kubectl wait` for pods matching `selector`, polled until `deadline`.
pub(crate) fn pods_ready(
    config: &Config,
    namespace: &str,
    selector: &str,
    deadline: std::time::Duration,
) -> (ProbeSpec, ReadinessCheck) {
    let poll = config.cluster.poll_interval;
    let invocation = tool(config, &config.tools.kubectl).args([
        "wait".to_string(),
        "--for=condition=ready".to_string(),
        "pod".to_string(),
        "-l".to_string(),
        selector.to_string(),
        "-n".to_string(),
        namespace.to_string(),
        format!("--timeout={}s", poll.as_secs().max(1)),
    ]);
    (
        ProbeSpec::Command(invocation),
        ReadinessCheck::new(poll, deadline),
    )
}

/// Fails with a prerequisite error unless `required` completed earlier in the run.
pub(crate) struct RequireStage {
    pub stage: StageId,
    pub required: StageId,
}

#[async_trait]
impl StageAction for RequireStage {
    fn describe(&self) -> String {
        format!("require {} completed", self.required)
    }

    async fn run(&self, ctx: &mut StageContext<'_>) -> Result<(), StageError> {
        if ctx.state.has_completed(self.required) {
            Ok(())
        } else {
            Err(StageError::Prerequisite {
                stage: self.stage,
                requirement: format!("{} to have completed", self.required),
            })
        }
    }
}
