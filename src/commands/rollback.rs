// ABOUTME: Rollback command implementation.
// ABOUTME: Reverts the application release to a previous Helm revision.

use rollout::cancel::CancelToken;
use rollout::config::Config;
use rollout::error::{Error, Result};
use rollout::invoke::{Invocation, ProcessInvoker, ToolInvoker};
use rollout::output::Output;
use rollout::readiness::{CommandProbe, ReadinessCheck, wait_until_ready};
use rollout::stages::{latest_revision, parse_history};
use std::sync::Arc;

/// Roll back to `revision`, or to the previous revision when none is given.
pub async fn rollback(
    config: Config,
    revision: Option<u32>,
    cancel: CancelToken,
    mut output: Output,
) -> Result<()> {
    output.start_timer();
    let invoker: Arc<dyn ToolInvoker> = Arc::new(ProcessInvoker::new());
    let namespace = config.namespace.as_str();

    output.progress(&format!(
        "Rolling back {} in namespace {}",
        config.project, namespace
    ));

    let mut rollback = Invocation::new(&config.tools.helm)
        .args(["rollback", config.project.as_str()])
        .timeout(config.release.timeout + config.command_timeout);
    if let Some(revision) = revision {
        rollback = rollback.arg(revision.to_string());
    }
    let rollback = rollback.args([
        "-n".to_string(),
        namespace.to_string(),
        "--wait".to_string(),
        format!("--timeout={}s", config.release.timeout.as_secs()),
    ]);
    invoker.invoke(&rollback).await?;

    output.progress("  → Waiting for pods...");
    let pods_ready = Invocation::new(&config.tools.kubectl)
        .args(["wait", "--for=condition=ready", "pod", "-n", namespace, "-l"])
        .arg(config.release_selector())
        .arg(format!(
            "--timeout={}s",
            config.cluster.poll_interval.as_secs().max(1)
        ))
        .timeout(config.command_timeout);
    let probe = CommandProbe::new(Arc::clone(&invoker), pods_ready);
    let check = ReadinessCheck::new(config.cluster.poll_interval, config.release.timeout);
    wait_until_ready(&probe, check, &cancel).await?;

    let history = Invocation::new(&config.tools.helm)
        .args(["history", config.project.as_str(), "-n", namespace, "-o", "json"])
        .timeout(config.command_timeout);
    let history = invoker.invoke(&history).await?;
    let entries = parse_history(&history.stdout).map_err(|reason| Error::DeploymentFailed {
        stage: "rollback".to_string(),
        reason,
    })?;

    match latest_revision(&entries) {
        Some(latest) if latest.status == "deployed" => {
            output.success(&format!("Rolled back to revision {}", latest.revision));
            Ok(())
        }
        Some(latest) => Err(Error::DeploymentFailed {
            stage: "rollback".to_string(),
            reason: format!("revision {} is {}", latest.revision, latest.status),
        }),
        None => Err(Error::DeploymentFailed {
            stage: "rollback".to_string(),
            reason: "release has no revisions".to_string(),
        }),
    }
}
