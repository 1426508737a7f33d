// ABOUTME: Status command implementation.
// ABOUTME: Shows the Helm release state, its latest revision, and the application pods.

use rollout::config::Config;
use rollout::error::{Error, Result};
use rollout::invoke::{Invocation, ProcessInvoker, ToolInvoker};
use rollout::output::Output;
use rollout::stages::{latest_revision, parse_history};

pub async fn status(config: Config, output: Output) -> Result<()> {
    let invoker = ProcessInvoker::new();
    let namespace = config.namespace.as_str();

    let history = Invocation::new(&config.tools.helm)
        .args(["history", config.project.as_str(), "-n", namespace, "-o", "json"])
        .timeout(config.command_timeout);
    let history = invoker.invoke(&history).await?;
    let entries = parse_history(&history.stdout)
        .map_err(|reason| Error::DeploymentFailed {
            stage: "status".to_string(),
            reason,
        })?;

    output.progress(&format!("Project:     {}", config.project));
    output.progress(&format!("Environment: {}", config.environment));
    output.progress(&format!("Namespace:   {}", namespace));
    match latest_revision(&entries) {
        Some(latest) => output.success(&format!(
            "Revision {} {} ({}, app {})",
            latest.revision, latest.status, latest.chart, latest.app_version
        )),
        None => output.warning(&format!("{} has no release history", config.project)),
    }

    let pods = Invocation::new(&config.tools.kubectl)
        .args(["get", "pods", "-n", namespace, "-l"])
        .arg(config.release_selector())
        .timeout(config.command_timeout);
    let pods = invoker.invoke(&pods).await?;
    output.progress(pods.stdout.trim_end());
    Ok(())
}
