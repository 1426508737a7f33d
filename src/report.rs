// ABOUTME: Plain-text run report written after a deploy with --report.
// ABOUTME: Collection and write failures become warnings; they never change the verdict.

use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::diagnostics::{Diagnostics, Warning};
use crate::invoke::{Invocation, ToolInvoker};
use crate::pipeline::PipelineRun;

/// `rollout-report-<YYYYmmdd-HHMMSS>.txt` for a run started at `started`.
pub fn report_filename(started: DateTime<Local>) -> String {
    format!("rollout-report-{}.txt", started.format("%Y%m%d-%H%M%S"))
}

/// Cluster state captured for the report.
#[derive(Debug, Default)]
pub struct ClusterSnapshot {
    pub resources: Option<String>,
    pub history: Option<String>,
}

impl ClusterSnapshot {
    /// Run `kubectl get all` and `helm history`, turning failures into warnings.
    pub async fn collect(config: &Config, invoker: &dyn ToolInvoker, diag: &mut Diagnostics) -> Self {
        let resources = Invocation::new(&config.tools.kubectl)
            .args(["get", "all", "-n", config.namespace.as_str()])
            .timeout(config.command_timeout);
        let history = Invocation::new(&config.tools.helm)
            .args([
                "history",
                config.project.as_str(),
                "-n",
                config.namespace.as_str(),
            ])
            .timeout(config.command_timeout);

        Self {
            resources: capture(invoker, &resources, diag).await,
            history: capture(invoker, &history, diag).await,
        }
    }
}

async fn capture(
    invoker: &dyn ToolInvoker,
    invocation: &Invocation,
    diag: &mut Diagnostics,
) -> Option<String> {
    match invoker.invoke(invocation).await {
        Ok(result) => Some(result.stdout),
        Err(e) => {
            diag.warn(Warning::report_failed(format!(
                "could not collect `{}` for the report: {}",
                invocation, e
            )));
            None
        }
    }
}

/// Render the report body.
pub fn render(run: &PipelineRun, config: &Config, host: &str, snapshot: &ClusterSnapshot) -> String {
    let mut out = String::new();
    let started = run.started_at.with_timezone(&Local);
    let finished = run.finished_at.with_timezone(&Local);

    // Writing to a String cannot fail.
    let _ = writeln!(out, "Rollout report for {}", config.project);
    let _ = writeln!(out, "Host:        {}", host);
    let _ = writeln!(out, "Environment: {}", config.environment);
    let _ = writeln!(out, "Namespace:   {}", config.namespace);
    let _ = writeln!(out, "Started:     {}", started.to_rfc3339());
    let _ = writeln!(out, "Finished:    {}", finished.to_rfc3339());
    let _ = writeln!(out, "Verdict:     {}", run.status);
    if let Some(revision) = run.release_revision {
        let _ = writeln!(out, "Revision:    {}", revision);
    }

    let _ = writeln!(out, "\nStages:");
    for record in &run.stages {
        let _ = writeln!(
            out,
            "  {}. {} - {} ({:.1}s, {} command(s))",
            record.ordinal,
            record.stage,
            record.outcome,
            record.duration.as_secs_f64(),
            record.invocations
        );
    }
    for stage in &run.not_reached {
        let _ = writeln!(out, "  -  {} - not reached", stage);
    }

    let warnings = run.all_warnings();
    let _ = writeln!(out, "\nWarnings: {}", warnings.len());
    for warning in warnings {
        let _ = writeln!(out, "  - {}", warning.message);
    }

    section(&mut out, "kubectl get all", snapshot.resources.as_deref());
    section(&mut out, "helm history", snapshot.history.as_deref());
    out
}

fn section(out: &mut String, title: &str, body: Option<&str>) {
    let _ = writeln!(out, "\n== {} ==", title);
    match body {
        Some(text) if !text.trim().is_empty() => {
            let _ = writeln!(out, "{}", text.trim_end());
        }
        Some(_) => {
            let _ = writeln!(out, "(empty)");
        }
        None => {
            let _ = writeln!(out, "(not collected)");
        }
    }
}

/// Collect cluster state and write the report into `dir`.
///
/// Returns the written path, or `None` when writing failed (recorded as a
/// warning).
pub async fn write_report(
    dir: &Path,
    run: &PipelineRun,
    config: &Config,
    invoker: &dyn ToolInvoker,
    diag: &mut Diagnostics,
) -> Option<PathBuf> {
    let snapshot = ClusterSnapshot::collect(config, invoker, diag).await;
    let host = gethostname::gethostname().to_string_lossy().into_owned();
    let body = render(run, config, &host, &snapshot);

    let path = dir.join(report_filename(run.started_at.with_timezone(&Local)));
    match tokio::fs::write(&path, body).await {
        Ok(()) => {
            tracing::info!("Wrote report to {}", path.display());
            Some(path)
        }
        Err(e) => {
            diag.warn(Warning::report_failed(format!(
                "could not write {}: {}",
                path.display(),
                e
            )));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn filename_uses_compact_timestamp() {
        let started = Local.with_ymd_and_hms(2026, 3, 7, 9, 5, 1).unwrap();
        assert_eq!(report_filename(started), "rollout-report-20260307-090501.txt");
    }

    #[test]
    fn missing_sections_are_marked() {
        let mut out = String::new();
        section(&mut out, "helm history", None);
        section(&mut out, "kubectl get all", Some("  \n"));
        assert!(out.contains("== helm history ==\n(not collected)"));
        assert!(out.contains("== kubectl get all ==\n(empty)"));
    }
}
