// ABOUTME: Deploy command implementation.
// ABOUTME: Builds the stage catalogue, runs the pipeline, and writes the optional report.

use rollout::cancel::CancelToken;
use rollout::config::Config;
use rollout::diagnostics::Diagnostics;
use rollout::error::{Error, Result};
use rollout::invoke::{ProcessInvoker, ToolInvoker};
use rollout::output::Output;
use rollout::pipeline::{Pipeline, RunStatus};
use rollout::report::write_report;
use rollout::stage::SkipFlags;
use rollout::stages::catalogue;
use std::env;
use std::sync::Arc;

/// Run every stage of the rollout against the configured cluster.
pub async fn deploy(
    config: Config,
    flags: SkipFlags,
    report: bool,
    cancel: CancelToken,
    mut output: Output,
) -> Result<()> {
    output.start_timer();
    output.progress(&format!(
        "Deploying {} ({}) to namespace {} [{}]",
        config.project, config.image, config.namespace, config.environment
    ));

    let invoker: Arc<dyn ToolInvoker> = Arc::new(ProcessInvoker::new());
    let pipeline = Pipeline::new(catalogue(&config), Arc::clone(&invoker))?
        .with_cancel(cancel)
        .with_retry(config.retry);

    let run = pipeline.execute(flags, &output).await;
    output.run_finished(&run);

    // Emit collected warnings
    for warning in run.all_warnings() {
        output.warning(&warning.message);
    }

    if report {
        let cwd = env::current_dir()?;
        let mut diag = Diagnostics::default();
        if let Some(path) = write_report(&cwd, &run, &config, invoker.as_ref(), &mut diag).await {
            output.progress(&format!("Report written to {}", path.display()));
        }
        for warning in diag.warnings() {
            output.warning(&warning.message);
        }
    }

    match run.status {
        RunStatus::Failed => {
            let (stage, reason) = match run.failed_stage() {
                Some(record) => (
                    record.stage.to_string(),
                    record
                        .outcome
                        .failure()
                        .map(|f| f.message.clone())
                        .unwrap_or_default(),
                ),
                None => ("unknown".to_string(), "run failed".to_string()),
            };
            Err(Error::DeploymentFailed { stage, reason })
        }
        RunStatus::PartialSkip => {
            output.success("Nothing to do: every stage was skipped");
            Ok(())
        }
        RunStatus::Success => {
            output.success("Rollout complete!");
            Ok(())
        }
    }
}
