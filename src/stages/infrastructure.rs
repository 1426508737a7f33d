// ABOUTME: infrastructure-provision: terraform init, plan, apply, and output capture.
// ABOUTME: The plan file lives in the temp dir and is removed by stage cleanup.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{path_arg, tool};
use crate::cleanup::CleanupAction;
use crate::config::Config;
use crate::invoke::Invocation;
use crate::stage::{ProvisioningOutputs, Stage, StageAction, StageContext, StageError, StageId};

pub(super) fn stage(config: &Config) -> Stage {
    let terraform = &config.tools.terraform;
    let dir = path_arg(config, &config.infrastructure.dir);
    let plan = plan_path(config.project.as_str());
    let plan_arg = plan.display().to_string();

    Stage::new(StageId::InfrastructureProvision)
        .cleanup(CleanupAction::RemoveFile(plan))
        .invoke(
            tool(config, terraform)
                .cwd(&dir)
                .args(["init", "-input=false"]),
        )
        .invoke(
            tool(config, terraform)
                .cwd(&dir)
                .args(["plan", "-input=false"])
                .arg(format!("-out={}", plan_arg)),
        )
        .invoke(
            tool(config, terraform)
                .cwd(&dir)
                .timeout(config.infrastructure.apply_timeout)
                .args(["apply", "-input=false", "-auto-approve"])
                .arg(plan_arg),
        )
        .action(CaptureOutputs {
            invocation: tool(config, terraform)
                .cwd(&dir)
                .args(["output", "-json"]),
        })
}

fn plan_path(project: &str) -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let pid = std::process::id();
    let count = COUNTER.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir().join(format!("rollout-{}-{}-{}.tfplan", project, pid, count))
}

/// Reads `terraform output -json` into the pipeline state.
struct CaptureOutputs {
    invocation: Invocation,
}

#[async_trait]
impl StageAction for CaptureOutputs {
    fn describe(&self) -> String {
        self.invocation.to_string()
    }

    async fn run(&self, ctx: &mut StageContext<'_>) -> Result<(), StageError> {
        let result = ctx.invoke(&self.invocation).await?;
        let outputs = ProvisioningOutputs::from_terraform_json(&result.stdout).map_err(|reason| {
            StageError::UnexpectedOutput {
                program: self.invocation.program.clone(),
                reason,
            }
        })?;
        tracing::info!("Captured {} provisioning output(s)", outputs.len());
        ctx.state.outputs = Some(outputs);
        Ok(())
    }
}
