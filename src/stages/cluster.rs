// ABOUTME: cluster-configure: kubeconfig from provisioning outputs, namespace, manifests.
// ABOUTME: Fails as a prerequisite error when provisioning outputs are missing.

use async_trait::async_trait;

use super::{path_arg, tool};
use crate::config::Config;
use crate::invoke::Invocation;
use crate::readiness::ReadinessCheck;
use crate::stage::{ProbeSpec, Stage, StageAction, StageContext, StageError, StageId};

pub(super) fn stage(config: &Config) -> Stage {
    let kubectl = &config.tools.kubectl;
    let namespace = &config.namespace;

    let mut stage = Stage::new(StageId::ClusterConfigure)
        .action(UpdateKubeconfig {
            base: tool(config, &config.tools.aws),
            cluster_name_output: config.infrastructure.cluster_name_output.clone(),
            region_output: config.infrastructure.region_output.clone(),
            enabled: config.cluster.update_kubeconfig,
        })
        .action(EnsureNamespace {
            namespace: namespace.clone(),
            lookup: tool(config, kubectl)
                .args(["get", "namespace", namespace.as_str()])
                .expect_exit_codes([0, 1]),
            create: tool(config, kubectl).args(["create", "namespace", namespace.as_str()]),
        });

    for manifest in &config.cluster.manifests {
        stage = stage.invoke(tool(config, kubectl).args([
            "apply".to_string(),
            "-f".to_string(),
            path_arg(config, manifest),
            "-n".to_string(),
            namespace.clone(),
        ]));
    }

    let poll = config.cluster.poll_interval;
    let nodes_ready = tool(config, kubectl).args([
        "wait".to_string(),
        "--for=condition=Ready".to_string(),
        "nodes".to_string(),
        "--all".to_string(),
        format!("--timeout={}s", poll.as_secs().max(1)),
    ]);
    stage.post_check(
        ProbeSpec::Command(nodes_ready),
        ReadinessCheck::new(poll, config.cluster.ready_timeout),
    )
}

struct UpdateKubeconfig {
    base: Invocation,
    cluster_name_output: String,
    region_output: String,
    enabled: bool,
}

#[async_trait]
impl StageAction for UpdateKubeconfig {
    fn describe(&self) -> String {
        format!("{} eks update-kubeconfig", self.base.program)
    }

    async fn run(&self, ctx: &mut StageContext<'_>) -> Result<(), StageError> {
        let stage = ctx.stage();
        if ctx.state.outputs.is_none() {
            return Err(StageError::Prerequisite {
                stage,
                requirement: "provisioning outputs".to_string(),
            });
        }
        let require = |key: &str| {
            ctx.state
                .output(key)
                .map(str::to_string)
                .ok_or_else(|| StageError::Prerequisite {
                    stage,
                    requirement: format!("provisioning output '{}'", key),
                })
        };
        let cluster = require(&self.cluster_name_output)?;
        let region = require(&self.region_output)?;

        if !self.enabled {
            tracing::debug!("kubeconfig update disabled, using current context");
            return Ok(());
        }

        let invocation = self.base.clone().args([
            "eks".to_string(),
            "update-kubeconfig".to_string(),
            "--name".to_string(),
            cluster,
            "--region".to_string(),
            region,
        ]);
        ctx.invoke(&invocation).await?;
        Ok(())
    }
}

/// Creates the namespace when `kubectl get namespace` exits 1.
struct EnsureNamespace {
    namespace: String,
    lookup: Invocation,
    create: Invocation,
}

#[async_trait]
impl StageAction for EnsureNamespace {
    fn describe(&self) -> String {
        format!("ensure namespace {}", self.namespace)
    }

    async fn run(&self, ctx: &mut StageContext<'_>) -> Result<(), StageError> {
        let found = ctx.invoke(&self.lookup).await?;
        if found.exit_code == Some(0) {
            tracing::debug!("namespace {} already exists", self.namespace);
            return Ok(());
        }
        ctx.invoke(&self.create).await?;
        tracing::info!("Created namespace {}", self.namespace);
        Ok(())
    }
}
