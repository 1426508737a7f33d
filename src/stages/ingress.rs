// ABOUTME: ingress-controller-install and ingress-rule-apply.
// ABOUTME: The controller comes from its Helm chart; the rule needs the application released.

use super::{RequireStage, path_arg, pods_ready, tool};
use crate::config::Config;
use crate::stage::{Stage, StageId};

pub(super) fn controller_stage(config: &Config) -> Stage {
    let helm = &config.tools.helm;
    let ingress = &config.ingress;
    let (probe, check) = pods_ready(config, &ingress.namespace, &ingress.selector, ingress.timeout);

    Stage::new(StageId::IngressControllerInstall)
        .invoke(tool(config, helm).args([
            "repo",
            "add",
            ingress.repo_name.as_str(),
            ingress.repo_url.as_str(),
            "--force-update",
        ]))
        .invoke(
            tool(config, helm)
                .timeout(ingress.timeout + config.command_timeout)
                .args([
                    "upgrade".to_string(),
                    "--install".to_string(),
                    ingress.release.clone(),
                    ingress.chart.clone(),
                    "-n".to_string(),
                    ingress.namespace.clone(),
                    "--create-namespace".to_string(),
                    "--wait".to_string(),
                    format!("--timeout={}s", ingress.timeout.as_secs()),
                ]),
        )
        .post_check(probe, check)
}

pub(super) fn rule_stage(config: &Config) -> Stage {
    Stage::new(StageId::IngressRuleApply)
        .action(RequireStage {
            stage: StageId::IngressRuleApply,
            required: StageId::ApplicationRelease,
        })
        .invoke(tool(config, &config.tools.kubectl).args([
            "apply".to_string(),
            "-f".to_string(),
            path_arg(config, &config.ingress.rule_manifest),
            "-n".to_string(),
            config.namespace.clone(),
        ]))
}
