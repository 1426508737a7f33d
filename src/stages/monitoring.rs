// ABOUTME: monitoring-stack-deploy: metrics stack chart plus scrape and alert rules.

use super::{path_arg, pods_ready, tool};
use crate::config::Config;
use crate::stage::{Stage, StageId};

pub(super) fn stage(config: &Config) -> Stage {
    let helm = &config.tools.helm;
    let monitoring = &config.monitoring;

    let mut install = tool(config, helm)
        .timeout(monitoring.timeout + config.command_timeout)
        .args([
            "upgrade".to_string(),
            "--install".to_string(),
            monitoring.release.clone(),
            monitoring.chart.clone(),
            "-n".to_string(),
            monitoring.namespace.clone(),
            "--create-namespace".to_string(),
        ]);
    if let Some(values) = &monitoring.values {
        install = install.args(["-f".to_string(), path_arg(config, values)]);
    }
    install = install.args([
        "--wait".to_string(),
        format!("--timeout={}s", monitoring.timeout.as_secs()),
    ]);

    let mut stage = Stage::new(StageId::MonitoringStackDeploy)
        .invoke(tool(config, helm).args([
            "repo",
            "add",
            monitoring.repo_name.as_str(),
            monitoring.repo_url.as_str(),
            "--force-update",
        ]))
        .invoke(install);

    for manifest in &monitoring.manifests {
        stage = stage.invoke(tool(config, &config.tools.kubectl).args([
            "apply".to_string(),
            "-f".to_string(),
            path_arg(config, manifest),
        ]));
    }

    let (probe, check) = pods_ready(
        config,
        &monitoring.namespace,
        &monitoring.selector,
        monitoring.timeout,
    );
    stage.post_check(probe, check)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn values_file_and_manifests_are_applied() {
        let mut config = Config::template();
        config.root = PathBuf::from("/srv/app");
        config.monitoring.values = Some(PathBuf::from("monitoring/values.yaml"));
        config.monitoring.manifests = vec![PathBuf::from("monitoring/alerts.yaml")];

        let stage = stage(&config);
        let steps: Vec<String> = stage.steps().iter().map(|s| s.describe()).collect();

        assert_eq!(steps.len(), 3);
        assert!(steps[1].contains("-f /srv/app/monitoring/values.yaml"));
        assert_eq!(steps[2], "kubectl apply -f /srv/app/monitoring/alerts.yaml");
    }
}
