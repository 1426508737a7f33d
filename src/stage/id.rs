// ABOUTME: Stage identifiers in fixed catalogue order, and the skip flags gating them.
// ABOUTME: Skip flags are resolved once from the CLI and never change during a run.

use serde::Serialize;
use std::fmt;

/// The eight stages of a rollout, declared in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageId {
    InfrastructureProvision,
    ClusterConfigure,
    IngressControllerInstall,
    MonitoringStackDeploy,
    ImageBuildAndPublish,
    ApplicationRelease,
    IngressRuleApply,
    DeploymentVerify,
}

impl StageId {
    pub const ALL: [StageId; 8] = [
        StageId::InfrastructureProvision,
        StageId::ClusterConfigure,
        StageId::IngressControllerInstall,
        StageId::MonitoringStackDeploy,
        StageId::ImageBuildAndPublish,
        StageId::ApplicationRelease,
        StageId::IngressRuleApply,
        StageId::DeploymentVerify,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StageId::InfrastructureProvision => "infrastructure-provision",
            StageId::ClusterConfigure => "cluster-configure",
            StageId::IngressControllerInstall => "ingress-controller-install",
            StageId::MonitoringStackDeploy => "monitoring-stack-deploy",
            StageId::ImageBuildAndPublish => "image-build-and-publish",
            StageId::ApplicationRelease => "application-release",
            StageId::IngressRuleApply => "ingress-rule-apply",
            StageId::DeploymentVerify => "deployment-verify",
        }
    }

    /// Skip flags that disable this stage in the standard catalogue.
    ///
    /// Cluster configuration and the ingress controller belong to the
    /// infrastructure group. Publishing needs the registry location that
    /// provisioning outputs, so it is in that group too.
    pub fn skipped_by(&self) -> &'static [SkipFlag] {
        match self {
            StageId::InfrastructureProvision | StageId::ClusterConfigure => {
                &[SkipFlag::Infrastructure]
            }
            StageId::IngressControllerInstall => &[SkipFlag::Infrastructure, SkipFlag::Ingress],
            StageId::MonitoringStackDeploy => &[SkipFlag::Monitoring],
            StageId::ImageBuildAndPublish => &[SkipFlag::ImageBuild, SkipFlag::Infrastructure],
            StageId::IngressRuleApply => &[SkipFlag::Ingress],
            StageId::ApplicationRelease | StageId::DeploymentVerify => &[],
        }
    }

    /// One-line description for the `stages` command.
    pub fn summary(&self) -> &'static str {
        match self {
            StageId::InfrastructureProvision => "terraform init, plan, apply, read outputs",
            StageId::ClusterConfigure => "update kubeconfig, ensure namespace, apply manifests",
            StageId::IngressControllerInstall => "install the ingress controller chart",
            StageId::MonitoringStackDeploy => "install the metrics stack, scrape and alert rules",
            StageId::ImageBuildAndPublish => "build, tag, and push the application image",
            StageId::ApplicationRelease => "helm upgrade --install the application",
            StageId::IngressRuleApply => "apply the application ingress rule",
            StageId::DeploymentVerify => "pods, release history, health, metrics, smoke checks",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// A single skip switch from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipFlag {
    Infrastructure,
    Monitoring,
    ImageBuild,
    Ingress,
}

impl SkipFlag {
    pub fn flag_name(&self) -> &'static str {
        match self {
            SkipFlag::Infrastructure => "skip-infrastructure",
            SkipFlag::Monitoring => "skip-monitoring",
            SkipFlag::ImageBuild => "skip-image-build",
            SkipFlag::Ingress => "skip-ingress",
        }
    }
}

impl fmt::Display for SkipFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "--{}", self.flag_name())
    }
}

/// Immutable set of skip switches for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SkipFlags {
    pub infrastructure: bool,
    pub monitoring: bool,
    pub image_build: bool,
    pub ingress: bool,
}

impl SkipFlags {
    pub fn is_set(&self, flag: SkipFlag) -> bool {
        match flag {
            SkipFlag::Infrastructure => self.infrastructure,
            SkipFlag::Monitoring => self.monitoring,
            SkipFlag::ImageBuild => self.image_build,
            SkipFlag::Ingress => self.ingress,
        }
    }

    /// The first flag in `gates` that is set, if any.
    pub fn first_set(&self, gates: &[SkipFlag]) -> Option<SkipFlag> {
        gates.iter().copied().find(|flag| self.is_set(*flag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_order_matches_declaration_order() {
        let mut sorted = StageId::ALL;
        sorted.sort();
        assert_eq!(sorted, StageId::ALL);
        assert!(StageId::InfrastructureProvision < StageId::ClusterConfigure);
        assert!(StageId::ApplicationRelease < StageId::IngressRuleApply);
    }

    #[test]
    fn release_and_verify_are_never_skipped() {
        assert!(StageId::ApplicationRelease.skipped_by().is_empty());
        assert!(StageId::DeploymentVerify.skipped_by().is_empty());
    }

    #[test]
    fn first_set_reports_matching_flag() {
        let flags = SkipFlags {
            monitoring: true,
            ..Default::default()
        };
        assert_eq!(
            flags.first_set(StageId::MonitoringStackDeploy.skipped_by()),
            Some(SkipFlag::Monitoring)
        );
        assert_eq!(
            flags.first_set(StageId::InfrastructureProvision.skipped_by()),
            None
        );
    }

    #[test]
    fn names_are_kebab_case() {
        assert_eq!(
            StageId::ImageBuildAndPublish.to_string(),
            "image-build-and-publish"
        );
        assert_eq!(SkipFlag::ImageBuild.to_string(), "--skip-image-build");
    }
}
