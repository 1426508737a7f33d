// ABOUTME: Configuration for the platform stages: provisioning, cluster, ingress, monitoring.
// ABOUTME: Defaults match the Terraform + EKS + ingress-nginx + kube-prometheus-stack layout.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InfrastructureConfig {
    /// Terraform working directory.
    pub dir: PathBuf,
    /// Output key holding the cluster name.
    pub cluster_name_output: String,
    /// Output key holding the cluster region.
    pub region_output: String,
    #[serde(with = "humantime_serde")]
    pub apply_timeout: Duration,
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("terraform"),
            cluster_name_output: "cluster_name".to_string(),
            region_output: "region".to_string(),
            apply_timeout: Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Run `aws eks update-kubeconfig` with the provisioning outputs.
    pub update_kubeconfig: bool,
    /// Manifests applied after the namespace exists.
    pub manifests: Vec<PathBuf>,
    #[serde(with = "humantime_serde")]
    pub ready_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            update_kubeconfig: true,
            manifests: Vec::new(),
            ready_timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngressConfig {
    pub repo_name: String,
    pub repo_url: String,
    pub chart: String,
    pub release: String,
    pub namespace: String,
    pub selector: String,
    /// Ingress rule for the application, applied after the release.
    pub rule_manifest: PathBuf,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            repo_name: "ingress-nginx".to_string(),
            repo_url: "https://kubernetes.github.io/ingress-nginx".to_string(),
            chart: "ingress-nginx/ingress-nginx".to_string(),
            release: "ingress-nginx".to_string(),
            namespace: "ingress-nginx".to_string(),
            selector: "app.kubernetes.io/component=controller".to_string(),
            rule_manifest: PathBuf::from("k8s/ingress.yaml"),
            timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub repo_name: String,
    pub repo_url: String,
    pub chart: String,
    pub release: String,
    pub namespace: String,
    pub values: Option<PathBuf>,
    /// Scrape and alert rule manifests (ServiceMonitor, PrometheusRule).
    pub manifests: Vec<PathBuf>,
    pub selector: String,
    pub prometheus_service: String,
    pub prometheus_port: u16,
    pub local_port: u16,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            repo_name: "prometheus-community".to_string(),
            repo_url: "https://prometheus-community.github.io/helm-charts".to_string(),
            chart: "prometheus-community/kube-prometheus-stack".to_string(),
            release: "monitoring".to_string(),
            namespace: "monitoring".to_string(),
            values: None,
            manifests: Vec::new(),
            selector: "app.kubernetes.io/name=prometheus".to_string(),
            prometheus_service: "monitoring-kube-prometheus-prometheus".to_string(),
            prometheus_port: 9090,
            local_port: 9090,
            timeout: Duration::from_secs(600),
        }
    }
}
