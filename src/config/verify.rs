// ABOUTME: Post-deployment verification settings.
// ABOUTME: Tunnel ports, health token, metrics path, smoke endpoints, and poll bounds.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    /// Service to forward to. Defaults to the project name.
    pub service: Option<String>,
    pub remote_port: u16,
    pub local_port: u16,
    pub health_path: String,
    /// Text the health endpoint must return.
    pub health_token: Option<String>,
    pub metrics_path: Option<String>,
    /// Business endpoints that must answer 2xx.
    pub endpoints: Vec<String>,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub deadline: Duration,
    /// Upper bound on tunnel warm-up.
    #[serde(with = "humantime_serde")]
    pub settle: Duration,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            service: None,
            remote_port: 80,
            local_port: 8080,
            health_path: "/health".to_string(),
            health_token: Some("healthy".to_string()),
            metrics_path: Some("/metrics".to_string()),
            endpoints: Vec::new(),
            poll_interval: Duration::from_secs(2),
            deadline: Duration::from_secs(60),
            settle: Duration::from_secs(3),
            request_timeout: Duration::from_secs(5),
        }
    }
}
