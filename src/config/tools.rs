// ABOUTME: Executable names for external collaborators and the retry policy.
// ABOUTME: Every tool can be pointed at a wrapper or an absolute path.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub terraform: String,
    pub kubectl: String,
    pub helm: String,
    pub docker: String,
    pub aws: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            terraform: "terraform".to_string(),
            kubectl: "kubectl".to_string(),
            helm: "helm".to_string(),
            docker: "docker".to_string(),
            aws: "aws".to_string(),
        }
    }
}

/// Capped retry for step invocations. One attempt means no retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::from_secs(5),
        }
    }
}
