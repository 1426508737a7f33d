// ABOUTME: Application-wide error types for rollout.
// ABOUTME: Uses thiserror for ergonomic error handling.

use crate::invoke::ExternalToolError;
use crate::pipeline::PipelineError;
use crate::readiness::ReadinessError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid pipeline: {0}")]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Tool(#[from] ExternalToolError),

    #[error(transparent)]
    Readiness(#[from] ReadinessError),

    #[error("deployment failed at {stage}: {reason}")]
    DeploymentFailed { stage: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
