// ABOUTME: Stage error types with SNAFU pattern.
// ABOUTME: Wraps tool, readiness, and tunnel failures; kind() classifies them for reports.

use snafu::Snafu;

use super::id::StageId;
use super::outcome::FailureKind;
use crate::invoke::ExternalToolError;
use crate::readiness::ReadinessError;
use crate::tunnel::TunnelError;

/// Why a stage stopped before completing.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StageError {
    #[snafu(display("{source}"))]
    Tool { source: ExternalToolError },

    #[snafu(display("{source}"))]
    Readiness { source: ReadinessError },

    #[snafu(display("{source}"))]
    Tunnel { source: TunnelError },

    #[snafu(display("{stage} requires {requirement}"))]
    Prerequisite { stage: StageId, requirement: String },

    #[snafu(display("configuration error: {message}"))]
    Configuration { message: String },

    #[snafu(display("smoke check {endpoint} failed: {reason}"))]
    SmokeCheck { endpoint: String, reason: String },

    #[snafu(display("unexpected output from {program}: {reason}"))]
    UnexpectedOutput { program: String, reason: String },
}

impl StageError {
    /// Classification used in stage outcomes and reports.
    pub fn kind(&self) -> FailureKind {
        match self {
            StageError::Tool { source } => match source {
                ExternalToolError::Cancelled { .. } => FailureKind::Cancelled,
                _ => FailureKind::ExternalTool,
            },
            StageError::Readiness { source } => match source {
                ReadinessError::Timeout { .. } => FailureKind::ReadinessTimeout,
                ReadinessError::Cancelled { .. } => FailureKind::Cancelled,
            },
            StageError::Tunnel { source } => match source {
                TunnelError::Cancelled { .. } => FailureKind::Cancelled,
                _ => FailureKind::Tunnel,
            },
            StageError::Prerequisite { .. } => FailureKind::Prerequisite,
            StageError::Configuration { .. } => FailureKind::Configuration,
            StageError::SmokeCheck { .. } => FailureKind::SmokeCheck,
            StageError::UnexpectedOutput { .. } => FailureKind::UnexpectedOutput,
        }
    }
}

impl From<ExternalToolError> for StageError {
    fn from(source: ExternalToolError) -> Self {
        StageError::Tool { source }
    }
}

impl From<ReadinessError> for StageError {
    fn from(source: ReadinessError) -> Self {
        StageError::Readiness { source }
    }
}

impl From<TunnelError> for StageError {
    fn from(source: TunnelError) -> Self {
        StageError::Tunnel { source }
    }
}

impl From<crate::error::Error> for StageError {
    fn from(err: crate::error::Error) -> Self {
        StageError::Configuration {
            message: err.to_string(),
        }
    }
}
