// ABOUTME: Per-stage outcomes and the record kept for each stage of a run.
// ABOUTME: Failed outcomes carry a classified failure kind and a message.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use super::error::StageError;
use super::id::{SkipFlag, StageId};
use crate::diagnostics::Warning;

/// Classification of a stage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ExternalTool,
    ReadinessTimeout,
    Tunnel,
    Prerequisite,
    Configuration,
    SmokeCheck,
    UnexpectedOutput,
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::ExternalTool => "external tool failed",
            FailureKind::ReadinessTimeout => "readiness timeout",
            FailureKind::Tunnel => "tunnel failure",
            FailureKind::Prerequisite => "missing prerequisite",
            FailureKind::Configuration => "configuration error",
            FailureKind::SmokeCheck => "smoke check failed",
            FailureKind::UnexpectedOutput => "unexpected tool output",
            FailureKind::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&StageError> for StageFailure {
    fn from(err: &StageError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome {
    Success,
    Skipped { flag: SkipFlag },
    Failed(StageFailure),
}

impl StageOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StageOutcome::Success)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StageOutcome::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StageOutcome::Failed(_))
    }

    pub fn failure(&self) -> Option<&StageFailure> {
        match self {
            StageOutcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageOutcome::Success => write!(f, "success"),
            StageOutcome::Skipped { flag } => write!(f, "skipped ({})", flag),
            StageOutcome::Failed(failure) => {
                write!(f, "failed: {}: {}", failure.kind, failure.message)
            }
        }
    }
}

/// What happened to one stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageRecord {
    pub stage: StageId,
    pub ordinal: usize,
    pub outcome: StageOutcome,
    pub warnings: Vec<Warning>,
    /// External commands issued, retries included.
    pub invocations: usize,
    #[serde(serialize_with = "serialize_secs")]
    pub duration: Duration,
}

impl StageRecord {
    pub fn skipped(stage: StageId, ordinal: usize, flag: SkipFlag) -> Self {
        Self {
            stage,
            ordinal,
            outcome: StageOutcome::Skipped { flag },
            warnings: Vec::new(),
            invocations: 0,
            duration: Duration::ZERO,
        }
    }
}

fn serialize_secs<S: serde::Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(duration.as_secs_f64())
}
