// ABOUTME: The record of one pipeline run: per-stage outcomes, verdict, warnings, tunnels.
// ABOUTME: Serialized for JSON output and rendered into the text report.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::diagnostics::Warning;
use crate::stage::{SkipFlags, StageId, StageOutcome, StageRecord};
use crate::tunnel::TunnelRecord;

/// Overall verdict of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    PartialSkip,
    Failed,
}

impl RunStatus {
    /// `Failed` if any stage failed, `PartialSkip` if every stage was
    /// skipped, `Success` otherwise.
    pub fn from_records(records: &[StageRecord]) -> Self {
        if records.iter().any(|r| r.outcome.is_failed()) {
            RunStatus::Failed
        } else if !records.is_empty() && records.iter().all(|r| r.outcome.is_skipped()) {
            RunStatus::PartialSkip
        } else {
            RunStatus::Success
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::PartialSkip => write!(f, "partial-skip"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub flags: SkipFlags,
    pub stages: Vec<StageRecord>,
    /// Stages after the first failure, never launched.
    pub not_reached: Vec<StageId>,
    pub status: RunStatus,
    /// Warnings from the global cleanup pass.
    pub warnings: Vec<Warning>,
    pub tunnels: Vec<TunnelRecord>,
    pub release_revision: Option<u32>,
    /// Times the global cleanup list was released.
    pub cleanup_runs: usize,
}

impl PipelineRun {
    pub fn record(&self, stage: StageId) -> Option<&StageRecord> {
        self.stages.iter().find(|r| r.stage == stage)
    }

    pub fn outcome(&self, stage: StageId) -> Option<&StageOutcome> {
        self.record(stage).map(|r| &r.outcome)
    }

    /// Stages that ran, in execution order, whatever their outcome.
    pub fn executed(&self) -> Vec<StageId> {
        self.stages
            .iter()
            .filter(|r| !r.outcome.is_skipped())
            .map(|r| r.stage)
            .collect()
    }

    pub fn failed_stage(&self) -> Option<&StageRecord> {
        self.stages.iter().find(|r| r.outcome.is_failed())
    }

    /// Stage warnings followed by global cleanup warnings.
    pub fn all_warnings(&self) -> Vec<&Warning> {
        self.stages
            .iter()
            .flat_map(|r| r.warnings.iter())
            .chain(self.warnings.iter())
            .collect()
    }

    pub fn total_invocations(&self) -> usize {
        self.stages.iter().map(|r| r.invocations).sum()
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// One line per stage plus the verdict, as printed after a deploy.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        for record in &self.stages {
            lines.push(format!(
                "  {}. {:<28} {}",
                record.ordinal, record.stage, record.outcome
            ));
        }
        for stage in &self.not_reached {
            lines.push(format!("  -  {:<28} not reached", stage));
        }
        lines.push(format!(
            "Result: {} ({} warning(s), {:.1}s)",
            self.status,
            self.all_warnings().len(),
            self.duration().num_milliseconds() as f64 / 1000.0
        ));
        lines.join("\n")
    }
}
