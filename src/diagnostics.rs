// ABOUTME: Diagnostics accumulator for non-fatal warnings during a rollout.
// ABOUTME: Collects warnings that shouldn't fail a stage but should be shown to users.

use serde::Serialize;

/// Collects non-fatal warnings during stage execution.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Take the collected warnings, leaving the accumulator empty.
    pub fn drain(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }
}

/// A non-fatal warning collected during a rollout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// A cleanup action (tunnel close, temp file removal) failed.
    pub fn cleanup_failed(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::CleanupFailed,
            message: message.into(),
        }
    }

    /// An optional credential was absent, so a step was skipped.
    pub fn missing_credential(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::MissingCredential,
            message: message.into(),
        }
    }

    /// A tunnel did not accept connections within its settle bound.
    pub fn tunnel_warmup(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::TunnelWarmup,
            message: message.into(),
        }
    }

    /// The report artifact could not be collected or written.
    pub fn report_failed(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::ReportFailed,
            message: message.into(),
        }
    }
}

/// Categories of warnings that can occur during a rollout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A cleanup action failed; the resource may still exist.
    CleanupFailed,
    /// A registry credential was missing and publishing was skipped.
    MissingCredential,
    /// A tunnel was not reachable after warm-up.
    TunnelWarmup,
    /// The run report could not be produced.
    ReportFailed,
}
