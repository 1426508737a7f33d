// ABOUTME: Error types for external tool invocation.
// ABOUTME: Distinguishes missing executables, unexpected exits, and timeouts.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExternalToolError {
    #[error("executable not found: {program}")]
    ProcessNotFound { program: String },

    #[error("{program} exited with {}: {}", display_code(.code), .stderr.trim())]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{program} timed out after {after:?}")]
    Timeout { program: String, after: Duration },

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} was cancelled")]
    Cancelled { program: String },
}

impl ExternalToolError {
    /// Whether a retry policy may try this invocation again.
    ///
    /// A missing executable or a cancelled run will not change on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ExternalToolError::NonZeroExit { .. } | ExternalToolError::Timeout { .. }
        )
    }

    pub fn program(&self) -> &str {
        match self {
            ExternalToolError::ProcessNotFound { program }
            | ExternalToolError::NonZeroExit { program, .. }
            | ExternalToolError::Timeout { program, .. }
            | ExternalToolError::Spawn { program, .. }
            | ExternalToolError::Cancelled { program } => program,
        }
    }
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "a signal".to_string(),
    }
}
