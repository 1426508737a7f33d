// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use serde::Serialize;
use std::time::Instant;

use crate::pipeline::PipelineRun;
use crate::stage::{StageId, StageOutcome, StageRecord};

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Announce a stage before it runs.
    pub fn stage_started(&self, stage: StageId, ordinal: usize, total: usize) {
        match self.mode {
            OutputMode::Normal => println!("[{ordinal}/{total}] {stage}..."),
            OutputMode::Quiet => {}
            OutputMode::Json => emit(&StageEvent {
                event: "stage_started",
                stage,
                ordinal,
                outcome: None,
                duration_secs: None,
            }),
        }
    }

    /// Report a finished (or skipped) stage.
    pub fn stage_finished(&self, record: &StageRecord) {
        match self.mode {
            OutputMode::Normal => {
                let mark = match record.outcome {
                    StageOutcome::Success => "✓",
                    StageOutcome::Skipped { .. } => "-",
                    StageOutcome::Failed(_) => "✗",
                };
                println!(
                    "  {mark} {} {} ({:.1}s)",
                    record.stage,
                    record.outcome,
                    record.duration.as_secs_f64()
                );
            }
            OutputMode::Quiet => {
                if record.outcome.is_failed() {
                    eprintln!("{}: {}", record.stage, record.outcome);
                }
            }
            OutputMode::Json => emit(&StageEvent {
                event: "stage_finished",
                stage: record.stage,
                ordinal: record.ordinal,
                outcome: Some(&record.outcome),
                duration_secs: Some(record.duration.as_secs_f64()),
            }),
        }
    }

    /// Print the run verdict with per-stage lines.
    pub fn run_finished(&self, run: &PipelineRun) {
        match self.mode {
            OutputMode::Normal => println!("{}", run.summary()),
            OutputMode::Quiet => println!("{}", run.status),
            OutputMode::Json => {
                #[derive(Serialize)]
                struct RunEvent<'a> {
                    event: &'a str,
                    #[serde(flatten)]
                    run: &'a PipelineRun,
                }
                emit(&RunEvent {
                    event: "run_finished",
                    run,
                });
            }
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => {
                // Print only the essential result
                println!("{message}");
            }
            OutputMode::Json => emit(&JsonEvent {
                event: "success",
                message,
                duration_secs: self.duration(),
            }),
        }
    }

    /// Print a warning. Shown in every mode.
    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Warning: {message}"),
            OutputMode::Json => emit(&JsonEvent {
                event: "warning",
                message,
                duration_secs: None,
            }),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "error",
                    message,
                    duration_secs: self.duration(),
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }
}

fn emit<T: Serialize>(event: &T) {
    if let Ok(json) = serde_json::to_string(event) {
        println!("{json}");
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

#[derive(Serialize)]
struct StageEvent<'a> {
    event: &'a str,
    stage: StageId,
    ordinal: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<&'a StageOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}
