// ABOUTME: Pipeline controller: validates stage order, runs stages, owns global cleanup.
// ABOUTME: Stops at the first failure and releases the global cleanup list exactly once.

mod run;

pub use run::{PipelineRun, RunStatus};

use chrono::Utc;
use nonempty::NonEmpty;
use std::sync::Arc;
use thiserror::Error;

use crate::cancel::CancelToken;
use crate::cleanup::CleanupRegistry;
use crate::config::RetryConfig;
use crate::diagnostics::Diagnostics;
use crate::invoke::ToolInvoker;
use crate::output::Output;
use crate::stage::{
    FailureKind, PipelineState, RunEnv, SkipFlags, Stage, StageFailure, StageId, StageOutcome,
    StageRecord, run_stage,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("pipeline has no stages")]
    Empty,

    #[error("stage {0} appears more than once")]
    Duplicate(StageId),

    #[error("stage {later} is declared after {earlier} but runs before it")]
    OutOfOrder { earlier: StageId, later: StageId },
}

/// An ordered, validated list of stages bound to a tool invoker.
pub struct Pipeline {
    stages: NonEmpty<Stage>,
    invoker: Arc<dyn ToolInvoker>,
    cancel: CancelToken,
    retry: RetryConfig,
    cleanup: CleanupRegistry,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_ids())
            .field("retry", &self.retry)
            .finish()
    }
}

impl Pipeline {
    /// Validate and number `stages`.
    ///
    /// Ids must be unique and follow catalogue order; ordinals start at 1.
    pub fn new(stages: Vec<Stage>, invoker: Arc<dyn ToolInvoker>) -> Result<Self, PipelineError> {
        let mut stages = NonEmpty::from_vec(stages).ok_or(PipelineError::Empty)?;

        for (earlier, later) in stages.iter().zip(stages.iter().skip(1)) {
            let (earlier, later) = (earlier.id(), later.id());
            if earlier == later {
                return Err(PipelineError::Duplicate(later));
            }
            if later < earlier {
                return Err(PipelineError::OutOfOrder { earlier, later });
            }
        }

        for (index, stage) in stages.iter_mut().enumerate() {
            stage.set_ordinal(index + 1);
        }

        Ok(Self {
            stages,
            invoker,
            cancel: CancelToken::new(),
            retry: RetryConfig::default(),
            cleanup: CleanupRegistry::new(),
        })
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn stage_ids(&self) -> Vec<StageId> {
        self.stages.iter().map(Stage::id).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Never true; a pipeline always has at least one stage.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Pipeline-wide cleanup list, released once after the last stage.
    pub fn cleanup(&self) -> &CleanupRegistry {
        &self.cleanup
    }

    /// Run every stage in order and release global cleanup.
    ///
    /// After the first failed stage no further stage is launched; the rest
    /// are listed as not reached.
    pub async fn execute(self, flags: SkipFlags, output: &Output) -> PipelineRun {
        let started_at = Utc::now();
        let total = self.stages.len();
        let mut state = PipelineState::new();
        let mut records = Vec::with_capacity(total);
        let mut not_reached = Vec::new();

        let env = RunEnv {
            invoker: Arc::clone(&self.invoker),
            global_cleanup: &self.cleanup,
            cancel: &self.cancel,
            retry: self.retry,
            flags,
        };

        let mut stopped = false;
        for stage in self.stages {
            if stopped {
                not_reached.push(stage.id());
                continue;
            }

            // A skipped stage stays skipped even once the run is cancelled.
            let record = if stage.skipped_by(&flags).is_some() {
                run_stage(stage, &env, &mut state).await
            } else if self.cancel.is_cancelled() {
                cancelled_before_start(&stage)
            } else {
                tracing::info!("Starting stage {} ({}/{})", stage.id(), stage.ordinal(), total);
                output.stage_started(stage.id(), stage.ordinal(), total);
                run_stage(stage, &env, &mut state).await
            };

            tracing::info!("Stage {} finished: {}", record.stage, record.outcome);
            output.stage_finished(&record);
            stopped = record.outcome.is_failed();
            records.push(record);
        }

        let mut diag = Diagnostics::default();
        let summary = self.cleanup.run_all(&mut diag).await;
        tracing::debug!(
            "Global cleanup released {} resource(s), {} failure(s)",
            summary.completed.len(),
            summary.failed.len()
        );

        let status = RunStatus::from_records(&records);
        PipelineRun {
            started_at,
            finished_at: Utc::now(),
            flags,
            stages: records,
            not_reached,
            status,
            warnings: diag.drain(),
            tunnels: state.tunnel_records(),
            release_revision: state.release_revision,
            cleanup_runs: self.cleanup.runs(),
        }
    }
}

fn cancelled_before_start(stage: &Stage) -> StageRecord {
    StageRecord {
        stage: stage.id(),
        ordinal: stage.ordinal(),
        outcome: StageOutcome::Failed(StageFailure {
            kind: FailureKind::Cancelled,
            message: "run cancelled before the stage started".to_string(),
        }),
        warnings: Vec::new(),
        invocations: 0,
        duration: std::time::Duration::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoke::{ExternalToolError, Invocation, InvocationResult};
    use async_trait::async_trait;

    struct NoopInvoker;

    #[async_trait]
    impl ToolInvoker for NoopInvoker {
        async fn invoke(&self, _: &Invocation) -> Result<InvocationResult, ExternalToolError> {
            Ok(InvocationResult {
                exit_code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
                duration: std::time::Duration::ZERO,
            })
        }
    }

    fn invoker() -> Arc<dyn ToolInvoker> {
        Arc::new(NoopInvoker)
    }

    #[test]
    fn empty_pipeline_is_rejected() {
        let err = Pipeline::new(Vec::new(), invoker()).unwrap_err();
        assert_eq!(err, PipelineError::Empty);
    }

    #[test]
    fn out_of_order_stages_are_rejected() {
        let stages = vec![
            Stage::new(StageId::ClusterConfigure),
            Stage::new(StageId::InfrastructureProvision),
        ];
        let err = Pipeline::new(stages, invoker()).unwrap_err();
        assert_eq!(
            err,
            PipelineError::OutOfOrder {
                earlier: StageId::ClusterConfigure,
                later: StageId::InfrastructureProvision,
            }
        );
    }

    #[test]
    fn duplicate_stages_are_rejected() {
        let stages = vec![
            Stage::new(StageId::ApplicationRelease),
            Stage::new(StageId::ApplicationRelease),
        ];
        let err = Pipeline::new(stages, invoker()).unwrap_err();
        assert_eq!(err, PipelineError::Duplicate(StageId::ApplicationRelease));
    }

    #[test]
    fn ordinals_are_assigned_from_one() {
        let stages = vec![
            Stage::new(StageId::ApplicationRelease),
            Stage::new(StageId::DeploymentVerify),
        ];
        let pipeline = Pipeline::new(stages, invoker()).unwrap();
        let ordinals: Vec<usize> = pipeline.stages.iter().map(Stage::ordinal).collect();
        assert_eq!(ordinals, vec![1, 2]);
    }

    #[tokio::test]
    async fn skipped_stage_stays_skipped_after_cancellation() {
        let stages = vec![
            Stage::new(StageId::MonitoringStackDeploy),
            Stage::new(StageId::ApplicationRelease),
            Stage::new(StageId::DeploymentVerify),
        ];
        let cancel = CancelToken::new();
        cancel.cancel();
        let flags = SkipFlags {
            monitoring: true,
            ..SkipFlags::default()
        };

        let run = Pipeline::new(stages, invoker())
            .unwrap()
            .with_cancel(cancel)
            .execute(flags, &Output::new(crate::output::OutputMode::Quiet))
            .await;

        assert!(matches!(
            run.stages[0].outcome,
            StageOutcome::Skipped {
                flag: crate::stage::SkipFlag::Monitoring
            }
        ));
        match &run.stages[1].outcome {
            StageOutcome::Failed(failure) => assert_eq!(failure.kind, FailureKind::Cancelled),
            other => panic!("expected cancellation, got {other}"),
        }
        assert_eq!(run.not_reached, vec![StageId::DeploymentVerify]);
        assert_eq!(run.status, RunStatus::Failed);
    }
}
