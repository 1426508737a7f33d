// ABOUTME: Stage definition and the runner executing one stage.
// ABOUTME: Skip check, ordered steps, post-check, then stage cleanup on every exit path.

mod context;
mod error;
mod id;
mod outcome;
mod state;

pub use context::{ProbeSpec, StageContext};
pub use error::StageError;
pub use id::{SkipFlag, SkipFlags, StageId};
pub use outcome::{FailureKind, StageFailure, StageOutcome, StageRecord};
pub use state::{PipelineState, ProvisioningOutputs};

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::cancel::CancelToken;
use crate::cleanup::{CleanupAction, CleanupRegistry};
use crate::config::RetryConfig;
use crate::invoke::{Invocation, ToolInvoker};
use crate::readiness::ReadinessCheck;

/// A step that needs to inspect tool output or pipeline state.
#[async_trait]
pub trait StageAction: Send + Sync {
    fn describe(&self) -> String;
    async fn run(&self, ctx: &mut StageContext<'_>) -> Result<(), StageError>;
}

/// One unit of work inside a stage.
pub enum Step {
    /// Run a command; an unaccepted exit code fails the stage.
    Invoke(Invocation),
    Action(Box<dyn StageAction>),
}

impl Step {
    pub fn action(action: impl StageAction + 'static) -> Self {
        Step::Action(Box::new(action))
    }

    pub fn describe(&self) -> String {
        match self {
            Step::Invoke(invocation) => invocation.to_string(),
            Step::Action(action) => action.describe(),
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Convergence check run after every step has succeeded.
#[derive(Debug, Clone)]
pub struct PostCheck {
    pub probe: ProbeSpec,
    pub check: ReadinessCheck,
}

/// A named unit of deployment work.
#[derive(Debug)]
pub struct Stage {
    id: StageId,
    ordinal: usize,
    skip_when: Vec<SkipFlag>,
    steps: Vec<Step>,
    post_check: Option<PostCheck>,
    cleanup: Vec<CleanupAction>,
}

impl Stage {
    /// A stage gated by the standard skip rules for `id`.
    pub fn new(id: StageId) -> Self {
        Self {
            id,
            ordinal: 0,
            skip_when: id.skipped_by().to_vec(),
            steps: Vec::new(),
            post_check: None,
            cleanup: Vec::new(),
        }
    }

    pub fn skip_when(mut self, flags: impl Into<Vec<SkipFlag>>) -> Self {
        self.skip_when = flags.into();
        self
    }

    pub fn invoke(mut self, invocation: Invocation) -> Self {
        self.steps.push(Step::Invoke(invocation));
        self
    }

    pub fn action(mut self, action: impl StageAction + 'static) -> Self {
        self.steps.push(Step::action(action));
        self
    }

    pub fn post_check(mut self, probe: ProbeSpec, check: ReadinessCheck) -> Self {
        self.post_check = Some(PostCheck { probe, check });
        self
    }

    /// Declare a resource the stage owns from the start, such as a temp file.
    pub fn cleanup(mut self, action: CleanupAction) -> Self {
        self.cleanup.push(action);
        self
    }

    pub fn id(&self) -> StageId {
        self.id
    }

    /// 1-based position in the pipeline. Zero until the pipeline assigns it.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub(crate) fn set_ordinal(&mut self, ordinal: usize) {
        self.ordinal = ordinal;
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The set flag that disables this stage, if any.
    pub fn skipped_by(&self, flags: &SkipFlags) -> Option<SkipFlag> {
        flags.first_set(&self.skip_when)
    }
}

/// Shared handles the runner passes into each stage context.
pub struct RunEnv<'a> {
    pub invoker: Arc<dyn ToolInvoker>,
    pub global_cleanup: &'a CleanupRegistry,
    pub cancel: &'a CancelToken,
    pub retry: RetryConfig,
    pub flags: SkipFlags,
}

/// Execute one stage and produce its record.
///
/// A skipped stage issues no invocations and registers nothing. Otherwise the
/// stage's cleanup runs exactly once whether the steps succeed or fail.
pub async fn run_stage(stage: Stage, env: &RunEnv<'_>, state: &mut PipelineState) -> StageRecord {
    let Stage {
        id,
        ordinal,
        skip_when,
        steps,
        post_check,
        cleanup,
    } = stage;

    if let Some(flag) = env.flags.first_set(&skip_when) {
        tracing::info!("Skipping {} ({})", id, flag);
        return StageRecord::skipped(id, ordinal, flag);
    }

    let started = Instant::now();
    let stage_cleanup = CleanupRegistry::new();
    let mut ctx = StageContext::new(
        id,
        Arc::clone(&env.invoker),
        &stage_cleanup,
        env.global_cleanup,
        env.cancel,
        env.retry,
        state,
    );
    for action in cleanup {
        ctx.register_cleanup(action);
    }

    let result = run_steps(&steps, post_check.as_ref(), &mut ctx).await;

    let summary = stage_cleanup.run_all(&mut ctx.diagnostics).await;
    if !summary.completed.is_empty() {
        tracing::debug!("[{}] released {} resource(s)", id, summary.completed.len());
    }

    let outcome = match result {
        Ok(()) => {
            ctx.state.mark_completed(id);
            StageOutcome::Success
        }
        Err(e) => {
            tracing::error!("[{}] {}", id, e);
            StageOutcome::Failed(StageFailure::from(&e))
        }
    };

    StageRecord {
        stage: id,
        ordinal,
        outcome,
        invocations: ctx.invocations(),
        warnings: ctx.diagnostics.drain(),
        duration: started.elapsed(),
    }
}

async fn run_steps(
    steps: &[Step],
    post_check: Option<&PostCheck>,
    ctx: &mut StageContext<'_>,
) -> Result<(), StageError> {
    for step in steps {
        match step {
            Step::Invoke(invocation) => {
                ctx.invoke(invocation).await?;
            }
            Step::Action(action) => {
                tracing::debug!("[{}] {}", ctx.stage(), action.describe());
                action.run(ctx).await?;
            }
        }
    }

    if let Some(post) = post_check {
        ctx.wait(&post.probe, post.check).await?;
    }
    Ok(())
}
