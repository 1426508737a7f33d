// ABOUTME: Execution context handed to stage steps.
// ABOUTME: Mediates tool calls, readiness waits, tunnels, cleanup registration, and warnings.

use std::sync::Arc;

use super::error::StageError;
use super::id::StageId;
use super::state::PipelineState;
use crate::cancel::CancelToken;
use crate::cleanup::{CleanupAction, CleanupRegistry};
use crate::config::RetryConfig;
use crate::diagnostics::{Diagnostics, Warning};
use crate::invoke::{ExternalToolError, Invocation, InvocationResult, ToolInvoker};
use crate::readiness::{CommandProbe, HttpProbe, Probe, ReadinessCheck, wait_until_ready};
use crate::tunnel::{Tunnel, TunnelSpec};

/// What a post-check or explicit wait should poll.
#[derive(Debug, Clone)]
pub enum ProbeSpec {
    Command(Invocation),
    Http(HttpProbe),
}

/// Everything a running stage may touch.
pub struct StageContext<'a> {
    stage: StageId,
    invoker: Arc<dyn ToolInvoker>,
    stage_cleanup: &'a CleanupRegistry,
    global_cleanup: &'a CleanupRegistry,
    cancel: &'a CancelToken,
    retry: RetryConfig,
    pub state: &'a mut PipelineState,
    pub diagnostics: Diagnostics,
    invocations: usize,
}

impl<'a> StageContext<'a> {
    pub fn new(
        stage: StageId,
        invoker: Arc<dyn ToolInvoker>,
        stage_cleanup: &'a CleanupRegistry,
        global_cleanup: &'a CleanupRegistry,
        cancel: &'a CancelToken,
        retry: RetryConfig,
        state: &'a mut PipelineState,
    ) -> Self {
        Self {
            stage,
            invoker,
            stage_cleanup,
            global_cleanup,
            cancel,
            retry,
            state,
            diagnostics: Diagnostics::default(),
            invocations: 0,
        }
    }

    pub fn stage(&self) -> StageId {
        self.stage
    }

    pub fn invoker(&self) -> Arc<dyn ToolInvoker> {
        Arc::clone(&self.invoker)
    }

    pub fn cancel_token(&self) -> &CancelToken {
        self.cancel
    }

    /// Commands issued so far, retries included.
    pub fn invocations(&self) -> usize {
        self.invocations
    }

    pub fn warn(&mut self, warning: Warning) {
        self.diagnostics.warn(warning);
    }

    /// Run an external command.
    ///
    /// Non-zero exits and timeouts are retried up to `retry.max_attempts`
    /// with a fixed backoff. Cancellation abandons the command, which kills
    /// the child process.
    pub async fn invoke(&mut self, invocation: &Invocation) -> Result<InvocationResult, StageError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            if self.cancel.is_cancelled() {
                return Err(ExternalToolError::Cancelled {
                    program: invocation.program.clone(),
                }
                .into());
            }

            tracing::debug!("[{}] {}", self.stage, invocation);
            self.invocations += 1;
            let result = tokio::select! {
                result = self.invoker.invoke(invocation) => result,
                _ = self.cancel.cancelled() => Err(ExternalToolError::Cancelled {
                    program: invocation.program.clone(),
                }),
            };

            match result {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    tracing::warn!(
                        "[{}] attempt {}/{} failed: {}; retrying in {:?}",
                        self.stage,
                        attempt,
                        max_attempts,
                        e,
                        self.retry.backoff
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(self.retry.backoff) => {}
                        _ = self.cancel.cancelled() => {}
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Wait for an arbitrary probe.
    pub async fn wait_for(&self, probe: &dyn Probe, check: ReadinessCheck) -> Result<(), StageError> {
        tracing::debug!("[{}] waiting for {}", self.stage, probe.describe());
        wait_until_ready(probe, check, self.cancel).await?;
        Ok(())
    }

    /// Wait for a command or HTTP probe to report ready.
    pub async fn wait(&self, probe: &ProbeSpec, check: ReadinessCheck) -> Result<(), StageError> {
        match probe {
            ProbeSpec::Command(invocation) => {
                let probe = CommandProbe::new(self.invoker(), invocation.clone());
                self.wait_for(&probe, check).await
            }
            ProbeSpec::Http(probe) => self.wait_for(probe, check).await,
        }
    }

    /// Register an action with this stage and, when it can be duplicated,
    /// with the pipeline as a backstop.
    pub fn register_cleanup(&self, action: CleanupAction) {
        if let Some(backstop) = action.duplicate() {
            self.global_cleanup.register(backstop);
        }
        self.stage_cleanup.register(action);
    }

    /// Start a tunnel and wait for it to settle.
    ///
    /// The tunnel is registered for cleanup before it is first used. A
    /// tunnel that never accepts a connection within its settle bound is
    /// only a warning; the caller's readiness probe decides the outcome.
    pub async fn open_tunnel(&mut self, spec: TunnelSpec) -> Result<Arc<Tunnel>, StageError> {
        tracing::debug!("[{}] opening tunnel {}", self.stage, spec.invocation);
        let settle = spec.settle;
        let tunnel = Tunnel::spawn(spec)?;
        self.register_cleanup(CleanupAction::CloseTunnel(Arc::clone(&tunnel)));
        self.state.track_tunnel(Arc::clone(&tunnel));

        if !tunnel.warm_up(self.cancel).await? {
            self.warn(Warning::tunnel_warmup(format!(
                "tunnel to {} not accepting connections on 127.0.0.1:{} after {:?}",
                tunnel.target(),
                tunnel.local_port(),
                settle
            )));
        }
        Ok(tunnel)
    }
}
