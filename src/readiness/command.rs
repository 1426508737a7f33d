// ABOUTME: Readiness probe backed by an external command.
// ABOUTME: Typically a bounded `kubectl wait` keyed by label selector.

use super::{Probe, ProbeStatus};
use crate::invoke::{Invocation, ToolInvoker};
use async_trait::async_trait;
use std::sync::Arc;

/// Ready when the invocation exits with an accepted code.
pub struct CommandProbe {
    invoker: Arc<dyn ToolInvoker>,
    invocation: Invocation,
}

impl CommandProbe {
    pub fn new(invoker: Arc<dyn ToolInvoker>, invocation: Invocation) -> Self {
        Self {
            invoker,
            invocation,
        }
    }
}

#[async_trait]
impl Probe for CommandProbe {
    fn describe(&self) -> String {
        self.invocation.to_string()
    }

    async fn check(&self) -> ProbeStatus {
        match self.invoker.invoke(&self.invocation).await {
            Ok(_) => ProbeStatus::Ready,
            Err(e) => ProbeStatus::NotReady(e.to_string()),
        }
    }
}
