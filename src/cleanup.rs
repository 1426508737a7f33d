// ABOUTME: Cleanup registry releasing tunnels, temp files, and custom actions.
// ABOUTME: Runs in reverse registration order, exactly once, failures become warnings.

use crate::diagnostics::{Diagnostics, Warning};
use crate::tunnel::Tunnel;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Boxed async cleanup callback.
pub type CleanupCallback = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), String>> + Send>;

/// A resource to release when its owner finishes.
pub enum CleanupAction {
    CloseTunnel(Arc<Tunnel>),
    RemoveFile(PathBuf),
    Custom {
        name: String,
        callback: CleanupCallback,
    },
}

impl fmt::Debug for CleanupAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl CleanupAction {
    pub fn custom<F, Fut>(name: impl Into<String>, callback: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        CleanupAction::Custom {
            name: name.into(),
            callback: Box::new(move || Box::pin(callback())),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            CleanupAction::CloseTunnel(tunnel) => format!("close tunnel to {}", tunnel.target()),
            CleanupAction::RemoveFile(path) => format!("remove {}", path.display()),
            CleanupAction::Custom { name, .. } => name.clone(),
        }
    }

    /// A second handle to the same resource, for actions that are idempotent.
    ///
    /// Custom callbacks run once and have no duplicate.
    pub fn duplicate(&self) -> Option<CleanupAction> {
        match self {
            CleanupAction::CloseTunnel(tunnel) => {
                Some(CleanupAction::CloseTunnel(Arc::clone(tunnel)))
            }
            CleanupAction::RemoveFile(path) => Some(CleanupAction::RemoveFile(path.clone())),
            CleanupAction::Custom { .. } => None,
        }
    }

    async fn run(self) -> Result<(), String> {
        match self {
            CleanupAction::CloseTunnel(tunnel) => tunnel.close().await.map_err(|e| e.to_string()),
            CleanupAction::RemoveFile(path) => match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(format!("failed to remove {}: {}", path.display(), e)),
            },
            CleanupAction::Custom { callback, .. } => callback().await,
        }
    }
}

/// Result of one cleanup pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupSummary {
    pub completed: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Ordered list of pending cleanup actions.
#[derive(Default)]
pub struct CleanupRegistry {
    actions: Mutex<Vec<CleanupAction>>,
    runs: AtomicUsize,
}

impl fmt::Debug for CleanupRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanupRegistry")
            .field("pending", &self.pending())
            .field("runs", &self.runs())
            .finish()
    }
}

impl CleanupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, action: CleanupAction) {
        tracing::debug!("Registered cleanup: {}", action.describe());
        self.actions.lock().push(action);
    }

    pub fn pending(&self) -> usize {
        self.actions.lock().len()
    }

    /// How many times [`CleanupRegistry::run_all`] has executed.
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    /// Run every pending action, last registered first.
    ///
    /// Every action is attempted even if earlier ones fail. Failures are
    /// recorded as warnings and never propagated.
    pub async fn run_all(&self, diag: &mut Diagnostics) -> CleanupSummary {
        let actions: Vec<_> = std::mem::take(&mut *self.actions.lock());
        self.runs.fetch_add(1, Ordering::SeqCst);

        let mut summary = CleanupSummary::default();
        for action in actions.into_iter().rev() {
            let name = action.describe();
            match action.run().await {
                Ok(()) => summary.completed.push(name),
                Err(e) => {
                    diag.warn(Warning::cleanup_failed(format!(
                        "cleanup '{}' failed: {}",
                        name, e
                    )));
                    summary.failed.push((name, e));
                }
            }
        }
        summary
    }
}
