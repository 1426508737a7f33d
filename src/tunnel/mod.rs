// ABOUTME: Background port-forwarding tunnels with an explicit lifecycle.
// ABOUTME: Starting -> Active -> Terminated; close is idempotent and kills the forwarder.

mod error;

pub use error::TunnelError;

use crate::cancel::CancelToken;
use crate::invoke::{Invocation, spawn_background};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::process::Child;

/// Upper bound on forwarder warm-up before probes start.
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(3);

const WARMUP_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TunnelState {
    Starting,
    Active,
    Terminated,
}

impl fmt::Display for TunnelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TunnelState::Starting => write!(f, "starting"),
            TunnelState::Active => write!(f, "active"),
            TunnelState::Terminated => write!(f, "terminated"),
        }
    }
}

/// How to start a forwarder and where it listens locally.
#[derive(Debug, Clone)]
pub struct TunnelSpec {
    /// Human-readable remote target, e.g. `demo/svc/demo-app:80`.
    pub target: String,
    pub local_port: u16,
    pub invocation: Invocation,
    pub settle: Duration,
}

impl TunnelSpec {
    /// `kubectl port-forward svc/<service> <local>:<remote> -n <namespace>`.
    pub fn port_forward(
        kubectl: &str,
        namespace: &str,
        service: &str,
        local_port: u16,
        remote_port: u16,
    ) -> Self {
        let invocation = Invocation::new(kubectl).args([
            "port-forward".to_string(),
            format!("svc/{}", service),
            format!("{}:{}", local_port, remote_port),
            "-n".to_string(),
            namespace.to_string(),
        ]);
        Self {
            target: format!("{}/svc/{}:{}", namespace, service, remote_port),
            local_port,
            invocation,
            settle: DEFAULT_SETTLE,
        }
    }

    pub fn settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }
}

/// Snapshot of a tunnel for run reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TunnelRecord {
    pub target: String,
    pub local_port: u16,
    pub state: TunnelState,
}

/// A running forwarder process owned by the stage that opened it.
pub struct Tunnel {
    target: String,
    local_port: u16,
    settle: Duration,
    state: Mutex<TunnelState>,
    child: tokio::sync::Mutex<Option<Child>>,
}

impl fmt::Debug for Tunnel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tunnel")
            .field("target", &self.target)
            .field("local_port", &self.local_port)
            .field("state", &self.state())
            .finish()
    }
}

impl Tunnel {
    /// Start the forwarder process. The tunnel is `Starting` until
    /// [`Tunnel::warm_up`] observes the local port accepting connections.
    pub fn spawn(spec: TunnelSpec) -> Result<Arc<Self>, TunnelError> {
        let child = spawn_background(&spec.invocation).map_err(|source| TunnelError::Spawn {
            target: spec.target.clone(),
            source,
        })?;

        tracing::debug!(
            "Started forwarder for {} on 127.0.0.1:{}",
            spec.target,
            spec.local_port
        );

        Ok(Arc::new(Self {
            target: spec.target,
            local_port: spec.local_port,
            settle: spec.settle,
            state: Mutex::new(TunnelState::Starting),
            child: tokio::sync::Mutex::new(Some(child)),
        }))
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    pub fn state(&self) -> TunnelState {
        *self.state.lock()
    }

    pub fn record(&self) -> TunnelRecord {
        TunnelRecord {
            target: self.target.clone(),
            local_port: self.local_port,
            state: self.state(),
        }
    }

    /// Poll the local port until it accepts a connection, bounded by the
    /// settle duration.
    ///
    /// Returns `Ok(true)` once the port answered and `Ok(false)` if the bound
    /// elapsed first. Either way the tunnel is `Active` afterwards; callers
    /// still probe through the readiness waiter. Fails if the forwarder exits.
    pub async fn warm_up(&self, cancel: &CancelToken) -> Result<bool, TunnelError> {
        let deadline = tokio::time::Instant::now() + self.settle;

        let reachable = loop {
            self.ensure_running().await?;

            if TcpStream::connect(("127.0.0.1", self.local_port))
                .await
                .is_ok()
            {
                break true;
            }

            if tokio::time::Instant::now() >= deadline {
                break false;
            }

            tokio::select! {
                _ = tokio::time::sleep(WARMUP_POLL) => {}
                _ = cancel.cancelled() => {
                    return Err(TunnelError::Cancelled { target: self.target.clone() });
                }
            }
        };

        let mut state = self.state.lock();
        if *state == TunnelState::Starting {
            *state = TunnelState::Active;
        }
        drop(state);

        if !reachable {
            tracing::debug!(
                "{} not accepting connections after {:?}, continuing",
                self.target,
                self.settle
            );
        }
        Ok(reachable)
    }

    async fn ensure_running(&self) -> Result<(), TunnelError> {
        let mut guard = self.child.lock().await;
        let Some(child) = guard.as_mut() else {
            return Err(TunnelError::Exited {
                target: self.target.clone(),
                status: "closed".to_string(),
            });
        };

        match child.try_wait() {
            Ok(None) => Ok(()),
            Ok(Some(status)) => {
                guard.take();
                *self.state.lock() = TunnelState::Terminated;
                Err(TunnelError::Exited {
                    target: self.target.clone(),
                    status: status.to_string(),
                })
            }
            Err(e) => Err(TunnelError::Exited {
                target: self.target.clone(),
                status: e.to_string(),
            }),
        }
    }

    /// Stop the forwarder. Closing a terminated tunnel is a no-op.
    ///
    /// If the kill fails the process handle is kept so a later close can try
    /// again.
    pub async fn close(&self) -> Result<(), TunnelError> {
        let mut guard = self.child.lock().await;

        if let Some(mut child) = guard.take() {
            let already_exited = matches!(child.try_wait(), Ok(Some(_)));
            if !already_exited {
                let killed = child.kill().await;
                if let Err(source) = killed {
                    *guard = Some(child);
                    return Err(TunnelError::Kill {
                        target: self.target.clone(),
                        source,
                    });
                }
            }
            tracing::debug!("Closed tunnel to {}", self.target);
        }

        *self.state.lock() = TunnelState::Terminated;
        Ok(())
    }
}
