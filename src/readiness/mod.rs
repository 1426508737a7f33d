// ABOUTME: Readiness waiter that polls a probe until ready, deadline, or cancellation.
// ABOUTME: Used for pods converging, tunnels warming up, and HTTP health endpoints.

mod command;
mod error;
mod http;

pub use command::CommandProbe;
pub use error::ReadinessError;
pub use http::{HttpProbe, HttpResponse, http_get};

use crate::cancel::CancelToken;
use async_trait::async_trait;
use std::time::{Duration, Instant};

/// Result of evaluating a probe once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    Ready,
    NotReady(String),
}

/// A condition that can be evaluated repeatedly.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Short description used in logs and timeout errors.
    fn describe(&self) -> String;

    async fn check(&self) -> ProbeStatus;
}

/// Poll parameters for one wait call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessCheck {
    pub poll_interval: Duration,
    pub deadline: Duration,
}

impl ReadinessCheck {
    pub fn new(poll_interval: Duration, deadline: Duration) -> Self {
        Self {
            poll_interval,
            deadline,
        }
    }
}

/// Wait until `probe` reports ready.
///
/// The probe is evaluated immediately and then every `poll_interval` until the
/// deadline passes. A probe that is still running when the deadline hits is
/// abandoned. Cancellation interrupts both the probe and the sleep.
pub async fn wait_until_ready(
    probe: &dyn Probe,
    check: ReadinessCheck,
    cancel: &CancelToken,
) -> Result<(), ReadinessError> {
    let what = probe.describe();
    let started = Instant::now();
    let deadline = tokio::time::Instant::now() + check.deadline;
    let mut attempts = 0u32;
    let mut last = "not evaluated".to_string();

    loop {
        attempts += 1;
        let status = tokio::select! {
            status = probe.check() => Some(status),
            _ = tokio::time::sleep_until(deadline) => None,
            _ = cancel.cancelled() => return Err(ReadinessError::Cancelled { what }),
        };

        match status {
            Some(ProbeStatus::Ready) => {
                tracing::debug!(
                    "{} ready after {} attempt(s) in {:.1}s",
                    what,
                    attempts,
                    started.elapsed().as_secs_f64()
                );
                return Ok(());
            }
            Some(ProbeStatus::NotReady(reason)) => {
                tracing::debug!("{} not ready (attempt {}): {}", what, attempts, reason);
                last = reason;
            }
            None => {}
        }

        if tokio::time::Instant::now() + check.poll_interval > deadline {
            return Err(ReadinessError::Timeout {
                what,
                deadline: check.deadline,
                last,
            });
        }

        tokio::select! {
            _ = tokio::time::sleep(check.poll_interval) => {}
            _ = cancel.cancelled() => return Err(ReadinessError::Cancelled { what }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingProbe {
        ready_after: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Probe for CountingProbe {
        fn describe(&self) -> String {
            "counter".to_string()
        }

        async fn check(&self) -> ProbeStatus {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.ready_after {
                ProbeStatus::Ready
            } else {
                ProbeStatus::NotReady(format!("call {n}"))
            }
        }
    }

    #[tokio::test]
    async fn ready_on_first_check_does_not_sleep() {
        let probe = CountingProbe {
            ready_after: 1,
            calls: AtomicU32::new(0),
        };
        let check = ReadinessCheck::new(Duration::from_secs(60), Duration::from_secs(120));
        tokio::time::timeout(
            Duration::from_secs(1),
            wait_until_ready(&probe, check, &CancelToken::new()),
        )
        .await
        .expect("should not wait for the poll interval")
        .unwrap();
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timeout_reports_last_reason() {
        let probe = CountingProbe {
            ready_after: u32::MAX,
            calls: AtomicU32::new(0),
        };
        let check = ReadinessCheck::new(Duration::from_millis(10), Duration::from_millis(50));
        let err = wait_until_ready(&probe, check, &CancelToken::new())
            .await
            .unwrap_err();
        match err {
            ReadinessError::Timeout { what, last, .. } => {
                assert_eq!(what, "counter");
                assert!(last.starts_with("call "));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
