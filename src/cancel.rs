// ABOUTME: Cancellation token shared between the CLI signal handler and the pipeline.
// ABOUTME: Waits and invocations select on it so an abort stops them immediately.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// Cloneable cancellation signal. Cancelling is idempotent.
#[derive(Debug, Clone)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once `cancel` has been called, immediately if it already was.
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as `self`, so the channel cannot close here.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

/// How interrupt forwarding ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptOutcome {
    /// A second interrupt arrived; the caller should exit without waiting
    /// for cleanup.
    Forced,
    /// The signal source stopped delivering interrupts.
    Closed,
}

/// Forward interrupts from `next_interrupt` to `token`.
///
/// The first interrupt cancels the run so cleanup can still happen. The
/// second one returns [`InterruptOutcome::Forced`].
pub async fn forward_interrupts<F, Fut>(token: CancelToken, mut next_interrupt: F) -> InterruptOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    let mut interrupted = false;
    loop {
        if let Err(e) = next_interrupt().await {
            tracing::debug!("Interrupt handler stopped: {}", e);
            return InterruptOutcome::Closed;
        }
        if interrupted {
            tracing::warn!("Interrupted again, exiting without cleanup");
            return InterruptOutcome::Forced;
        }
        tracing::warn!("Interrupted, cancelling the current step (press Ctrl-C again to force)");
        token.cancel();
        interrupted = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn cancelled_resolves_after_cancel() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!token.is_cancelled());
        token.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter should wake")
            .unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_resolves_immediately_when_already_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        token.cancel();
        tokio::time::timeout(Duration::from_millis(100), token.cancelled())
            .await
            .expect("already cancelled token should not block");
    }

    fn interrupts(count: usize) -> impl FnMut() -> std::future::Ready<std::io::Result<()>> {
        let mut remaining = count;
        move || {
            let delivered = remaining > 0;
            remaining = remaining.saturating_sub(1);
            std::future::ready(if delivered {
                Ok(())
            } else {
                Err(std::io::Error::other("signal source closed"))
            })
        }
    }

    #[tokio::test]
    async fn first_interrupt_cancels_without_forcing() {
        let token = CancelToken::new();
        let outcome = forward_interrupts(token.clone(), interrupts(1)).await;

        assert_eq!(outcome, InterruptOutcome::Closed);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn second_interrupt_forces_exit() {
        let token = CancelToken::new();
        let outcome = forward_interrupts(token.clone(), interrupts(3)).await;

        assert_eq!(outcome, InterruptOutcome::Forced);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn earlier_cancellation_does_not_count_as_an_interrupt() {
        let token = CancelToken::new();
        token.cancel();
        let outcome = forward_interrupts(token.clone(), interrupts(1)).await;

        assert_eq!(outcome, InterruptOutcome::Closed);
    }
}
