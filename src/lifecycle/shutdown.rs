//! Shared cancellation for every long-running subsystem.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation token plus an optional deadline.
///
/// Cloning is cheap and every clone observes the same cancellation. Once
/// cancelled the context stays cancelled; cancelling again is a no-op.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl ExecutionContext {
    /// Create a fresh, uncancelled root context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat the context as cancelled once `deadline` passes.
    ///
    /// An earlier existing deadline is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Shorthand for a deadline `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once cancelled or past the deadline.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolve when the context is cancelled or its deadline passes.
    ///
    /// Resolves immediately if that already happened.
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// Owned variant of [`cancelled`](Self::cancelled) for `'static` futures.
    pub async fn cancelled_owned(self) {
        self.cancelled().await
    }

    /// Derive a context that is cancelled with this one but can also be
    /// cancelled on its own without touching the parent.
    pub fn child(&self) -> ExecutionContext {
        ExecutionContext {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_monotonic_and_idempotent() {
        let ctx = ExecutionContext::new();
        assert!(!ctx.is_cancelled());

        ctx.cancel();
        ctx.cancel();
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn cancellation_before_wait_is_not_lost() {
        let ctx = ExecutionContext::new();
        let observer = ctx.clone();
        ctx.cancel();

        // Resolves immediately; a lost wakeup would hang here.
        tokio::time::timeout(Duration::from_millis(100), observer.cancelled())
            .await
            .expect("pre-cancelled context should resolve at once");
    }

    #[tokio::test]
    async fn child_follows_parent_but_not_reverse() {
        let parent = ExecutionContext::new();
        let child = parent.child();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());

        let second = parent.child();
        parent.cancel();
        assert!(second.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_counts_as_cancellation() {
        let ctx = ExecutionContext::new().with_timeout(Duration::from_secs(5));
        assert!(!ctx.is_cancelled());

        ctx.cancelled().await;
        assert!(ctx.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn earlier_deadline_wins() {
        let now = Instant::now();
        let ctx = ExecutionContext::new()
            .with_deadline(now + Duration::from_secs(2))
            .with_deadline(now + Duration::from_secs(10));
        assert_eq!(ctx.deadline(), Some(now + Duration::from_secs(2)));
    }
}
