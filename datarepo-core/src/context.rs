//! Per-request cancellation and deadline token.
//!
//! Every repository, cache and collaborator call takes a `&RequestContext`.
//! The engine never polls it; stores, fetchers and writers call
//! [`RequestContext::check`] before doing work and surface the result as an
//! error.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::ContextError;

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
}

/// Owner side of a cancellable context.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl RequestContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// A fresh context plus the handle that cancels it (and every clone).
    pub fn cancellable() -> (CancelHandle, Self) {
        let (tx, rx) = watch::channel(false);
        (
            CancelHandle { tx },
            Self {
                deadline: None,
                cancel: Some(rx),
            },
        )
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_cancellation(mut self, rx: watch::Receiver<bool>) -> Self {
        self.cancel = Some(rx);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    pub fn check(&self) -> Result<(), ContextError> {
        if self.is_cancelled() {
            return Err(ContextError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(ContextError::DeadlineExceeded);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_is_always_live() {
        let ctx = RequestContext::background();
        assert!(ctx.check().is_ok());
        assert!(ctx.deadline().is_none());
        assert!(ctx.remaining().is_none());
    }

    #[test]
    fn test_cancel_reaches_clones() {
        let (handle, ctx) = RequestContext::cancellable();
        let clone = ctx.clone();
        assert!(clone.check().is_ok());

        handle.cancel();
        assert_eq!(ctx.check(), Err(ContextError::Cancelled));
        assert_eq!(clone.check(), Err(ContextError::Cancelled));
    }

    #[test]
    fn test_external_watch_channel() {
        let (tx, rx) = watch::channel(false);
        let ctx = RequestContext::background().with_cancellation(rx);
        assert!(!ctx.is_cancelled());
        tx.send_replace(true);
        assert!(ctx.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires() {
        let ctx = RequestContext::background().with_timeout(Duration::from_secs(5));
        assert!(ctx.check().is_ok());
        assert_eq!(ctx.remaining(), Some(Duration::from_secs(5)));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(ctx.check(), Err(ContextError::DeadlineExceeded));
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }
}
