//! Cooperative cancellation and the run deadline
//!
//! Workers never get interrupted mid-operation; they call
//! [`RunGuard::check`] at every suspension point (before each navigation,
//! scroll step, strategy and login step) and unwind with
//! `Cancelled`/`DeadlineExceeded` when it fails.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::errors::{ExtractError, ExtractResult};

/// Shared cancellation flag. Once set it is never cleared.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of every operation holding a clone of this token
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check if cancellation has been requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Cancellation token plus the run's wall-clock deadline
#[derive(Debug, Clone)]
pub struct RunGuard {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RunGuard {
    /// Guard expiring `budget` from now
    #[must_use]
    pub fn new(token: CancellationToken, budget: Duration) -> Self {
        Self {
            token,
            deadline: Some(Instant::now() + budget),
        }
    }

    /// Guard with no deadline
    #[must_use]
    pub fn unbounded(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Time left before the deadline; `None` when unbounded
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Clamp an operation timeout so it never outlives the run
    #[must_use]
    pub fn cap(&self, timeout: Duration) -> Duration {
        self.remaining().map_or(timeout, |left| timeout.min(left))
    }

    /// Fail fast when the run has been cancelled or its budget is spent
    pub fn check(&self) -> ExtractResult<()> {
        if self.token.is_cancelled() {
            return Err(ExtractError::Cancelled);
        }
        if self.is_expired() {
            return Err(ExtractError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Sleep for `duration`, returning early with an error if the run stops
    pub async fn sleep(&self, duration: Duration) -> ExtractResult<()> {
        const SLICE: Duration = Duration::from_millis(50);
        let until = Instant::now() + self.cap(duration);
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= until {
                return Ok(());
            }
            tokio::time::sleep((until - now).min(SLICE)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_visible_through_clones() {
        let token = CancellationToken::new();
        let guard = RunGuard::unbounded(token.clone());
        assert!(guard.check().is_ok());
        token.cancel();
        assert!(matches!(guard.check(), Err(ExtractError::Cancelled)));
    }

    #[tokio::test]
    async fn expired_deadline_fails_check() {
        let guard = RunGuard::new(CancellationToken::new(), Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(matches!(guard.check(), Err(ExtractError::DeadlineExceeded)));
        assert_eq!(guard.cap(Duration::from_secs(5)), Duration::ZERO);
    }
}
