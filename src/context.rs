//! Call-scoped deadlines and cancellation.
//!
//! A [`Context`] bounds how long a caller is willing to block inside the
//! queue: waiting for capacity on submit, or waiting for drain on shutdown.
//! It is never consulted once a job has been accepted.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, MutexGuard};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// How often a blocked caller re-checks its cancellation token.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Why a context stopped waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error("cancelled")]
    Cancelled,
}

/// Deadline and cancellation scope for a single queue call.
#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    token: Option<CancellationToken>,
}

impl Context {
    /// A context that never expires.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self { deadline: Some(deadline), token: None }
    }

    /// Attach a cancellation token; cancelling it ends any wait early.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.as_ref().map_or(false, CancellationToken::is_cancelled)
    }

    /// Report whether the context is already done.
    pub fn check(&self) -> Result<(), ContextError> {
        if self.is_cancelled() {
            return Err(ContextError::Cancelled);
        }
        match self.deadline {
            Some(d) if Instant::now() >= d => Err(ContextError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Block on `condvar` for at most one slice of this context's budget.
    ///
    /// Callers loop on their own predicate; spurious and slice wakeups are
    /// expected. Returns an error once the context is done.
    pub(crate) fn wait_on<T>(
        &self,
        condvar: &Condvar,
        guard: &mut MutexGuard<'_, T>,
    ) -> Result<(), ContextError> {
        self.check()?;

        let slice = match (self.remaining(), self.token.is_some()) {
            (Some(left), true) => left.min(CANCEL_POLL_INTERVAL),
            (Some(left), false) => left,
            (None, true) => CANCEL_POLL_INTERVAL,
            (None, false) => {
                condvar.wait(guard);
                return Ok(());
            }
        };
        let _ = condvar.wait_for(guard, slice);
        Ok(())
    }
}
