//! Cooperative cancellation and deadlines.
//!
//! Every orchestrator operation carries a [`CancelToken`]. The token is
//! probed at each pipeline step boundary and between CI polls; in-flight
//! subprocess calls finish, then the next checkpoint observes the request.
//! An elapsed deadline behaves exactly like cancellation, except it
//! surfaces as [`WorkflowError::Timeout`] instead of
//! [`WorkflowError::Cancelled`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::WorkflowError;

/// A cheap, clonable cancellation handle.
///
/// Cloning shares the underlying flag: cancelling any clone cancels all of
/// them. The deadline, when present, is fixed at construction.
#[derive(Clone, Debug)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    started: Instant,
    deadline: Option<Duration>,
}

impl CancelToken {
    /// A token that never expires and is not yet cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            started: Instant::now(),
            deadline: None,
        }
    }

    /// A token that additionally expires `timeout` from now.
    #[must_use]
    pub fn with_deadline(timeout: Duration) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            started: Instant::now(),
            deadline: Some(timeout),
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Whether the deadline (if any) has elapsed.
    #[must_use]
    pub fn deadline_exceeded(&self) -> bool {
        self.deadline
            .is_some_and(|limit| self.started.elapsed() >= limit)
    }

    /// `true` when either cancelled or past the deadline. This is the probe
    /// handed to poll loops.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.is_cancelled() || self.deadline_exceeded()
    }

    /// Surface the token's state as an error, if it requests stopping.
    ///
    /// Called between pipeline steps: the current durable state is already
    /// a legal resting point, so returning here loses nothing.
    ///
    /// # Errors
    /// [`WorkflowError::Cancelled`] on explicit cancellation,
    /// [`WorkflowError::Timeout`] on an elapsed deadline.
    pub fn checkpoint(&self) -> Result<(), WorkflowError> {
        if self.is_cancelled() {
            return Err(WorkflowError::Cancelled);
        }
        if self.deadline_exceeded() {
            return Err(WorkflowError::Timeout {
                elapsed_secs: self.started.elapsed().as_secs(),
            });
        }
        Ok(())
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
