//! The [`ForgePort`] trait — the single abstraction boundary between the
//! orchestration core and the remote forge.
//!
//! # Object safety
//!
//! The trait is object-safe; cancellation and progress reporting use plain
//! `dyn` closures instead of generics so `Box<dyn ForgePort>` works.
//!
//! # The CI wait loop
//!
//! [`wait_for_checks`](ForgePort::wait_for_checks) is a provided method: a
//! cooperative poll loop over [`get_check_status`](ForgePort::get_check_status)
//! that sleeps in sub-second slices so a cancellation request is observed
//! promptly, never only at poll-interval granularity. Backends normally keep
//! the default implementation; fakes may override it to skip real sleeping.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::ForgeError;
use crate::types::{
    ChecksWait, CheckStatus, CreatedPr, MergeStrategy, NewPullRequest, PrStateFilter,
    PullRequestSummary, PullRequestUpdate,
};

/// Options controlling one [`wait_for_checks`](ForgePort::wait_for_checks)
/// call.
pub struct WaitOptions<'a> {
    /// Give up after this long (ship default: 20 minutes).
    pub timeout: Duration,
    /// Interval between forge polls (ship default: 30 seconds).
    pub poll_interval: Duration,
    /// Probed between polls; returning `true` aborts the wait.
    pub should_cancel: Option<&'a dyn Fn() -> bool>,
    /// Invoked with each fresh roll-up, for progress reporting.
    pub on_progress: Option<&'a mut dyn FnMut(&CheckStatus)>,
}

impl WaitOptions<'_> {
    /// Wait options with no cancellation probe and no progress callback.
    #[must_use]
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
            should_cancel: None,
            on_progress: None,
        }
    }
}

/// The forge abstraction trait used by the orchestration core.
pub trait ForgePort {
    /// Create a pull request and return its number and URL.
    fn create_pull_request(&self, request: &NewPullRequest) -> Result<CreatedPr, ForgeError>;

    /// Update the title and/or body of an existing pull request.
    fn update_pull_request(
        &self,
        number: u64,
        update: &PullRequestUpdate,
    ) -> Result<(), ForgeError>;

    /// List pull requests whose head branch is `head`, filtered by state.
    fn list_pull_requests(
        &self,
        head: &str,
        state: PrStateFilter,
    ) -> Result<Vec<PullRequestSummary>, ForgeError>;

    /// Aggregate CI check roll-up for a head branch.
    fn get_check_status(&self, head: &str) -> Result<CheckStatus, ForgeError>;

    /// Merge a pull request. Returns `true` when the forge confirms the
    /// merge. A conflict surfaces as [`ForgeError::MergeConflict`].
    fn merge_pull_request(&self, number: u64, strategy: MergeStrategy) -> Result<bool, ForgeError>;

    /// Poll [`get_check_status`](Self::get_check_status) until all checks
    /// pass, any check fails, the timeout elapses, or the caller cancels.
    ///
    /// Cancellation aborts the wait but leaves the PR untouched; it is the
    /// caller's job to map a cancelled wait onto its own error type.
    ///
    /// # Errors
    /// Propagates forge failures from the underlying status query.
    fn wait_for_checks(
        &self,
        head: &str,
        mut opts: WaitOptions<'_>,
    ) -> Result<ChecksWait, ForgeError> {
        let started = Instant::now();
        let cancelled = |probe: Option<&dyn Fn() -> bool>| probe.is_some_and(|f| f());

        loop {
            if cancelled(opts.should_cancel) {
                return Ok(ChecksWait {
                    cancelled: true,
                    ..ChecksWait::default()
                });
            }

            let status = self.get_check_status(head)?;
            debug!(
                target: "shipline::forge",
                head,
                passed = status.passed,
                pending = status.pending,
                failed = status.failed,
                "check poll"
            );
            if let Some(progress) = opts.on_progress.as_mut() {
                progress(&status);
            }

            if status.failed > 0 {
                return Ok(ChecksWait {
                    failed_checks: status.failed_names,
                    ..ChecksWait::default()
                });
            }
            if status.pending == 0 {
                return Ok(ChecksWait {
                    success: true,
                    ..ChecksWait::default()
                });
            }
            if started.elapsed() >= opts.timeout {
                return Ok(ChecksWait {
                    timed_out: true,
                    ..ChecksWait::default()
                });
            }

            // Sleep one poll interval, in slices, so cancellation is seen
            // within ~250ms rather than after a full 30s interval.
            let slice = Duration::from_millis(250);
            let mut slept = Duration::ZERO;
            while slept < opts.poll_interval {
                if cancelled(opts.should_cancel) {
                    return Ok(ChecksWait {
                        cancelled: true,
                        ..ChecksWait::default()
                    });
                }
                if started.elapsed() >= opts.timeout {
                    return Ok(ChecksWait {
                        timed_out: true,
                        ..ChecksWait::default()
                    });
                }
                let step = slice.min(opts.poll_interval - slept);
                std::thread::sleep(step);
                slept += step;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// A fake forge whose check status advances through a scripted sequence.
    struct ScriptedForge {
        statuses: RefCell<Vec<CheckStatus>>,
    }

    impl ScriptedForge {
        fn new(mut statuses: Vec<CheckStatus>) -> Self {
            statuses.reverse();
            Self {
                statuses: RefCell::new(statuses),
            }
        }
    }

    impl ForgePort for ScriptedForge {
        fn create_pull_request(&self, _: &NewPullRequest) -> Result<CreatedPr, ForgeError> {
            unreachable!("not used in wait tests")
        }
        fn update_pull_request(&self, _: u64, _: &PullRequestUpdate) -> Result<(), ForgeError> {
            unreachable!("not used in wait tests")
        }
        fn list_pull_requests(
            &self,
            _: &str,
            _: PrStateFilter,
        ) -> Result<Vec<PullRequestSummary>, ForgeError> {
            unreachable!("not used in wait tests")
        }
        fn get_check_status(&self, _: &str) -> Result<CheckStatus, ForgeError> {
            let mut statuses = self.statuses.borrow_mut();
            if statuses.len() > 1 {
                Ok(statuses.pop().expect("non-empty"))
            } else {
                Ok(statuses.last().expect("at least one status").clone())
            }
        }
        fn merge_pull_request(
            &self,
            _: u64,
            _: MergeStrategy,
        ) -> Result<bool, ForgeError> {
            unreachable!("not used in wait tests")
        }
    }

    fn fast_opts(timeout_ms: u64) -> WaitOptions<'static> {
        WaitOptions::new(
            Duration::from_millis(timeout_ms),
            Duration::from_millis(1),
        )
    }

    #[test]
    fn wait_resolves_success_when_pending_drains() {
        let forge = ScriptedForge::new(vec![
            CheckStatus {
                passed: 1,
                pending: 2,
                ..CheckStatus::default()
            },
            CheckStatus {
                passed: 3,
                ..CheckStatus::default()
            },
        ]);
        let outcome = forge.wait_for_checks("feature/a", fast_opts(5_000)).expect("wait");
        assert!(outcome.success);
        assert!(!outcome.timed_out);
    }

    #[test]
    fn wait_reports_failed_check_names() {
        let forge = ScriptedForge::new(vec![CheckStatus {
            passed: 2,
            failed: 1,
            failed_names: vec!["lint".to_owned()],
            ..CheckStatus::default()
        }]);
        let outcome = forge.wait_for_checks("feature/a", fast_opts(5_000)).expect("wait");
        assert!(!outcome.success);
        assert_eq!(outcome.failed_checks, vec!["lint"]);
    }

    #[test]
    fn wait_times_out_while_pending() {
        let forge = ScriptedForge::new(vec![CheckStatus {
            pending: 1,
            ..CheckStatus::default()
        }]);
        let outcome = forge.wait_for_checks("feature/a", fast_opts(10)).expect("wait");
        assert!(outcome.timed_out);
        assert!(!outcome.success);
    }

    #[test]
    fn wait_observes_cancellation() {
        static CANCEL: AtomicBool = AtomicBool::new(false);
        CANCEL.store(true, Ordering::SeqCst);

        let forge = ScriptedForge::new(vec![CheckStatus {
            pending: 1,
            ..CheckStatus::default()
        }]);
        let probe = || CANCEL.load(Ordering::SeqCst);
        let opts = WaitOptions {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(1),
            should_cancel: Some(&probe),
            on_progress: None,
        };
        let outcome = forge.wait_for_checks("feature/a", opts).expect("wait");
        assert!(outcome.cancelled);
    }

    #[test]
    fn wait_succeeds_immediately_with_no_checks() {
        let forge = ScriptedForge::new(vec![CheckStatus::default()]);
        let outcome = forge.wait_for_checks("feature/a", fast_opts(5_000)).expect("wait");
        assert!(outcome.success);
    }

    #[test]
    fn progress_callback_sees_each_poll() {
        let forge = ScriptedForge::new(vec![
            CheckStatus {
                pending: 1,
                ..CheckStatus::default()
            },
            CheckStatus {
                passed: 1,
                ..CheckStatus::default()
            },
        ]);
        let mut seen = Vec::new();
        let mut on_progress = |status: &CheckStatus| seen.push(status.clone());
        let opts = WaitOptions {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(1),
            should_cancel: None,
            on_progress: Some(&mut on_progress),
        };
        let outcome = forge.wait_for_checks("feature/a", opts).expect("wait");
        assert!(outcome.success);
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].pending, 1);
        assert_eq!(seen[1].passed, 1);
    }
}
