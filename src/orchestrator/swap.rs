//! The `swap` operation: move between active workflow branches.

use shipline_git::BranchName;

use crate::cancel::CancelToken;
use crate::checks::{postflight, preflight, CheckResult, CheckSet};
use crate::error::WorkflowError;
use crate::result::SessionToolResult;

use super::Orchestrator;

/// Arguments to [`Orchestrator::swap`].
#[derive(Clone, Debug, Default)]
pub struct SwapArgs {
    /// Branch to switch to. Its session must exist.
    pub branch_name: Option<BranchName>,
    /// Switch even with a dirty tree; the checkout discards the changes.
    pub force: bool,
    /// Stash uncommitted changes before switching.
    pub stash: bool,
}

impl Orchestrator {
    /// Switch to another session's branch, optionally stashing the current
    /// tree.
    ///
    /// # Errors
    /// Infrastructure failures only; domain refusals are reported inside
    /// the returned result.
    pub fn swap(
        &self,
        args: &SwapArgs,
        cancel: &CancelToken,
    ) -> Result<SessionToolResult, WorkflowError> {
        cancel.checkpoint()?;
        self.audit_op("swap", None);

        let Some(target) = args.branch_name.clone() else {
            let mut result = SessionToolResult {
                branch_name: None,
                errors: vec!["swap requires a branch name".to_owned()],
                next_steps: vec!["list sessions with `shipline sessions`".to_owned()],
                ..SessionToolResult::default()
            };
            result.pre_flight_checks.push(CheckResult::fail(
                "Target branch named",
                "no branch given",
            ));
            self.audit_op_done("swap", None, false);
            return Ok(result);
        };

        let current = self.git().current_branch()?;
        let target_session = self.store().get_by_branch(&target)?;

        let mut checks = CheckSet::new();
        {
            let target_ref = &target;
            let current_ref = &current;
            let session_opt = target_session.as_ref();
            checks.add(move || preflight::session_present(session_opt, target_ref.as_str()));
            checks.add(move || {
                const NAME: &str = "Not already on target";
                if current_ref == target_ref {
                    CheckResult::fail(NAME, format!("already on '{target_ref}'"))
                } else {
                    CheckResult::pass(NAME, format!("currently on '{current_ref}'"))
                }
            });
            checks.add(move || {
                const NAME: &str = "Target branch exists";
                match self.git().branch_exists_local(target_ref) {
                    Ok(true) => CheckResult::pass(NAME, format!("'{target_ref}' exists locally")),
                    Ok(false) => CheckResult::fail(NAME, format!("'{target_ref}' is missing locally"))
                        .with_suggestion("the session's branch was deleted; abort the session"),
                    Err(e) => CheckResult::fail(NAME, e.to_string()),
                }
            });
        }
        let outcome = checks.run(false);
        if outcome.blocked {
            self.audit_check_failures(&outcome);
            self.audit_op_done("swap", None, false);
            return Ok(SessionToolResult::blocked(
                Some(target.as_str().to_owned()),
                outcome,
            ));
        }
        let Some(target_session) = target_session else {
            // session_present above guarantees this; defensive unreachable
            // is not worth a panic path, so treat as blocked.
            return Ok(SessionToolResult::blocked(
                Some(target.as_str().to_owned()),
                outcome,
            ));
        };

        // The target session's lock serializes swaps against other
        // operations on that session.
        let _lock = self.store().acquire_lock(target_session.id)?;
        cancel.checkpoint()?;

        // Park or reject uncommitted changes.
        let mut warnings = Vec::new();
        let mut stash_recorded = false;
        if self.git().has_uncommitted_changes()? && !args.force {
            if args.stash {
                let stash = self
                    .git()
                    .stash(&format!("shipline swap: leaving {current}"))?;
                // Record the stash on the session owning the work, so a
                // later swap back can restore it.
                if let Some(mut current_session) = self.store().get_by_branch(&current)? {
                    current_session.record_stash(stash.as_str().to_owned(), Self::now());
                    self.store().update(&current_session)?;
                    stash_recorded = true;
                } else {
                    warnings.push(format!(
                        "changes stashed as {stash}, but '{current}' has no session to record it on"
                    ));
                }
            } else {
                let status = self.git().status()?;
                let error = WorkflowError::DirtyWorkingTree {
                    summary: status.summary(),
                };
                self.audit_op_done("swap", Some(&target_session), false);
                return Ok(SessionToolResult {
                    success: false,
                    branch_name: Some(target.as_str().to_owned()),
                    state: Some(target_session.current_state),
                    pre_flight_checks: outcome.results,
                    errors: vec![error.to_string()],
                    next_steps: vec![
                        "re-run with --stash to park the changes, or --force to discard them"
                            .to_owned(),
                    ],
                    ..SessionToolResult::default()
                });
            }
        }

        self.git().checkout_branch(&target)?;

        let post = vec![
            postflight::current_branch_is(self.git(), &target),
            postflight::session_state_is(&target_session, target_session.current_state),
        ];

        self.audit_op_done("swap", Some(&target_session), true);
        let mut next_steps = vec![format!(
            "resume with `shipline status`; session is at {}",
            target_session.current_state
        )];
        if stash_recorded {
            next_steps.push(format!(
                "swap back to '{current}' later and `git stash pop` to restore the parked changes"
            ));
        }
        Ok(SessionToolResult {
            success: true,
            branch_name: Some(target.as_str().to_owned()),
            state: Some(target_session.current_state),
            pre_flight_checks: outcome.results,
            post_flight_verifications: post,
            errors: Vec::new(),
            warnings,
            next_steps,
        })
    }
}
