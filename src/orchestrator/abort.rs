//! The `abort` operation: abandon a workflow and return to main.
//!
//! Aborting never touches the forge — an open PR stays open for the
//! operator to close or repurpose. The session is moved to `aborted`
//! *before* the git cleanup so a crash mid-abort cannot leave a live
//! session pointing at a half-dismantled branch.

use std::collections::BTreeMap;

use shipline_git::BranchName;

use crate::audit::AuditEvent;
use crate::cancel::CancelToken;
use crate::checks::{postflight, preflight, CheckSet};
use crate::error::WorkflowError;
use crate::model::types::WorkflowState;
use crate::result::SessionToolResult;

use super::Orchestrator;

/// Arguments to [`Orchestrator::abort`].
#[derive(Clone, Debug, Default)]
pub struct AbortArgs {
    /// Branch whose session to abort; defaults to the current branch.
    pub branch_name: Option<BranchName>,
    /// Also delete the branch (locally, and remotely when it was pushed).
    pub delete_branch: bool,
    /// Abort even with a dirty tree; the checkout back to main discards
    /// the changes.
    pub force: bool,
    /// Stash uncommitted changes instead of refusing.
    pub yes: bool,
}

impl Orchestrator {
    /// Abort a workflow session: park or keep uncommitted changes, mark the
    /// session `aborted`, and return to main.
    ///
    /// # Errors
    /// Infrastructure failures only; domain refusals are reported inside
    /// the returned result.
    pub fn abort(
        &self,
        args: &AbortArgs,
        cancel: &CancelToken,
    ) -> Result<SessionToolResult, WorkflowError> {
        cancel.checkpoint()?;
        self.audit_op("abort", None);

        let target = match &args.branch_name {
            Some(name) => name.clone(),
            None => self.git().current_branch()?,
        };
        let Some(session) = self.store().get_by_branch(&target)? else {
            let mut checks = CheckSet::new();
            checks.add(|| preflight::session_present(None, target.as_str()));
            let result =
                SessionToolResult::blocked(Some(target.as_str().to_owned()), checks.run(false));
            self.audit_op_done("abort", None, false);
            return Ok(result);
        };

        let _lock = self.store().acquire_lock(session.id)?;
        let mut session = self.store().get(session.id)?;
        cancel.checkpoint()?;

        let pre_flight = {
            let mut checks = CheckSet::new();
            let session_ref = &session;
            checks.add(move || {
                preflight::session_present(Some(session_ref), session_ref.branch_name.as_str())
            });
            checks.run(false)
        };

        // Uncommitted changes on the branch being abandoned: refuse by
        // default, stash with --yes, or proceed untouched with --force.
        let mut warnings = Vec::new();
        let on_target = self.git().current_branch()? == target;
        if on_target && self.git().has_uncommitted_changes()? && !args.force {
            if args.yes {
                match self.git().stash(&format!("shipline abort: {target}")) {
                    Ok(stash) => {
                        session.record_stash(stash.as_str().to_owned(), Self::now());
                        self.store().update(&session)?;
                        warnings.push(format!("uncommitted changes stashed as {stash}"));
                    }
                    Err(e) => warnings.push(format!("could not stash changes: {e}")),
                }
            } else {
                let status = self.git().status()?;
                let error = WorkflowError::DirtyWorkingTree {
                    summary: status.summary(),
                };
                self.audit_op_done("abort", Some(&session), false);
                return Ok(SessionToolResult {
                    success: false,
                    branch_name: Some(target.as_str().to_owned()),
                    state: Some(session.current_state),
                    pre_flight_checks: pre_flight.results,
                    errors: vec![error.to_string()],
                    next_steps: vec![
                        "re-run with --yes to stash the changes, or --force to discard them"
                            .to_owned(),
                    ],
                    ..SessionToolResult::default()
                });
            }
        }

        cancel.checkpoint()?;

        // Commit the abort first; the git cleanup below is recoverable by
        // hand, a wrongly-live session is not.
        let was_pushed = matches!(
            session.current_state,
            WorkflowState::Pushed
                | WorkflowState::PrCreated
                | WorkflowState::WaitingApproval
                | WorkflowState::HotfixPushed
                | WorkflowState::HotfixValidated
                | WorkflowState::HotfixDeployed
        );
        self.transition(&mut session, WorkflowState::Aborted, BTreeMap::new())?;

        // Aborting always lands the caller on main, wherever they stood.
        let mut errors = Vec::new();
        let main_name = self.main_branch_name()?;
        if let Err(e) = self.git().checkout_branch(&main_name) {
            errors.push(format!("could not check out {main_name}: {e}"));
        }

        if args.delete_branch && errors.is_empty() {
            if let Err(e) = self.git().delete_branch(&target, true) {
                warnings.push(format!("could not delete local branch {target}: {e}"));
            } else {
                self.audit_event(
                    Some(&session),
                    AuditEvent::GitAction {
                        action: format!("delete_branch {target}"),
                    },
                );
            }
            if was_pushed {
                match self.git().branch_exists_remote(&target) {
                    Ok(true) => {
                        if let Err(e) = self.git().delete_remote_branch(&target) {
                            warnings.push(format!(
                                "could not delete remote branch {target}: {e}"
                            ));
                        }
                    }
                    Ok(false) => {}
                    Err(e) => warnings.push(format!("could not probe remote branch: {e}")),
                }
            }
        }

        let mut post = vec![
            postflight::on_main(self.git(), self.main_branch()),
            postflight::session_state_is(&session, WorkflowState::Aborted),
        ];
        if args.delete_branch {
            post.push(postflight::local_branch_presence(self.git(), &target, false));
        }

        let success = errors.is_empty();
        self.audit_op_done("abort", Some(&session), success);
        Ok(SessionToolResult {
            success,
            branch_name: Some(target.as_str().to_owned()),
            state: Some(session.current_state),
            pre_flight_checks: pre_flight.results,
            post_flight_verifications: post,
            errors,
            warnings,
            next_steps: vec![format!(
                "start fresh with `shipline launch` (the open PR for {target}, if any, was left untouched)"
            )],
        })
    }
}
