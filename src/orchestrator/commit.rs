//! The `commit` operation: stage and record changes on the session branch.

use std::collections::BTreeMap;

use shipline_git::CommitOptions;

use crate::audit::AuditEvent;
use crate::cancel::CancelToken;
use crate::checks::{postflight, preflight, CheckSet};
use crate::error::WorkflowError;
use crate::model::session::WorkflowSession;
use crate::model::types::{WorkflowState, WorkflowType};
use crate::result::SessionToolResult;

use super::Orchestrator;

/// Arguments to [`Orchestrator::commit`].
#[derive(Clone, Debug, Default)]
pub struct CommitArgs {
    /// Commit message; defaults to the session description or a line
    /// derived from the branch name.
    pub message: Option<String>,
    /// Commit only what is already staged.
    pub staged_only: bool,
}

/// States from which `commit` may run, per workflow family.
fn commit_states(workflow: WorkflowType) -> &'static [WorkflowState] {
    if workflow.is_hotfix() {
        &[
            WorkflowState::HotfixReady,
            WorkflowState::HotfixCommitted,
            WorkflowState::HotfixPushed,
        ]
    } else {
        &[
            WorkflowState::BranchReady,
            WorkflowState::ChangesCommitted,
            WorkflowState::Pushed,
            WorkflowState::PrCreated,
        ]
    }
}

impl Orchestrator {
    /// Record the working tree as a commit on the session's branch.
    ///
    /// # Errors
    /// Infrastructure failures only; domain refusals are reported inside
    /// the returned result.
    pub fn commit(
        &self,
        args: &CommitArgs,
        cancel: &CancelToken,
    ) -> Result<SessionToolResult, WorkflowError> {
        cancel.checkpoint()?;
        self.audit_op("commit", None);

        let (branch, session) = self.current_session()?;
        let Some(session) = session else {
            let mut checks = CheckSet::new();
            checks.add(|| preflight::session_present(None, branch.as_str()));
            let result =
                SessionToolResult::blocked(Some(branch.as_str().to_owned()), checks.run(false));
            self.audit_op_done("commit", None, false);
            return Ok(result);
        };

        let _lock = self.store().acquire_lock(session.id)?;
        let mut session = self.store().get(session.id)?;
        cancel.checkpoint()?;

        let mut checks = CheckSet::new();
        {
            let session = &session;
            checks.add(move || preflight::session_present(Some(session), session.branch_name.as_str()));
            checks.add(move || {
                preflight::state_allows(
                    "Session state allows commit",
                    session,
                    commit_states(session.workflow_type),
                )
            });
            checks.add(|| preflight::has_changes(self.git()));
        }
        let outcome = checks.run(false);
        if outcome.blocked {
            self.audit_check_failures(&outcome);
            self.audit_op_done("commit", Some(&session), false);
            return Ok(SessionToolResult::blocked(
                Some(session.branch_name.as_str().to_owned()),
                outcome,
            ));
        }

        cancel.checkpoint()?;

        // Stage and commit.
        if !args.staged_only {
            if let Err(e) = self.git().stage_all() {
                return Ok(self.commit_failed(&session, outcome.results, e.into()));
            }
        }
        let message = args
            .message
            .clone()
            .unwrap_or_else(|| Self::default_commit_message(&session));
        let commit_id = match self.git().commit(&message, CommitOptions::default()) {
            Ok(id) => id,
            Err(e) => return Ok(self.commit_failed(&session, outcome.results, e.into())),
        };
        self.audit_event(
            Some(&session),
            AuditEvent::GitAction {
                action: format!("commit {}", commit_id.short()),
            },
        );

        let target = if session.workflow_type.is_hotfix() {
            WorkflowState::HotfixCommitted
        } else {
            WorkflowState::ChangesCommitted
        };
        let mut details = BTreeMap::new();
        details.insert("commit".to_owned(), commit_id.as_str().to_owned());
        self.transition(&mut session, target, details)?;

        let mut post = vec![postflight::session_state_is(&session, target)];
        if !args.staged_only {
            post.push(postflight::tree_state(self.git(), true));
        }

        self.audit_op_done("commit", Some(&session), true);
        Ok(SessionToolResult {
            success: true,
            branch_name: Some(session.branch_name.as_str().to_owned()),
            state: Some(session.current_state),
            pre_flight_checks: outcome.results,
            post_flight_verifications: post,
            errors: Vec::new(),
            warnings: Vec::new(),
            next_steps: vec!["ship it when ready: `shipline ship`".to_owned()],
        })
    }

    fn commit_failed(
        &self,
        session: &WorkflowSession,
        pre_flight: Vec<crate::checks::CheckResult>,
        error: WorkflowError,
    ) -> SessionToolResult {
        self.audit_op_done("commit", Some(session), false);
        SessionToolResult {
            success: false,
            branch_name: Some(session.branch_name.as_str().to_owned()),
            state: Some(session.current_state),
            pre_flight_checks: pre_flight,
            errors: vec![error.to_string()],
            ..SessionToolResult::default()
        }
    }
}
