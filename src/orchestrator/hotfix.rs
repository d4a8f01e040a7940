//! The `hotfix` operation: an emergency-fix workflow over the hotfix state
//! chain.
//!
//! One command, two modes. With no active hotfix session it behaves like a
//! launch: cut a `hotfix/...` branch from main and open a session. With an
//! active hotfix session on the current branch it advances the pipeline:
//! commit → push → validated → deployed → cleanup → complete. Validation
//! and deployment are recorded as state transitions only — the external
//! deployment machinery is somebody else's job.

use std::collections::BTreeMap;

use shipline_git::{BranchName, CommitOptions};
use tracing::info;

use crate::audit::AuditEvent;
use crate::cancel::CancelToken;
use crate::checks::{postflight, preflight, CheckSet};
use crate::error::WorkflowError;
use crate::model::session::WorkflowSession;
use crate::model::types::{WorkflowState, WorkflowType};
use crate::result::SessionToolResult;
use crate::validate::branch::BranchValidator;

use super::{slugify, Orchestrator};

/// Arguments to [`Orchestrator::hotfix`].
#[derive(Clone, Debug, Default)]
pub struct HotfixArgs {
    /// Branch to create; derived from the description when omitted.
    pub branch_name: Option<BranchName>,
    /// What broke; seeds commit defaults.
    pub description: Option<String>,
    /// Demote pre-flight errors to warnings (launch mode only).
    pub force: bool,
}

impl Orchestrator {
    /// Start or advance a hotfix workflow.
    ///
    /// # Errors
    /// Infrastructure failures only; domain refusals are reported inside
    /// the returned result.
    pub fn hotfix(
        &self,
        args: &HotfixArgs,
        cancel: &CancelToken,
    ) -> Result<SessionToolResult, WorkflowError> {
        cancel.checkpoint()?;
        self.audit_op("hotfix", None);

        // An active hotfix session on the current branch means "advance".
        let (_current, session) = self.current_session()?;
        if let Some(session) = session
            && session.workflow_type.is_hotfix()
        {
            return self.hotfix_advance(session, cancel);
        }
        self.hotfix_launch(args, cancel)
    }

    // -----------------------------------------------------------------------
    // Launch mode
    // -----------------------------------------------------------------------

    fn hotfix_launch(
        &self,
        args: &HotfixArgs,
        cancel: &CancelToken,
    ) -> Result<SessionToolResult, WorkflowError> {
        let main = self.main_branch().to_owned();
        let branch = match &args.branch_name {
            Some(name) => name.clone(),
            None => derive_hotfix_branch(args.description.as_deref()),
        };

        let existing = self.store().get_by_branch(&branch)?;
        let mut checks = CheckSet::new();
        checks.add(|| preflight::on_main_branch(self.git(), &main));
        checks.add(|| preflight::working_tree_clean(self.git()));
        checks.add(|| preflight::main_up_to_date(self.git(), &main));
        checks.add(|| preflight::no_active_session(existing.as_ref(), &branch));
        let mut outcome = checks.run(args.force);
        if outcome.blocked {
            self.audit_check_failures(&outcome);
            self.audit_op_done("hotfix", None, false);
            return Ok(SessionToolResult::blocked(
                Some(branch.as_str().to_owned()),
                outcome,
            ));
        }

        let validator = BranchValidator::new(self.store(), self.git(), Some(self.forge()));
        let reuse = validator.classify(&branch, true)?;
        let suggestion = if reuse.blocks_launch() {
            validator.suggest(&branch)?
        } else {
            String::new()
        };
        let reuse_check = preflight::branch_available(&branch, &reuse, &suggestion);
        let blocked = reuse_check.is_blocking();
        outcome.results.push(reuse_check);
        if blocked {
            let mut result =
                SessionToolResult::blocked(Some(branch.as_str().to_owned()), outcome);
            if let Some(err) = reuse.launch_error(&branch, suggestion) {
                result.errors = vec![err.to_string()];
            }
            self.audit_op_done("hotfix", None, false);
            return Ok(result);
        }

        cancel.checkpoint()?;

        let mut session = WorkflowSession::new(
            branch.clone(),
            WorkflowType::Hotfix,
            Self::now(),
            self.config().sessions.ttl_days,
        );
        session.metadata.description = args.description.clone();
        session.metadata.forge_kind = Some(self.config().forge.kind.to_string());
        self.store().create(&session)?;
        let _lock = self.store().acquire_lock(session.id)?;

        if let Err(e) = self
            .git()
            .create_branch(&branch, &main)
            .and_then(|()| self.git().checkout_branch(&branch))
        {
            self.store().delete(session.id)?;
            self.audit_op_done("hotfix", None, false);
            let mut result =
                SessionToolResult::blocked(Some(branch.as_str().to_owned()), outcome);
            result.errors = vec![WorkflowError::Git(e).to_string()];
            return Ok(result);
        }
        self.transition(&mut session, WorkflowState::HotfixReady, BTreeMap::new())?;

        info!(
            target: "shipline::orchestrator",
            session = %session.id,
            branch = %branch,
            "hotfix started"
        );
        self.audit_op_done("hotfix", Some(&session), true);
        Ok(SessionToolResult {
            success: true,
            branch_name: Some(branch.as_str().to_owned()),
            state: Some(session.current_state),
            pre_flight_checks: outcome.results,
            post_flight_verifications: vec![
                postflight::current_branch_is(self.git(), &branch),
                postflight::session_state_is(&session, WorkflowState::HotfixReady),
            ],
            next_steps: vec![
                "apply the fix, then run `shipline hotfix` again to drive it through".to_owned(),
            ],
            ..SessionToolResult::default()
        })
    }

    // -----------------------------------------------------------------------
    // Advance mode
    // -----------------------------------------------------------------------

    fn hotfix_advance(
        &self,
        session: WorkflowSession,
        cancel: &CancelToken,
    ) -> Result<SessionToolResult, WorkflowError> {
        let _lock = self.store().acquire_lock(session.id)?;
        let mut session = self.store().get(session.id)?;
        let branch = session.branch_name.clone();
        cancel.checkpoint()?;

        let mut warnings = Vec::new();

        // Commit pending work.
        if matches!(
            session.current_state,
            WorkflowState::HotfixReady | WorkflowState::HotfixCommitted
        ) && self.git().has_uncommitted_changes()?
        {
            self.git().stage_all()?;
            let message = session
                .metadata
                .description
                .clone()
                .map_or_else(
                    || format!("hotfix: {}", super::humanize_branch(&branch)),
                    |d| format!("hotfix: {d}"),
                );
            let commit_id = self.git().commit(&message, CommitOptions::default())?;
            let mut details = BTreeMap::new();
            details.insert("commit".to_owned(), commit_id.as_str().to_owned());
            self.transition(&mut session, WorkflowState::HotfixCommitted, details)?;
        }

        if session.current_state == WorkflowState::HotfixReady {
            // Nothing committed and nothing to commit: hold position.
            self.audit_op_done("hotfix", Some(&session), false);
            return Ok(SessionToolResult {
                success: false,
                branch_name: Some(branch.as_str().to_owned()),
                state: Some(session.current_state),
                errors: vec!["no changes to drive through the hotfix pipeline".to_owned()],
                next_steps: vec!["apply the fix first, then re-run `shipline hotfix`".to_owned()],
                ..SessionToolResult::default()
            });
        }

        // Push.
        cancel.checkpoint()?;
        if session.current_state == WorkflowState::HotfixCommitted {
            self.git().push(&branch, false)?;
            self.audit_event(
                Some(&session),
                AuditEvent::GitAction {
                    action: format!("push {branch}"),
                },
            );
            self.transition(&mut session, WorkflowState::HotfixPushed, BTreeMap::new())?;
        }

        // Validation and deployment exist as recorded transitions; the
        // external systems they describe are out of core.
        cancel.checkpoint()?;
        if session.current_state == WorkflowState::HotfixPushed {
            self.transition(&mut session, WorkflowState::HotfixValidated, BTreeMap::new())?;
        }
        if session.current_state == WorkflowState::HotfixValidated {
            self.transition(&mut session, WorkflowState::HotfixDeployed, BTreeMap::new())?;
        }

        // Cleanup and completion.
        cancel.checkpoint()?;
        if session.current_state == WorkflowState::HotfixDeployed {
            self.transition(&mut session, WorkflowState::HotfixCleanup, BTreeMap::new())?;
        }
        if session.current_state == WorkflowState::HotfixCleanup {
            let main_name = self.main_branch_name()?;
            if let Err(e) = self.git().checkout_branch(&main_name) {
                warnings.push(format!("could not check out {main_name}: {e}"));
            } else {
                if let Err(e) = self.git().pull(self.remote(), self.main_branch()) {
                    warnings.push(format!("could not fast-forward {main_name}: {e}"));
                }
                if let Err(e) = self.git().delete_branch(&branch, true) {
                    warnings.push(format!("could not delete local branch {branch}: {e}"));
                }
                match self.git().branch_exists_remote(&branch) {
                    Ok(true) => {
                        if let Err(e) = self.git().delete_remote_branch(&branch) {
                            warnings.push(format!(
                                "could not delete remote branch {branch}: {e}"
                            ));
                        } else {
                            session.record_remote_branch_deleted(Self::now());
                        }
                    }
                    Ok(false) => {}
                    Err(e) => warnings.push(format!("could not probe remote branch: {e}")),
                }
            }
            self.transition(&mut session, WorkflowState::HotfixComplete, BTreeMap::new())?;
        }

        let post = vec![
            postflight::on_main(self.git(), self.main_branch()),
            postflight::session_state_is(&session, WorkflowState::HotfixComplete),
        ];

        self.audit_op_done("hotfix", Some(&session), true);
        Ok(SessionToolResult {
            success: true,
            branch_name: Some(branch.as_str().to_owned()),
            state: Some(session.current_state),
            post_flight_verifications: post,
            warnings,
            next_steps: vec![format!(
                "hotfix landed; you are on {}",
                self.main_branch()
            )],
            ..SessionToolResult::default()
        })
    }
}

fn derive_hotfix_branch(description: Option<&str>) -> BranchName {
    let slug = description.map(slugify).filter(|s| !s.is_empty());
    let name = slug.map_or_else(
        || format!("hotfix/{}", chrono::Utc::now().format("%Y%m%d-%H%M%S")),
        |slug| format!("hotfix/{slug}"),
    );
    BranchName::new(&name)
        .unwrap_or_else(|_| BranchName::new("hotfix/fix").expect("static name is valid"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_hotfix_branch_from_description() {
        let name = derive_hotfix_branch(Some("CVE-2026-1234 fix"));
        assert_eq!(name.as_str(), "hotfix/cve-2026-1234-fix");
        assert!(derive_hotfix_branch(None).as_str().starts_with("hotfix/"));
    }
}
