//! The `launch` operation: start a feature workflow on a fresh branch.

use std::collections::BTreeMap;

use shipline_git::{BranchName, StashRef};
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

/// Arguments to [`Orchestrator::launch`].
#[derive(Clone, Debug, Default)]
pub struct LaunchArgs {
    /// Branch to create; derived from the description when omitted.
    pub branch_name: Option<BranchName>,
    /// What this feature is about; seeds commit/PR defaults.
    pub description: Option<String>,
    /// Demote pre-flight errors (dirty tree, stale main) to warnings.
    pub force: bool,
    /// A stash to apply onto the fresh branch.
    pub stash_ref: Option<String>,
}

impl Orchestrator {
    /// Start a new workflow: create a session, cut the branch from main's
    /// tip, and check it out.
    ///
    /// # Errors
    /// Infrastructure failures only ([`WorkflowError::LockHeld`],
    /// [`WorkflowError::Cancelled`], [`WorkflowError::Persistence`], ...);
    /// domain refusals are reported inside the returned result.
    pub fn launch(
        &self,
        args: &LaunchArgs,
        cancel: &CancelToken,
    ) -> Result<SessionToolResult, WorkflowError> {
        cancel.checkpoint()?;
        self.audit_op("launch", None);

        let main = self.main_branch().to_owned();
        let branch = match &args.branch_name {
            Some(name) => name.clone(),
            None => derive_branch_name(args.description.as_deref()),
        };

        // Pre-flight. The force flag can demote environment problems; the
        // branch-retirement gate below is exempt from it.
        let existing = self.store().get_by_branch(&branch)?;
        let mut checks = CheckSet::new();
        checks.add(|| preflight::on_main_branch(self.git(), &main));
        checks.add(|| preflight::working_tree_clean(self.git()));
        checks.add(|| preflight::main_up_to_date(self.git(), &main));
        checks.add(|| preflight::no_active_session(existing.as_ref(), &branch));
        let mut outcome = checks.run(args.force);

        if outcome.blocked {
            self.audit_check_failures(&outcome);
            self.audit_op_done("launch", None, false);
            return Ok(SessionToolResult::blocked(
                Some(branch.as_str().to_owned()),
                outcome,
            ));
        }

        // Branch retirement is an invariant, not an environment problem:
        // --force never overrides it.
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
            let mut result = SessionToolResult::blocked(Some(branch.as_str().to_owned()), outcome);
            if let Some(err) = reuse.launch_error(&branch, suggestion) {
                result.errors = vec![err.to_string()];
            }
            self.audit_op_done("launch", None, false);
            return Ok(result);
        }

        cancel.checkpoint()?;

        // Create the session first so the branch name is claimed, then cut
        // the branch. A git failure rolls the session back — durable state
        // must not outlive a failed launch.
        let mut session =
            WorkflowSession::new(branch.clone(), WorkflowType::Launch, Self::now(), self.config().sessions.ttl_days);
        session.metadata.description = args.description.clone();
        session.metadata.forge_kind = Some(self.config().forge.kind.to_string());
        session.metadata.user = self.config().user.name.clone();
        self.store().create(&session)?;
        let _lock = self.store().acquire_lock(session.id)?;

        if let Err(e) = self
            .git()
            .create_branch(&branch, &main)
            .and_then(|()| self.git().checkout_branch(&branch))
        {
            self.store().delete(session.id)?;
            self.audit_op_done("launch", None, false);
            let mut result = SessionToolResult::blocked(Some(branch.as_str().to_owned()), outcome);
            result.errors = vec![WorkflowError::Git(e).to_string()];
            return Ok(result);
        }
        self.audit_event(
            Some(&session),
            AuditEvent::GitAction {
                action: format!("create_branch {branch} from {main}"),
            },
        );

        self.transition(&mut session, WorkflowState::BranchReady, BTreeMap::new())?;

        // Optionally re-apply parked work onto the fresh branch.
        let mut warnings = Vec::new();
        let mut stash_applied = false;
        if let Some(stash) = &args.stash_ref {
            match self.git().stash_apply(&StashRef(stash.clone())) {
                Ok(()) => {
                    stash_applied = true;
                    session.record_stash(stash.clone(), Self::now());
                    self.store().update(&session)?;
                }
                Err(e) => warnings.push(format!("could not apply stash {stash}: {e}")),
            }
        }

        // Post-flight.
        let post = vec![
            postflight::current_branch_is(self.git(), &branch),
            postflight::session_state_is(&session, WorkflowState::BranchReady),
            postflight::tree_state(self.git(), !stash_applied),
        ];

        info!(
            target: "shipline::orchestrator",
            session = %session.id,
            branch = %branch,
            "launch complete"
        );
        self.audit_op_done("launch", Some(&session), true);

        Ok(SessionToolResult {
            success: true,
            branch_name: Some(branch.as_str().to_owned()),
            state: Some(session.current_state),
            pre_flight_checks: outcome.results,
            post_flight_verifications: post,
            errors: Vec::new(),
            warnings,
            next_steps: vec![
                "make your changes, then `shipline commit`".to_owned(),
                "when the feature is ready: `shipline ship`".to_owned(),
            ],
        })
    }

    pub(crate) fn audit_check_failures(&self, outcome: &crate::checks::CheckOutcome) {
        for result in outcome.results.iter().filter(|r| !r.passed) {
            self.audit_event(
                None,
                AuditEvent::CheckFailed {
                    check: result.name.clone(),
                    message: result.message.clone(),
                },
            );
        }
    }
}

/// Derive a branch name from the description, or fall back to a timestamped
/// name.
fn derive_branch_name(description: Option<&str>) -> BranchName {
    let slug = description.map(slugify).filter(|s| !s.is_empty());
    let name = slug.map_or_else(
        || {
            format!(
                "feature/{}",
                chrono::Utc::now().format("%Y%m%d-%H%M%S")
            )
        },
        |slug| format!("feature/{slug}"),
    );
    // Both arms produce names that satisfy branch-name validation.
    BranchName::new(&name).unwrap_or_else(|_| {
        BranchName::new("feature/launch").expect("static name is valid")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_branch_from_description() {
        let name = derive_branch_name(Some("Add user auth"));
        assert_eq!(name.as_str(), "feature/add-user-auth");
    }

    #[test]
    fn falls_back_to_timestamped_name() {
        let name = derive_branch_name(None);
        assert!(name.as_str().starts_with("feature/"));
        let name = derive_branch_name(Some("!!!"));
        assert!(name.as_str().starts_with("feature/"));
    }
}
