//! The `ship` pipeline: commit → push → PR → wait-for-CI → squash-merge →
//! sync → cleanup.
//!
//! The seven steps execute strictly in order with no internal parallelism.
//! Each step either advances the persisted state or fails the whole
//! operation, leaving the session at the last persisted state — a legal
//! resting point a later `ship` resumes from:
//!
//! | failure            | session rests at      |
//! |--------------------|-----------------------|
//! | push               | `changes_committed`   |
//! | PR create/update   | `pushed`              |
//! | CI failed/timeout  | `pr_created`          |
//! | merge (plain)      | `pr_created`          |
//! | merge (conflict)   | `conflict_resolution` |
//!
//! Everything after the squash-merge is best-effort: cleanup failures are
//! warnings, never errors, because the merge is authoritative — the
//! session still completes.

use std::collections::BTreeMap;

use shipline_forge::{
    CheckStatus, MergeStrategy, NewPullRequest, PullRequestUpdate, WaitOptions,
};
use shipline_git::CommitOptions;
use tracing::{info, warn};

use crate::audit::AuditEvent;
use crate::cancel::CancelToken;
use crate::checks::{postflight, preflight, CheckResult, CheckSet};
use crate::error::WorkflowError;
use crate::model::session::{PrRecord, WorkflowSession};
use crate::model::types::WorkflowState;
use crate::result::ForgeToolResult;
use crate::validate::branch::BranchValidator;
use crate::validate::pr::{classify_pr_action, PrAction};

use super::Orchestrator;

/// Arguments to [`Orchestrator::ship`].
#[derive(Clone, Debug, Default)]
pub struct ShipArgs {
    /// PR body; defaults to the session description.
    pub pr_description: Option<String>,
    /// Demote pre-flight errors to warnings.
    pub force: bool,
    /// Skip confirmation prompts (reserved for interactive embeddings; the
    /// core itself never prompts).
    pub yes: bool,
}

/// States a ship run can start from.
const SHIP_ENTRY_STATES: &[WorkflowState] = &[
    WorkflowState::BranchReady,
    WorkflowState::ChangesCommitted,
    WorkflowState::Pushed,
    WorkflowState::PrCreated,
    WorkflowState::WaitingApproval,
    WorkflowState::Merged,
];

impl Orchestrator {
    /// Take the current branch all the way to merged-and-cleaned-up.
    ///
    /// # Errors
    /// Infrastructure failures only ([`WorkflowError::LockHeld`],
    /// [`WorkflowError::Cancelled`], [`WorkflowError::Timeout`],
    /// [`WorkflowError::Persistence`]); pipeline failures are reported
    /// inside the returned result with the session left at a resting state.
    pub fn ship(
        &self,
        args: &ShipArgs,
        cancel: &CancelToken,
    ) -> Result<ForgeToolResult, WorkflowError> {
        cancel.checkpoint()?;
        self.audit_op("ship", None);

        let (branch, session) = self.current_session()?;
        let Some(session) = session else {
            let mut checks = CheckSet::new();
            checks.add(|| preflight::session_present(None, branch.as_str()));
            let blocked = checks.run(false);
            self.audit_op_done("ship", None, false);
            return Ok(blocked_result(branch.as_str(), blocked));
        };

        let _lock = self.store().acquire_lock(session.id)?;
        let mut session = self.store().get(session.id)?;
        cancel.checkpoint()?;

        // -------------------------------------------------------------------
        // Pre-flight
        // -------------------------------------------------------------------
        let main = self.main_branch().to_owned();
        let forge_kind = self.config().forge.kind.to_string();
        let expired = session.is_expired(Self::now());
        let pr_action = classify_pr_action(self.forge(), branch.as_str());

        // Branch-reuse classification: a non-launching caller is allowed to
        // continue after a merge (a new PR is created), so this check can
        // only fail on infrastructure errors.
        let validator = BranchValidator::new(self.store(), self.git(), Some(self.forge()));
        let reuse = validator.classify(&branch, false)?;
        drop(validator);

        let mut checks = CheckSet::new();
        {
            let session_ref = &session;
            let pr_action_ref = &pr_action;
            let branch_ref = &branch;
            let reuse_ref = &reuse;
            checks.add(move || {
                preflight::state_allows("Session state allows ship", session_ref, SHIP_ENTRY_STATES)
            });
            checks.add(move || preflight::session_not_expired(session_ref, expired));
            checks.add(|| preflight::not_on_main(self.git(), &main));
            checks.add(|| preflight::forge_configured(Some(forge_kind.as_str())));
            checks.add(move || preflight::branch_available(branch_ref, reuse_ref, ""));
            checks.add(move || match pr_action_ref {
                Ok(action) => preflight::pr_state(branch_ref, action),
                Err(e) => CheckResult::fail("Pull request state", e.to_string()),
            });
            checks.add(move || work_to_ship_check(self, session_ref));
        }
        let outcome = checks.run(args.force);
        if outcome.blocked {
            self.audit_check_failures(&outcome);
            self.audit_op_done("ship", Some(&session), false);
            return Ok(blocked_result(branch.as_str(), outcome));
        }

        let mut result = ForgeToolResult {
            branch_name: Some(branch.as_str().to_owned()),
            pre_flight_checks: outcome.results,
            ..ForgeToolResult::default()
        };

        // -------------------------------------------------------------------
        // Step 1 — internal commit when the tree is dirty
        // -------------------------------------------------------------------
        cancel.checkpoint()?;
        match self.git().has_uncommitted_changes() {
            Ok(true) => {
                if let Err(e) = self.internal_commit(&mut session) {
                    return Ok(self.ship_failed(result, &session, "commit", e));
                }
            }
            Ok(false) => {}
            Err(e) => return Ok(self.ship_failed(result, &session, "commit", e.into())),
        }

        // An un-advanced session with commits (made outside `shipline
        // commit`) is normalized so the push step sees changes_committed.
        if session.current_state == WorkflowState::BranchReady {
            let ahead = self.git().commits_ahead_of(&main)?;
            if ahead > 0 {
                let mut details = BTreeMap::new();
                details.insert("note".to_owned(), "commits made outside shipline".to_owned());
                self.transition(&mut session, WorkflowState::ChangesCommitted, details)?;
            }
        }

        // -------------------------------------------------------------------
        // Step 2 — push
        // -------------------------------------------------------------------
        cancel.checkpoint()?;
        if session.current_state == WorkflowState::ChangesCommitted {
            if let Err(e) = self.git().push(&branch, false) {
                return Ok(self.ship_failed(result, &session, "push", e.into()));
            }
            self.audit_event(
                Some(&session),
                AuditEvent::GitAction {
                    action: format!("push {branch}"),
                },
            );
            self.transition(&mut session, WorkflowState::Pushed, BTreeMap::new())?;
        }

        // -------------------------------------------------------------------
        // Step 3 — create or update the PR
        // -------------------------------------------------------------------
        cancel.checkpoint()?;
        if session.current_state == WorkflowState::Pushed {
            let action = match pr_action {
                Ok(action) => action,
                Err(e) => return Ok(self.ship_failed(result, &session, "pull request", e.into())),
            };
            match self.open_or_adopt_pr(&mut session, &action, args) {
                Ok(()) => {}
                Err(e) => return Ok(self.ship_failed(result, &session, "pull request", e)),
            }
            self.transition(&mut session, WorkflowState::PrCreated, BTreeMap::new())?;
        }
        if let Some(pr) = &session.metadata.pr {
            result.pr_number = Some(pr.number);
            result.pr_url = Some(pr.url.clone());
        }

        // -------------------------------------------------------------------
        // Step 4 — wait for CI
        // -------------------------------------------------------------------
        cancel.checkpoint()?;
        if session.current_state == WorkflowState::PrCreated {
            let mut last_status: Option<CheckStatus> = None;
            let wait = {
                let probe = || cancel.should_stop();
                let mut progress = |status: &CheckStatus| {
                    info!(
                        target: "shipline::orchestrator",
                        checks = %status.summary(),
                        "waiting for CI"
                    );
                    last_status = Some(status.clone());
                };
                let opts = WaitOptions {
                    timeout: self.config().ci.wait_timeout(),
                    poll_interval: self.config().ci.poll_interval(),
                    should_cancel: Some(&probe),
                    on_progress: Some(&mut progress),
                };
                match self.forge().wait_for_checks(branch.as_str(), opts) {
                    Ok(wait) => wait,
                    Err(e) => {
                        return Ok(self.ship_failed(result, &session, "ci wait", e.into()))
                    }
                }
            };
            result.checks = last_status;

            if wait.cancelled {
                // Map back onto the token's reason; the PR stays open and
                // the session rests at pr_created.
                cancel.checkpoint()?;
                return Err(WorkflowError::Cancelled);
            }
            if wait.timed_out {
                let error = WorkflowError::CiTimeout {
                    waited_secs: self.config().ci.wait_timeout_secs,
                };
                return Ok(self.ship_failed(result, &session, "ci wait", error));
            }
            if !wait.success {
                let error = WorkflowError::CiFailed {
                    failed: wait.failed_checks,
                };
                return Ok(self.ship_failed(result, &session, "ci wait", error));
            }
            self.audit_event(
                Some(&session),
                AuditEvent::ForgeAction {
                    action: "checks passed".to_owned(),
                },
            );
            // No transition yet: pr_created stays the resting state until
            // the merge itself succeeds, so a merge failure never strands
            // the session past the point it can retry from.
        }

        // -------------------------------------------------------------------
        // Step 5 — squash-merge
        //
        // Reached at pr_created (checks just passed above) or at
        // waiting_approval (a crash between the post-merge transitions).
        // -------------------------------------------------------------------
        cancel.checkpoint()?;
        if matches!(
            session.current_state,
            WorkflowState::PrCreated | WorkflowState::WaitingApproval
        ) {
            // A merged flag here means a prior run crashed after the forge
            // merge; only the transitions below are still owed.
            if !session.has_merged_pr() {
                let Some(pr_number) = session.metadata.pr.as_ref().map(|pr| pr.number) else {
                    let error = WorkflowError::NoSession {
                        target: format!("{branch} (session has no PR record)"),
                    };
                    return Ok(self.ship_failed(result, &session, "merge", error));
                };
                match self.forge().merge_pull_request(pr_number, MergeStrategy::Squash) {
                    Ok(_) => {}
                    Err(e @ shipline_forge::ForgeError::MergeConflict { .. }) => {
                        self.transition(
                            &mut session,
                            WorkflowState::ConflictResolution,
                            BTreeMap::new(),
                        )?;
                        return Ok(self.ship_failed(result, &session, "merge", e.into()));
                    }
                    Err(e) => return Ok(self.ship_failed(result, &session, "merge", e.into())),
                }
                self.audit_event(
                    Some(&session),
                    AuditEvent::ForgeAction {
                        action: format!("squash merge #{pr_number}"),
                    },
                );
                session.mark_pr_merged(Self::now());
            }
            if session.current_state == WorkflowState::PrCreated {
                self.transition(&mut session, WorkflowState::WaitingApproval, BTreeMap::new())?;
            }
            self.transition(&mut session, WorkflowState::Merged, BTreeMap::new())?;
            result.merged = Some(true);
        }

        // -------------------------------------------------------------------
        // Steps 6 & 7 — sync main, delete the branch, complete.
        // Best-effort: the merge is authoritative, failures downgrade to
        // warnings and the session still completes.
        // -------------------------------------------------------------------
        if session.current_state == WorkflowState::Merged {
            let mut warnings = Vec::new();
            self.sync_and_cleanup(&mut session, &mut warnings);
            self.transition(&mut session, WorkflowState::Complete, BTreeMap::new())?;
            result.warnings = warnings;
        }

        // Post-flight.
        result.post_flight_verifications = vec![
            postflight::on_main(self.git(), self.main_branch()),
            postflight::local_branch_presence(self.git(), &branch, false),
            postflight::remote_branch_absent(self.git(), &branch),
            postflight::session_state_is(&session, WorkflowState::Complete),
        ];

        result.success = true;
        result.state = Some(session.current_state);
        result.merged = Some(session.has_merged_pr());
        result.next_steps = vec![format!(
            "you are on {}; start the next feature with `shipline launch`",
            self.main_branch()
        )];
        self.audit_op_done("ship", Some(&session), true);
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Step helpers
    // -----------------------------------------------------------------------

    fn internal_commit(&self, session: &mut WorkflowSession) -> Result<(), WorkflowError> {
        self.git().stage_all()?;
        let message = Self::default_commit_message(session);
        let commit_id = self.git().commit(&message, CommitOptions::default())?;
        self.audit_event(
            Some(session),
            AuditEvent::GitAction {
                action: format!("commit {}", commit_id.short()),
            },
        );
        let mut details = BTreeMap::new();
        details.insert("commit".to_owned(), commit_id.as_str().to_owned());
        self.transition(session, WorkflowState::ChangesCommitted, details)
    }

    fn open_or_adopt_pr(
        &self,
        session: &mut WorkflowSession,
        action: &PrAction,
        args: &ShipArgs,
    ) -> Result<(), WorkflowError> {
        let title = Self::default_pr_title(session);
        let body = args
            .pr_description
            .clone()
            .or_else(|| session.metadata.description.clone())
            .unwrap_or_default();
        let base = self.main_branch().to_owned();
        let head = session.branch_name.as_str().to_owned();

        match action {
            PrAction::Create => {
                let created = self.forge().create_pull_request(&NewPullRequest {
                    title: title.clone(),
                    body: body.clone(),
                    base: base.clone(),
                    head: head.clone(),
                })?;
                self.audit_event(
                    Some(session),
                    AuditEvent::ForgeAction {
                        action: format!("create pr #{}", created.number),
                    },
                );
                session.record_pr(
                    PrRecord {
                        number: created.number,
                        url: created.url,
                        title,
                        body,
                        base,
                        head,
                        merged: false,
                        merged_at: None,
                    },
                    Self::now(),
                );
            }
            PrAction::Update { number } => {
                // Pushing already added the commits; refresh metadata when a
                // new description was supplied.
                if args.pr_description.is_some() {
                    self.forge().update_pull_request(
                        *number,
                        &PullRequestUpdate {
                            title: None,
                            body: Some(body.clone()),
                        },
                    )?;
                }
                self.audit_event(
                    Some(session),
                    AuditEvent::ForgeAction {
                        action: format!("adopt pr #{number}"),
                    },
                );
                if session.metadata.pr.as_ref().is_none_or(|pr| pr.number != *number) {
                    session.record_pr(
                        PrRecord {
                            number: *number,
                            url: String::new(),
                            title,
                            body,
                            base,
                            head,
                            merged: false,
                            merged_at: None,
                        },
                        Self::now(),
                    );
                }
            }
            PrAction::Block { open } => {
                return Err(WorkflowError::MultiplePrs {
                    branch: session.branch_name.as_str().to_owned(),
                    numbers: open.clone(),
                });
            }
        }
        self.store().update(session)
    }

    fn sync_and_cleanup(&self, session: &mut WorkflowSession, warnings: &mut Vec<String>) {
        let branch = session.branch_name.clone();
        let main = self.main_branch().to_owned();
        let remote = self.remote().to_owned();

        let checkout = match self.main_branch_name() {
            Ok(main_name) => self
                .git()
                .checkout_branch(&main_name)
                .map_err(WorkflowError::from),
            Err(e) => Err(e),
        };
        if let Err(e) = checkout {
            warnings.push(format!("could not check out {main}: {e}"));
            return; // Without main checked out, the remaining steps would
                    // operate on the wrong branch.
        }

        if let Err(e) = self.git().pull(&remote, &main) {
            warnings.push(format!("could not fast-forward {main}: {e}"));
        }

        // Squash-merged commits are not ancestors of main; -D is required.
        if let Err(e) = self.git().delete_branch(&branch, true) {
            warnings.push(format!("could not delete local branch {branch}: {e}"));
        }

        match self.git().branch_exists_remote(&branch) {
            Ok(true) => {
                if let Err(e) = self.git().delete_remote_branch(&branch) {
                    warnings.push(format!("could not delete remote branch {branch}: {e}"));
                } else {
                    session.record_remote_branch_deleted(Self::now());
                }
            }
            // The forge may auto-delete merged heads.
            Ok(false) => session.record_remote_branch_deleted(Self::now()),
            Err(e) => warnings.push(format!("could not probe remote branch {branch}: {e}")),
        }

        if let Err(e) = self.store().update(session) {
            warnings.push(format!("could not persist branch bookkeeping: {e}"));
        }
        for warning in warnings.iter() {
            warn!(target: "shipline::orchestrator", "{warning}");
        }
    }

    fn ship_failed(
        &self,
        mut result: ForgeToolResult,
        session: &WorkflowSession,
        step: &str,
        error: WorkflowError,
    ) -> ForgeToolResult {
        warn!(
            target: "shipline::orchestrator",
            session = %session.id,
            step,
            error = %error,
            "ship step failed"
        );
        result.success = false;
        result.state = Some(session.current_state);
        result.errors = vec![format!("step '{step}': {error}")];
        result.merged = Some(session.has_merged_pr());
        result.next_steps = vec![format!(
            "the session rests at {}; re-run `shipline ship` to resume",
            session.current_state
        )];
        self.audit_op_done("ship", Some(session), false);
        result
    }
}

fn blocked_result(branch: &str, outcome: crate::checks::CheckOutcome) -> ForgeToolResult {
    let session_shape = crate::result::SessionToolResult::blocked(Some(branch.to_owned()), outcome);
    ForgeToolResult {
        success: false,
        branch_name: session_shape.branch_name,
        pre_flight_checks: session_shape.pre_flight_checks,
        errors: session_shape.errors,
        next_steps: session_shape.next_steps,
        ..ForgeToolResult::default()
    }
}

/// There must be something to ship: commits ahead of main, a dirty tree
/// (ship will commit it), or an already-advanced session resuming.
fn work_to_ship_check(orch: &Orchestrator, session: &WorkflowSession) -> CheckResult {
    const NAME: &str = "Work to ship";
    if session.current_state != WorkflowState::BranchReady
        && session.current_state != WorkflowState::ChangesCommitted
    {
        return CheckResult::pass(NAME, "resuming an advanced session");
    }
    match orch.git().has_uncommitted_changes() {
        Ok(true) => return CheckResult::pass(NAME, "uncommitted changes will be committed"),
        Ok(false) => {}
        Err(e) => return CheckResult::fail(NAME, e.to_string()),
    }
    preflight::commits_ahead(orch.git(), orch.main_branch())
}
