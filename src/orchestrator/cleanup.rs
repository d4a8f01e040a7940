//! The `cleanup` operation: sweep finished branches, old sessions, stale
//! locks, and aged audit files.
//!
//! Deletion candidates are presented first; nothing is removed unless the
//! caller passed `--yes` (the core never prompts interactively). Branch
//! candidates are restricted to branches that have shipline session
//! history — branches the tool never managed are not its to delete.

use chrono::Utc;

use crate::audit::AuditEvent;
use crate::cancel::CancelToken;
use crate::checks::postflight;
use crate::error::WorkflowError;
use crate::result::SessionToolResult;

use super::Orchestrator;

/// Arguments to [`Orchestrator::cleanup`].
#[derive(Clone, Debug, Default)]
pub struct CleanupArgs {
    /// Report candidates without deleting anything.
    pub dry_run: bool,
    /// Actually delete (the core never prompts).
    pub yes: bool,
    /// Age threshold for sessions/audit files; defaults to the configured
    /// session TTL.
    pub days: Option<i64>,
}

impl Orchestrator {
    /// Fast-forward main and sweep leftovers: orphaned branches, old
    /// terminal/expired sessions, stale locks, aged audit files.
    ///
    /// # Errors
    /// Infrastructure failures only.
    pub fn cleanup(
        &self,
        args: &CleanupArgs,
        cancel: &CancelToken,
    ) -> Result<SessionToolResult, WorkflowError> {
        cancel.checkpoint()?;
        self.audit_op("cleanup", None);

        let days = args.days.unwrap_or(self.config().sessions.ttl_days);
        let now = Utc::now();
        let main_name = self.main_branch_name()?;
        let mut warnings = Vec::new();

        // Land on main and sync it.
        if self.git().current_branch()? != main_name {
            self.git().checkout_branch(&main_name)?;
        }
        if let Err(e) = self.git().pull(self.remote(), self.main_branch()) {
            warnings.push(format!("could not fast-forward {main_name}: {e}"));
        }

        cancel.checkpoint()?;

        // Orphaned branches: local branches with session history but no
        // live session.
        let all_sessions = self.store().list(true)?;
        let local_branches = self.git().list_branches()?;
        let orphan_branches: Vec<_> = local_branches
            .iter()
            .filter(|b| **b != main_name)
            .filter(|b| {
                let history: Vec<_> = all_sessions
                    .iter()
                    .filter(|s| &s.branch_name == *b)
                    .collect();
                !history.is_empty() && history.iter().all(|s| s.is_terminal())
            })
            .cloned()
            .collect();

        // Old sessions: terminal or expired, untouched past the threshold.
        let old_sessions = self.store().cleanup_candidates(days, now)?;

        if args.dry_run || !args.yes {
            self.audit_op_done("cleanup", None, true);
            let mut lines = Vec::new();
            for branch in &orphan_branches {
                lines.push(format!("branch eligible for deletion: {branch}"));
            }
            for session in &old_sessions {
                lines.push(format!(
                    "session eligible for deletion: {} ({}, {})",
                    session.id.short(),
                    session.branch_name,
                    session.current_state
                ));
            }
            let mut next_steps = Vec::new();
            if lines.is_empty() {
                lines.push("nothing eligible for cleanup".to_owned());
            } else {
                next_steps.push("re-run with --yes to delete the listed items".to_owned());
            }
            return Ok(SessionToolResult {
                success: true,
                warnings: lines,
                next_steps,
                ..SessionToolResult::default()
            });
        }

        cancel.checkpoint()?;

        // Delete, best-effort per item.
        let mut removed_branches = 0usize;
        for branch in &orphan_branches {
            match self.git().delete_branch(branch, true) {
                Ok(()) => {
                    removed_branches += 1;
                    self.audit_event(
                        None,
                        AuditEvent::GitAction {
                            action: format!("delete_branch {branch}"),
                        },
                    );
                }
                Err(e) => warnings.push(format!("could not delete branch {branch}: {e}")),
            }
        }

        let mut removed_sessions = 0usize;
        for session in &old_sessions {
            match self.store().delete(session.id) {
                Ok(()) => removed_sessions += 1,
                Err(e) => warnings.push(format!(
                    "could not delete session {}: {e}",
                    session.id.short()
                )),
            }
        }

        let reclaimed_locks = self.store().reclaim_stale_locks()?;
        let pruned_audit = match self.audit_log().prune_older_than(days, now) {
            Ok(count) => count,
            Err(e) => {
                warnings.push(format!("could not prune audit files: {e}"));
                0
            }
        };

        let post = vec![postflight::on_main(self.git(), self.main_branch())];

        self.audit_event(
            None,
            AuditEvent::Note {
                message: format!(
                    "cleanup removed {removed_branches} branch(es), {removed_sessions} session(s), \
                     {reclaimed_locks} stale lock(s), {pruned_audit} audit file(s)"
                ),
            },
        );
        self.audit_op_done("cleanup", None, true);

        Ok(SessionToolResult {
            success: true,
            post_flight_verifications: post,
            warnings,
            next_steps: vec![format!(
                "removed {removed_branches} branch(es), {removed_sessions} session(s), \
                 {reclaimed_locks} stale lock(s), {pruned_audit} audit file(s)"
            )],
            ..SessionToolResult::default()
        })
    }
}
