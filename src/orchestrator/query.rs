//! The read-only queries: `status` and `sessions`.

use serde_json::json;

use crate::error::WorkflowError;
use crate::model::session::WorkflowSession;
use crate::model::types::WorkflowState;
use crate::result::QueryToolResult;

use super::Orchestrator;

impl Orchestrator {
    /// Where am I, what session owns this branch, and what would I do next.
    ///
    /// # Errors
    /// Git or store failures.
    pub fn status(&self) -> Result<QueryToolResult, WorkflowError> {
        let branch = self.git().current_branch()?;
        let status = self.git().status()?;
        let branch_status = self.git().branch_status()?;
        let session = self.store().get_by_branch(&branch)?;

        let session_json = session.as_ref().map(|s| {
            json!({
                "id": s.id.to_string(),
                "workflow_type": s.workflow_type,
                "state": s.current_state,
                "created_at": s.created_at,
                "pr": s.metadata.pr.as_ref().map(|pr| json!({
                    "number": pr.number,
                    "url": pr.url,
                    "merged": pr.merged,
                })),
            })
        });
        let hint = next_step_hint(&branch, session.as_ref(), self.main_branch());

        Ok(QueryToolResult {
            success: true,
            data: json!({
                "branch": branch.as_str(),
                "on_main": branch.as_str() == self.main_branch(),
                "working_tree": {
                    "clean": status.clean,
                    "summary": status.summary(),
                },
                "ahead": branch_status.ahead,
                "behind": branch_status.behind,
                "has_remote": branch_status.has_remote,
                "session": session_json,
                "next_step": hint,
            }),
            message: Some(hint.to_owned()),
            errors: Vec::new(),
            warnings: Vec::new(),
        })
    }

    /// List workflow sessions. `all` includes terminal ones.
    ///
    /// # Errors
    /// Store failures.
    pub fn sessions(&self, all: bool) -> Result<QueryToolResult, WorkflowError> {
        let now = Self::now();
        let sessions = self.store().list(all)?;
        let rows: Vec<_> = sessions
            .iter()
            .map(|s| {
                json!({
                    "id": s.id.to_string(),
                    "branch": s.branch_name.as_str(),
                    "workflow_type": s.workflow_type,
                    "state": s.current_state,
                    "created_at": s.created_at,
                    "updated_at": s.updated_at,
                    "expired": s.is_expired(now),
                    "merged": s.has_merged_pr(),
                })
            })
            .collect();

        let count = rows.len();
        Ok(QueryToolResult {
            success: true,
            data: json!({ "sessions": rows }),
            message: Some(format!("{count} session(s)")),
            errors: Vec::new(),
            warnings: Vec::new(),
        })
    }
}

/// One-line guidance matching the session's position in the workflow.
fn next_step_hint(
    branch: &shipline_git::BranchName,
    session: Option<&WorkflowSession>,
    main: &str,
) -> &'static str {
    let Some(session) = session else {
        return if branch.as_str() == main {
            "start a feature with `shipline launch`"
        } else {
            "no session owns this branch; `shipline launch` from main manages new work"
        };
    };
    match session.current_state {
        WorkflowState::Init | WorkflowState::HotfixInit => "launch is mid-flight; re-run it",
        WorkflowState::BranchReady | WorkflowState::HotfixReady => {
            "make changes, then `shipline commit`"
        }
        WorkflowState::ChangesCommitted | WorkflowState::Pushed => "`shipline ship` when ready",
        WorkflowState::PrCreated | WorkflowState::WaitingApproval => {
            "re-run `shipline ship` to finish the pipeline"
        }
        WorkflowState::Rebasing | WorkflowState::ConflictResolution => {
            "resolve conflicts, then re-run `shipline ship`"
        }
        WorkflowState::Merged => "re-run `shipline ship` to finish cleanup",
        WorkflowState::HotfixCommitted
        | WorkflowState::HotfixPushed
        | WorkflowState::HotfixValidated
        | WorkflowState::HotfixDeployed
        | WorkflowState::HotfixCleanup
        | WorkflowState::Rollback => "re-run `shipline hotfix` to drive the fix through",
        WorkflowState::Complete | WorkflowState::HotfixComplete | WorkflowState::Aborted => {
            "this session is finished; `shipline launch` starts the next one"
        }
    }
}
