//! The workflow orchestrator.
//!
//! Composes the ports, the session store, the check framework, the
//! validators, and the audit log into the workflow operations: `launch`,
//! `commit`, `ship`, `abort`, `swap`, `cleanup`, `hotfix`, plus the
//! `status`/`sessions` queries. One module per operation.
//!
//! Every operation follows the same shape: resolve the target session,
//! acquire its lock for the whole call, run pre-flight checks, execute the
//! staged actions (advancing and persisting state between steps), run
//! post-flight verifications, and return a structured result. Each
//! persisted state is a legal resting point, so a cancelled or failed
//! operation can be resumed by re-running the command.

mod abort;
mod cleanup;
mod commit;
mod hotfix;
mod launch;
mod query;
mod ship;
mod swap;

pub use abort::AbortArgs;
pub use cleanup::CleanupArgs;
pub use commit::CommitArgs;
pub use hotfix::HotfixArgs;
pub use launch::LaunchArgs;
pub use ship::ShipArgs;
pub use swap::SwapArgs;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use shipline_forge::ForgePort;
use shipline_git::{BranchName, GitPort};
use tracing::info;

use crate::audit::{AuditEntry, AuditEvent, AuditLog};
use crate::config::ShiplineConfig;
use crate::error::WorkflowError;
use crate::model::session::WorkflowSession;
use crate::model::types::WorkflowState;
use crate::store::SessionStore;

/// The orchestration core. All collaborators are constructor-injected so
/// tests can supply in-memory fakes.
pub struct Orchestrator {
    git: Box<dyn GitPort>,
    forge: Box<dyn ForgePort>,
    store: SessionStore,
    audit: AuditLog,
    config: ShiplineConfig,
}

impl Orchestrator {
    /// Assemble an orchestrator from its collaborators.
    #[must_use]
    pub fn new(
        git: Box<dyn GitPort>,
        forge: Box<dyn ForgePort>,
        store: SessionStore,
        audit: AuditLog,
        config: ShiplineConfig,
    ) -> Self {
        Self {
            git,
            forge,
            store,
            audit,
            config,
        }
    }

    /// The session store (exposed for queries and tests).
    #[must_use]
    pub const fn store(&self) -> &SessionStore {
        &self.store
    }

    /// The loaded configuration.
    #[must_use]
    pub const fn config(&self) -> &ShiplineConfig {
        &self.config
    }

    pub(crate) fn git(&self) -> &dyn GitPort {
        self.git.as_ref()
    }

    pub(crate) fn forge(&self) -> &dyn ForgePort {
        self.forge.as_ref()
    }

    pub(crate) const fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    pub(crate) fn main_branch(&self) -> &str {
        &self.config.repo.main_branch
    }

    pub(crate) fn remote(&self) -> &str {
        &self.config.repo.remote
    }

    pub(crate) fn now() -> DateTime<Utc> {
        Utc::now()
    }

    /// The configured main branch as a validated name.
    pub(crate) fn main_branch_name(&self) -> Result<BranchName, WorkflowError> {
        Ok(BranchName::new(self.main_branch())?)
    }

    // -----------------------------------------------------------------------
    // Session helpers
    // -----------------------------------------------------------------------

    /// The non-terminal session owning the currently checked-out branch.
    pub(crate) fn current_session(
        &self,
    ) -> Result<(BranchName, Option<WorkflowSession>), WorkflowError> {
        let branch = self.git.current_branch()?;
        let session = self.store.get_by_branch(&branch)?;
        Ok((branch, session))
    }

    /// Advance a session and persist it, recording the transition in the
    /// audit log. The caller holds the session lock.
    pub(crate) fn transition(
        &self,
        session: &mut WorkflowSession,
        to: WorkflowState,
        details: BTreeMap<String, String>,
    ) -> Result<(), WorkflowError> {
        let from = session.current_state;
        session.transition_to(to, Self::now(), details)?;
        self.store.update(session)?;
        let trigger = session
            .state_history
            .last()
            .map(|t| t.trigger)
            .unwrap_or(crate::model::types::Trigger::BranchCreated);
        info!(
            target: "shipline::orchestrator",
            session = %session.id,
            branch = %session.branch_name,
            %from,
            %to,
            "state transition"
        );
        self.audit_event(
            Some(session),
            AuditEvent::StateChanged { from, to, trigger },
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Audit helpers
    // -----------------------------------------------------------------------

    pub(crate) fn audit_event(&self, session: Option<&WorkflowSession>, event: AuditEvent) {
        self.audit.append(&AuditEntry {
            at: Self::now(),
            session_id: session.map(|s| s.id),
            branch: session.map(|s| s.branch_name.as_str().to_owned()),
            event,
            details: BTreeMap::new(),
        });
    }

    pub(crate) fn audit_op(&self, operation: &str, session: Option<&WorkflowSession>) {
        self.audit_event(
            session,
            AuditEvent::OperationStarted {
                operation: operation.to_owned(),
            },
        );
    }

    pub(crate) fn audit_op_done(
        &self,
        operation: &str,
        session: Option<&WorkflowSession>,
        success: bool,
    ) {
        self.audit_event(
            session,
            AuditEvent::OperationFinished {
                operation: operation.to_owned(),
                success,
            },
        );
    }

    // -----------------------------------------------------------------------
    // Naming helpers
    // -----------------------------------------------------------------------

    /// Default commit message for a session: its description, or a line
    /// derived from the branch name.
    pub(crate) fn default_commit_message(session: &WorkflowSession) -> String {
        session
            .metadata
            .description
            .clone()
            .unwrap_or_else(|| format!("feat: {}", humanize_branch(&session.branch_name)))
    }

    /// Default PR title for a session.
    pub(crate) fn default_pr_title(session: &WorkflowSession) -> String {
        session
            .metadata
            .description
            .clone()
            .unwrap_or_else(|| humanize_branch(&session.branch_name))
    }
}

/// Turn `feature/add-user-auth` into `Add user auth`.
pub(crate) fn humanize_branch(branch: &BranchName) -> String {
    let stem = branch
        .as_str()
        .rsplit_once('/')
        .map_or(branch.as_str(), |(_, stem)| stem);
    let spaced = stem.replace(['-', '_'], " ");
    let mut chars = spaced.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().collect::<String>() + chars.as_str()
    })
}

/// Derive a branch slug from a free-form description:
/// `"Add user auth!"` → `add-user-auth`.
pub(crate) fn slugify(description: &str) -> String {
    let mut slug = String::with_capacity(description.len());
    let mut last_dash = true;
    for c in description.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
        if slug.len() >= 48 {
            break;
        }
    }
    slug.trim_end_matches('-').to_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
