//! The persisted workflow session.
//!
//! A [`WorkflowSession`] records one feature's journey from branch creation
//! through merge. Sessions are serialized to `sessions/<id>.json` as
//! human-readable JSON; every mutation goes through
//! [`WorkflowSession::transition_to`] so the state history stays consistent
//! with the current state.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::machine;
use crate::model::types::{BranchName, SessionId, Trigger, WorkflowState, WorkflowType};

// ---------------------------------------------------------------------------
// StateTransition
// ---------------------------------------------------------------------------

/// One entry in a session's append-only state history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    /// State before the transition.
    pub from: WorkflowState,
    /// State after the transition.
    pub to: WorkflowState,
    /// What caused the transition.
    pub trigger: Trigger,
    /// When the transition was committed (UTC).
    pub at: DateTime<Utc>,
    /// Free-form context (commit id, PR number, stash ref, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// PrRecord / BranchRecord
// ---------------------------------------------------------------------------

/// The pull request attached to this session, once one exists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrRecord {
    /// PR number on the forge.
    pub number: u64,
    /// Web URL.
    pub url: String,
    /// PR title.
    pub title: String,
    /// PR body.
    pub body: String,
    /// Base branch (main).
    pub base: String,
    /// Head branch (the feature branch).
    pub head: String,
    /// Set exactly once, when the forge confirms the squash-merge.
    pub merged: bool,
    /// When the merge was confirmed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<DateTime<Utc>>,
}

/// Post-merge branch bookkeeping, used by the branch-reuse validator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRecord {
    /// The remote branch was deleted after merge.
    pub remote_deleted: bool,
    /// When the remote branch was deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    /// The branch was observed to exist again after retirement.
    pub recreated: bool,
    /// When recreation was observed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recreated_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// SessionMetadata
// ---------------------------------------------------------------------------

/// The recognized metadata fields of a session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Absolute path of the project the session belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<PathBuf>,
    /// Remote URL of the repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    /// Forge kind (e.g. `"github"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forge_kind: Option<String>,
    /// User identity the session was created under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Human description given at launch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Stash reference recorded by swap/abort, if changes were parked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stash: Option<String>,
    /// The session's pull request, once created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr: Option<PrRecord>,
    /// Post-merge branch bookkeeping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<BranchRecord>,
}

// ---------------------------------------------------------------------------
// WorkflowSession
// ---------------------------------------------------------------------------

/// A durable record of one feature's journey from branch creation through
/// merge.
///
/// Mutated only by the orchestrator while holding the session lock. Once a
/// terminal state is reached the session is immutable except for archival
/// cleanup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSession {
    /// Unique, immutable session id.
    pub id: SessionId,
    /// The branch this session owns; unique among non-terminal sessions.
    pub branch_name: BranchName,
    /// Workflow family.
    pub workflow_type: WorkflowType,
    /// Current state; mutated only through [`transition_to`](Self::transition_to).
    pub current_state: WorkflowState,
    /// Append-only transition history; never pruned.
    pub state_history: Vec<StateTransition>,
    /// Recognized metadata fields.
    #[serde(default)]
    pub metadata: SessionMetadata,
    /// Creation time (UTC).
    pub created_at: DateTime<Utc>,
    /// Last mutation time (UTC).
    pub updated_at: DateTime<Utc>,
    /// Expiry time; non-terminal sessions past it are rejected from
    /// continuing without explicit override.
    pub expires_at: DateTime<Utc>,
}

impl WorkflowSession {
    /// Create a new session in the family's initial state.
    ///
    /// `ttl_days` controls `expires_at` and must be positive so that
    /// `expires_at > created_at` holds.
    #[must_use]
    pub fn new(
        branch_name: BranchName,
        workflow_type: WorkflowType,
        now: DateTime<Utc>,
        ttl_days: i64,
    ) -> Self {
        Self {
            id: SessionId::generate(),
            branch_name,
            workflow_type,
            current_state: machine::initial_state(workflow_type),
            state_history: Vec::new(),
            metadata: SessionMetadata::default(),
            created_at: now,
            updated_at: now,
            expires_at: now + Duration::days(ttl_days.max(1)),
        }
    }

    /// Whether the session has reached a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.current_state.is_terminal()
    }

    /// Whether the session's TTL has elapsed.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Whether this session's PR has been merged.
    #[must_use]
    pub fn has_merged_pr(&self) -> bool {
        self.metadata.pr.as_ref().is_some_and(|pr| pr.merged)
    }

    /// Advance to `to`, appending a history entry.
    ///
    /// The trigger is looked up from the transition table; an undefined
    /// transition is refused without mutating the session.
    ///
    /// # Errors
    /// [`WorkflowError::InvalidTransition`] when the table has no entry for
    /// `current_state → to`.
    pub fn transition_to(
        &mut self,
        to: WorkflowState,
        now: DateTime<Utc>,
        metadata: BTreeMap<String, String>,
    ) -> Result<(), WorkflowError> {
        let trigger = machine::transition_trigger(self.workflow_type, self.current_state, to)
            .ok_or(WorkflowError::InvalidTransition {
                workflow: self.workflow_type,
                from: self.current_state,
                to,
            })?;
        self.state_history.push(StateTransition {
            from: self.current_state,
            to,
            trigger,
            at: now,
            metadata,
        });
        self.current_state = to;
        self.updated_at = now;
        Ok(())
    }

    /// Record the PR attached to this session.
    pub fn record_pr(&mut self, pr: PrRecord, now: DateTime<Utc>) {
        self.metadata.pr = Some(pr);
        self.updated_at = now;
    }

    /// Mark the session's PR merged. Idempotent: `merged` is set exactly
    /// once and `merged_at` keeps its first value.
    pub fn mark_pr_merged(&mut self, now: DateTime<Utc>) {
        if let Some(pr) = self.metadata.pr.as_mut()
            && !pr.merged
        {
            pr.merged = true;
            pr.merged_at = Some(now);
            self.updated_at = now;
        }
    }

    /// Record that the remote branch was deleted after merge.
    pub fn record_remote_branch_deleted(&mut self, now: DateTime<Utc>) {
        let record = self.metadata.branch.get_or_insert_with(BranchRecord::default);
        record.remote_deleted = true;
        record.deleted_at = Some(now);
        self.updated_at = now;
    }

    /// Record a stash reference parked by swap or abort.
    pub fn record_stash(&mut self, stash: String, now: DateTime<Utc>) {
        self.metadata.stash = Some(stash);
        self.updated_at = now;
    }

    /// Check the history/state consistency invariant: the last history
    /// entry's `to` equals the current state (vacuous for a fresh session).
    #[must_use]
    pub fn history_consistent(&self) -> bool {
        self.state_history
            .last()
            .is_none_or(|last| last.to == self.current_state)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
