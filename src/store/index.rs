//! The `session-index.json` branch index.
//!
//! A denormalized listing of every session, keyed by id, maintained with
//! the same atomic-write discipline as the session files themselves. The
//! index is an accelerator, not a source of truth: readers that miss here
//! fall back to scanning `sessions/` (the store handles that).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::session::WorkflowSession;
use crate::model::types::{SessionId, WorkflowState, WorkflowType};

/// Current index schema version.
pub const INDEX_VERSION: u32 = 1;

/// One session's summary row in the index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Session id.
    pub id: SessionId,
    /// The branch the session owns.
    pub branch_name: String,
    /// Workflow family.
    pub workflow_type: WorkflowType,
    /// State at last update.
    pub current_state: WorkflowState,
    /// When the session was created.
    pub started_at: DateTime<Utc>,
    /// When the session was last written.
    pub last_modified: DateTime<Utc>,
}

impl IndexEntry {
    /// Build the index row for a session.
    #[must_use]
    pub fn for_session(session: &WorkflowSession) -> Self {
        Self {
            id: session.id,
            branch_name: session.branch_name.as_str().to_owned(),
            workflow_type: session.workflow_type,
            current_state: session.current_state,
            started_at: session.created_at,
            last_modified: session.updated_at,
        }
    }
}

/// The persisted `session-index.json` document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIndex {
    /// Summary rows, ordered by `started_at`.
    pub sessions: Vec<IndexEntry>,
    /// Schema version.
    pub version: u32,
}

impl SessionIndex {
    /// An empty index at the current schema version.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            sessions: Vec::new(),
            version: INDEX_VERSION,
        }
    }

    /// Insert or replace the row for `session`.
    pub fn upsert(&mut self, session: &WorkflowSession) {
        let entry = IndexEntry::for_session(session);
        match self.sessions.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => self.sessions.push(entry),
        }
        self.sessions.sort_by_key(|e| e.started_at);
    }

    /// Remove the row for `id`, if present.
    pub fn remove(&mut self, id: SessionId) {
        self.sessions.retain(|e| e.id != id);
    }

    /// Find the non-terminal session owning `branch`, if the index knows
    /// one.
    #[must_use]
    pub fn active_for_branch(&self, branch: &str) -> Option<&IndexEntry> {
        self.sessions
            .iter()
            .find(|e| e.branch_name == branch && !e.current_state.is_terminal())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
