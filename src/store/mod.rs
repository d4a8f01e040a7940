//! The durable session store.
//!
//! Sessions live under the project-local state directory:
//!
//! ```text
//! .shipline/
//!   sessions/<id>.json     one document per session
//!   session-index.json     branch index (accelerator, not source of truth)
//!   locks/<id>.lock        advisory per-session locks
//! ```
//!
//! Every write is atomic: serialize, write to a sibling temp file, fsync,
//! rename. A crash at any point leaves either the old document or the new
//! one, never a torn file. The index is maintained with the same
//! discipline; readers that miss in the index fall back to a directory
//! scan.

pub mod index;
pub mod lock;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::error::WorkflowError;
use crate::model::session::WorkflowSession;
use crate::model::types::{BranchName, SessionId};

pub use index::{IndexEntry, SessionIndex};
pub use lock::SessionLock;

/// File-backed store of workflow sessions.
#[derive(Clone, Debug)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    /// Open (creating directories as needed) the store under `state_dir`.
    ///
    /// # Errors
    /// [`WorkflowError::Persistence`] when the directories cannot be
    /// created.
    pub fn open(state_dir: impl Into<PathBuf>) -> Result<Self, WorkflowError> {
        let root = state_dir.into();
        for dir in [root.join("sessions"), root.join("locks")] {
            fs::create_dir_all(&dir).map_err(|e| WorkflowError::Persistence {
                path: dir.clone(),
                detail: e.to_string(),
            })?;
        }
        Ok(Self { root })
    }

    /// The state directory this store lives under.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }

    fn locks_dir(&self) -> PathBuf {
        self.root.join("locks")
    }

    fn session_path(&self, id: SessionId) -> PathBuf {
        self.sessions_dir().join(format!("{id}.json"))
    }

    fn index_path(&self) -> PathBuf {
        self.root.join("session-index.json")
    }

    // -----------------------------------------------------------------------
    // CRUD
    // -----------------------------------------------------------------------

    /// Persist a brand-new session.
    ///
    /// Enforces the one-active-session-per-branch invariant.
    ///
    /// # Errors
    /// [`WorkflowError::SessionExists`] when a non-terminal session already
    /// owns the branch; [`WorkflowError::Persistence`] on write failure.
    pub fn create(&self, session: &WorkflowSession) -> Result<(), WorkflowError> {
        if self.get_by_branch(&session.branch_name)?.is_some() {
            return Err(WorkflowError::SessionExists {
                branch: session.branch_name.as_str().to_owned(),
            });
        }
        self.write_session(session)?;
        debug!(
            target: "shipline::store",
            session = %session.id,
            branch = %session.branch_name,
            "session created"
        );
        Ok(())
    }

    /// Load a session by id.
    ///
    /// # Errors
    /// [`WorkflowError::NoSession`] when absent;
    /// [`WorkflowError::Persistence`] when the file is unreadable.
    pub fn get(&self, id: SessionId) -> Result<WorkflowSession, WorkflowError> {
        let path = self.session_path(id);
        let contents = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                WorkflowError::NoSession {
                    target: id.to_string(),
                }
            } else {
                WorkflowError::Persistence {
                    path: path.clone(),
                    detail: e.to_string(),
                }
            }
        })?;
        serde_json::from_str(&contents).map_err(|e| WorkflowError::Persistence {
            path,
            detail: format!("corrupt session document: {e}"),
        })
    }

    /// Find the non-terminal session owning `branch`, if any.
    ///
    /// Consults the index first; on a miss, falls back to scanning the
    /// sessions directory (the index may lag a crash).
    ///
    /// # Errors
    /// [`WorkflowError::Persistence`] on unreadable state.
    pub fn get_by_branch(
        &self,
        branch: &BranchName,
    ) -> Result<Option<WorkflowSession>, WorkflowError> {
        let index = self.load_index()?;
        if let Some(entry) = index.active_for_branch(branch.as_str()) {
            // The index said so, but the session file is the truth.
            match self.get(entry.id) {
                Ok(session) if !session.is_terminal() => return Ok(Some(session)),
                Ok(_) | Err(WorkflowError::NoSession { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        // Fallback scan.
        Ok(self
            .list(true)?
            .into_iter()
            .find(|s| &s.branch_name == branch && !s.is_terminal()))
    }

    /// Every session that ever owned `branch`, terminal ones included,
    /// newest first. Used by the branch-reuse validator.
    ///
    /// # Errors
    /// [`WorkflowError::Persistence`] on unreadable state.
    pub fn all_for_branch(
        &self,
        branch: &BranchName,
    ) -> Result<Vec<WorkflowSession>, WorkflowError> {
        let mut sessions: Vec<_> = self
            .list(true)?
            .into_iter()
            .filter(|s| &s.branch_name == branch)
            .collect();
        sessions.sort_by_key(|s| std::cmp::Reverse(s.created_at));
        Ok(sessions)
    }

    /// List sessions, oldest first. `include_terminal` keeps completed and
    /// aborted sessions in the listing.
    ///
    /// # Errors
    /// [`WorkflowError::Persistence`] when the directory cannot be read.
    pub fn list(&self, include_terminal: bool) -> Result<Vec<WorkflowSession>, WorkflowError> {
        let dir = self.sessions_dir();
        let entries = fs::read_dir(&dir).map_err(|e| WorkflowError::Persistence {
            path: dir.clone(),
            detail: e.to_string(),
        })?;
        let mut sessions = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let Ok(contents) = fs::read_to_string(&path) else {
                continue;
            };
            match serde_json::from_str::<WorkflowSession>(&contents) {
                Ok(session) if include_terminal || !session.is_terminal() => {
                    sessions.push(session);
                }
                Ok(_) => {}
                Err(e) => {
                    // A torn write cannot happen (atomic rename), so this is
                    // a schema drift or manual edit. Skip and keep going.
                    warn!(
                        target: "shipline::store",
                        path = %path.display(),
                        error = %e,
                        "skipping unreadable session document"
                    );
                }
            }
        }
        sessions.sort_by_key(|s| s.created_at);
        Ok(sessions)
    }

    /// Persist an updated session. The caller holds the session lock.
    ///
    /// # Errors
    /// [`WorkflowError::Persistence`] on write failure.
    pub fn update(&self, session: &WorkflowSession) -> Result<(), WorkflowError> {
        self.write_session(session)
    }

    /// Delete a session document and its index row. Idempotent.
    ///
    /// # Errors
    /// [`WorkflowError::Persistence`] on I/O failure other than absence.
    pub fn delete(&self, id: SessionId) -> Result<(), WorkflowError> {
        let path = self.session_path(id);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(WorkflowError::Persistence {
                    path,
                    detail: e.to_string(),
                })
            }
        }
        let mut index = self.load_index()?;
        index.remove(id);
        self.write_index(&index)?;
        // A leftover lock for a deleted session is meaningless.
        let _ = fs::remove_file(self.locks_dir().join(format!("{id}.lock")));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Locking
    // -----------------------------------------------------------------------

    /// Acquire the advisory lock for `id`. The returned guard releases on
    /// drop.
    ///
    /// # Errors
    /// [`WorkflowError::LockHeld`] when another invocation holds it.
    pub fn acquire_lock(&self, id: SessionId) -> Result<SessionLock, WorkflowError> {
        SessionLock::acquire(&self.locks_dir(), id)
    }

    /// Remove stale locks (older than 24 hours). Returns the count removed.
    ///
    /// # Errors
    /// [`WorkflowError::Persistence`] when the lock directory is unreadable.
    pub fn reclaim_stale_locks(&self) -> Result<usize, WorkflowError> {
        lock::reclaim_stale(&self.locks_dir())
    }

    // -----------------------------------------------------------------------
    // Expiry
    // -----------------------------------------------------------------------

    /// Sessions eligible for archival deletion: terminal or expired, and
    /// untouched for more than `older_than_days`.
    ///
    /// # Errors
    /// [`WorkflowError::Persistence`] on unreadable state.
    pub fn cleanup_candidates(
        &self,
        older_than_days: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<WorkflowSession>, WorkflowError> {
        let cutoff = now - Duration::days(older_than_days.max(0));
        Ok(self
            .list(true)?
            .into_iter()
            .filter(|s| (s.is_terminal() || s.is_expired(now)) && s.updated_at < cutoff)
            .collect())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn write_session(&self, session: &WorkflowSession) -> Result<(), WorkflowError> {
        let path = self.session_path(session.id);
        let json =
            serde_json::to_string_pretty(session).map_err(|e| WorkflowError::Persistence {
                path: path.clone(),
                detail: format!("serialize: {e}"),
            })?;
        write_atomic(&path, json.as_bytes())?;

        let mut index = self.load_index()?;
        index.upsert(session);
        self.write_index(&index)
    }

    fn load_index(&self) -> Result<SessionIndex, WorkflowError> {
        let path = self.index_path();
        match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).or_else(|e| {
                // An unreadable index is rebuilt from the directory scan on
                // the next write; never fail a read over it.
                warn!(
                    target: "shipline::store",
                    error = %e,
                    "session index unreadable; treating as empty"
                );
                Ok(SessionIndex::empty())
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SessionIndex::empty()),
            Err(e) => Err(WorkflowError::Persistence {
                path,
                detail: e.to_string(),
            }),
        }
    }

    fn write_index(&self, index: &SessionIndex) -> Result<(), WorkflowError> {
        let path = self.index_path();
        let json = serde_json::to_string_pretty(index).map_err(|e| WorkflowError::Persistence {
            path: path.clone(),
            detail: format!("serialize: {e}"),
        })?;
        write_atomic(&path, json.as_bytes())
    }
}

/// Write `contents` to `path` atomically.
///
/// 1. Write to a temp file in the same directory (same filesystem).
/// 2. fsync the temp file.
/// 3. Rename (atomic on POSIX) over the target path.
///
/// # Errors
/// [`WorkflowError::Persistence`] at any step; the target file is left
/// unchanged on failure.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), WorkflowError> {
    let persist_err = |detail: String| WorkflowError::Persistence {
        path: path.to_owned(),
        detail,
    };

    let dir = path
        .parent()
        .ok_or_else(|| persist_err("no parent directory".to_owned()))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| persist_err("no file name".to_owned()))?
        .to_string_lossy();
    // Per-process temp name so concurrent writers to different sessions
    // never collide on the scratch file.
    let tmp_path = dir.join(format!(".{file_name}.{}.tmp", std::process::id()));

    let mut file =
        fs::File::create(&tmp_path).map_err(|e| persist_err(format!("create temp: {e}")))?;
    file.write_all(contents)
        .map_err(|e| persist_err(format!("write temp: {e}")))?;
    file.sync_all()
        .map_err(|e| persist_err(format!("fsync: {e}")))?;
    drop(file);

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        persist_err(format!("rename into place: {e}"))
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
