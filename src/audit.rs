//! Append-only audit log.
//!
//! Every orchestration run leaves a forensic trail: operation start/end,
//! state transitions, check failures, and git/forge side effects, one JSON
//! object per line in a daily file under `audit/<YYYY-MM-DD>.log`. Entries
//! are never rewritten; daily files are retained until `cleanup` removes
//! old ones.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::WorkflowError;
use crate::model::types::{SessionId, Trigger, WorkflowState};

// ---------------------------------------------------------------------------
// AuditEvent / AuditEntry
// ---------------------------------------------------------------------------

/// The kind of event an audit entry records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// An orchestrator operation began.
    OperationStarted {
        /// Operation name (`launch`, `ship`, ...).
        operation: String,
    },
    /// An orchestrator operation finished.
    OperationFinished {
        /// Operation name.
        operation: String,
        /// Whether it reported success.
        success: bool,
    },
    /// A session state transition was committed.
    StateChanged {
        /// State before.
        from: WorkflowState,
        /// State after.
        to: WorkflowState,
        /// The trigger that legitimized the move.
        trigger: Trigger,
    },
    /// A pre-flight check failed.
    CheckFailed {
        /// Check name.
        check: String,
        /// Failure message.
        message: String,
    },
    /// A git side effect was performed.
    GitAction {
        /// What was done (`push`, `delete_branch`, ...).
        action: String,
    },
    /// A forge side effect was performed.
    ForgeAction {
        /// What was done (`create_pr`, `squash_merge`, ...).
        action: String,
    },
    /// Free-form note.
    Note {
        /// The note text.
        message: String,
    },
}

/// One line of the audit log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the event happened (UTC).
    pub at: DateTime<Utc>,
    /// The session involved, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// The branch involved, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// The event itself.
    pub event: AuditEvent,
    /// Extra context (PR number, commit id, error kind, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// AuditLog
// ---------------------------------------------------------------------------

/// Append-only writer/reader over the daily audit files.
#[derive(Clone, Debug)]
pub struct AuditLog {
    dir: PathBuf,
}

impl AuditLog {
    /// Open (creating the directory as needed) the audit log under
    /// `state_dir/audit`.
    ///
    /// # Errors
    /// [`WorkflowError::Persistence`] when the directory cannot be created.
    pub fn open(state_dir: &Path) -> Result<Self, WorkflowError> {
        let dir = state_dir.join("audit");
        fs::create_dir_all(&dir).map_err(|e| WorkflowError::Persistence {
            path: dir.clone(),
            detail: e.to_string(),
        })?;
        Ok(Self { dir })
    }

    fn day_path(&self, day: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.log", day.format("%Y-%m-%d")))
    }

    /// Append one entry to today's file.
    ///
    /// Audit writes are deliberately non-fatal: a failed append is logged
    /// and swallowed so bookkeeping can never break a workflow operation.
    pub fn append(&self, entry: &AuditEntry) {
        let path = self.day_path(entry.at.date_naive());
        let result = serde_json::to_string(entry)
            .map_err(|e| e.to_string())
            .and_then(|line| {
                fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .and_then(|mut file| writeln!(file, "{line}"))
                    .map_err(|e| e.to_string())
            });
        if let Err(detail) = result {
            warn!(
                target: "shipline::audit",
                path = %path.display(),
                detail,
                "failed to append audit entry"
            );
        }
    }

    /// Read every entry recorded on `day`, in append order. Unparseable
    /// lines are skipped.
    ///
    /// # Errors
    /// [`WorkflowError::Persistence`] when an existing file is unreadable.
    pub fn read_day(&self, day: NaiveDate) -> Result<Vec<AuditEntry>, WorkflowError> {
        let path = self.day_path(day);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(WorkflowError::Persistence {
                    path,
                    detail: e.to_string(),
                })
            }
        };
        Ok(contents
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    /// Delete daily files older than `retain_days`. Returns the count
    /// removed.
    ///
    /// # Errors
    /// [`WorkflowError::Persistence`] when the directory is unreadable.
    pub fn prune_older_than(
        &self,
        retain_days: i64,
        now: DateTime<Utc>,
    ) -> Result<usize, WorkflowError> {
        let cutoff = (now - Duration::days(retain_days.max(0))).date_naive();
        let entries = fs::read_dir(&self.dir).map_err(|e| WorkflowError::Persistence {
            path: self.dir.clone(),
            detail: e.to_string(),
        })?;
        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(day) = NaiveDate::parse_from_str(stem, "%Y-%m-%d") else {
                continue;
            };
            if day < cutoff && fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
