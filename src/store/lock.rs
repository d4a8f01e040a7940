//! Advisory per-session lock files.
//!
//! One lock file per session id under `locks/`. Acquisition is cooperative:
//! `create_new` either atomically creates the file (lock acquired) or fails
//! (lock held). The [`SessionLock`] guard removes the file on drop, so
//! every exit path — including error returns and panics during an
//! operation — releases the lock.
//!
//! Stale locks (older than the configured threshold, default 24 hours) are
//! reclaimed: once by the next acquirer, and in bulk by `cleanup`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use crate::error::WorkflowError;
use crate::model::types::SessionId;

/// Locks older than this are considered abandoned.
pub const STALE_AFTER: Duration = Duration::from_secs(24 * 60 * 60);

/// RAII guard for a held session lock. Dropping it releases the lock.
#[derive(Debug)]
pub struct SessionLock {
    path: PathBuf,
    id: SessionId,
}

impl SessionLock {
    /// Acquire the lock for `id`, creating `locks/<id>.lock`.
    ///
    /// If the file exists but is older than [`STALE_AFTER`], it is
    /// reclaimed and acquisition retried once.
    ///
    /// # Errors
    /// [`WorkflowError::LockHeld`] when another invocation holds a fresh
    /// lock; [`WorkflowError::Persistence`] on I/O failure.
    pub fn acquire(locks_dir: &Path, id: SessionId) -> Result<Self, WorkflowError> {
        fs::create_dir_all(locks_dir).map_err(|e| WorkflowError::Persistence {
            path: locks_dir.to_owned(),
            detail: e.to_string(),
        })?;
        let path = locks_dir.join(format!("{id}.lock"));

        match Self::try_create(&path, id) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                if is_stale(&path, STALE_AFTER) {
                    warn!(target: "shipline::store", session = %id, "reclaiming stale lock");
                    let _ = fs::remove_file(&path);
                    Self::try_create(&path, id).map_err(|retry| {
                        if retry.kind() == std::io::ErrorKind::AlreadyExists {
                            WorkflowError::LockHeld {
                                session: id.to_string(),
                            }
                        } else {
                            WorkflowError::Persistence {
                                path: path.clone(),
                                detail: retry.to_string(),
                            }
                        }
                    })?;
                } else {
                    return Err(WorkflowError::LockHeld {
                        session: id.to_string(),
                    });
                }
            }
            Err(e) => {
                return Err(WorkflowError::Persistence {
                    path,
                    detail: e.to_string(),
                })
            }
        }

        debug!(target: "shipline::store", session = %id, "lock acquired");
        Ok(Self { path, id })
    }

    fn try_create(path: &Path, id: SessionId) -> std::io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        // Holder identification, for humans inspecting a wedged lock.
        writeln!(file, "{{\"session\":\"{id}\",\"pid\":{}}}", std::process::id())?;
        Ok(())
    }

    /// The session this lock belongs to.
    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        self.id
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            // Never panic on release; an unremovable lock is reclaimed as
            // stale later.
            warn!(
                target: "shipline::store",
                session = %self.id,
                error = %e,
                "failed to release session lock"
            );
        } else {
            debug!(target: "shipline::store", session = %self.id, "lock released");
        }
    }
}

/// Whether the lock file at `path` is older than `threshold`.
fn is_stale(path: &Path, threshold: Duration) -> bool {
    let Ok(meta) = fs::metadata(path) else {
        // Vanished between the failed create and this check — treat as
        // reclaimable and let the retry settle it.
        return true;
    };
    let Ok(modified) = meta.modified() else {
        return false;
    };
    SystemTime::now()
        .duration_since(modified)
        .is_ok_and(|age| age >= threshold)
}

/// Remove every lock file in `locks_dir` older than [`STALE_AFTER`].
/// Returns the number reclaimed.
///
/// # Errors
/// [`WorkflowError::Persistence`] when the directory cannot be read.
pub fn reclaim_stale(locks_dir: &Path) -> Result<usize, WorkflowError> {
    if !locks_dir.exists() {
        return Ok(0);
    }
    let entries = fs::read_dir(locks_dir).map_err(|e| WorkflowError::Persistence {
        path: locks_dir.to_owned(),
        detail: e.to_string(),
    })?;
    let mut reclaimed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "lock")
            && is_stale(&path, STALE_AFTER)
            && fs::remove_file(&path).is_ok()
        {
            reclaimed += 1;
        }
    }
    Ok(reclaimed)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn acquire_release_reacquire() {
        let dir = TempDir::new().expect("temp dir");
        let id = SessionId::generate();

        let lock = SessionLock::acquire(dir.path(), id).expect("first acquire");
        assert!(dir.path().join(format!("{id}.lock")).exists());
        drop(lock);
        assert!(!dir.path().join(format!("{id}.lock")).exists());

        let _again = SessionLock::acquire(dir.path(), id).expect("reacquire after release");
    }

    #[test]
    fn second_acquire_fails_with_lock_held() {
        let dir = TempDir::new().expect("temp dir");
        let id = SessionId::generate();

        let _held = SessionLock::acquire(dir.path(), id).expect("first acquire");
        let err = SessionLock::acquire(dir.path(), id).expect_err("second must fail");
        assert!(matches!(err, WorkflowError::LockHeld { .. }));
    }

    #[test]
    fn locks_for_different_sessions_are_independent() {
        let dir = TempDir::new().expect("temp dir");
        let _a = SessionLock::acquire(dir.path(), SessionId::generate()).expect("a");
        let _b = SessionLock::acquire(dir.path(), SessionId::generate()).expect("b");
    }

    #[test]
    fn stale_lock_is_reclaimed_on_acquire() {
        let dir = TempDir::new().expect("temp dir");
        let id = SessionId::generate();
        let path = dir.path().join(format!("{id}.lock"));
        fs::write(&path, "{}").expect("seed lock");

        // Backdate the lock past the staleness threshold.
        let old = SystemTime::now() - (STALE_AFTER + Duration::from_secs(60));
        let file = fs::OpenOptions::new().write(true).open(&path).expect("open");
        file.set_modified(old).expect("set mtime");
        drop(file);

        let _lock = SessionLock::acquire(dir.path(), id).expect("reclaims stale lock");
    }

    #[test]
    fn reclaim_stale_sweeps_old_locks_only() {
        let dir = TempDir::new().expect("temp dir");
        let stale_path = dir.path().join("old.lock");
        fs::write(&stale_path, "{}").expect("seed");
        let old = SystemTime::now() - (STALE_AFTER + Duration::from_secs(60));
        let file = fs::OpenOptions::new()
            .write(true)
            .open(&stale_path)
            .expect("open");
        file.set_modified(old).expect("set mtime");
        drop(file);

        let fresh = SessionId::generate();
        let _held = SessionLock::acquire(dir.path(), fresh).expect("fresh lock");

        let reclaimed = reclaim_stale(dir.path()).expect("sweep");
        assert_eq!(reclaimed, 1);
        assert!(!stale_path.exists());
        assert!(dir.path().join(format!("{fresh}.lock")).exists());
    }
}
