//! Error types for git operations.
//!
//! [`GitError`] is the single error type returned by all
//! [`GitPort`](crate::GitPort) trait methods. It uses rich enum variants so
//! callers can match on specific failure modes (merge conflict, rejected
//! push, missing ref) without parsing error messages.

use thiserror::Error;

/// Errors returned by [`GitPort`](crate::GitPort) operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// A requested branch, ref, or object was not found.
    #[error("not found: {message}")]
    NotFound {
        /// Human-readable description of what was missing.
        message: String,
    },

    /// A merge produced conflicts that require manual resolution.
    #[error("merge conflict: {message}")]
    MergeConflict {
        /// Description of the conflict (conflicted paths when known).
        message: String,
    },

    /// A push to a remote was rejected or failed.
    #[error("push to `{remote}` failed: {message}")]
    PushRejected {
        /// The remote name (e.g., `"origin"`).
        remote: String,
        /// Details about the rejection.
        message: String,
    },

    /// A git CLI fallback command exited non-zero.
    ///
    /// The `command` is the full invocation (e.g. `"git push origin x"`)
    /// and `stderr` is git's trimmed error output. Only the network
    /// operations shell out; everything else goes through gix.
    #[error("`{command}` failed: {stderr}")]
    Command {
        /// The full command line that was run.
        command: String,
        /// Captured stderr from git.
        stderr: String,
        /// The process exit code (`None` if killed by signal).
        exit_code: Option<i32>,
    },

    /// The gix backend returned an unclassified error.
    ///
    /// The catch-all for failures that fit no other variant; the message
    /// carries enough context to diagnose the call that failed.
    #[error("git backend error: {message}")]
    Backend {
        /// Freeform error description from the backend.
        message: String,
    },

    /// An I/O error occurred (process spawn, file system).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GitError {
    /// Build a [`GitError::Command`] from a finished `git` invocation.
    #[must_use]
    pub fn from_output(command: String, output: &std::process::Output) -> Self {
        Self::Command {
            command,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            exit_code: output.status.code(),
        }
    }
}
