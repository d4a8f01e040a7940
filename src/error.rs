//! Workflow error types for shipline.
//!
//! Defines [`WorkflowError`], the unified error type for all orchestration
//! operations. Error messages are designed to be actionable: each variant
//! includes a clear description of what went wrong and a "To fix:" line
//! naming the next step.
//!
//! Errors bubble to the operation boundary unchanged — there is no silent
//! recovery in the core. Best-effort cleanup steps downgrade their failures
//! to warnings inside the ToolResult instead of raising these.

use std::fmt;
use std::path::PathBuf;

use shipline_forge::ForgeError;
use shipline_git::GitError;

use crate::model::types::{WorkflowState, WorkflowType};

// ---------------------------------------------------------------------------
// WorkflowError
// ---------------------------------------------------------------------------

/// Unified error type for shipline workflow operations.
#[derive(Debug)]
pub enum WorkflowError {
    /// No shipline configuration present; `shipline init` has not run.
    NotInitialized {
        /// The state directory that was probed.
        dir: PathBuf,
    },

    /// No session exists where one was required.
    NoSession {
        /// What was looked up (branch name or session id).
        target: String,
    },

    /// A non-terminal session already exists where none may.
    SessionExists {
        /// The branch whose session conflicts.
        branch: String,
    },

    /// The state machine refused a transition.
    InvalidTransition {
        /// The workflow family.
        workflow: WorkflowType,
        /// Current state.
        from: WorkflowState,
        /// Requested state.
        to: WorkflowState,
    },

    /// The branch name was merged previously and may not be launched again.
    BranchRetired {
        /// The retired branch name.
        branch: String,
        /// A free replacement name.
        suggestion: String,
    },

    /// A retired branch name exists again locally or remotely.
    BranchRecreated {
        /// The recreated branch name.
        branch: String,
        /// A free replacement name.
        suggestion: String,
    },

    /// More than one open PR has this branch as head.
    MultiplePrs {
        /// The branch.
        branch: String,
        /// Numbers of the open PRs.
        numbers: Vec<u64>,
    },

    /// Uncommitted changes where the operation forbids them.
    DirtyWorkingTree {
        /// One-line change summary.
        summary: String,
    },

    /// The branch name failed validation.
    InvalidBranchName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A git operation failed.
    Git(GitError),

    /// A forge operation failed.
    Forge(ForgeError),

    /// CI checks failed for the PR's head commit.
    CiFailed {
        /// Names of the failed checks.
        failed: Vec<String>,
    },

    /// CI checks did not settle within the wait timeout.
    CiTimeout {
        /// How long the pipeline waited, in seconds.
        waited_secs: u64,
    },

    /// The caller cancelled the operation.
    Cancelled,

    /// The operation deadline elapsed.
    Timeout {
        /// How long the operation ran, in seconds.
        elapsed_secs: u64,
    },

    /// The session lock could not be acquired.
    LockHeld {
        /// The locked session (id, with branch when known).
        session: String,
    },

    /// An atomic write failed; durable state is unchanged.
    Persistence {
        /// The path being written.
        path: PathBuf,
        /// What went wrong.
        detail: String,
    },
}

impl WorkflowError {
    /// The process exit code for embeddings that expose a shell interface:
    /// 3 for cancellation/timeout, 4 when not initialized, 1 otherwise.
    /// (Pre-flight failures exit 2, but those are reported through the
    /// ToolResult, not through this type.)
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::NotInitialized { .. } => 4,
            Self::Cancelled | Self::Timeout { .. } => 3,
            _ => 1,
        }
    }

    /// Short machine-readable kind name, used in audit records.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotInitialized { .. } => "not_initialized",
            Self::NoSession { .. } => "no_session",
            Self::SessionExists { .. } => "session_exists",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::BranchRetired { .. } => "branch_retired",
            Self::BranchRecreated { .. } => "branch_recreated",
            Self::MultiplePrs { .. } => "multiple_prs",
            Self::DirtyWorkingTree { .. } => "dirty_working_tree",
            Self::InvalidBranchName { .. } => "invalid_branch_name",
            Self::Git(_) => "git_failure",
            Self::Forge(_) => "forge_failure",
            Self::CiFailed { .. } => "ci_failed",
            Self::CiTimeout { .. } => "ci_timeout",
            Self::Cancelled => "cancelled",
            Self::Timeout { .. } => "timeout",
            Self::LockHeld { .. } => "lock_held",
            Self::Persistence { .. } => "persistence",
        }
    }
}

// ---------------------------------------------------------------------------
// Display — actionable error messages
// ---------------------------------------------------------------------------

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized { dir } => {
                write!(
                    f,
                    "shipline is not initialized (no config at {}).\n  To fix: run `shipline init` in the repository root.",
                    dir.display()
                )
            }
            Self::NoSession { target } => {
                write!(
                    f,
                    "no workflow session for '{target}'.\n  To fix: start one with `shipline launch`, or list sessions:\n    shipline sessions"
                )
            }
            Self::SessionExists { branch } => {
                write!(
                    f,
                    "an active workflow session already exists for '{branch}'.\n  To fix: finish it with `shipline ship`, or abandon it:\n    shipline abort --branch {branch}"
                )
            }
            Self::InvalidTransition { workflow, from, to } => {
                write!(
                    f,
                    "illegal {workflow} transition {from} → {to}.\n  To fix: check the session with `shipline status`; the workflow must advance through its defined states."
                )
            }
            Self::BranchRetired { branch, suggestion } => {
                write!(
                    f,
                    "branch '{branch}' was merged previously and is retired.\n  To fix: use a fresh name, e.g.:\n    shipline launch --branch {suggestion}"
                )
            }
            Self::BranchRecreated { branch, suggestion } => {
                write!(
                    f,
                    "branch '{branch}' was merged previously but exists again — reusing it would rewrite shipped history.\n  To fix: delete the recreated branch, or use a fresh name, e.g.:\n    shipline launch --branch {suggestion}"
                )
            }
            Self::MultiplePrs { branch, numbers } => {
                let list = numbers
                    .iter()
                    .map(|n| format!("#{n}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(
                    f,
                    "{} open pull requests have head '{branch}' ({list}).\n  To fix: close the extra PRs on the forge, keeping at most one open.",
                    numbers.len()
                )
            }
            Self::DirtyWorkingTree { summary } => {
                write!(
                    f,
                    "the working tree has uncommitted changes ({summary}).\n  To fix: commit them with `shipline commit`, stash them, or pass --force."
                )
            }
            Self::InvalidBranchName { name, reason } => {
                write!(
                    f,
                    "invalid branch name '{name}': {reason}\n  To fix: pick a git-legal name, e.g. feature/my-change."
                )
            }
            Self::Git(err) => {
                write!(
                    f,
                    "git operation failed: {err}\n  To fix: inspect the repository with `git status` and retry."
                )
            }
            Self::Forge(err) => {
                write!(
                    f,
                    "forge operation failed: {err}\n  To fix: check `gh auth status` and the forge's availability, then retry."
                )
            }
            Self::CiFailed { failed } => {
                write!(f, "CI checks failed: {}.", failed.join(", "))?;
                write!(
                    f,
                    "\n  To fix: inspect the failing checks on the PR, push a fix, and re-run `shipline ship`."
                )
            }
            Self::CiTimeout { waited_secs } => {
                write!(
                    f,
                    "CI checks did not finish within {waited_secs}s.\n  To fix: wait for the checks to settle, then re-run `shipline ship` (the PR is still open)."
                )
            }
            Self::Cancelled => {
                write!(
                    f,
                    "operation cancelled.\n  The session was left at its last persisted state; re-run the command to resume."
                )
            }
            Self::Timeout { elapsed_secs } => {
                write!(
                    f,
                    "operation timed out after {elapsed_secs}s.\n  The session was left at its last persisted state; re-run the command to resume."
                )
            }
            Self::LockHeld { session } => {
                write!(
                    f,
                    "session {session} is locked by another shipline invocation.\n  To fix: wait for it to finish; stale locks older than 24h are reclaimed by `shipline cleanup`."
                )
            }
            Self::Persistence { path, detail } => {
                write!(
                    f,
                    "failed to persist state to {}: {detail}\n  Durable state is unchanged. To fix: check disk space and permissions.",
                    path.display()
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// std::error::Error + conversions
// ---------------------------------------------------------------------------

impl std::error::Error for WorkflowError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Git(err) => Some(err),
            Self::Forge(err) => Some(err),
            _ => None,
        }
    }
}

impl From<GitError> for WorkflowError {
    fn from(err: GitError) -> Self {
        Self::Git(err)
    }
}

impl From<ForgeError> for WorkflowError {
    fn from(err: ForgeError) -> Self {
        Self::Forge(err)
    }
}

impl From<shipline_git::BranchNameError> for WorkflowError {
    fn from(err: shipline_git::BranchNameError) -> Self {
        Self::InvalidBranchName {
            name: err.value,
            reason: err.reason,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
