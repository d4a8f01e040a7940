//! Foundation types for workflow sessions.
//!
//! Session identifiers, workflow families, the state enumeration, and the
//! transition triggers. Branch names come from the git layer
//! ([`shipline_git::BranchName`]) so the same validated type flows from CLI
//! argument to port call to persisted session.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use shipline_git::BranchName;

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// Unique identifier of a workflow session (UUID v4), generated at creation
/// and immutable thereafter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh session id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// The first 8 hex characters, for display.
    #[must_use]
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_owned()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// WorkflowType
// ---------------------------------------------------------------------------

/// The workflow family a session belongs to.
///
/// `Launch` and `Ship` share the standard state chain; `Hotfix` runs the
/// hotfix chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
    /// Feature workflow created by `launch`.
    Launch,
    /// Feature workflow created directly by `ship` tooling.
    Ship,
    /// Emergency fix over the hotfix state chain.
    Hotfix,
}

impl WorkflowType {
    /// `true` for the hotfix family.
    #[must_use]
    pub const fn is_hotfix(self) -> bool {
        matches!(self, Self::Hotfix)
    }
}

impl fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Launch => f.write_str("launch"),
            Self::Ship => f.write_str("ship"),
            Self::Hotfix => f.write_str("hotfix"),
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowState
// ---------------------------------------------------------------------------

/// Every state a session can rest in, across both workflow families.
///
/// Persisted as snake_case strings. Which states are reachable from which
/// is the state machine's business ([`crate::machine`]); sessions only
/// store the current element and the transition history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    // Standard chain.
    /// Session created, branch not yet cut.
    Init,
    /// Feature branch created and checked out.
    BranchReady,
    /// At least one commit recorded on the branch.
    ChangesCommitted,
    /// Branch pushed to the remote.
    Pushed,
    /// Pull request open on the forge.
    PrCreated,
    /// CI green, squash-merge not yet executed.
    WaitingApproval,
    /// Squash-merge confirmed by the forge.
    Merged,
    /// Branch cleaned up; terminal.
    Complete,
    /// Syncing the branch with main before push.
    Rebasing,
    /// A rebase or merge produced conflicts needing manual resolution.
    ConflictResolution,
    /// Workflow abandoned; terminal.
    Aborted,

    // Hotfix chain.
    /// Hotfix session created.
    HotfixInit,
    /// Hotfix branch created and checked out.
    HotfixReady,
    /// Hotfix changes committed.
    HotfixCommitted,
    /// Hotfix branch pushed.
    HotfixPushed,
    /// Hotfix validation recorded.
    HotfixValidated,
    /// Hotfix marked deployed.
    HotfixDeployed,
    /// Hotfix branch being cleaned up.
    HotfixCleanup,
    /// Hotfix finished; terminal.
    HotfixComplete,
    /// Hotfix being rolled back.
    Rollback,
}

impl WorkflowState {
    /// Terminal states accept no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::HotfixComplete | Self::Aborted)
    }

    /// `true` for states on the hotfix chain.
    #[must_use]
    pub const fn is_hotfix_state(self) -> bool {
        matches!(
            self,
            Self::HotfixInit
                | Self::HotfixReady
                | Self::HotfixCommitted
                | Self::HotfixPushed
                | Self::HotfixValidated
                | Self::HotfixDeployed
                | Self::HotfixCleanup
                | Self::HotfixComplete
                | Self::Rollback
        )
    }

    /// The snake_case name used on disk and in output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::BranchReady => "branch_ready",
            Self::ChangesCommitted => "changes_committed",
            Self::Pushed => "pushed",
            Self::PrCreated => "pr_created",
            Self::WaitingApproval => "waiting_approval",
            Self::Merged => "merged",
            Self::Complete => "complete",
            Self::Rebasing => "rebasing",
            Self::ConflictResolution => "conflict_resolution",
            Self::Aborted => "aborted",
            Self::HotfixInit => "hotfix_init",
            Self::HotfixReady => "hotfix_ready",
            Self::HotfixCommitted => "hotfix_committed",
            Self::HotfixPushed => "hotfix_pushed",
            Self::HotfixValidated => "hotfix_validated",
            Self::HotfixDeployed => "hotfix_deployed",
            Self::HotfixCleanup => "hotfix_cleanup",
            Self::HotfixComplete => "hotfix_complete",
            Self::Rollback => "rollback",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

/// What caused a state transition. Recorded in the session's state history
/// for forensic replay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Branch cut from main during launch/hotfix setup.
    BranchCreated,
    /// `commit` operation (explicit or ship's internal commit).
    CommitCommand,
    /// Branch pushed to the remote.
    PushCommand,
    /// Pull request created or adopted on the forge.
    PrOpened,
    /// All required CI checks succeeded.
    ChecksPassed,
    /// Squash-merge executed on the forge.
    MergeCommand,
    /// Post-merge sync/cleanup finished.
    CleanupDone,
    /// `abort` operation.
    AbortCommand,
    /// Rebase onto main started.
    RebaseStarted,
    /// Rebase finished cleanly.
    RebaseCompleted,
    /// A conflict was detected (rebase or forge merge).
    ConflictDetected,
    /// Conflicts resolved by the operator.
    ConflictResolved,
    /// Hotfix validation recorded.
    ValidationPassed,
    /// Hotfix marked deployed.
    DeployMarked,
    /// Hotfix cleanup started.
    CleanupStarted,
    /// Hotfix rollback requested.
    RollbackCommand,
    /// Rollback finished; hotfix branch ready again.
    RollbackCompleted,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::BranchCreated => "branch_created",
            Self::CommitCommand => "commit_command",
            Self::PushCommand => "push_command",
            Self::PrOpened => "pr_opened",
            Self::ChecksPassed => "checks_passed",
            Self::MergeCommand => "merge_command",
            Self::CleanupDone => "cleanup_done",
            Self::AbortCommand => "abort_command",
            Self::RebaseStarted => "rebase_started",
            Self::RebaseCompleted => "rebase_completed",
            Self::ConflictDetected => "conflict_detected",
            Self::ConflictResolved => "conflict_resolved",
            Self::ValidationPassed => "validation_passed",
            Self::DeployMarked => "deploy_marked",
            Self::CleanupStarted => "cleanup_started",
            Self::RollbackCommand => "rollback_command",
            Self::RollbackCompleted => "rollback_completed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
