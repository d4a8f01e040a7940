//! Core types for the shipline forge abstraction layer.
//!
//! Shared vocabulary between the [`ForgePort`](crate::ForgePort) trait and
//! the orchestration core. Backend-specific wire formats (gh CLI JSON,
//! REST payloads) never cross this boundary.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Pull request creation / update
// ---------------------------------------------------------------------------

/// Request payload for creating a pull request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewPullRequest {
    /// PR title.
    pub title: String,
    /// PR body (markdown).
    pub body: String,
    /// Base branch (normally main).
    pub base: String,
    /// Head branch (the feature branch).
    pub head: String,
}

/// The forge's identifiers for a freshly created pull request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedPr {
    /// PR number, unique per repository.
    pub number: u64,
    /// Web URL of the PR.
    pub url: String,
}

/// Fields that can be changed on an existing pull request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PullRequestUpdate {
    /// New title, if changing.
    pub title: Option<String>,
    /// New body, if changing.
    pub body: Option<String>,
}

impl PullRequestUpdate {
    /// `true` when the update carries no changes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.is_none()
    }
}

// ---------------------------------------------------------------------------
// Pull request listing
// ---------------------------------------------------------------------------

/// Lifecycle state of a pull request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrState {
    /// Open and mergeable.
    Open,
    /// Closed without merging.
    Closed,
    /// Merged into the base branch.
    Merged,
}

impl fmt::Display for PrState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("open"),
            Self::Closed => f.write_str("closed"),
            Self::Merged => f.write_str("merged"),
        }
    }
}

/// Server-side state filter for PR listings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrStateFilter {
    /// Only open PRs.
    Open,
    /// Only merged PRs.
    Merged,
    /// Every PR regardless of state.
    All,
}

impl PrStateFilter {
    /// The value the gh CLI expects for `--state`.
    #[must_use]
    pub const fn as_cli_arg(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Merged => "merged",
            Self::All => "all",
        }
    }
}

/// One pull request in a listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestSummary {
    /// PR number.
    pub number: u64,
    /// Lifecycle state.
    pub state: PrState,
    /// When the PR was merged (ISO-8601), if it was.
    pub merged_at: Option<String>,
    /// Web URL of the PR.
    pub url: String,
}

impl PullRequestSummary {
    /// `true` for merged PRs.
    #[must_use]
    pub fn is_merged(&self) -> bool {
        self.state == PrState::Merged || self.merged_at.is_some()
    }
}

// ---------------------------------------------------------------------------
// Check status
// ---------------------------------------------------------------------------

/// Aggregate CI check status for a head ref.
///
/// The forge reports individual check runs; this is the roll-up the ship
/// pipeline polls. A head with zero checks counts as passed — a repository
/// without CI must still be shippable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckStatus {
    /// Checks that completed successfully (or were skipped).
    pub passed: u32,
    /// Checks still queued or running.
    pub pending: u32,
    /// Checks that completed unsuccessfully.
    pub failed: u32,
    /// Names of the failed checks.
    pub failed_names: Vec<String>,
}

impl CheckStatus {
    /// Total number of checks the forge reported.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.passed + self.pending + self.failed
    }

    /// `true` when every reported check succeeded and none are pending.
    #[must_use]
    pub const fn all_passed(&self) -> bool {
        self.pending == 0 && self.failed == 0
    }

    /// One-line summary, e.g. `"3 passed, 1 pending"`.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.total() == 0 {
            return "no checks reported".to_owned();
        }
        let mut parts = Vec::new();
        for (count, label) in [
            (self.passed, "passed"),
            (self.pending, "pending"),
            (self.failed, "failed"),
        ] {
            if count > 0 {
                parts.push(format!("{count} {label}"));
            }
        }
        parts.join(", ")
    }
}

/// Outcome of a [`wait_for_checks`](crate::ForgePort::wait_for_checks) call.
///
/// Exactly one of `success`, `timed_out`, `cancelled`, or a non-empty
/// `failed_checks` describes why the wait ended.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksWait {
    /// All required checks succeeded.
    pub success: bool,
    /// The wait exceeded its timeout before checks settled.
    pub timed_out: bool,
    /// The caller cancelled the wait. The PR is left in place.
    pub cancelled: bool,
    /// Names of checks that failed, when any did.
    pub failed_checks: Vec<String>,
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Merge strategy for [`merge_pull_request`](crate::ForgePort::merge_pull_request).
///
/// shipline only ever squash-merges (linear history is the point), but the
/// port keeps the strategy explicit so the contract is visible at call
/// sites.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Collapse the PR's commits into a single commit on the base branch.
    #[default]
    Squash,
    /// Regular merge commit.
    Merge,
    /// Rebase the PR's commits onto the base branch.
    Rebase,
}

impl MergeStrategy {
    /// The flag the gh CLI expects.
    #[must_use]
    pub const fn as_cli_flag(self) -> &'static str {
        match self {
            Self::Squash => "--squash",
            Self::Merge => "--merge",
            Self::Rebase => "--rebase",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_status_aggregation() {
        let status = CheckStatus {
            passed: 3,
            pending: 1,
            failed: 0,
            failed_names: vec![],
        };
        assert_eq!(status.total(), 4);
        assert!(!status.all_passed());
        assert_eq!(status.summary(), "3 passed, 1 pending");

        let empty = CheckStatus::default();
        assert!(empty.all_passed());
        assert_eq!(empty.summary(), "no checks reported");
    }

    #[test]
    fn merged_detection_uses_state_or_timestamp() {
        let merged = PullRequestSummary {
            number: 1,
            state: PrState::Closed,
            merged_at: Some("2026-01-01T00:00:00Z".to_owned()),
            url: String::new(),
        };
        assert!(merged.is_merged());

        let closed = PullRequestSummary {
            number: 2,
            state: PrState::Closed,
            merged_at: None,
            url: String::new(),
        };
        assert!(!closed.is_merged());
    }
}
