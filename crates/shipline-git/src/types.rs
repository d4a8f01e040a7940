//! Core types for the shipline git abstraction layer.
//!
//! These types form the vocabulary shared between the [`GitPort`](crate::GitPort)
//! trait and the orchestration core. They intentionally contain no gix
//! (or CLI, or test-double) types — the backend is an implementation
//! detail.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// BranchName
// ---------------------------------------------------------------------------

/// A validated git branch name.
///
/// Enforces the subset of `git check-ref-format` rules that matter for
/// workflow branches: non-empty, no whitespace or control characters, no
/// `..`, no leading `-` or `/`, no trailing `/` or `.lock`.
/// Examples: `feature/auth`, `hotfix/cve-2024-1234`, `fix-typo-v2`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// The maximum length of a branch name.
    pub const MAX_LEN: usize = 200;

    /// Create a new `BranchName` from a string, validating format.
    ///
    /// # Errors
    /// Returns an error if the name is empty, too long, or contains
    /// characters git would reject.
    pub fn new(s: &str) -> Result<Self, BranchNameError> {
        Self::validate(s)?;
        Ok(Self(s.to_owned()))
    }

    /// Return the branch name as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(s: &str) -> Result<(), BranchNameError> {
        let err = |reason: String| BranchNameError {
            value: s.to_owned(),
            reason,
        };
        if s.is_empty() {
            return Err(err("branch name must not be empty".to_owned()));
        }
        if s.len() > Self::MAX_LEN {
            return Err(err(format!(
                "branch name must be at most {} characters, got {}",
                Self::MAX_LEN,
                s.len()
            )));
        }
        if s.starts_with('-') || s.starts_with('/') {
            return Err(err(
                "branch name must not start with '-' or '/'".to_owned()
            ));
        }
        if s.ends_with('/') || s.ends_with('.') || s.ends_with(".lock") {
            return Err(err(
                "branch name must not end with '/', '.' or '.lock'".to_owned(),
            ));
        }
        if s.contains("..") || s.contains("//") || s.contains("@{") {
            return Err(err(
                "branch name must not contain '..', '//' or '@{'".to_owned(),
            ));
        }
        if let Some(c) = s
            .chars()
            .find(|c| c.is_whitespace() || c.is_control() || matches!(c, '~' | '^' | ':' | '?' | '*' | '[' | '\\'))
        {
            return Err(err(format!("branch name must not contain {c:?}")));
        }
        Ok(())
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BranchName {
    type Err = BranchNameError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for BranchName {
    type Error = BranchNameError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

/// Error returned when a branch name fails validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BranchNameError {
    /// The raw value that failed validation.
    pub value: String,
    /// Why validation failed.
    pub reason: String,
}

impl fmt::Display for BranchNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid branch name `{}`: {}", self.value, self.reason)
    }
}

impl std::error::Error for BranchNameError {}

// ---------------------------------------------------------------------------
// CommitId
// ---------------------------------------------------------------------------

/// A validated 40-character lowercase hex git commit ID (SHA-1).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitId(String);

impl CommitId {
    /// Create a new `CommitId` from a string, validating format.
    ///
    /// # Errors
    /// Returns an error if the string is not exactly 40 lowercase hex
    /// characters.
    pub fn new(s: &str) -> Result<Self, BranchNameError> {
        Self::validate(s)?;
        Ok(Self(s.to_owned()))
    }

    /// Return the inner hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return the first 12 characters, for display.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..12]
    }

    fn validate(s: &str) -> Result<(), BranchNameError> {
        if s.len() != 40 {
            return Err(BranchNameError {
                value: s.to_owned(),
                reason: format!("expected 40 hex characters, got {}", s.len()),
            });
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
        {
            return Err(BranchNameError {
                value: s.to_owned(),
                reason: "must contain only lowercase hex characters (0-9, a-f)".to_owned(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CommitId {
    type Err = BranchNameError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CommitId {
    type Error = BranchNameError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}

impl From<CommitId> for String {
    fn from(id: CommitId) -> Self {
        id.0
    }
}

// ---------------------------------------------------------------------------
// StashRef
// ---------------------------------------------------------------------------

/// A reference to a stash entry (e.g. `stash@{0}`).
///
/// Opaque to the core: produced by [`GitPort::stash`](crate::GitPort::stash)
/// and handed back to `stash_apply`/`stash_pop` unchanged. Sessions persist
/// it as a plain string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StashRef(pub String);

impl StashRef {
    /// Return the stash reference as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StashRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// WorktreeStatus
// ---------------------------------------------------------------------------

/// A snapshot of the working tree, grouped by change kind.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorktreeStatus {
    /// `true` when no entry lists are non-empty.
    pub clean: bool,
    /// Tracked files with unstaged or staged modifications.
    pub modified: Vec<String>,
    /// Newly added (staged) files.
    pub created: Vec<String>,
    /// Deleted files.
    pub deleted: Vec<String>,
    /// Untracked files.
    pub untracked: Vec<String>,
}

impl WorktreeStatus {
    /// Total number of changed paths.
    #[must_use]
    pub fn change_count(&self) -> usize {
        self.modified.len() + self.created.len() + self.deleted.len() + self.untracked.len()
    }

    /// One-line summary, e.g. `"3 modified, 1 untracked"`.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.clean {
            return "clean".to_owned();
        }
        let mut parts = Vec::new();
        for (count, label) in [
            (self.modified.len(), "modified"),
            (self.created.len(), "created"),
            (self.deleted.len(), "deleted"),
            (self.untracked.len(), "untracked"),
        ] {
            if count > 0 {
                parts.push(format!("{count} {label}"));
            }
        }
        parts.join(", ")
    }
}

// ---------------------------------------------------------------------------
// BranchStatus
// ---------------------------------------------------------------------------

/// Position of the current branch relative to its upstream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchStatus {
    /// Commits on the local branch not on the upstream.
    pub ahead: u32,
    /// Commits on the upstream not on the local branch.
    pub behind: u32,
    /// Whether an upstream tracking branch is configured.
    pub has_remote: bool,
    /// Whether the working tree is clean.
    pub is_clean: bool,
}

// ---------------------------------------------------------------------------
// CommitOptions
// ---------------------------------------------------------------------------

/// Options for [`GitPort::commit`](crate::GitPort::commit).
#[derive(Clone, Copy, Debug, Default)]
pub struct CommitOptions {
    /// Skip commit hooks (`git commit --no-verify`).
    pub no_verify: bool,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
