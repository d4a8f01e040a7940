//! The [`GitPort`] trait — the single abstraction boundary between the
//! orchestration core and the local repository.
//!
//! The core depends exclusively on this trait. The production backend
//! ([`GixGit`](crate::GixGit)) is gix-native with a `git` CLI fallback for
//! network operations; tests supply in-memory fakes.
//!
//! # Object safety
//!
//! This trait is object-safe: no generic methods, no `Self` in return
//! position outside of `Result`. Callers may use `&dyn GitPort` or
//! `Box<dyn GitPort>`.
//!
//! # Shared-resource contract
//!
//! The working tree is process-wide shared state. The port itself holds no
//! mutex: callers serialize access through the session lock plus the
//! one-active-session-per-branch invariant.

use crate::error::GitError;
use crate::types::{
    BranchName, BranchStatus, CommitId, CommitOptions, StashRef, WorktreeStatus,
};

/// The git abstraction trait used by the orchestration core.
pub trait GitPort {
    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    /// The branch currently checked out.
    ///
    /// Replaces: `git rev-parse --abbrev-ref HEAD`.
    fn current_branch(&self) -> Result<BranchName, GitError>;

    /// Snapshot of the working tree grouped by change kind.
    ///
    /// Replaces: `git status --porcelain`.
    fn status(&self) -> Result<WorktreeStatus, GitError>;

    /// Position of the current branch relative to its upstream.
    ///
    /// Replaces: `git rev-list --count @{u}..HEAD` / `HEAD..@{u}`.
    fn branch_status(&self) -> Result<BranchStatus, GitError>;

    /// Whether the working tree has any staged, unstaged, or untracked
    /// changes.
    fn has_uncommitted_changes(&self) -> Result<bool, GitError>;

    /// Number of commits on `HEAD` that are not on `base_ref`.
    ///
    /// Replaces: `git rev-list --count <base_ref>..HEAD`.
    fn commits_ahead_of(&self, base_ref: &str) -> Result<u32, GitError>;

    /// Whether a local branch with this name exists.
    ///
    /// Replaces: `git show-ref --verify refs/heads/<name>`.
    fn branch_exists_local(&self, name: &BranchName) -> Result<bool, GitError>;

    /// Whether the remote has a branch with this name.
    ///
    /// Replaces: `git ls-remote --exit-code --heads <remote> <name>`.
    fn branch_exists_remote(&self, name: &BranchName) -> Result<bool, GitError>;

    /// All local branches.
    ///
    /// Replaces: `git for-each-ref --format='%(refname:short)' refs/heads/`.
    fn list_branches(&self) -> Result<Vec<BranchName>, GitError>;

    // -----------------------------------------------------------------------
    // Staging and commits
    // -----------------------------------------------------------------------

    /// Stage every change in the working tree.
    ///
    /// Replaces: `git add -A`.
    fn stage_all(&self) -> Result<(), GitError>;

    /// Create a commit from the index and return its ID.
    ///
    /// Replaces: `git commit -m <message> [--no-verify]`.
    fn commit(&self, message: &str, opts: CommitOptions) -> Result<CommitId, GitError>;

    // -----------------------------------------------------------------------
    // Branches
    // -----------------------------------------------------------------------

    /// Create a branch at `base_ref` without checking it out.
    ///
    /// Replaces: `git branch <name> <base_ref>`.
    fn create_branch(&self, name: &BranchName, base_ref: &str) -> Result<(), GitError>;

    /// Check out an existing branch.
    ///
    /// Replaces: `git checkout <name>`.
    fn checkout_branch(&self, name: &BranchName) -> Result<(), GitError>;

    /// Delete a local branch. `force` uses `-D` (required for squash-merged
    /// branches, whose commits are not ancestors of main).
    ///
    /// Replaces: `git branch -d/-D <name>`.
    fn delete_branch(&self, name: &BranchName, force: bool) -> Result<(), GitError>;

    /// Delete the branch on the remote.
    ///
    /// Replaces: `git push <remote> --delete <name>`.
    fn delete_remote_branch(&self, name: &BranchName) -> Result<(), GitError>;

    // -----------------------------------------------------------------------
    // Remote sync
    // -----------------------------------------------------------------------

    /// Fetch a ref from a remote.
    ///
    /// Replaces: `git fetch <remote> <ref>`.
    fn fetch(&self, remote: &str, refspec: &str) -> Result<(), GitError>;

    /// Fast-forward pull a ref from a remote.
    ///
    /// Replaces: `git pull --ff-only <remote> <ref>`.
    fn pull(&self, remote: &str, refspec: &str) -> Result<(), GitError>;

    /// Push a branch to the remote, setting upstream.
    ///
    /// Replaces: `git push -u <remote> <branch> [--force-with-lease]`.
    fn push(&self, branch: &BranchName, force: bool) -> Result<(), GitError>;

    /// Merge a branch into the current branch.
    ///
    /// Replaces: `git merge [--squash] <branch>`. Returns
    /// [`GitError::MergeConflict`] when git reports conflicts.
    fn merge(&self, branch: &BranchName, squash: bool) -> Result<(), GitError>;

    // -----------------------------------------------------------------------
    // Stash
    // -----------------------------------------------------------------------

    /// Stash all working-tree changes under a message.
    ///
    /// Replaces: `git stash push -u -m <message>`.
    fn stash(&self, message: &str) -> Result<StashRef, GitError>;

    /// Apply a stash without dropping it.
    ///
    /// Replaces: `git stash apply <ref>`.
    fn stash_apply(&self, stash: &StashRef) -> Result<(), GitError>;

    /// Apply a stash and drop it.
    ///
    /// Replaces: `git stash pop <ref>`.
    fn stash_pop(&self, stash: &StashRef) -> Result<(), GitError>;
}
