//! The gix-backed implementation of [`GitPort`].
//!
//! Everything local — status, branches, checkout, commits, stash — goes
//! through [gix](https://github.com/GitoxideLabs/gitoxide); only the
//! network operations fall back to the `git` CLI (see
//! [`remote_impl`](crate::remote_impl)).

use std::path::{Path, PathBuf};

use crate::error::GitError;
use crate::port::GitPort;
use crate::types::{
    BranchName, BranchStatus, CommitId, CommitOptions, StashRef, WorktreeStatus,
};

/// A [`GitPort`] implementation backed by gix.
///
/// Construct via [`GixGit::open`].
pub struct GixGit {
    pub(crate) repo: gix::Repository,
    pub(crate) workdir: PathBuf,
    pub(crate) remote: String,
}

impl GixGit {
    /// Open the git repository at or above `path`, using the `origin`
    /// remote for network operations.
    ///
    /// # Errors
    /// [`GitError::Backend`] when the path is not inside a repository or
    /// the repository is bare.
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = gix::open(path).map_err(|e| GitError::Backend {
            message: format!("open repository at {}: {e}", path.display()),
        })?;
        let workdir = repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| GitError::Backend {
                message: "repository has no working tree".to_owned(),
            })?;
        Ok(Self {
            repo,
            workdir,
            remote: "origin".to_owned(),
        })
    }

    /// Override the remote name.
    #[must_use]
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    /// The working directory of the repository.
    #[must_use]
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// The commit HEAD currently points at.
    pub(crate) fn head_commit_id(&self) -> Result<gix::ObjectId, GitError> {
        let commit = self.repo.head_commit().map_err(|e| GitError::Backend {
            message: format!("resolve HEAD commit: {e}"),
        })?;
        Ok(commit.id)
    }
}

/// Convert a `gix::ObjectId` to the port's [`CommitId`].
pub(crate) fn to_commit_id(oid: gix::ObjectId) -> Result<CommitId, GitError> {
    CommitId::new(&oid.to_string()).map_err(|e| GitError::Backend {
        message: format!("object id round-trip: {e}"),
    })
}

/// Parse a hex object id string the port handed back.
pub(crate) fn parse_oid(hex: &str) -> Result<gix::ObjectId, GitError> {
    gix::ObjectId::from_hex(hex.as_bytes()).map_err(|e| GitError::NotFound {
        message: format!("invalid object id `{hex}`: {e}"),
    })
}

impl GitPort for GixGit {
    // === Inspection ===
    fn current_branch(&self) -> Result<BranchName, GitError> {
        crate::branch_impl::current_branch(self)
    }

    fn status(&self) -> Result<WorktreeStatus, GitError> {
        crate::status_impl::status(self)
    }

    fn branch_status(&self) -> Result<BranchStatus, GitError> {
        crate::branch_impl::branch_status(self)
    }

    fn has_uncommitted_changes(&self) -> Result<bool, GitError> {
        crate::status_impl::has_uncommitted_changes(self)
    }

    fn commits_ahead_of(&self, base_ref: &str) -> Result<u32, GitError> {
        crate::branch_impl::commits_ahead_of(self, base_ref)
    }

    fn branch_exists_local(&self, name: &BranchName) -> Result<bool, GitError> {
        crate::branch_impl::branch_exists_local(self, name)
    }

    fn branch_exists_remote(&self, name: &BranchName) -> Result<bool, GitError> {
        crate::remote_impl::branch_exists_remote(self, name)
    }

    fn list_branches(&self) -> Result<Vec<BranchName>, GitError> {
        crate::branch_impl::list_branches(self)
    }

    // === Staging and commits ===
    fn stage_all(&self) -> Result<(), GitError> {
        crate::commit_impl::stage_all(self)
    }

    fn commit(&self, message: &str, opts: CommitOptions) -> Result<CommitId, GitError> {
        crate::commit_impl::commit(self, message, opts)
    }

    // === Branches ===
    fn create_branch(&self, name: &BranchName, base_ref: &str) -> Result<(), GitError> {
        crate::branch_impl::create_branch(self, name, base_ref)
    }

    fn checkout_branch(&self, name: &BranchName) -> Result<(), GitError> {
        crate::branch_impl::checkout_branch(self, name)
    }

    fn delete_branch(&self, name: &BranchName, force: bool) -> Result<(), GitError> {
        crate::branch_impl::delete_branch(self, name, force)
    }

    fn delete_remote_branch(&self, name: &BranchName) -> Result<(), GitError> {
        crate::remote_impl::delete_remote_branch(self, name)
    }

    // === Remote sync ===
    fn fetch(&self, remote: &str, refspec: &str) -> Result<(), GitError> {
        crate::remote_impl::fetch(self, remote, refspec)
    }

    fn pull(&self, remote: &str, refspec: &str) -> Result<(), GitError> {
        crate::remote_impl::pull(self, remote, refspec)
    }

    fn push(&self, branch: &BranchName, force: bool) -> Result<(), GitError> {
        crate::remote_impl::push(self, branch, force)
    }

    fn merge(&self, branch: &BranchName, squash: bool) -> Result<(), GitError> {
        crate::merge_impl::merge(self, branch, squash)
    }

    // === Stash ===
    fn stash(&self, message: &str) -> Result<StashRef, GitError> {
        crate::stash_impl::stash(self, message)
    }

    fn stash_apply(&self, stash: &StashRef) -> Result<(), GitError> {
        crate::stash_impl::stash_apply(self, stash)
    }

    fn stash_pop(&self, stash: &StashRef) -> Result<(), GitError> {
        crate::stash_impl::stash_pop(self, stash)
    }
}
