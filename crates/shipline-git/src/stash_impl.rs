//! Stash create/apply built from gix commit/tree primitives.
//!
//! gix does not provide a high-level stash API. The stash is a plain
//! snapshot commit over the current worktree state, referenced only by the
//! [`StashRef`] handed back to the caller (its hex commit id). Applying
//! writes the snapshot's files over the worktree and resets the index to
//! HEAD so the restored changes read as uncommitted.

use crate::checkout_impl;
use crate::commit_impl;
use crate::error::GitError;
use crate::gix_repo::{parse_oid, GixGit};
use crate::types::StashRef;

pub fn stash(repo: &GixGit, message: &str) -> Result<StashRef, GitError> {
    // Capture: stage everything, turn the index into a tree, and commit it
    // without moving any ref.
    commit_impl::stage_all(repo)?;
    let tree_id = commit_impl::tree_from_index(repo)?;

    let (author, committer) = commit_impl::identities(repo)?;
    let parents: Vec<gix::ObjectId> = match repo.repo.head_id() {
        Ok(id) => vec![id.detach()],
        Err(_) => Vec::new(),
    };
    let commit = gix::objs::Commit {
        message: message.into(),
        tree: tree_id,
        author: author.into(),
        committer: committer.into(),
        encoding: None,
        parents: parents.into_iter().collect(),
        extra_headers: Default::default(),
    };
    let id = repo
        .repo
        .write_object(&commit)
        .map_err(|e| GitError::Backend {
            message: format!("failed to write stash commit: {e}"),
        })?
        .detach();

    // Drop the captured changes: worktree and index back to HEAD.
    let head_id = repo.head_commit_id()?;
    checkout_impl::materialize_commit(repo, head_id, true)?;

    Ok(StashRef(id.to_string()))
}

pub fn stash_apply(repo: &GixGit, stash: &StashRef) -> Result<(), GitError> {
    let id = parse_oid(stash.as_str())?;
    // Write the snapshot's files over the worktree without removing
    // anything else, then restore the index to HEAD so the changes show
    // up as uncommitted.
    checkout_impl::materialize_commit(repo, id, false)?;
    checkout_impl::index_from_head(repo)
}

pub fn stash_pop(repo: &GixGit, stash: &StashRef) -> Result<(), GitError> {
    // The snapshot commit is unreferenced; once applied there is nothing
    // to drop, so pop and apply coincide.
    stash_apply(repo, stash)
}
