//! gix-backed status and dirty detection.
//!
//! [`status`] reports two layers merged into one [`WorktreeStatus`]:
//! index-vs-worktree changes (from the status walk, which honors
//! `.gitignore`) and HEAD-vs-index changes (staged but uncommitted),
//! so `status().clean` agrees with [`has_uncommitted_changes`].

use std::collections::{BTreeMap, BTreeSet};

use crate::error::GitError;
use crate::gix_repo::GixGit;
use crate::types::WorktreeStatus;

pub fn has_uncommitted_changes(repo: &GixGit) -> Result<bool, GitError> {
    repo.repo.is_dirty().map_err(|e| GitError::Backend {
        message: format!("dirty check: {e}"),
    })
}

pub fn status(repo: &GixGit) -> Result<WorktreeStatus, GitError> {
    let mut modified = BTreeSet::new();
    let mut created = BTreeSet::new();
    let mut deleted = BTreeSet::new();
    let mut untracked = BTreeSet::new();

    // Layer 1: index vs worktree, via the status walk.
    let platform = repo
        .repo
        .status(gix::progress::Discard)
        .map_err(|e| GitError::Backend {
            message: format!("status: {e}"),
        })?;
    let iter = platform
        .into_index_worktree_iter(Vec::<gix::bstr::BString>::new())
        .map_err(|e| GitError::Backend {
            message: format!("status walk: {e}"),
        })?;
    for item in iter {
        let item = item.map_err(|e| GitError::Backend {
            message: format!("status entry: {e}"),
        })?;
        let path = item.rela_path().to_string();
        use gix::status::index_worktree::Item;
        use gix::status::index_worktree::iter::Summary;
        match &item {
            Item::DirectoryContents { .. } => {
                untracked.insert(path);
            }
            Item::Rewrite { .. } => {
                modified.insert(path);
            }
            _ => match item.summary() {
                Some(Summary::Added | Summary::IntentToAdd | Summary::Copied) => {
                    created.insert(path);
                }
                Some(Summary::Removed) => {
                    deleted.insert(path);
                }
                Some(_) | None => {
                    modified.insert(path);
                }
            },
        }
    }

    // Layer 2: HEAD vs index, so staged-but-uncommitted changes show up.
    let index_entries = index_map(repo)?;
    let head_entries = head_map(repo)?;
    for (path, id) in &index_entries {
        match head_entries.get(path) {
            None => {
                created.insert(path.clone());
            }
            Some(head_id) if head_id != id => {
                modified.insert(path.clone());
            }
            Some(_) => {}
        }
    }
    for path in head_entries.keys() {
        if !index_entries.contains_key(path) {
            deleted.insert(path.clone());
        }
    }

    let mut status = WorktreeStatus {
        clean: false,
        modified: modified.into_iter().collect(),
        created: created.into_iter().collect(),
        deleted: deleted.into_iter().collect(),
        untracked: untracked.into_iter().collect(),
    };
    status.clean = status.change_count() == 0;
    Ok(status)
}

/// Path → blob id for every entry in the on-disk index (empty when the
/// repository has no index yet).
fn index_map(repo: &GixGit) -> Result<BTreeMap<String, gix::ObjectId>, GitError> {
    let Ok(index) = repo.repo.open_index() else {
        return Ok(BTreeMap::new());
    };
    Ok(index
        .entries()
        .iter()
        .filter_map(|entry| {
            use gix::bstr::ByteSlice;
            let path = entry.path(&index).to_str().ok()?.to_owned();
            Some((path, entry.id))
        })
        .collect())
}

/// Path → blob id for every entry in HEAD's tree (empty on an unborn
/// branch).
fn head_map(repo: &GixGit) -> Result<BTreeMap<String, gix::ObjectId>, GitError> {
    let Ok(commit) = repo.repo.head_commit() else {
        return Ok(BTreeMap::new());
    };
    let tree_id = commit.tree_id().map_err(|e| GitError::Backend {
        message: format!("read HEAD tree id: {e}"),
    })?;
    let index = repo
        .repo
        .index_from_tree(&tree_id)
        .map_err(|e| GitError::Backend {
            message: format!("index from HEAD tree: {e}"),
        })?;
    Ok(index
        .entries()
        .iter()
        .filter_map(|entry| {
            use gix::bstr::ByteSlice;
            let path = entry.path(&index).to_str().ok()?.to_owned();
            Some((path, entry.id))
        })
        .collect())
}
