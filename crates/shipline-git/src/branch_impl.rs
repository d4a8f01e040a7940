//! gix-backed branch and ref operations: current branch, create, checkout,
//! delete, listing, and ahead/behind counting.

use std::collections::HashSet;

use crate::checkout_impl;
use crate::error::GitError;
use crate::gix_repo::GixGit;
use crate::types::{BranchName, BranchStatus};

fn full_ref(name: &BranchName) -> String {
    format!("refs/heads/{name}")
}

pub fn current_branch(repo: &GixGit) -> Result<BranchName, GitError> {
    let head = repo.repo.head_name().map_err(|e| GitError::Backend {
        message: format!("resolve HEAD: {e}"),
    })?;
    let Some(name) = head else {
        return Err(GitError::NotFound {
            message: "HEAD is detached".to_owned(),
        });
    };
    let short = name.shorten().to_string();
    BranchName::new(&short).map_err(|e| GitError::Backend {
        message: format!("HEAD points at an unusable ref name: {e}"),
    })
}

pub fn create_branch(repo: &GixGit, name: &BranchName, base_ref: &str) -> Result<(), GitError> {
    let id = repo
        .repo
        .rev_parse_single(base_ref)
        .map_err(|e| GitError::NotFound {
            message: format!("cannot resolve '{base_ref}': {e}"),
        })?;
    repo.repo
        .reference(
            full_ref(name),
            id,
            gix::refs::transaction::PreviousValue::MustNotExist,
            format!("branch: created from {base_ref}"),
        )
        .map_err(|e| GitError::Backend {
            message: format!("create branch '{name}': {e}"),
        })?;
    Ok(())
}

pub fn checkout_branch(repo: &GixGit, name: &BranchName) -> Result<(), GitError> {
    let full = full_ref(name);
    let mut reference = repo
        .repo
        .find_reference(&full)
        .map_err(|e| GitError::NotFound {
            message: format!("branch '{name}': {e}"),
        })?;
    let commit_id = reference
        .peel_to_id_in_place()
        .map_err(|e| GitError::Backend {
            message: format!("peel branch '{name}': {e}"),
        })?
        .detach();

    // Materialize the branch's tree, then repoint HEAD at the branch.
    checkout_impl::materialize_commit(repo, commit_id, true)?;

    use gix::refs::transaction::{Change, LogChange, PreviousValue, RefEdit, RefLog};
    let target: gix::refs::FullName = full.try_into().map_err(|e| GitError::Backend {
        message: format!("branch ref name: {e}"),
    })?;
    let head: gix::refs::FullName = "HEAD".try_into().map_err(|e| GitError::Backend {
        message: format!("HEAD ref name: {e}"),
    })?;
    repo.repo
        .edit_reference(RefEdit {
            change: Change::Update {
                log: LogChange {
                    mode: RefLog::AndReference,
                    force_create_reflog: false,
                    message: format!("checkout: moving to {name}").into(),
                },
                expected: PreviousValue::Any,
                new: gix::refs::Target::Symbolic(target),
            },
            name: head,
            deref: false,
        })
        .map_err(|e| GitError::Backend {
            message: format!("repoint HEAD at '{name}': {e}"),
        })?;
    Ok(())
}

pub fn delete_branch(repo: &GixGit, name: &BranchName, _force: bool) -> Result<(), GitError> {
    // gix ref deletion never re-checks ancestry, so -d and -D coincide
    // here; callers gate deletion on session state instead.
    let reference = repo
        .repo
        .find_reference(&full_ref(name))
        .map_err(|e| GitError::NotFound {
            message: format!("branch '{name}': {e}"),
        })?;
    reference.delete().map_err(|e| GitError::Backend {
        message: format!("delete branch '{name}': {e}"),
    })?;
    Ok(())
}

pub fn branch_exists_local(repo: &GixGit, name: &BranchName) -> Result<bool, GitError> {
    repo.repo
        .try_find_reference(&full_ref(name))
        .map(|r| r.is_some())
        .map_err(|e| GitError::Backend {
            message: format!("probe branch '{name}': {e}"),
        })
}

pub fn list_branches(repo: &GixGit) -> Result<Vec<BranchName>, GitError> {
    let platform = repo.repo.references().map_err(|e| GitError::Backend {
        message: format!("list references: {e}"),
    })?;
    let iter = platform.local_branches().map_err(|e| GitError::Backend {
        message: format!("list branches: {e}"),
    })?;
    let mut branches = Vec::new();
    for reference in iter {
        let Ok(reference) = reference else { continue };
        let short = reference.name().shorten().to_string();
        if let Ok(name) = BranchName::new(&short) {
            branches.push(name);
        }
    }
    branches.sort();
    Ok(branches)
}

pub fn branch_status(repo: &GixGit) -> Result<BranchStatus, GitError> {
    let is_clean = !crate::status_impl::has_uncommitted_changes(repo)?;

    let Some(head_name) = repo.repo.head_name().map_err(|e| GitError::Backend {
        message: format!("resolve HEAD: {e}"),
    })?
    else {
        return Ok(BranchStatus {
            ahead: 0,
            behind: 0,
            has_remote: false,
            is_clean,
        });
    };

    // Resolve the branch's remote-tracking ref (@{upstream}).
    let tracking = repo
        .repo
        .branch_remote_tracking_ref_name(head_name.as_ref(), gix::remote::Direction::Fetch);
    let Some(Ok(tracking)) = tracking else {
        return Ok(BranchStatus {
            ahead: 0,
            behind: 0,
            has_remote: false,
            is_clean,
        });
    };
    let Some(mut tracking_ref) = repo
        .repo
        .try_find_reference(tracking.as_bstr())
        .map_err(|e| GitError::Backend {
            message: format!("probe tracking ref: {e}"),
        })?
    else {
        // Configured upstream that was never fetched.
        return Ok(BranchStatus {
            ahead: 0,
            behind: 0,
            has_remote: false,
            is_clean,
        });
    };
    let upstream_id = tracking_ref
        .peel_to_id_in_place()
        .map_err(|e| GitError::Backend {
            message: format!("peel tracking ref: {e}"),
        })?
        .detach();
    let head_id = repo.head_commit_id()?;

    let head_set = reachable_set(repo, head_id)?;
    let upstream_set = reachable_set(repo, upstream_id)?;
    Ok(BranchStatus {
        ahead: count(head_set.difference(&upstream_set)),
        behind: count(upstream_set.difference(&head_set)),
        has_remote: true,
        is_clean,
    })
}

pub fn commits_ahead_of(repo: &GixGit, base_ref: &str) -> Result<u32, GitError> {
    let base_id = repo
        .repo
        .rev_parse_single(base_ref)
        .map_err(|e| GitError::NotFound {
            message: format!("cannot resolve '{base_ref}': {e}"),
        })?
        .detach();
    let head_id = repo.head_commit_id()?;
    let head_set = reachable_set(repo, head_id)?;
    let base_set = reachable_set(repo, base_id)?;
    Ok(count(head_set.difference(&base_set)))
}

/// Every commit reachable from `tip`. Feature branches are short-lived, so
/// full reachability sets stay cheap at the scale this tool works at.
fn reachable_set(repo: &GixGit, tip: gix::ObjectId) -> Result<HashSet<gix::ObjectId>, GitError> {
    let walk = repo
        .repo
        .rev_walk(Some(tip))
        .all()
        .map_err(|e| GitError::Backend {
            message: format!("rev walk from {tip}: {e}"),
        })?;
    let mut set = HashSet::new();
    for info in walk {
        let info = info.map_err(|e| GitError::Backend {
            message: format!("rev walk step: {e}"),
        })?;
        set.insert(info.id);
    }
    Ok(set)
}

fn count<'a>(iter: impl Iterator<Item = &'a gix::ObjectId>) -> u32 {
    u32::try_from(iter.count()).unwrap_or(u32::MAX)
}
