//! gix-backed working-tree materialization.
//!
//! [`materialize_commit`] writes a commit's tree into the working
//! directory and rebuilds the index to match; it is the engine behind
//! branch checkout and the stash machinery.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::AtomicBool;

use gix::bstr::ByteSlice;

use crate::error::GitError;
use crate::gix_repo::GixGit;

/// Materialize `oid` (a commit or tree) into the working directory.
///
/// The index is rebuilt from the target tree and every file in the tree is
/// written out, overwriting existing content. With `remove_stale`, files
/// present in the working tree but absent from the target tree are removed
/// (the semantics of a branch checkout); without it, existing files
/// outside the tree are left alone (the semantics of a stash apply).
pub(crate) fn materialize_commit(
    repo: &GixGit,
    oid: gix::ObjectId,
    remove_stale: bool,
) -> Result<(), GitError> {
    // If oid is a commit, resolve to its tree.
    let tree_oid = {
        let obj = repo.repo.find_object(oid).map_err(|e| GitError::NotFound {
            message: format!("object {oid}: {e}"),
        })?;
        match obj.kind {
            gix::object::Kind::Commit => {
                let commit = obj.into_commit();
                commit
                    .tree_id()
                    .map_err(|e| GitError::Backend {
                        message: format!("failed to get tree from commit {oid}: {e}"),
                    })?
                    .detach()
            }
            gix::object::Kind::Tree => oid,
            other => {
                return Err(GitError::Backend {
                    message: format!("expected commit or tree, got {other}"),
                });
            }
        }
    };

    // Build index from tree using the high-level API.
    let mut index_file = repo
        .repo
        .index_from_tree(&tree_oid)
        .map_err(|e| GitError::Backend {
            message: format!("failed to create index from tree {tree_oid}: {e}"),
        })?;

    // Collect all paths in the target tree so stale files can be removed
    // after checkout.
    let tree_paths: HashSet<String> = index_file
        .entries()
        .iter()
        .filter_map(|entry| entry.path(&index_file).to_str().ok().map(|s| s.to_owned()))
        .collect();

    // Get checkout options from the repository configuration.
    let mut opts = repo
        .repo
        .checkout_options(gix::worktree::stack::state::attributes::Source::IdMapping)
        .map_err(|e| GitError::Backend {
            message: format!("failed to get checkout options: {e}"),
        })?;
    opts.overwrite_existing = true;
    opts.destination_is_initially_empty = false;

    let objects = repo
        .repo
        .objects
        .clone()
        .into_arc()
        .map_err(|e| GitError::Backend {
            message: format!("failed to convert object store to Arc: {e}"),
        })?;

    let outcome = gix::worktree::state::checkout(
        &mut index_file,
        &repo.workdir,
        objects,
        &gix::progress::Discard,
        &gix::progress::Discard,
        &AtomicBool::new(false),
        opts,
    )
    .map_err(|e| GitError::Backend {
        message: format!("checkout failed: {e}"),
    })?;

    if !outcome.errors.is_empty() {
        let first = &outcome.errors[0];
        return Err(GitError::Backend {
            message: format!(
                "checkout had {} error(s), first: {}: {}",
                outcome.errors.len(),
                first.path,
                first.error,
            ),
        });
    }

    // Persist the rebuilt index so status sees index == tree.
    index_file.write(Default::default()).map_err(|e| GitError::Backend {
        message: format!("failed to write index: {e}"),
    })?;

    if remove_stale {
        remove_stale_files(&repo.workdir, &repo.workdir, &tree_paths)?;
    }

    Ok(())
}

/// Walk `dir` and remove any files whose path relative to `workdir` is not
/// in `tree_paths`. Skips `.git` directories/files. Removes empty
/// directories after file cleanup.
fn remove_stale_files(
    workdir: &Path,
    dir: &Path,
    tree_paths: &HashSet<String>,
) -> Result<(), GitError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return Ok(()),
    };

    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        let path = entry.path();
        let name = entry.file_name();

        // Never touch .git (file or directory).
        if name == ".git" {
            continue;
        }

        if path.is_dir() {
            remove_stale_files(workdir, &path, tree_paths)?;
            // Remove directory if it became empty (ignore errors — may not
            // be empty).
            let _ = std::fs::remove_dir(&path);
        } else {
            let rel = path
                .strip_prefix(workdir)
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            if !rel.is_empty() && !tree_paths.contains(&rel) {
                std::fs::remove_file(&path).map_err(|e| GitError::Backend {
                    message: format!("failed to remove stale file '{rel}': {e}"),
                })?;
            }
        }
    }

    Ok(())
}

/// Reset the index to match HEAD's tree without touching the working
/// tree, equivalent to `git reset HEAD`.
pub(crate) fn index_from_head(repo: &GixGit) -> Result<(), GitError> {
    let head_commit = repo.repo.head_commit().map_err(|e| GitError::Backend {
        message: format!("failed to resolve HEAD commit: {e}"),
    })?;

    let head_tree_id = head_commit.tree_id().map_err(|e| GitError::Backend {
        message: format!("failed to read HEAD tree id: {e}"),
    })?;

    // Build a new index state from the HEAD tree.
    let state = gix::index::State::from_tree(&head_tree_id, &repo.repo.objects, Default::default())
        .map_err(|e| GitError::Backend {
            message: format!("failed to create index from tree: {e}"),
        })?;

    // Write the new index to disk.
    let mut new_index = gix::index::File::from_state(state, repo.repo.index_path());
    new_index.write(Default::default()).map_err(|e| GitError::Backend {
        message: format!("failed to write index: {e}"),
    })?;

    Ok(())
}
