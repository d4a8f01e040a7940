//! gix-backed staging and commit creation.
//!
//! Staging folds the status walk's findings into a rebuilt index (the walk
//! honors `.gitignore`, so ignored files never get staged); committing
//! turns the index into a tree with the tree editor and writes the commit
//! through `commit_as`, updating `HEAD`.

use std::collections::BTreeMap;

use gix::bstr::ByteSlice;

use crate::error::GitError;
use crate::gix_repo::{self, GixGit};
use crate::types::{CommitId, CommitOptions};

pub fn stage_all(repo: &GixGit) -> Result<(), GitError> {
    // Start from the tracked state the index already records.
    let mut entries = index_entries(repo)?;

    // Fold in every change the status walk reports.
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
        use gix::status::index_worktree::iter::Summary;
        match item.summary() {
            Some(Summary::Removed) => {
                entries.remove(&path);
            }
            // Added, modified, renamed, untracked: snapshot the file as it
            // is on disk.
            Some(_) | None => {
                let Some(staged) = snapshot_file(repo, &path)? else {
                    entries.remove(&path);
                    continue;
                };
                entries.insert(path, staged);
            }
        }
    }

    write_index(repo, &entries)
}

pub fn commit(repo: &GixGit, message: &str, _opts: CommitOptions) -> Result<CommitId, GitError> {
    // Hooks are porcelain; this backend never runs them, so no_verify has
    // nothing to skip.
    let tree_id = tree_from_index(repo)?;

    let (author, committer) = identities(repo)?;
    let parents: Vec<gix::ObjectId> = match repo.repo.head_id() {
        Ok(id) => vec![id.detach()],
        // Unborn branch: the first commit has no parent.
        Err(_) => Vec::new(),
    };

    let id = repo
        .repo
        .commit_as(committer, author, "HEAD", message, tree_id, parents)
        .map_err(|e| GitError::Backend {
            message: format!("failed to create commit: {e}"),
        })?;
    gix_repo::to_commit_id(id.detach())
}

/// Build a tree object from the full index listing. The tree editor
/// creates nested trees from slash paths.
pub(crate) fn tree_from_index(repo: &GixGit) -> Result<gix::ObjectId, GitError> {
    let index = repo.repo.open_index().map_err(|e| GitError::Backend {
        message: format!("open index: {e}"),
    })?;

    let empty = repo.repo.empty_tree();
    let mut editor = empty.edit().map_err(|e| GitError::Backend {
        message: format!("failed to create tree editor: {e}"),
    })?;
    for entry in index.entries() {
        let Ok(path) = entry.path(&index).to_str() else {
            continue;
        };
        editor
            .upsert(path, kind_for_mode(entry.mode), entry.id)
            .map_err(|e| GitError::Backend {
                message: format!("tree edit upsert '{path}': {e}"),
            })?;
    }
    let id = editor.write().map_err(|e| GitError::Backend {
        message: format!("failed to write tree: {e}"),
    })?;
    Ok(id.detach())
}

/// The configured author/committer identities, required for any commit.
pub(crate) fn identities(
    repo: &GixGit,
) -> Result<(gix::actor::SignatureRef<'_>, gix::actor::SignatureRef<'_>), GitError> {
    let author = repo
        .repo
        .author()
        .ok_or_else(|| GitError::Backend {
            message: "no author identity configured".to_owned(),
        })?
        .map_err(|e| GitError::Backend {
            message: format!("failed to read author identity: {e}"),
        })?;
    let committer = repo
        .repo
        .committer()
        .ok_or_else(|| GitError::Backend {
            message: "no committer identity configured".to_owned(),
        })?
        .map_err(|e| GitError::Backend {
            message: format!("failed to read committer identity: {e}"),
        })?;
    Ok((author, committer))
}

/// Path → (blob id, index mode) for the on-disk index, falling back to
/// HEAD's tree when no index exists yet.
fn index_entries(
    repo: &GixGit,
) -> Result<BTreeMap<String, (gix::ObjectId, gix::index::entry::Mode)>, GitError> {
    let collect = |index: &gix::index::File| {
        index
            .entries()
            .iter()
            .filter_map(|entry| {
                let path = entry.path(index).to_str().ok()?.to_owned();
                Some((path, (entry.id, entry.mode)))
            })
            .collect()
    };

    if let Ok(index) = repo.repo.open_index() {
        return Ok(collect(&index));
    }
    match repo.repo.head_commit() {
        Ok(commit) => {
            let tree_id = commit.tree_id().map_err(|e| GitError::Backend {
                message: format!("read HEAD tree id: {e}"),
            })?;
            let index = repo
                .repo
                .index_from_tree(&tree_id)
                .map_err(|e| GitError::Backend {
                    message: format!("index from HEAD tree: {e}"),
                })?;
            Ok(collect(&index))
        }
        // Unborn branch with no index: nothing tracked yet.
        Err(_) => Ok(BTreeMap::new()),
    }
}

/// Write one worktree file into the object store, returning its blob id
/// and index mode. `None` when the file vanished between walk and read.
fn snapshot_file(
    repo: &GixGit,
    rela_path: &str,
) -> Result<Option<(gix::ObjectId, gix::index::entry::Mode)>, GitError> {
    let path = repo.workdir.join(rela_path);
    let meta = match std::fs::symlink_metadata(&path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(GitError::Io(e)),
    };

    if meta.file_type().is_symlink() {
        let target = std::fs::read_link(&path).map_err(GitError::Io)?;
        let id = repo
            .repo
            .write_blob(target.to_string_lossy().as_bytes())
            .map_err(|e| GitError::Backend {
                message: format!("failed to write blob: {e}"),
            })?;
        return Ok(Some((id.detach(), gix::index::entry::Mode::SYMLINK)));
    }
    if !meta.is_file() {
        return Ok(None);
    }

    let data = std::fs::read(&path).map_err(GitError::Io)?;
    let id = repo
        .repo
        .write_blob(&data)
        .map_err(|e| GitError::Backend {
            message: format!("failed to write blob: {e}"),
        })?;
    let mode = if is_executable(&meta) {
        gix::index::entry::Mode::FILE_EXECUTABLE
    } else {
        gix::index::entry::Mode::FILE
    };
    Ok(Some((id.detach(), mode)))
}

#[cfg(unix)]
fn is_executable(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &std::fs::Metadata) -> bool {
    false
}

/// Replace the on-disk index with the given entries.
fn write_index(
    repo: &GixGit,
    entries: &BTreeMap<String, (gix::ObjectId, gix::index::entry::Mode)>,
) -> Result<(), GitError> {
    let mut state = gix::index::State::new(repo.repo.object_hash());

    for (path, (id, mode)) in entries {
        let stat: gix::index::entry::Stat = Default::default();
        let flags = gix::index::entry::Flags::empty();
        state.dangerously_push_entry(stat, *id, flags, *mode, path.as_str().into());
    }

    state.sort_entries();

    let mut index_file = gix::index::File::from_state(state, repo.repo.index_path());
    index_file.write(Default::default()).map_err(|e| GitError::Backend {
        message: format!("failed to write index: {e}"),
    })?;

    Ok(())
}

fn kind_for_mode(mode: gix::index::entry::Mode) -> gix::objs::tree::EntryKind {
    match mode {
        gix::index::entry::Mode::FILE_EXECUTABLE => gix::objs::tree::EntryKind::BlobExecutable,
        gix::index::entry::Mode::SYMLINK => gix::objs::tree::EntryKind::Link,
        gix::index::entry::Mode::COMMIT => gix::objs::tree::EntryKind::Commit,
        gix::index::entry::Mode::DIR => gix::objs::tree::EntryKind::Tree,
        _ => gix::objs::tree::EntryKind::Blob,
    }
}
