//! Network operations via git CLI fallback.
//!
//! Push is the flagship operation kept as a CLI subprocess because gix
//! does not yet provide a high-level push API; fetch, pull, remote branch
//! probing, and remote deletion (a push in disguise) ride the same
//! fallback. Everything local goes through gix.

use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::GitError;
use crate::gix_repo::GixGit;
use crate::types::BranchName;

pub fn push(repo: &GixGit, branch: &BranchName, force: bool) -> Result<(), GitError> {
    let mut args = vec!["push", "-u", repo.remote.as_str(), branch.as_str()];
    if force {
        args.push("--force-with-lease");
    }
    let output = run(repo, &args)?;
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
    if stderr.contains("[rejected]") || stderr.contains("non-fast-forward") {
        Err(GitError::PushRejected {
            remote: repo.remote.clone(),
            message: stderr,
        })
    } else {
        Err(GitError::from_output(
            format!("git {}", args.join(" ")),
            &output,
        ))
    }
}

pub fn pull(repo: &GixGit, remote: &str, refspec: &str) -> Result<(), GitError> {
    git_ok(repo, &["pull", "--ff-only", remote, refspec])
}

pub fn fetch(repo: &GixGit, remote: &str, refspec: &str) -> Result<(), GitError> {
    git_ok(repo, &["fetch", remote, refspec])
}

pub fn delete_remote_branch(repo: &GixGit, name: &BranchName) -> Result<(), GitError> {
    git_ok(repo, &["push", &repo.remote, "--delete", name.as_str()]).map_err(|e| match e {
        GitError::Command {
            command, stderr, ..
        } => GitError::PushRejected {
            remote: repo.remote.clone(),
            message: format!("{command}: {stderr}"),
        },
        other => other,
    })
}

pub fn branch_exists_remote(repo: &GixGit, name: &BranchName) -> Result<bool, GitError> {
    let output = run(
        repo,
        &[
            "ls-remote",
            "--exit-code",
            "--heads",
            &repo.remote,
            name.as_str(),
        ],
    )?;
    Ok(output.status.success())
}

fn git_ok(repo: &GixGit, args: &[&str]) -> Result<(), GitError> {
    let output = run(repo, args)?;
    if output.status.success() {
        Ok(())
    } else {
        Err(GitError::from_output(
            format!("git {}", args.join(" ")),
            &output,
        ))
    }
}

pub(crate) fn run(repo: &GixGit, args: &[&str]) -> Result<std::process::Output, GitError> {
    debug!(target: "shipline::git", command = %format!("git {}", args.join(" ")), "exec");
    Command::new("git")
        .args(args)
        .current_dir(&repo.workdir)
        .stdin(Stdio::null())
        .output()
        .map_err(GitError::Io)
}
