//! Working-tree merge via git CLI fallback.
//!
//! gix merges trees; materializing conflict markers and index conflict
//! stages into the working tree is porcelain it does not expose yet, so
//! this one local operation stays a subprocess alongside the network set.

use crate::error::GitError;
use crate::gix_repo::GixGit;
use crate::remote_impl::run;
use crate::types::BranchName;

pub fn merge(repo: &GixGit, branch: &BranchName, squash: bool) -> Result<(), GitError> {
    let mut args = vec!["merge"];
    if squash {
        args.push("--squash");
    }
    args.push(branch.as_str());
    let output = run(repo, &args)?;
    if output.status.success() {
        return Ok(());
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
    if stdout.contains("CONFLICT") || stderr.contains("CONFLICT") {
        Err(GitError::MergeConflict {
            message: if stderr.is_empty() {
                stdout.trim().to_owned()
            } else {
                stderr
            },
        })
    } else {
        Err(GitError::from_output(
            format!("git {}", args.join(" ")),
            &output,
        ))
    }
}
