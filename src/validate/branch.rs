//! Branch-reuse detection.
//!
//! A branch name whose PR has ever been squash-merged is retired: launching
//! it again would make the new PR's diff replay already-shipped commits and
//! corrupt the linear history the tool exists to protect. The validator
//! classifies a proposed name against the session store, the local/remote
//! branch state, and the forge's merged-PR history.

use shipline_forge::{ForgePort, PrStateFilter};
use shipline_git::{BranchName, GitPort};
use tracing::debug;

use crate::error::WorkflowError;
use crate::store::SessionStore;

/// How a proposed branch name relates to prior workflow history.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BranchReuse {
    /// No session, no branch, no merged PR — free to use.
    NeverUsed,
    /// Only aborted sessions exist; no merge was ever recorded.
    AbortedOnly,
    /// A prior session merged and the branch is gone. Launching is blocked.
    MergedDeleted,
    /// A prior session merged but the branch exists again (locally or
    /// remotely). Launching is blocked; this is the critical case.
    MergedRecreated,
    /// Merged history exists but the caller is not launching — continued
    /// work on the surviving session; a new PR is created on the next ship.
    ContinuedWork,
}

impl BranchReuse {
    /// Whether this classification blocks a launch.
    #[must_use]
    pub const fn blocks_launch(self) -> bool {
        matches!(self, Self::MergedDeleted | Self::MergedRecreated)
    }

    /// The error a blocked launch surfaces.
    #[must_use]
    pub fn launch_error(self, branch: &BranchName, suggestion: String) -> Option<WorkflowError> {
        match self {
            Self::MergedDeleted => Some(WorkflowError::BranchRetired {
                branch: branch.as_str().to_owned(),
                suggestion,
            }),
            Self::MergedRecreated => Some(WorkflowError::BranchRecreated {
                branch: branch.as_str().to_owned(),
                suggestion,
            }),
            _ => None,
        }
    }
}

/// Classifies proposed branch names against workflow history.
pub struct BranchValidator<'a> {
    store: &'a SessionStore,
    git: &'a dyn GitPort,
    forge: Option<&'a dyn ForgePort>,
}

impl<'a> BranchValidator<'a> {
    /// Build a validator over the given collaborators. `forge` is optional:
    /// without one, merged-PR history is judged from sessions alone.
    #[must_use]
    pub fn new(
        store: &'a SessionStore,
        git: &'a dyn GitPort,
        forge: Option<&'a dyn ForgePort>,
    ) -> Self {
        Self { store, git, forge }
    }

    /// Classify `branch` for a caller that is (`launching=true`) or is not
    /// (`launching=false`) trying to start a fresh workflow on it.
    ///
    /// # Errors
    /// Propagates store and git failures; forge failures are tolerated
    /// (history lookup falls back to session records).
    pub fn classify(
        &self,
        branch: &BranchName,
        launching: bool,
    ) -> Result<BranchReuse, WorkflowError> {
        let history = self.store.all_for_branch(branch)?;
        let merged_in_sessions = history.iter().any(|s| s.has_merged_pr());
        let merged = merged_in_sessions || self.forge_reports_merge(branch);

        if merged {
            if !launching {
                return Ok(BranchReuse::ContinuedWork);
            }
            let exists = self.git.branch_exists_local(branch)?
                || self.git.branch_exists_remote(branch)?;
            return Ok(if exists {
                BranchReuse::MergedRecreated
            } else {
                BranchReuse::MergedDeleted
            });
        }

        if history.iter().all(|s| s.is_terminal()) && !history.is_empty() {
            return Ok(BranchReuse::AbortedOnly);
        }
        Ok(BranchReuse::NeverUsed)
    }

    /// Suggest a free variant of `branch` by appending `-v2`, `-v3`, ...
    ///
    /// # Errors
    /// Propagates store and git failures from the availability probes.
    pub fn suggest(&self, branch: &BranchName) -> Result<String, WorkflowError> {
        suggest_name(branch.as_str(), |candidate| {
            let Ok(name) = BranchName::new(candidate) else {
                return Ok(true);
            };
            Ok(self.classify(&name, true)?.blocks_launch()
                || self.store.get_by_branch(&name)?.is_some()
                || self.git.branch_exists_local(&name)?)
        })
    }

    fn forge_reports_merge(&self, branch: &BranchName) -> bool {
        let Some(forge) = self.forge else {
            return false;
        };
        match forge.list_pull_requests(branch.as_str(), PrStateFilter::Merged) {
            Ok(prs) => !prs.is_empty(),
            Err(e) => {
                // Forge history is supplementary; session records already
                // capture merges this tool performed.
                debug!(
                    target: "shipline::validate",
                    branch = %branch,
                    error = %e,
                    "forge history lookup failed; relying on session records"
                );
                false
            }
        }
    }
}

/// Append `-v2`, `-v3`, ... until `is_taken` reports a free name.
///
/// # Errors
/// Propagates probe failures.
pub fn suggest_name(
    base: &str,
    mut is_taken: impl FnMut(&str) -> Result<bool, WorkflowError>,
) -> Result<String, WorkflowError> {
    // A base that already carries a -vN suffix versions from its stem, so
    // feature/x-v2 suggests feature/x-v3, not feature/x-v2-v2.
    let stem = base
        .rsplit_once("-v")
        .filter(|(_, n)| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
        .map_or(base, |(stem, _)| stem);

    for n in 2..=99 {
        let candidate = format!("{stem}-v{n}");
        if !is_taken(&candidate)? {
            return Ok(candidate);
        }
    }
    // 98 taken variants means something is systematically wrong; fall back
    // to the first candidate and let the launch checks reject it visibly.
    Ok(format!("{stem}-v2"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
