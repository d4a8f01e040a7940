//! PR-conflict detection.
//!
//! The at-most-one-open-PR-per-branch-lifecycle invariant: before shipping,
//! the open PRs whose head is the session's branch decide whether ship
//! creates a PR, updates the existing one, or refuses until an operator
//! closes the extras. A previously merged PR does not block — continued
//! work after a merge gets a fresh PR.

use shipline_forge::{ForgeError, ForgePort, PrStateFilter};
use tracing::debug;

/// What ship should do about the pull request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PrAction {
    /// No open PR: create one.
    Create,
    /// Exactly one open PR: pushing adds commits; update metadata on it.
    Update {
        /// The open PR's number.
        number: u64,
    },
    /// Two or more open PRs share this head; the operator must close the
    /// extras.
    Block {
        /// Numbers of all open PRs with this head.
        open: Vec<u64>,
    },
}

/// Classify the open-PR situation for `branch`.
///
/// # Errors
/// Propagates forge failures from the listing call.
pub fn classify_pr_action(forge: &dyn ForgePort, branch: &str) -> Result<PrAction, ForgeError> {
    let open = forge.list_pull_requests(branch, PrStateFilter::Open)?;
    let mut numbers: Vec<u64> = open.iter().map(|pr| pr.number).collect();
    numbers.sort_unstable();

    let action = match numbers.as_slice() {
        [] => PrAction::Create,
        [single] => PrAction::Update { number: *single },
        _ => PrAction::Block { open: numbers },
    };
    debug!(target: "shipline::validate", branch, ?action, "pr classification");
    Ok(action)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use shipline_forge::{
        ChecksWait, CheckStatus, CreatedPr, MergeStrategy, NewPullRequest, PrState,
        PullRequestSummary, PullRequestUpdate, WaitOptions,
    };

    /// Minimal forge whose PR listing is fixed.
    struct ListOnlyForge {
        open: Vec<u64>,
    }

    impl ForgePort for ListOnlyForge {
        fn create_pull_request(&self, _: &NewPullRequest) -> Result<CreatedPr, ForgeError> {
            unreachable!("listing only")
        }
        fn update_pull_request(&self, _: u64, _: &PullRequestUpdate) -> Result<(), ForgeError> {
            unreachable!("listing only")
        }
        fn list_pull_requests(
            &self,
            _: &str,
            state: PrStateFilter,
        ) -> Result<Vec<PullRequestSummary>, ForgeError> {
            assert!(matches!(state, PrStateFilter::Open));
            Ok(self
                .open
                .iter()
                .map(|n| PullRequestSummary {
                    number: *n,
                    state: PrState::Open,
                    merged_at: None,
                    url: format!("https://github.com/a/b/pull/{n}"),
                })
                .collect())
        }
        fn get_check_status(&self, _: &str) -> Result<CheckStatus, ForgeError> {
            unreachable!("listing only")
        }
        fn merge_pull_request(&self, _: u64, _: MergeStrategy) -> Result<bool, ForgeError> {
            unreachable!("listing only")
        }
        fn wait_for_checks(&self, _: &str, _: WaitOptions<'_>) -> Result<ChecksWait, ForgeError> {
            unreachable!("listing only")
        }
    }

    #[test]
    fn no_open_prs_means_create() {
        let forge = ListOnlyForge { open: vec![] };
        assert_eq!(
            classify_pr_action(&forge, "feature/a").expect("classify"),
            PrAction::Create
        );
    }

    #[test]
    fn one_open_pr_means_update() {
        let forge = ListOnlyForge { open: vec![41] };
        assert_eq!(
            classify_pr_action(&forge, "feature/a").expect("classify"),
            PrAction::Update { number: 41 }
        );
    }

    #[test]
    fn multiple_open_prs_block() {
        let forge = ListOnlyForge { open: vec![7, 3] };
        assert_eq!(
            classify_pr_action(&forge, "feature/a").expect("classify"),
            PrAction::Block { open: vec![3, 7] }
        );
    }
}
