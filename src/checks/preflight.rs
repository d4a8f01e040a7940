//! Named pre-flight checks.
//!
//! Each function builds one [`CheckResult`] from port queries or from
//! classifications the orchestrator already computed. Checks only read
//! state; a port error turns into a failed check carrying the error text
//! rather than aborting the check run itself.

use shipline_git::{BranchName, GitPort};

use crate::checks::CheckResult;
use crate::model::session::WorkflowSession;
use crate::model::types::WorkflowState;
use crate::validate::branch::BranchReuse;
use crate::validate::pr::PrAction;

/// The caller must be on `main` (launch, hotfix).
pub fn on_main_branch(git: &dyn GitPort, main: &str) -> CheckResult {
    const NAME: &str = "On main branch";
    match git.current_branch() {
        Ok(current) if current.as_str() == main => {
            CheckResult::pass(NAME, format!("on {main}"))
        }
        Ok(current) => CheckResult::fail(NAME, format!("currently on '{current}'"))
            .with_expectation(main, current.as_str())
            .with_suggestion(format!("git checkout {main}")),
        Err(e) => CheckResult::fail(NAME, e.to_string()),
    }
}

/// The caller must NOT be on `main` (ship).
pub fn not_on_main(git: &dyn GitPort, main: &str) -> CheckResult {
    const NAME: &str = "Not on main";
    match git.current_branch() {
        Ok(current) if current.as_str() == main => {
            CheckResult::fail(NAME, format!("cannot ship from {main} itself"))
                .with_suggestion("switch to a feature branch, or start one with `shipline launch`")
        }
        Ok(current) => CheckResult::pass(NAME, format!("on feature branch '{current}'")),
        Err(e) => CheckResult::fail(NAME, e.to_string()),
    }
}

/// The working tree must be clean.
pub fn working_tree_clean(git: &dyn GitPort) -> CheckResult {
    const NAME: &str = "Working tree clean";
    match git.status() {
        Ok(status) if status.clean => CheckResult::pass(NAME, "no uncommitted changes"),
        Ok(status) => CheckResult::fail(NAME, status.summary())
            .with_expectation("clean", status.summary())
            .with_suggestion("commit or stash the changes, or pass --force"),
        Err(e) => CheckResult::fail(NAME, e.to_string()),
    }
}

/// Main must not be behind its remote (run while on main).
pub fn main_up_to_date(git: &dyn GitPort, main: &str) -> CheckResult {
    const NAME: &str = "Main up to date";
    match git.branch_status() {
        Ok(status) if !status.has_remote => {
            CheckResult::pass(NAME, "no remote tracking branch; nothing to sync")
        }
        Ok(status) if status.behind == 0 => CheckResult::pass(NAME, "up to date with remote"),
        Ok(status) => CheckResult::fail(
            NAME,
            format!("{main} is {} commit(s) behind its remote", status.behind),
        )
        .with_suggestion(format!("git pull --ff-only origin {main}")),
        Err(e) => CheckResult::fail(NAME, e.to_string()),
    }
}

/// No non-terminal session may already own the branch (launch).
pub fn no_active_session(existing: Option<&WorkflowSession>, branch: &BranchName) -> CheckResult {
    const NAME: &str = "No active session";
    existing.map_or_else(
        || CheckResult::pass(NAME, format!("no active session for '{branch}'")),
        |session| {
            CheckResult::fail(
                NAME,
                format!(
                    "session {} already owns '{branch}' (state: {})",
                    session.id.short(),
                    session.current_state
                ),
            )
            .with_suggestion(format!(
                "finish it with `shipline ship`, or run `shipline abort --branch {branch}`"
            ))
        },
    )
}

/// An active session must exist (commit, ship, abort, swap).
pub fn session_present(existing: Option<&WorkflowSession>, target: &str) -> CheckResult {
    const NAME: &str = "Active session";
    existing.map_or_else(
        || {
            CheckResult::fail(NAME, format!("no active session for '{target}'"))
                .with_suggestion("start one with `shipline launch`")
        },
        |session| {
            CheckResult::pass(
                NAME,
                format!(
                    "session {} ({}, state: {})",
                    session.id.short(),
                    session.workflow_type,
                    session.current_state
                ),
            )
        },
    )
}

/// The session must be in one of the allowed states.
pub fn state_allows(
    name: &'static str,
    session: &WorkflowSession,
    allowed: &[WorkflowState],
) -> CheckResult {
    if allowed.contains(&session.current_state) {
        CheckResult::pass(name, format!("state {} permits this", session.current_state))
    } else {
        let expected = allowed
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" | ");
        CheckResult::fail(
            name,
            format!("session is in state {}", session.current_state),
        )
        .with_expectation(expected, session.current_state.as_str())
        .with_suggestion("run `shipline status` to see where the workflow stands")
    }
}

/// An expired session may not continue without override.
pub fn session_not_expired(session: &WorkflowSession, expired: bool) -> CheckResult {
    const NAME: &str = "Session not expired";
    if expired {
        CheckResult::fail(
            NAME,
            format!(
                "session {} expired at {}",
                session.id.short(),
                session.expires_at.to_rfc3339()
            ),
        )
        .with_suggestion("pass --force to continue anyway, or `shipline abort` to retire it")
    } else {
        CheckResult::pass(NAME, "session within its TTL")
    }
}

/// There must be changes to commit (commit).
pub fn has_changes(git: &dyn GitPort) -> CheckResult {
    const NAME: &str = "Changes to commit";
    match git.has_uncommitted_changes() {
        Ok(true) => CheckResult::pass(NAME, "working tree has changes"),
        Ok(false) => CheckResult::fail(NAME, "nothing to commit")
            .with_suggestion("make some changes first, or run `shipline ship` to push what exists"),
        Err(e) => CheckResult::fail(NAME, e.to_string()),
    }
}

/// Ship needs commits that are ahead of main (unless a PR already exists,
/// in which case the caller skips this check).
pub fn commits_ahead(git: &dyn GitPort, main: &str) -> CheckResult {
    const NAME: &str = "Commits ahead of main";
    match git.commits_ahead_of(main) {
        Ok(0) => CheckResult::fail(NAME, format!("branch has no commits ahead of {main}"))
            .with_suggestion("commit your work with `shipline commit` first"),
        Ok(n) => CheckResult::pass(NAME, format!("{n} commit(s) ahead of {main}")),
        Err(e) => CheckResult::fail(NAME, e.to_string()),
    }
}

/// The forge must be configured (ship).
pub fn forge_configured(forge_kind: Option<&str>) -> CheckResult {
    const NAME: &str = "Forge configured";
    forge_kind.map_or_else(
        || {
            CheckResult::fail(NAME, "no forge configured")
                .with_suggestion("set forge.kind in .shipline/config.yaml (run `shipline init`)")
        },
        |kind| CheckResult::pass(NAME, format!("forge: {kind}")),
    )
}

/// Render a branch-reuse classification as the "Branch name available"
/// check (launch).
pub fn branch_available(branch: &BranchName, reuse: &BranchReuse, suggestion: &str) -> CheckResult {
    const NAME: &str = "Branch name available";
    match reuse {
        BranchReuse::NeverUsed => CheckResult::pass(NAME, format!("'{branch}' has no history")),
        BranchReuse::AbortedOnly => {
            CheckResult::pass(NAME, format!("'{branch}' only has aborted sessions"))
        }
        BranchReuse::ContinuedWork => CheckResult::pass(
            NAME,
            format!("'{branch}' continues after a merge; a new PR will be created on ship"),
        ),
        BranchReuse::MergedDeleted => CheckResult::fail(
            NAME,
            format!("'{branch}' was merged previously and is retired"),
        )
        .with_suggestion(format!("use '{suggestion}' instead")),
        BranchReuse::MergedRecreated => CheckResult::fail(
            NAME,
            format!("'{branch}' was merged previously but exists again — reusing it would rewrite shipped history"),
        )
        .with_suggestion(format!("delete the recreated branch or use '{suggestion}'")),
    }
}

/// Render a PR classification as the "Pull request state" check (ship).
pub fn pr_state(branch: &BranchName, action: &PrAction) -> CheckResult {
    const NAME: &str = "Pull request state";
    match action {
        PrAction::Create => CheckResult::pass(NAME, "no open PR; one will be created"),
        PrAction::Update { number } => {
            CheckResult::pass(NAME, format!("open PR #{number} will be updated"))
        }
        PrAction::Block { open } => {
            let list = open
                .iter()
                .map(|n| format!("#{n}"))
                .collect::<Vec<_>>()
                .join(", ");
            CheckResult::fail(
                NAME,
                format!("{} open PRs have head '{branch}' ({list})", open.len()),
            )
            .with_suggestion("close the extra PRs on the forge, keeping at most one open")
        }
    }
}
