//! Named post-flight verifications.
//!
//! Run after an operation's mutating actions to confirm the world looks
//! the way the operation claims. Failures here are reported as warnings on
//! the ToolResult — the durable state transition has already committed.

use shipline_git::{BranchName, GitPort};

use crate::checks::CheckResult;
use crate::model::session::WorkflowSession;
use crate::model::types::WorkflowState;

/// The session must have reached the expected state.
pub fn session_state_is(session: &WorkflowSession, expected: WorkflowState) -> CheckResult {
    const NAME: &str = "Session state";
    if session.current_state == expected {
        CheckResult::pass(NAME, format!("session is {expected}"))
    } else {
        CheckResult::warn(NAME, format!("session is {}", session.current_state))
            .with_expectation(expected.as_str(), session.current_state.as_str())
    }
}

/// The expected branch must be checked out.
pub fn current_branch_is(git: &dyn GitPort, expected: &BranchName) -> CheckResult {
    const NAME: &str = "Current branch";
    match git.current_branch() {
        Ok(current) if &current == expected => {
            CheckResult::pass(NAME, format!("on '{expected}'"))
        }
        Ok(current) => CheckResult::warn(NAME, format!("on '{current}'"))
            .with_expectation(expected.as_str(), current.as_str()),
        Err(e) => CheckResult::warn(NAME, e.to_string()),
    }
}

/// The caller must have landed on `main`.
pub fn on_main(git: &dyn GitPort, main: &str) -> CheckResult {
    const NAME: &str = "On main branch";
    match git.current_branch() {
        Ok(current) if current.as_str() == main => CheckResult::pass(NAME, format!("on {main}")),
        Ok(current) => CheckResult::warn(NAME, format!("on '{current}'"))
            .with_expectation(main, current.as_str()),
        Err(e) => CheckResult::warn(NAME, e.to_string()),
    }
}

/// The working tree must match the operation's expectation.
pub fn tree_state(git: &dyn GitPort, expect_clean: bool) -> CheckResult {
    const NAME: &str = "Working tree";
    match git.status() {
        Ok(status) if status.clean == expect_clean => CheckResult::pass(
            NAME,
            if expect_clean {
                "clean".to_owned()
            } else {
                format!("changes present ({})", status.summary())
            },
        ),
        Ok(status) => CheckResult::warn(NAME, status.summary()).with_expectation(
            if expect_clean { "clean" } else { "changes present" },
            status.summary(),
        ),
        Err(e) => CheckResult::warn(NAME, e.to_string()),
    }
}

/// The branch must exist locally (launch) or be gone (ship/abort cleanup).
pub fn local_branch_presence(
    git: &dyn GitPort,
    branch: &BranchName,
    expect_present: bool,
) -> CheckResult {
    const NAME: &str = "Local branch";
    match git.branch_exists_local(branch) {
        Ok(present) if present == expect_present => CheckResult::pass(
            NAME,
            if expect_present {
                format!("'{branch}' exists")
            } else {
                format!("'{branch}' deleted")
            },
        ),
        Ok(_) => CheckResult::warn(
            NAME,
            if expect_present {
                format!("'{branch}' is missing")
            } else {
                format!("'{branch}' still exists")
            },
        ),
        Err(e) => CheckResult::warn(NAME, e.to_string()),
    }
}

/// The remote branch must be gone after ship's cleanup.
pub fn remote_branch_absent(git: &dyn GitPort, branch: &BranchName) -> CheckResult {
    const NAME: &str = "Remote branch";
    match git.branch_exists_remote(branch) {
        Ok(false) => CheckResult::pass(NAME, format!("'{branch}' deleted on remote")),
        Ok(true) => CheckResult::warn(NAME, format!("'{branch}' still exists on remote"))
            .with_suggestion(format!("git push origin --delete {branch}")),
        Err(e) => CheckResult::warn(NAME, e.to_string()),
    }
}
