//! Abort, swap, hotfix, and cleanup scenarios.

mod common;

use common::TestEnv;
use shipline::orchestrator::{AbortArgs, CleanupArgs, HotfixArgs, ShipArgs, SwapArgs};
use shipline::{CancelToken, WorkflowState};
use shipline_forge::CheckStatus;

#[test]
fn abort_from_pr_created_leaves_main_and_keeps_the_pr() {
    let env = TestEnv::new();
    env.launch_ok("feature/a");
    env.commit_ok();
    // Park the session at pr_created via a failing-CI ship.
    env.forge.script_checks(vec![CheckStatus {
        failed: 1,
        failed_names: vec!["test".to_owned()],
        ..CheckStatus::default()
    }]);
    let parked = env
        .orch
        .ship(&ShipArgs::default(), &CancelToken::new())
        .expect("no infrastructure error");
    assert!(!parked.success);
    assert_eq!(env.session_for("feature/a").current_state, WorkflowState::PrCreated);

    // Abort must leave main checked out and never touch the forge.
    let result = env
        .orch
        .abort(
            &AbortArgs {
                delete_branch: true,
                ..AbortArgs::default()
            },
            &CancelToken::new(),
        )
        .expect("no infrastructure error");

    assert!(result.success, "abort failed: {:?}", result.errors);
    let session = env.session_for("feature/a");
    assert_eq!(session.current_state, WorkflowState::Aborted);
    assert!(session.history_consistent());

    let git = env.git.state();
    assert_eq!(git.current_branch, "main");
    assert!(!git.local_branches.contains("feature/a"));
    drop(git);

    // The open PR on the forge is not touched.
    assert_eq!(env.forge.open_pr_count("feature/a"), 1);
}

#[test]
fn abort_refuses_dirty_tree_then_stashes_with_yes() {
    let env = TestEnv::new();
    env.launch_ok("feature/a");
    env.git.make_dirty();

    let refused = env
        .orch
        .abort(&AbortArgs::default(), &CancelToken::new())
        .expect("no infrastructure error");
    assert!(!refused.success);
    assert!(refused.errors.iter().any(|e| e.contains("uncommitted changes")));
    // Still live: the refusal must not abort the session.
    assert_eq!(env.session_for("feature/a").current_state, WorkflowState::BranchReady);

    let stashed = env
        .orch
        .abort(
            &AbortArgs {
                yes: true,
                ..AbortArgs::default()
            },
            &CancelToken::new(),
        )
        .expect("no infrastructure error");
    assert!(stashed.success, "abort failed: {:?}", stashed.errors);

    let session = env.session_for("feature/a");
    assert_eq!(session.current_state, WorkflowState::Aborted);
    assert!(session.metadata.stash.is_some(), "stash recorded in metadata");
    assert_eq!(env.git.state().current_branch, "main");
}

#[test]
fn abort_by_branch_name_works_from_elsewhere() {
    let env = TestEnv::new();
    env.launch_ok("feature/a");
    env.git.set_current_branch("main");

    let result = env
        .orch
        .abort(
            &AbortArgs {
                branch_name: Some(TestEnv::branch("feature/a")),
                delete_branch: true,
                ..AbortArgs::default()
            },
            &CancelToken::new(),
        )
        .expect("no infrastructure error");

    assert!(result.success, "abort failed: {:?}", result.errors);
    assert_eq!(env.session_for("feature/a").current_state, WorkflowState::Aborted);
}

#[test]
fn abort_from_unrelated_branch_still_lands_on_main() {
    let env = TestEnv::new();
    env.launch_ok("feature/a");
    // Stand on some third branch, unrelated to the session being aborted.
    env.git.set_current_branch("feature/elsewhere");

    let result = env
        .orch
        .abort(
            &AbortArgs {
                branch_name: Some(TestEnv::branch("feature/a")),
                delete_branch: true,
                ..AbortArgs::default()
            },
            &CancelToken::new(),
        )
        .expect("no infrastructure error");

    assert!(result.success, "abort failed: {:?}", result.errors);
    assert_eq!(env.session_for("feature/a").current_state, WorkflowState::Aborted);
    // Aborting always leaves the caller on main, wherever they stood.
    assert_eq!(env.git.state().current_branch, "main");
    assert!(!env.git.state().local_branches.contains("feature/a"));
}

#[test]
fn swap_switches_between_sessions_and_stashes() {
    let env = TestEnv::new();
    env.launch_ok("feature/a");
    env.git.set_current_branch("main");
    env.launch_ok("feature/b");

    // Dirty tree without --stash: refused.
    env.git.make_dirty();
    let refused = env
        .orch
        .swap(
            &SwapArgs {
                branch_name: Some(TestEnv::branch("feature/a")),
                ..SwapArgs::default()
            },
            &CancelToken::new(),
        )
        .expect("no infrastructure error");
    assert!(!refused.success);
    assert!(refused.errors.iter().any(|e| e.contains("uncommitted changes")));

    // With --stash: parked on the session being left, then switched.
    let swapped = env
        .orch
        .swap(
            &SwapArgs {
                branch_name: Some(TestEnv::branch("feature/a")),
                stash: true,
                ..SwapArgs::default()
            },
            &CancelToken::new(),
        )
        .expect("no infrastructure error");
    assert!(swapped.success, "swap failed: {:?}", swapped.errors);
    assert_eq!(env.git.state().current_branch, "feature/a");
    assert!(
        env.session_for("feature/b").metadata.stash.is_some(),
        "stash recorded on the branch that was left"
    );
}

#[test]
fn swap_to_branch_without_session_is_refused() {
    let env = TestEnv::new();
    env.launch_ok("feature/a");

    let result = env
        .orch
        .swap(
            &SwapArgs {
                branch_name: Some(TestEnv::branch("feature/nope")),
                ..SwapArgs::default()
            },
            &CancelToken::new(),
        )
        .expect("no infrastructure error");

    assert!(!result.success);
    assert!(result
        .pre_flight_checks
        .iter()
        .any(|c| c.name == "Active session" && !c.passed));
}

#[test]
fn swap_onto_current_branch_is_refused() {
    let env = TestEnv::new();
    env.launch_ok("feature/a");

    let result = env
        .orch
        .swap(
            &SwapArgs {
                branch_name: Some(TestEnv::branch("feature/a")),
                ..SwapArgs::default()
            },
            &CancelToken::new(),
        )
        .expect("no infrastructure error");

    assert!(!result.success);
    assert!(result
        .pre_flight_checks
        .iter()
        .any(|c| c.name == "Not already on target" && !c.passed));
}

#[test]
fn hotfix_launches_then_drives_to_complete() {
    let env = TestEnv::new();

    let started = env
        .orch
        .hotfix(
            &HotfixArgs {
                description: Some("rollback bad migration".to_owned()),
                ..HotfixArgs::default()
            },
            &CancelToken::new(),
        )
        .expect("no infrastructure error");
    assert!(started.success, "hotfix launch failed: {:?}", started.errors);
    assert_eq!(started.state, Some(WorkflowState::HotfixReady));
    let branch = started.branch_name.clone().expect("branch name");
    assert!(branch.starts_with("hotfix/"));
    assert_eq!(env.git.state().current_branch, branch);

    // Apply the fix, then drive the pipeline.
    env.git.make_dirty();
    let finished = env
        .orch
        .hotfix(&HotfixArgs::default(), &CancelToken::new())
        .expect("no infrastructure error");
    assert!(finished.success, "hotfix drive failed: {:?}", finished.errors);
    assert_eq!(finished.state, Some(WorkflowState::HotfixComplete));

    let session = env.session_for(&branch);
    assert_eq!(session.current_state, WorkflowState::HotfixComplete);
    // The chain walked every hotfix station.
    let states: Vec<_> = session.state_history.iter().map(|t| t.to).collect();
    assert_eq!(
        states,
        vec![
            WorkflowState::HotfixReady,
            WorkflowState::HotfixCommitted,
            WorkflowState::HotfixPushed,
            WorkflowState::HotfixValidated,
            WorkflowState::HotfixDeployed,
            WorkflowState::HotfixCleanup,
            WorkflowState::HotfixComplete,
        ]
    );
    assert_eq!(env.git.state().current_branch, "main");
}

#[test]
fn hotfix_advance_without_changes_holds_position() {
    let env = TestEnv::new();
    env.orch
        .hotfix(
            &HotfixArgs {
                branch_name: Some(TestEnv::branch("hotfix/x")),
                ..HotfixArgs::default()
            },
            &CancelToken::new(),
        )
        .expect("no infrastructure error");

    let held = env
        .orch
        .hotfix(&HotfixArgs::default(), &CancelToken::new())
        .expect("no infrastructure error");
    assert!(!held.success);
    assert_eq!(env.session_for("hotfix/x").current_state, WorkflowState::HotfixReady);
}

#[test]
fn cleanup_lists_then_deletes_with_yes() {
    let env = TestEnv::new();

    // A finished workflow whose branch lingers locally.
    env.launch_ok("feature/done");
    let aborted = env
        .orch
        .abort(&AbortArgs::default(), &CancelToken::new())
        .expect("no infrastructure error");
    assert!(aborted.success);
    assert!(env.git.state().local_branches.contains("feature/done"));

    // Dry run reports, deletes nothing.
    let dry = env
        .orch
        .cleanup(
            &CleanupArgs {
                dry_run: true,
                days: Some(0),
                ..CleanupArgs::default()
            },
            &CancelToken::new(),
        )
        .expect("no infrastructure error");
    assert!(dry.success);
    assert!(dry
        .warnings
        .iter()
        .any(|w| w.contains("feature/done")));
    assert!(env.git.state().local_branches.contains("feature/done"));

    // --yes removes the branch and the old session.
    let swept = env
        .orch
        .cleanup(
            &CleanupArgs {
                yes: true,
                days: Some(0),
                ..CleanupArgs::default()
            },
            &CancelToken::new(),
        )
        .expect("no infrastructure error");
    assert!(swept.success, "cleanup failed: {:?}", swept.errors);
    assert!(!env.git.state().local_branches.contains("feature/done"));
    assert!(env
        .orch
        .store()
        .all_for_branch(&TestEnv::branch("feature/done"))
        .expect("store readable")
        .is_empty());
    assert_eq!(env.git.state().current_branch, "main");
}

#[test]
fn status_query_reports_session_and_hint() {
    let env = TestEnv::new();
    env.launch_ok("feature/a");

    let status = env.orch.status().expect("status");
    assert!(status.success);
    assert_eq!(status.data["branch"], "feature/a");
    assert_eq!(status.data["session"]["state"], "branch_ready");
    assert!(status
        .message
        .as_deref()
        .is_some_and(|m| m.contains("commit")));

    let sessions = env.orch.sessions(true).expect("sessions");
    assert!(sessions.success);
    assert_eq!(
        sessions.data["sessions"]
            .as_array()
            .expect("array")
            .len(),
        1
    );
}
