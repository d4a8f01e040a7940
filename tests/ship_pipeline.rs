//! Ship pipeline scenarios: the seven-step path to merged, and every
//! resting state its failure policy defines.

mod common;

use common::TestEnv;
use shipline::orchestrator::ShipArgs;
use shipline::{CancelToken, WorkflowError, WorkflowState};
use shipline_forge::CheckStatus;

fn pending() -> CheckStatus {
    CheckStatus {
        pending: 1,
        ..CheckStatus::default()
    }
}

fn all_green() -> CheckStatus {
    CheckStatus {
        passed: 3,
        ..CheckStatus::default()
    }
}

fn lint_failed() -> CheckStatus {
    CheckStatus {
        passed: 2,
        failed: 1,
        failed_names: vec!["lint".to_owned()],
        ..CheckStatus::default()
    }
}

#[test]
fn ship_with_passing_ci_reaches_complete() {
    let env = TestEnv::new();
    env.launch_ok("feature/b");
    env.commit_ok();
    env.forge.script_checks(vec![pending(), all_green()]);

    let result = env
        .orch
        .ship(&ShipArgs::default(), &CancelToken::new())
        .expect("no infrastructure error");

    // The full contract of a successful ship, point by point.
    assert!(result.success, "ship failed: {:?}", result.errors);
    assert_eq!(result.state, Some(WorkflowState::Complete));
    assert_eq!(result.pr_number, Some(1));
    assert_eq!(result.merged, Some(true));

    let session = env.session_for("feature/b");
    assert_eq!(session.current_state, WorkflowState::Complete);
    assert!(session.has_merged_pr());
    assert!(session.history_consistent());
    let pr = session.metadata.pr.as_ref().expect("pr recorded");
    assert!(pr.merged);
    assert!(pr.merged_at.is_some());

    // Caller lands on main; the branch is gone locally and remotely.
    let git = env.git.state();
    assert_eq!(git.current_branch, "main");
    assert!(!git.local_branches.contains("feature/b"));
    assert!(!git.remote_branches.contains("feature/b"));
    drop(git);

    // The walked chain is exactly the pipeline's.
    let states: Vec<_> = session.state_history.iter().map(|t| t.to).collect();
    assert_eq!(
        states,
        vec![
            WorkflowState::BranchReady,
            WorkflowState::ChangesCommitted,
            WorkflowState::Pushed,
            WorkflowState::PrCreated,
            WorkflowState::WaitingApproval,
            WorkflowState::Merged,
            WorkflowState::Complete,
        ]
    );
}

#[test]
fn ship_commits_a_dirty_tree_itself() {
    let env = TestEnv::new();
    env.launch_ok("feature/b");
    env.git.make_dirty();

    let result = env
        .orch
        .ship(&ShipArgs::default(), &CancelToken::new())
        .expect("no infrastructure error");

    assert!(result.success, "ship failed: {:?}", result.errors);
    assert_eq!(env.session_for("feature/b").current_state, WorkflowState::Complete);
}

#[test]
fn ship_with_failing_ci_rests_at_pr_created_and_retries() {
    let env = TestEnv::new();
    env.launch_ok("feature/b");
    env.commit_ok();
    env.forge.script_checks(vec![lint_failed()]);

    // The failure names the check and parks the session.
    let result = env
        .orch
        .ship(&ShipArgs::default(), &CancelToken::new())
        .expect("no infrastructure error");

    assert!(!result.success);
    assert!(
        result.errors.iter().any(|e| e.contains("CI checks failed") && e.contains("lint")),
        "errors name the failing check: {:?}",
        result.errors
    );
    assert_eq!(result.state, Some(WorkflowState::PrCreated));
    assert_eq!(env.session_for("feature/b").current_state, WorkflowState::PrCreated);

    // The PR survives for the retry.
    assert_eq!(env.forge.open_pr_count("feature/b"), 1);

    // Re-running ship after CI is fixed completes the pipeline.
    env.forge.script_checks(vec![all_green()]);
    let retry = env
        .orch
        .ship(&ShipArgs::default(), &CancelToken::new())
        .expect("no infrastructure error");
    assert!(retry.success, "retry failed: {:?}", retry.errors);
    assert_eq!(env.session_for("feature/b").current_state, WorkflowState::Complete);
}

#[test]
fn ship_with_ci_timeout_rests_at_pr_created() {
    let env = TestEnv::new();
    env.launch_ok("feature/b");
    env.commit_ok();
    env.forge.script_checks(vec![pending()]);

    let result = env
        .orch
        .ship(&ShipArgs::default(), &CancelToken::new())
        .expect("no infrastructure error");

    assert!(!result.success);
    assert!(result.errors.iter().any(|e| e.contains("did not finish")));
    assert_eq!(env.session_for("feature/b").current_state, WorkflowState::PrCreated);
}

#[test]
fn multiple_open_prs_block_without_side_effects() {
    let env = TestEnv::new();
    env.forge.seed_open_pr("feature/c");
    env.forge.seed_open_pr("feature/c");
    env.launch_ok("feature/c");
    env.commit_ok();

    // Two open PRs on one head is an operator problem, not ours to pick.
    let result = env
        .orch
        .ship(&ShipArgs::default(), &CancelToken::new())
        .expect("no infrastructure error");

    assert!(!result.success);
    assert!(result.failed_pre_flight());
    let pr_check = result
        .pre_flight_checks
        .iter()
        .find(|c| c.name == "Pull request state")
        .expect("pr check present");
    assert!(!pr_check.passed);
    assert!(pr_check
        .details
        .suggestion
        .as_deref()
        .is_some_and(|s| s.contains("close the extra")));

    // No side effects: nothing pushed, state unchanged, both PRs open.
    assert!(!env.git.state().remote_branches.contains("feature/c"));
    assert_eq!(
        env.session_for("feature/c").current_state,
        WorkflowState::ChangesCommitted
    );
    assert_eq!(env.forge.open_pr_count("feature/c"), 2);
}

#[test]
fn single_open_pr_is_adopted_not_duplicated() {
    let env = TestEnv::new();
    let seeded = env.forge.seed_open_pr("feature/d");
    env.launch_ok("feature/d");
    env.commit_ok();
    env.forge.script_checks(vec![all_green()]);

    let result = env
        .orch
        .ship(&ShipArgs::default(), &CancelToken::new())
        .expect("no infrastructure error");

    assert!(result.success, "ship failed: {:?}", result.errors);
    assert_eq!(result.pr_number, Some(seeded));
    // No second PR was created.
    let session = env.session_for("feature/d");
    assert_eq!(session.metadata.pr.as_ref().map(|pr| pr.number), Some(seeded));
}

#[test]
fn push_failure_rests_at_changes_committed() {
    let env = TestEnv::new();
    env.launch_ok("feature/b");
    env.commit_ok();
    env.git.state().fail_push = Some("remote hung up unexpectedly".to_owned());

    let result = env
        .orch
        .ship(&ShipArgs::default(), &CancelToken::new())
        .expect("no infrastructure error");

    assert!(!result.success);
    assert!(result.errors.iter().any(|e| e.contains("step 'push'")));
    assert_eq!(
        env.session_for("feature/b").current_state,
        WorkflowState::ChangesCommitted
    );

    // The rejection cleared; the next ship resumes from the resting state.
    let retry = env
        .orch
        .ship(&ShipArgs::default(), &CancelToken::new())
        .expect("no infrastructure error");
    assert!(retry.success, "retry failed: {:?}", retry.errors);
}

#[test]
fn merge_conflict_moves_to_conflict_resolution() {
    let env = TestEnv::new();
    env.launch_ok("feature/b");
    env.commit_ok();
    env.forge.state().merge_refusal = Some(true);

    let result = env
        .orch
        .ship(&ShipArgs::default(), &CancelToken::new())
        .expect("no infrastructure error");

    assert!(!result.success);
    assert!(result.errors.iter().any(|e| e.contains("conflict")));
    assert_eq!(
        env.session_for("feature/b").current_state,
        WorkflowState::ConflictResolution
    );
}

#[test]
fn plain_merge_failure_rests_at_pr_created() {
    let env = TestEnv::new();
    env.launch_ok("feature/b");
    env.commit_ok();
    env.forge.state().merge_refusal = Some(false);

    let result = env
        .orch
        .ship(&ShipArgs::default(), &CancelToken::new())
        .expect("no infrastructure error");

    assert!(!result.success);
    assert!(result.errors.iter().any(|e| e.contains("step 'merge'")));
    assert_eq!(
        env.session_for("feature/b").current_state,
        WorkflowState::PrCreated
    );

    // The merge refusal was transient; re-ship resumes from pr_created.
    let retry = env
        .orch
        .ship(&ShipArgs::default(), &CancelToken::new())
        .expect("no infrastructure error");
    assert!(retry.success, "retry failed: {:?}", retry.errors);
    assert_eq!(env.session_for("feature/b").current_state, WorkflowState::Complete);
}

#[test]
fn concurrent_ship_on_locked_session_fails_with_lock_held() {
    let env = TestEnv::new();
    env.launch_ok("feature/b");
    env.commit_ok();

    let session = env.session_for("feature/b");
    let _held = env
        .orch
        .store()
        .acquire_lock(session.id)
        .expect("test holds the lock");

    // The competing operation loses, loudly.
    let err = env
        .orch
        .ship(&ShipArgs::default(), &CancelToken::new())
        .expect_err("must fail while locked");
    assert!(matches!(err, WorkflowError::LockHeld { .. }));
}

#[test]
fn cancelled_token_aborts_before_any_step() {
    let env = TestEnv::new();
    env.launch_ok("feature/b");
    env.commit_ok();

    let cancel = CancelToken::new();
    cancel.cancel();
    let err = env
        .orch
        .ship(&ShipArgs::default(), &cancel)
        .expect_err("cancelled");
    assert!(matches!(err, WorkflowError::Cancelled));

    // Durable state is untouched and the lock is free again.
    assert_eq!(
        env.session_for("feature/b").current_state,
        WorkflowState::ChangesCommitted
    );
    let session = env.session_for("feature/b");
    drop(
        env.orch
            .store()
            .acquire_lock(session.id)
            .expect("lock released on cancellation"),
    );
}

#[test]
fn ship_without_session_is_refused() {
    let env = TestEnv::new();
    env.git.set_current_branch("feature/stray");

    let result = env
        .orch
        .ship(&ShipArgs::default(), &CancelToken::new())
        .expect("no infrastructure error");

    assert!(!result.success);
    assert!(result
        .pre_flight_checks
        .iter()
        .any(|c| c.name == "Active session" && !c.passed));
}

#[test]
fn ship_from_main_is_refused() {
    let env = TestEnv::new();
    env.launch_ok("feature/b");
    env.commit_ok();
    env.git.set_current_branch("main");

    let result = env
        .orch
        .ship(&ShipArgs::default(), &CancelToken::new())
        .expect("no infrastructure error");

    // On main there is no session for the branch, so the session gate
    // fires first — either way the pipeline must not run.
    assert!(!result.success);
    assert!(env.git.state().actions.iter().all(|a| !a.starts_with("push")));
}
