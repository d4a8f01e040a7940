//! Integration-test infrastructure: an orchestrator wired to in-memory
//! fake ports and a tempdir-backed session store.
#![allow(dead_code)]
//!
//! The fakes model just enough of a repository and a forge for the
//! workflow scenarios: branch sets, a dirty flag, per-branch ahead counts,
//! open/merged PRs, and a scripted sequence of CI roll-ups. Both fakes are
//! `Clone` handles over shared state so tests keep a handle after moving
//! boxes into the orchestrator.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tempfile::TempDir;

use shipline::audit::AuditLog;
use shipline::config::{CiConfig, ShiplineConfig};
use shipline::{Orchestrator, SessionStore};
use shipline_forge::{
    ChecksWait, CheckStatus, CreatedPr, ForgeError, ForgePort, MergeStrategy, NewPullRequest,
    PrState, PrStateFilter, PullRequestSummary, PullRequestUpdate, WaitOptions,
};
use shipline_git::{
    BranchName, BranchStatus, CommitId, CommitOptions, GitError, GitPort, StashRef,
    WorktreeStatus,
};

// ---------------------------------------------------------------------------
// FakeGit
// ---------------------------------------------------------------------------

/// Mutable state behind [`FakeGit`].
pub struct GitState {
    pub current_branch: String,
    pub local_branches: BTreeSet<String>,
    pub remote_branches: BTreeSet<String>,
    pub dirty: bool,
    pub staged: bool,
    /// Commits ahead of main, per branch.
    pub ahead: BTreeMap<String, u32>,
    /// How far main is behind its remote.
    pub main_behind: u32,
    pub stash_counter: usize,
    pub commit_counter: u64,
    /// Error message to inject into the next push.
    pub fail_push: Option<String>,
    /// Chronological record of mutating calls, for side-effect assertions.
    pub actions: Vec<String>,
}

impl Default for GitState {
    fn default() -> Self {
        let mut local_branches = BTreeSet::new();
        local_branches.insert("main".to_owned());
        Self {
            current_branch: "main".to_owned(),
            local_branches,
            remote_branches: BTreeSet::new(),
            dirty: false,
            staged: false,
            ahead: BTreeMap::new(),
            main_behind: 0,
            stash_counter: 0,
            commit_counter: 0,
            fail_push: None,
            actions: Vec::new(),
        }
    }
}

/// A `Clone`-able in-memory [`GitPort`].
#[derive(Clone, Default)]
pub struct FakeGit(Arc<Mutex<GitState>>);

impl FakeGit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, GitState> {
        self.0.lock().expect("git state poisoned")
    }

    /// Make the working tree dirty.
    pub fn make_dirty(&self) {
        self.state().dirty = true;
    }

    /// Force the checked-out branch (test setup shortcut).
    pub fn set_current_branch(&self, name: &str) {
        let mut state = self.state();
        state.local_branches.insert(name.to_owned());
        state.current_branch = name.to_owned();
    }

    fn fail(command: &str, message: &str) -> GitError {
        GitError::Command {
            command: command.to_owned(),
            stderr: message.to_owned(),
            exit_code: Some(1),
        }
    }
}

impl GitPort for FakeGit {
    fn current_branch(&self) -> Result<BranchName, GitError> {
        let state = self.state();
        BranchName::new(&state.current_branch).map_err(|e| GitError::NotFound {
            message: e.to_string(),
        })
    }

    fn status(&self) -> Result<WorktreeStatus, GitError> {
        let state = self.state();
        Ok(if state.dirty {
            WorktreeStatus {
                clean: false,
                modified: vec!["src/lib.rs".to_owned()],
                ..WorktreeStatus::default()
            }
        } else {
            WorktreeStatus {
                clean: true,
                ..WorktreeStatus::default()
            }
        })
    }

    fn branch_status(&self) -> Result<BranchStatus, GitError> {
        let state = self.state();
        let on_main = state.current_branch == "main";
        Ok(BranchStatus {
            ahead: state
                .ahead
                .get(&state.current_branch)
                .copied()
                .unwrap_or(0),
            behind: if on_main { state.main_behind } else { 0 },
            has_remote: on_main || state.remote_branches.contains(&state.current_branch),
            is_clean: !state.dirty,
        })
    }

    fn has_uncommitted_changes(&self) -> Result<bool, GitError> {
        Ok(self.state().dirty)
    }

    fn commits_ahead_of(&self, _base_ref: &str) -> Result<u32, GitError> {
        let state = self.state();
        Ok(state
            .ahead
            .get(&state.current_branch)
            .copied()
            .unwrap_or(0))
    }

    fn branch_exists_local(&self, name: &BranchName) -> Result<bool, GitError> {
        Ok(self.state().local_branches.contains(name.as_str()))
    }

    fn branch_exists_remote(&self, name: &BranchName) -> Result<bool, GitError> {
        Ok(self.state().remote_branches.contains(name.as_str()))
    }

    fn list_branches(&self) -> Result<Vec<BranchName>, GitError> {
        Ok(self
            .state()
            .local_branches
            .iter()
            .filter_map(|b| BranchName::new(b).ok())
            .collect())
    }

    fn stage_all(&self) -> Result<(), GitError> {
        let mut state = self.state();
        state.staged = state.dirty;
        state.actions.push("stage_all".to_owned());
        Ok(())
    }

    fn commit(&self, message: &str, _opts: CommitOptions) -> Result<CommitId, GitError> {
        let mut state = self.state();
        if !state.dirty && !state.staged {
            return Err(Self::fail("git commit", "nothing to commit"));
        }
        state.dirty = false;
        state.staged = false;
        state.commit_counter += 1;
        let branch = state.current_branch.clone();
        *state.ahead.entry(branch).or_insert(0) += 1;
        state.actions.push(format!("commit: {message}"));
        let hex = format!("{:040x}", state.commit_counter);
        CommitId::new(&hex).map_err(|e| Self::fail("git rev-parse HEAD", &e.to_string()))
    }

    fn create_branch(&self, name: &BranchName, base_ref: &str) -> Result<(), GitError> {
        let mut state = self.state();
        if !state.local_branches.insert(name.as_str().to_owned()) {
            return Err(Self::fail(
                "git branch",
                &format!("branch '{name}' already exists"),
            ));
        }
        state.actions.push(format!("create_branch {name} {base_ref}"));
        Ok(())
    }

    fn checkout_branch(&self, name: &BranchName) -> Result<(), GitError> {
        let mut state = self.state();
        if !state.local_branches.contains(name.as_str()) {
            return Err(GitError::NotFound {
                message: format!("branch '{name}' not found"),
            });
        }
        state.current_branch = name.as_str().to_owned();
        state.actions.push(format!("checkout {name}"));
        Ok(())
    }

    fn delete_branch(&self, name: &BranchName, _force: bool) -> Result<(), GitError> {
        let mut state = self.state();
        if !state.local_branches.remove(name.as_str()) {
            return Err(GitError::NotFound {
                message: format!("branch '{name}' not found"),
            });
        }
        state.actions.push(format!("delete_branch {name}"));
        Ok(())
    }

    fn delete_remote_branch(&self, name: &BranchName) -> Result<(), GitError> {
        let mut state = self.state();
        state.remote_branches.remove(name.as_str());
        state.actions.push(format!("delete_remote_branch {name}"));
        Ok(())
    }

    fn fetch(&self, _remote: &str, _refspec: &str) -> Result<(), GitError> {
        Ok(())
    }

    fn pull(&self, _remote: &str, refspec: &str) -> Result<(), GitError> {
        let mut state = self.state();
        if refspec == "main" {
            state.main_behind = 0;
        }
        state.actions.push(format!("pull {refspec}"));
        Ok(())
    }

    fn push(&self, branch: &BranchName, _force: bool) -> Result<(), GitError> {
        let mut state = self.state();
        if let Some(message) = state.fail_push.take() {
            return Err(GitError::PushRejected {
                remote: "origin".to_owned(),
                message,
            });
        }
        state.remote_branches.insert(branch.as_str().to_owned());
        state.actions.push(format!("push {branch}"));
        Ok(())
    }

    fn merge(&self, branch: &BranchName, _squash: bool) -> Result<(), GitError> {
        self.state().actions.push(format!("merge {branch}"));
        Ok(())
    }

    fn stash(&self, message: &str) -> Result<StashRef, GitError> {
        let mut state = self.state();
        if !state.dirty {
            return Err(Self::fail("git stash", "no local changes to save"));
        }
        state.dirty = false;
        state.stash_counter += 1;
        state.actions.push(format!("stash: {message}"));
        Ok(StashRef("stash@{0}".to_owned()))
    }

    fn stash_apply(&self, _stash: &StashRef) -> Result<(), GitError> {
        let mut state = self.state();
        state.dirty = true;
        state.actions.push("stash_apply".to_owned());
        Ok(())
    }

    fn stash_pop(&self, _stash: &StashRef) -> Result<(), GitError> {
        let mut state = self.state();
        state.dirty = true;
        state.actions.push("stash_pop".to_owned());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeForge
// ---------------------------------------------------------------------------

/// One pull request tracked by [`FakeForge`].
pub struct FakePr {
    pub number: u64,
    pub head: String,
    pub state: PrState,
    pub merged_at: Option<String>,
}

/// Mutable state behind [`FakeForge`].
#[derive(Default)]
pub struct ForgeState {
    pub prs: Vec<FakePr>,
    pub next_number: u64,
    /// CI roll-ups returned by successive polls; the last entry repeats.
    pub check_sequence: VecDeque<CheckStatus>,
    /// Inject a merge refusal: `Some(true)` = conflict, `Some(false)` =
    /// plain failure.
    pub merge_refusal: Option<bool>,
    pub actions: Vec<String>,
}

/// A `Clone`-able in-memory [`ForgePort`].
#[derive(Clone, Default)]
pub struct FakeForge(Arc<Mutex<ForgeState>>);

impl FakeForge {
    pub fn new() -> Self {
        let forge = Self::default();
        forge.state().next_number = 1;
        // Default: a single all-green roll-up.
        forge.state().check_sequence.push_back(CheckStatus {
            passed: 1,
            ..CheckStatus::default()
        });
        forge
    }

    pub fn state(&self) -> MutexGuard<'_, ForgeState> {
        self.0.lock().expect("forge state poisoned")
    }

    /// Replace the scripted CI roll-ups.
    pub fn script_checks(&self, statuses: Vec<CheckStatus>) {
        let mut state = self.state();
        state.check_sequence = statuses.into();
    }

    /// Seed an open PR with the given head.
    pub fn seed_open_pr(&self, head: &str) -> u64 {
        let mut state = self.state();
        let number = state.next_number.max(1);
        state.next_number = number + 1;
        state.prs.push(FakePr {
            number,
            head: head.to_owned(),
            state: PrState::Open,
            merged_at: None,
        });
        number
    }

    /// Seed a merged PR with the given head.
    pub fn seed_merged_pr(&self, head: &str) -> u64 {
        let mut state = self.state();
        let number = state.next_number.max(1);
        state.next_number = number + 1;
        state.prs.push(FakePr {
            number,
            head: head.to_owned(),
            state: PrState::Merged,
            merged_at: Some("2026-01-01T00:00:00Z".to_owned()),
        });
        number
    }

    pub fn open_pr_count(&self, head: &str) -> usize {
        self.state()
            .prs
            .iter()
            .filter(|pr| pr.head == head && pr.state == PrState::Open)
            .count()
    }
}

impl ForgePort for FakeForge {
    fn create_pull_request(&self, request: &NewPullRequest) -> Result<CreatedPr, ForgeError> {
        let mut state = self.state();
        let number = state.next_number.max(1);
        state.next_number = number + 1;
        state.prs.push(FakePr {
            number,
            head: request.head.clone(),
            state: PrState::Open,
            merged_at: None,
        });
        state.actions.push(format!("create_pr #{number}"));
        Ok(CreatedPr {
            number,
            url: format!("https://github.com/acme/widgets/pull/{number}"),
        })
    }

    fn update_pull_request(
        &self,
        number: u64,
        _update: &PullRequestUpdate,
    ) -> Result<(), ForgeError> {
        self.state().actions.push(format!("update_pr #{number}"));
        Ok(())
    }

    fn list_pull_requests(
        &self,
        head: &str,
        filter: PrStateFilter,
    ) -> Result<Vec<PullRequestSummary>, ForgeError> {
        let state = self.state();
        Ok(state
            .prs
            .iter()
            .filter(|pr| pr.head == head)
            .filter(|pr| match filter {
                PrStateFilter::Open => pr.state == PrState::Open,
                PrStateFilter::Merged => pr.state == PrState::Merged,
                PrStateFilter::All => true,
            })
            .map(|pr| PullRequestSummary {
                number: pr.number,
                state: pr.state,
                merged_at: pr.merged_at.clone(),
                url: format!("https://github.com/acme/widgets/pull/{}", pr.number),
            })
            .collect())
    }

    fn get_check_status(&self, _head: &str) -> Result<CheckStatus, ForgeError> {
        let mut state = self.state();
        if state.check_sequence.len() > 1 {
            Ok(state.check_sequence.pop_front().expect("non-empty"))
        } else {
            Ok(state
                .check_sequence
                .front()
                .cloned()
                .unwrap_or_default())
        }
    }

    fn merge_pull_request(&self, number: u64, _strategy: MergeStrategy) -> Result<bool, ForgeError> {
        let mut state = self.state();
        match state.merge_refusal.take() {
            Some(true) => {
                return Err(ForgeError::MergeConflict {
                    message: "Pull Request is not mergeable".to_owned(),
                })
            }
            Some(false) => {
                return Err(ForgeError::Command {
                    command: format!("gh pr merge {number} --squash"),
                    stderr: "GraphQL: Base branch was modified".to_owned(),
                    exit_code: Some(1),
                })
            }
            None => {}
        }
        let Some(pr) = state.prs.iter_mut().find(|pr| pr.number == number) else {
            return Err(ForgeError::NoPullRequest {
                message: format!("no PR #{number}"),
            });
        };
        pr.state = PrState::Merged;
        pr.merged_at = Some("2026-02-01T00:00:00Z".to_owned());
        state.actions.push(format!("merge_pr #{number}"));
        Ok(true)
    }

    // The default poll loop would really sleep; the fake resolves from the
    // scripted sequence immediately.
    fn wait_for_checks(
        &self,
        head: &str,
        mut opts: WaitOptions<'_>,
    ) -> Result<ChecksWait, ForgeError> {
        if opts.timeout.is_zero() {
            return Ok(ChecksWait {
                timed_out: true,
                ..ChecksWait::default()
            });
        }
        loop {
            if opts.should_cancel.is_some_and(|probe| probe()) {
                return Ok(ChecksWait {
                    cancelled: true,
                    ..ChecksWait::default()
                });
            }
            // A poll on the sequence's last entry repeats it forever; a
            // pending roll-up there means the scenario wants a timeout.
            let exhausted = self.state().check_sequence.len() <= 1;
            let status = self.get_check_status(head)?;
            if let Some(progress) = opts.on_progress.as_mut() {
                progress(&status);
            }
            if status.failed > 0 {
                return Ok(ChecksWait {
                    failed_checks: status.failed_names,
                    ..ChecksWait::default()
                });
            }
            if status.pending == 0 {
                return Ok(ChecksWait {
                    success: true,
                    ..ChecksWait::default()
                });
            }
            if exhausted {
                return Ok(ChecksWait {
                    timed_out: true,
                    ..ChecksWait::default()
                });
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TestEnv
// ---------------------------------------------------------------------------

/// A fully wired orchestrator over fakes and a tempdir state directory.
pub struct TestEnv {
    _dir: TempDir,
    pub git: FakeGit,
    pub forge: FakeForge,
    pub orch: Orchestrator,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let state_dir = dir.path().join(".shipline");
        let store = SessionStore::open(&state_dir).expect("open store");
        let audit = AuditLog::open(&state_dir).expect("open audit");
        let git = FakeGit::new();
        let forge = FakeForge::new();
        let config = ShiplineConfig {
            ci: CiConfig {
                wait_timeout_secs: 5,
                poll_interval_secs: 0,
            },
            ..ShiplineConfig::default()
        };
        let orch = Orchestrator::new(
            Box::new(git.clone()),
            Box::new(forge.clone()),
            store,
            audit,
            config,
        );
        Self {
            _dir: dir,
            git,
            forge,
            orch,
        }
    }

    pub fn branch(name: &str) -> BranchName {
        BranchName::new(name).expect("valid branch name")
    }

    /// Launch a session on `name` and assert success.
    pub fn launch_ok(&self, name: &str) -> shipline::SessionToolResult {
        let result = self
            .orch
            .launch(
                &shipline::orchestrator::LaunchArgs {
                    branch_name: Some(Self::branch(name)),
                    ..shipline::orchestrator::LaunchArgs::default()
                },
                &shipline::CancelToken::new(),
            )
            .expect("launch must not error");
        assert!(
            result.success,
            "launch of {name} failed: {:?}",
            result.errors
        );
        result
    }

    /// Dirty the tree and commit on the current branch, asserting success.
    pub fn commit_ok(&self) -> shipline::SessionToolResult {
        self.git.make_dirty();
        let result = self
            .orch
            .commit(
                &shipline::orchestrator::CommitArgs::default(),
                &shipline::CancelToken::new(),
            )
            .expect("commit must not error");
        assert!(result.success, "commit failed: {:?}", result.errors);
        result
    }

    /// The session currently owning `name`, terminal or not.
    pub fn session_for(&self, name: &str) -> shipline::WorkflowSession {
        self.orch
            .store()
            .all_for_branch(&Self::branch(name))
            .expect("store readable")
            .into_iter()
            .next()
            .expect("session exists")
    }
}
