//! End-to-end tests for the gix backend against real repositories.
//!
//! Test repositories are set up with the git CLI (the ground truth) and
//! exercised exclusively through the [`GitPort`] surface of [`GixGit`].

use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

use shipline_git::{BranchName, CommitOptions, GitPort, GixGit};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .status()
        .expect("spawn git");
    assert!(status.success(), "git {args:?} failed");
}

fn branch(name: &str) -> BranchName {
    BranchName::new(name).expect("valid branch name")
}

/// A repository with one commit on `main` and a configured identity.
fn setup_repo() -> (TempDir, GixGit) {
    let dir = TempDir::new().expect("temp dir");
    let root = dir.path();
    git(root, &["init", "-b", "main"]);
    git(root, &["config", "user.name", "Test"]);
    git(root, &["config", "user.email", "test@localhost"]);
    git(root, &["config", "commit.gpgsign", "false"]);
    fs::write(root.join("README.md"), "hello\n").expect("write");
    git(root, &["add", "-A"]);
    git(root, &["commit", "-m", "init"]);
    let repo = GixGit::open(root).expect("open");
    (dir, repo)
}

// ---------------------------------------------------------------------------
// Branches
// ---------------------------------------------------------------------------

#[test]
fn current_branch_is_main_after_setup() {
    let (_dir, repo) = setup_repo();
    assert_eq!(repo.current_branch().expect("branch").as_str(), "main");
}

#[test]
fn branch_create_checkout_list_delete() {
    let (_dir, repo) = setup_repo();
    let feature = branch("feature/a");

    assert!(!repo.branch_exists_local(&feature).expect("probe"));
    repo.create_branch(&feature, "main").expect("create");
    assert!(repo.branch_exists_local(&feature).expect("probe"));

    repo.checkout_branch(&feature).expect("checkout");
    assert_eq!(repo.current_branch().expect("branch"), feature);

    let branches = repo.list_branches().expect("list");
    assert!(branches.contains(&feature));
    assert!(branches.contains(&branch("main")));

    repo.checkout_branch(&branch("main")).expect("back to main");
    repo.delete_branch(&feature, true).expect("delete");
    assert!(!repo.branch_exists_local(&feature).expect("probe"));
}

#[test]
fn create_branch_refuses_duplicates() {
    let (_dir, repo) = setup_repo();
    let feature = branch("feature/a");
    repo.create_branch(&feature, "main").expect("create");
    assert!(repo.create_branch(&feature, "main").is_err());
}

// ---------------------------------------------------------------------------
// Status, staging, commits
// ---------------------------------------------------------------------------

#[test]
fn status_buckets_untracked_and_modified() {
    let (dir, repo) = setup_repo();

    assert!(!repo.has_uncommitted_changes().expect("clean"));
    assert!(repo.status().expect("status").clean);

    fs::write(dir.path().join("new.txt"), "new\n").expect("write");
    fs::write(dir.path().join("README.md"), "changed\n").expect("write");

    assert!(repo.has_uncommitted_changes().expect("dirty"));
    let status = repo.status().expect("status");
    assert!(!status.clean);
    assert!(status.untracked.contains(&"new.txt".to_owned()));
    assert!(status.modified.contains(&"README.md".to_owned()));
}

#[test]
fn stage_and_commit_round_trip() {
    let (dir, repo) = setup_repo();
    let feature = branch("feature/a");
    repo.create_branch(&feature, "main").expect("create");
    repo.checkout_branch(&feature).expect("checkout");

    fs::write(dir.path().join("a.txt"), "a\n").expect("write");
    repo.stage_all().expect("stage");
    let id = repo
        .commit("feat: add a", CommitOptions::default())
        .expect("commit");
    assert_eq!(id.as_str().len(), 40);

    assert!(!repo.has_uncommitted_changes().expect("clean after commit"));
    assert!(repo.status().expect("status").clean);
    assert_eq!(repo.commits_ahead_of("main").expect("ahead"), 1);

    // The CLI agrees the commit exists and the tree is clean.
    let out = Command::new("git")
        .args(["status", "--porcelain"])
        .current_dir(dir.path())
        .output()
        .expect("git status");
    assert!(out.stdout.is_empty(), "CLI sees a clean tree");
}

#[test]
fn stage_all_honors_gitignore() {
    let (dir, repo) = setup_repo();
    fs::write(dir.path().join(".gitignore"), "ignored.txt\n").expect("write");
    git(dir.path(), &["add", "-A"]);
    git(dir.path(), &["commit", "-m", "add gitignore"]);

    fs::write(dir.path().join("ignored.txt"), "scratch\n").expect("write");
    fs::write(dir.path().join("kept.txt"), "kept\n").expect("write");
    repo.stage_all().expect("stage");
    repo.commit("feat: keep", CommitOptions::default()).expect("commit");

    let out = Command::new("git")
        .args(["ls-files"])
        .current_dir(dir.path())
        .output()
        .expect("git ls-files");
    let listed = String::from_utf8_lossy(&out.stdout);
    assert!(listed.contains("kept.txt"));
    assert!(!listed.contains("ignored.txt"), "ignored file must not be staged");
}

#[test]
fn commit_records_deletions() {
    let (dir, repo) = setup_repo();
    fs::remove_file(dir.path().join("README.md")).expect("remove");

    assert!(repo.has_uncommitted_changes().expect("dirty"));
    let status = repo.status().expect("status");
    assert!(status.deleted.contains(&"README.md".to_owned()));

    repo.stage_all().expect("stage");
    repo.commit("chore: drop readme", CommitOptions::default())
        .expect("commit");

    let out = Command::new("git")
        .args(["ls-files"])
        .current_dir(dir.path())
        .output()
        .expect("git ls-files");
    assert!(!String::from_utf8_lossy(&out.stdout).contains("README.md"));
    assert!(repo.status().expect("status").clean);
}

#[test]
fn checkout_switches_working_tree_content() {
    let (dir, repo) = setup_repo();
    let feature = branch("feature/a");
    repo.create_branch(&feature, "main").expect("create");
    repo.checkout_branch(&feature).expect("checkout");

    fs::write(dir.path().join("feature-only.txt"), "x\n").expect("write");
    repo.stage_all().expect("stage");
    repo.commit("feat: feature file", CommitOptions::default())
        .expect("commit");

    repo.checkout_branch(&branch("main")).expect("back to main");
    assert!(
        !dir.path().join("feature-only.txt").exists(),
        "files exclusive to the feature branch leave with it"
    );
    assert!(dir.path().join("README.md").exists());

    repo.checkout_branch(&feature).expect("forward again");
    assert!(dir.path().join("feature-only.txt").exists());
}

// ---------------------------------------------------------------------------
// Stash
// ---------------------------------------------------------------------------

#[test]
fn stash_parks_and_restores_changes() {
    let (dir, repo) = setup_repo();

    fs::write(dir.path().join("wip.txt"), "wip\n").expect("write");
    fs::write(dir.path().join("README.md"), "edited\n").expect("write");

    let stash = repo.stash("park work in progress").expect("stash");
    assert!(!repo.has_uncommitted_changes().expect("clean after stash"));
    assert!(!dir.path().join("wip.txt").exists());
    assert_eq!(
        fs::read_to_string(dir.path().join("README.md")).expect("read"),
        "hello\n",
        "tracked edits roll back to HEAD"
    );

    repo.stash_apply(&stash).expect("apply");
    assert!(repo.has_uncommitted_changes().expect("dirty after apply"));
    assert_eq!(
        fs::read_to_string(dir.path().join("wip.txt")).expect("read"),
        "wip\n"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("README.md")).expect("read"),
        "edited\n"
    );
}

#[test]
fn stash_pop_is_apply_for_snapshot_refs() {
    let (dir, repo) = setup_repo();
    fs::write(dir.path().join("wip.txt"), "wip\n").expect("write");
    let stash = repo.stash("park").expect("stash");
    repo.stash_pop(&stash).expect("pop");
    assert!(dir.path().join("wip.txt").exists());
}

// ---------------------------------------------------------------------------
// Ahead/behind
// ---------------------------------------------------------------------------

#[test]
fn commits_ahead_counts_against_arbitrary_base() {
    let (dir, repo) = setup_repo();
    let feature = branch("feature/a");
    repo.create_branch(&feature, "main").expect("create");
    repo.checkout_branch(&feature).expect("checkout");

    assert_eq!(repo.commits_ahead_of("main").expect("ahead"), 0);
    for n in 0..3 {
        fs::write(dir.path().join(format!("f{n}.txt")), "x\n").expect("write");
        repo.stage_all().expect("stage");
        repo.commit(&format!("feat: f{n}"), CommitOptions::default())
            .expect("commit");
    }
    assert_eq!(repo.commits_ahead_of("main").expect("ahead"), 3);
}

#[test]
fn branch_status_without_upstream_reports_no_remote() {
    let (_dir, repo) = setup_repo();
    let status = repo.branch_status().expect("status");
    assert!(!status.has_remote);
    assert_eq!(status.ahead, 0);
    assert_eq!(status.behind, 0);
    assert!(status.is_clean);
}
