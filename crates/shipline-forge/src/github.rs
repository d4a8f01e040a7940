//! GitHub backend via the `gh` CLI.
//!
//! Shells out to `gh` for every forge operation. `gh` handles
//! authentication, host selection, and fork detection; we only parse its
//! `--json` output. Commands run from the repository directory so gh can
//! resolve the owner/repo pair itself.
//!
//! `statusCheckRollup` entries are a union of two GitHub API types with
//! different field structures: `CheckRun` (GitHub Actions) carries
//! `status`/`conclusion`, `StatusContext` (external CI) carries `state`
//! only. Both are parsed and whichever field is present wins.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ForgeError;
use crate::port::ForgePort;
use crate::types::{
    CheckStatus, CreatedPr, MergeStrategy, NewPullRequest, PrState, PrStateFilter,
    PullRequestSummary, PullRequestUpdate,
};

/// Upper bound on PRs fetched per listing; branch-name collisions across
/// forks rarely exceed single digits.
const MAX_PRS_TO_FETCH: u32 = 20;

/// Default per-call timeout.
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// A [`ForgePort`] implementation backed by the GitHub `gh` CLI.
pub struct GhForge {
    /// Directory gh commands run in (enables repo auto-detection).
    repo_dir: PathBuf,
    /// Per-call timeout; a hung gh process is killed when it elapses.
    call_timeout: Duration,
}

impl GhForge {
    /// Create a backend that runs `gh` from `repo_dir`.
    #[must_use]
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Override the per-call timeout.
    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// The directory gh commands run in.
    #[must_use]
    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    /// Verify `gh` is installed and authenticated.
    ///
    /// # Errors
    /// Returns [`ForgeError::Unavailable`] when either probe fails.
    pub fn check_available(&self) -> Result<(), ForgeError> {
        let version = self.run(&["--version"]);
        match version {
            Err(_) => {
                return Err(ForgeError::Unavailable {
                    message: "`gh` is not installed; see https://cli.github.com".to_owned(),
                })
            }
            Ok(out) if !out.status.success() => {
                return Err(ForgeError::Unavailable {
                    message: "`gh --version` failed".to_owned(),
                })
            }
            Ok(_) => {}
        }
        let auth = self.run(&["auth", "status"])?;
        if auth.status.success() {
            Ok(())
        } else {
            Err(ForgeError::Unavailable {
                message: "`gh` is not authenticated; run `gh auth login`".to_owned(),
            })
        }
    }

    /// Run a gh command under the per-call timeout.
    ///
    /// The wait is a cooperative poll over `try_wait`; on an elapsed
    /// deadline the child is killed and [`ForgeError::Timeout`] returned.
    /// Output is drained only after exit, so a response larger than the
    /// pipe buffer relies on gh exiting before the deadline.
    fn run(&self, args: &[&str]) -> Result<std::process::Output, ForgeError> {
        let command = format!("gh {}", args.join(" "));
        debug!(target: "shipline::forge", command = %command, "exec");
        // Null stdin prevents gh from prompting when credentials are stale.
        let mut child = Command::new("gh")
            .args(args)
            .current_dir(&self.repo_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(ForgeError::Io)?;

        let deadline = Instant::now() + self.call_timeout;
        loop {
            match child.try_wait().map_err(ForgeError::Io)? {
                Some(_) => break,
                None if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    warn!(target: "shipline::forge", command = %command, "gh call timed out");
                    return Err(ForgeError::Timeout {
                        command,
                        secs: self.call_timeout.as_secs(),
                    });
                }
                None => std::thread::sleep(Duration::from_millis(50)),
            }
        }
        child.wait_with_output().map_err(ForgeError::Io)
    }

    fn gh_stdout(&self, args: &[&str]) -> Result<String, ForgeError> {
        let output = self.run(args)?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
        } else {
            Err(ForgeError::from_output(
                format!("gh {}", args.join(" ")),
                &output,
            ))
        }
    }

    fn gh_json<T: serde::de::DeserializeOwned>(
        &self,
        args: &[&str],
        context: &str,
    ) -> Result<T, ForgeError> {
        let stdout = self.gh_stdout(args)?;
        serde_json::from_str(&stdout).map_err(|e| ForgeError::Parse {
            context: context.to_owned(),
            detail: e.to_string(),
        })
    }
}

impl ForgePort for GhForge {
    fn create_pull_request(&self, request: &NewPullRequest) -> Result<CreatedPr, ForgeError> {
        let url = self.gh_stdout(&[
            "pr",
            "create",
            "--title",
            &request.title,
            "--body",
            &request.body,
            "--base",
            &request.base,
            "--head",
            &request.head,
        ])?;
        // `gh pr create` prints the PR URL as its last stdout line.
        let url = url
            .lines()
            .last()
            .unwrap_or_default()
            .trim()
            .to_owned();
        let number = parse_pr_number(&url).ok_or_else(|| ForgeError::Parse {
            context: "gh pr create".to_owned(),
            detail: format!("no PR number in output: {url}"),
        })?;
        Ok(CreatedPr { number, url })
    }

    fn update_pull_request(
        &self,
        number: u64,
        update: &PullRequestUpdate,
    ) -> Result<(), ForgeError> {
        if update.is_empty() {
            return Ok(());
        }
        let number = number.to_string();
        let mut args = vec!["pr", "edit", number.as_str()];
        if let Some(title) = update.title.as_deref() {
            args.extend(["--title", title]);
        }
        if let Some(body) = update.body.as_deref() {
            args.extend(["--body", body]);
        }
        self.gh_stdout(&args).map(|_| ())
    }

    fn list_pull_requests(
        &self,
        head: &str,
        state: PrStateFilter,
    ) -> Result<Vec<PullRequestSummary>, ForgeError> {
        let limit = MAX_PRS_TO_FETCH.to_string();
        // `gh pr list --head` (not `gh pr view`) so all-digit branch names
        // are treated as branches, not PR numbers.
        let prs: Vec<GhPr> = self.gh_json(
            &[
                "pr",
                "list",
                "--head",
                head,
                "--state",
                state.as_cli_arg(),
                "--limit",
                &limit,
                "--json",
                "number,state,mergedAt,url",
            ],
            "gh pr list",
        )?;
        Ok(prs.into_iter().map(GhPr::into_summary).collect())
    }

    fn get_check_status(&self, head: &str) -> Result<CheckStatus, ForgeError> {
        let limit = MAX_PRS_TO_FETCH.to_string();
        let prs: Vec<GhPrChecks> = self.gh_json(
            &[
                "pr",
                "list",
                "--head",
                head,
                "--state",
                "open",
                "--limit",
                &limit,
                "--json",
                "number,statusCheckRollup",
            ],
            "gh pr list --json statusCheckRollup",
        )?;
        let Some(pr) = prs.into_iter().next() else {
            return Err(ForgeError::NoPullRequest {
                message: format!("no open pull request with head `{head}`"),
            });
        };
        Ok(aggregate_checks(pr.status_check_rollup.unwrap_or_default()))
    }

    fn merge_pull_request(&self, number: u64, strategy: MergeStrategy) -> Result<bool, ForgeError> {
        let number_arg = number.to_string();
        let output = self.run(&["pr", "merge", &number_arg, strategy.as_cli_flag()])?;
        if output.status.success() {
            return Ok(true);
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        let lower = stderr.to_lowercase();
        if lower.contains("conflict") || lower.contains("not mergeable") {
            warn!(target: "shipline::forge", pr = number, "merge refused: conflict");
            Err(ForgeError::MergeConflict { message: stderr })
        } else {
            Err(ForgeError::Command {
                command: format!("gh pr merge {number_arg} {}", strategy.as_cli_flag()),
                stderr,
                exit_code: output.status.code(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// gh JSON wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GhPr {
    number: u64,
    /// gh reports "OPEN", "CLOSED", or "MERGED".
    state: String,
    #[serde(rename = "mergedAt")]
    merged_at: Option<String>,
    url: String,
}

impl GhPr {
    fn into_summary(self) -> PullRequestSummary {
        let state = match self.state.as_str() {
            "MERGED" => PrState::Merged,
            "CLOSED" => PrState::Closed,
            _ => PrState::Open,
        };
        PullRequestSummary {
            number: self.number,
            state,
            merged_at: self.merged_at,
            url: self.url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GhPrChecks {
    #[allow(dead_code)]
    number: u64,
    #[serde(rename = "statusCheckRollup")]
    status_check_rollup: Option<Vec<GhCheck>>,
}

/// A single `statusCheckRollup` entry — union of `CheckRun` and
/// `StatusContext` shapes.
#[derive(Debug, Deserialize)]
struct GhCheck {
    /// Check name (CheckRun) — StatusContext uses `context` instead.
    name: Option<String>,
    /// StatusContext name.
    context: Option<String>,
    /// CheckRun only: "COMPLETED", "IN_PROGRESS", "QUEUED", ...
    status: Option<String>,
    /// CheckRun only: "SUCCESS", "FAILURE", "CANCELLED", "SKIPPED", ...
    conclusion: Option<String>,
    /// StatusContext only: "SUCCESS", "FAILURE", "PENDING", "ERROR".
    state: Option<String>,
}

impl GhCheck {
    fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.context.clone())
            .unwrap_or_else(|| "unnamed check".to_owned())
    }

    /// Resolve the union into pass/pending/fail.
    fn bucket(&self) -> CheckBucket {
        // StatusContext: single `state` field.
        if let Some(state) = self.state.as_deref() {
            return match state {
                "SUCCESS" => CheckBucket::Passed,
                "PENDING" => CheckBucket::Pending,
                _ => CheckBucket::Failed,
            };
        }
        // CheckRun: `status` says whether it finished, `conclusion` how.
        if self.status.as_deref() != Some("COMPLETED") {
            return CheckBucket::Pending;
        }
        match self.conclusion.as_deref() {
            Some("SUCCESS" | "SKIPPED" | "NEUTRAL") => CheckBucket::Passed,
            _ => CheckBucket::Failed,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CheckBucket {
    Passed,
    Pending,
    Failed,
}

fn aggregate_checks(checks: Vec<GhCheck>) -> CheckStatus {
    let mut status = CheckStatus::default();
    for check in checks {
        match check.bucket() {
            CheckBucket::Passed => status.passed += 1,
            CheckBucket::Pending => status.pending += 1,
            CheckBucket::Failed => {
                status.failed += 1;
                status.failed_names.push(check.display_name());
            }
        }
    }
    status
}

/// Extract the PR number from a GitHub PR URL
/// (`https://github.com/owner/repo/pull/123`).
fn parse_pr_number(url: &str) -> Option<u64> {
    url.rsplit('/').next()?.parse().ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pr_number_from_url() {
        assert_eq!(
            parse_pr_number("https://github.com/acme/widgets/pull/123"),
            Some(123)
        );
        assert_eq!(parse_pr_number("not a url"), None);
    }

    #[test]
    fn check_run_buckets() {
        let passed: GhCheck = serde_json::from_str(
            r#"{"name":"build","status":"COMPLETED","conclusion":"SUCCESS"}"#,
        )
        .expect("parse");
        assert!(passed.bucket() == CheckBucket::Passed);

        let skipped: GhCheck = serde_json::from_str(
            r#"{"name":"docs","status":"COMPLETED","conclusion":"SKIPPED"}"#,
        )
        .expect("parse");
        assert!(skipped.bucket() == CheckBucket::Passed);

        let running: GhCheck =
            serde_json::from_str(r#"{"name":"test","status":"IN_PROGRESS"}"#).expect("parse");
        assert!(running.bucket() == CheckBucket::Pending);

        let failed: GhCheck = serde_json::from_str(
            r#"{"name":"lint","status":"COMPLETED","conclusion":"FAILURE"}"#,
        )
        .expect("parse");
        assert!(failed.bucket() == CheckBucket::Failed);
    }

    #[test]
    fn status_context_buckets() {
        let passed: GhCheck =
            serde_json::from_str(r#"{"context":"ci/external","state":"SUCCESS"}"#).expect("parse");
        assert!(passed.bucket() == CheckBucket::Passed);

        let pending: GhCheck =
            serde_json::from_str(r#"{"context":"ci/external","state":"PENDING"}"#).expect("parse");
        assert!(pending.bucket() == CheckBucket::Pending);

        let errored: GhCheck =
            serde_json::from_str(r#"{"context":"ci/external","state":"ERROR"}"#).expect("parse");
        assert!(errored.bucket() == CheckBucket::Failed);
    }

    #[test]
    fn aggregate_names_failures() {
        let checks: Vec<GhCheck> = serde_json::from_str(
            r#"[
                {"name":"build","status":"COMPLETED","conclusion":"SUCCESS"},
                {"name":"lint","status":"COMPLETED","conclusion":"FAILURE"},
                {"context":"ci/vendor","state":"PENDING"}
            ]"#,
        )
        .expect("parse");
        let status = aggregate_checks(checks);
        assert_eq!(status.passed, 1);
        assert_eq!(status.failed, 1);
        assert_eq!(status.pending, 1);
        assert_eq!(status.failed_names, vec!["lint"]);
    }

    #[test]
    fn pr_state_mapping() {
        let pr: GhPr = serde_json::from_str(
            r#"{"number":7,"state":"MERGED","mergedAt":"2026-02-01T10:00:00Z","url":"https://github.com/a/b/pull/7"}"#,
        )
        .expect("parse");
        let summary = pr.into_summary();
        assert_eq!(summary.state, PrState::Merged);
        assert!(summary.is_merged());
    }
}
