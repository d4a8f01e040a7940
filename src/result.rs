//! Structured operation results.
//!
//! Every invocation-surface operation returns one of three tagged shapes:
//! session operations return [`SessionToolResult`], `ship` returns
//! [`ForgeToolResult`] (session fields plus PR/check data), and the
//! `status`/`sessions` queries return [`QueryToolResult`]. All three are
//! serializable so `--format json` emits them verbatim.
//!
//! Errors inside a result are rendered strings (the Display form of
//! [`WorkflowError`](crate::error::WorkflowError) carries the kind and a
//! "To fix:" suggestion), keeping the shapes plain data.

use serde::{Deserialize, Serialize};
use shipline_forge::CheckStatus;

use crate::checks::{CheckOutcome, CheckResult};
use crate::model::types::WorkflowState;

// ---------------------------------------------------------------------------
// SessionToolResult
// ---------------------------------------------------------------------------

/// Result of a session operation (launch, commit, abort, swap, cleanup,
/// hotfix).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToolResult {
    /// Whether the operation achieved its contract.
    pub success: bool,
    /// The branch the operation acted on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
    /// Session state after the operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<WorkflowState>,
    /// Pre-flight check results, in execution order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_flight_checks: Vec<CheckResult>,
    /// Post-flight verification results.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_flight_verifications: Vec<CheckResult>,
    /// Rendered errors (each carries its own fix hint).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    /// Non-fatal problems (best-effort cleanup failures, demoted checks).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// What the user would sensibly do next.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next_steps: Vec<String>,
}

impl SessionToolResult {
    /// A result seeded from a pre-flight outcome that blocked the
    /// operation.
    #[must_use]
    pub fn blocked(branch: Option<String>, pre_flight: CheckOutcome) -> Self {
        let mut errors = pre_flight.failures();
        if errors.is_empty() {
            errors.push("pre-flight checks failed".to_owned());
        }
        let next_steps = pre_flight.suggestions.clone();
        Self {
            success: false,
            branch_name: branch,
            pre_flight_checks: pre_flight.results,
            errors,
            next_steps,
            ..Self::default()
        }
    }

    /// Whether the failure was a pre-flight refusal (exit code 2) rather
    /// than a mid-operation error (exit code 1).
    #[must_use]
    pub fn failed_pre_flight(&self) -> bool {
        !self.success && self.pre_flight_checks.iter().any(CheckResult::is_blocking)
    }
}

// ---------------------------------------------------------------------------
// ForgeToolResult
// ---------------------------------------------------------------------------

/// Result of the ship pipeline: the session fields plus PR and check data.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgeToolResult {
    /// Whether the pipeline reached COMPLETE.
    pub success: bool,
    /// The branch that was shipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
    /// Session state after the operation (a legal resting state on
    /// failure).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<WorkflowState>,
    /// PR number, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u64>,
    /// PR URL, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    /// Whether the PR is merged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged: Option<bool>,
    /// Last observed CI roll-up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checks: Option<CheckStatus>,
    /// Pre-flight check results.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_flight_checks: Vec<CheckResult>,
    /// Post-flight verification results.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_flight_verifications: Vec<CheckResult>,
    /// Rendered errors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    /// Non-fatal problems.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// What the user would sensibly do next.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next_steps: Vec<String>,
}

impl ForgeToolResult {
    /// Whether the failure was a pre-flight refusal.
    #[must_use]
    pub fn failed_pre_flight(&self) -> bool {
        !self.success && self.pre_flight_checks.iter().any(CheckResult::is_blocking)
    }
}

// ---------------------------------------------------------------------------
// QueryToolResult
// ---------------------------------------------------------------------------

/// Result of a read-only query (`status`, `sessions`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryToolResult {
    /// Whether the query succeeded.
    pub success: bool,
    /// The query's payload.
    pub data: serde_json::Value,
    /// Optional human summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Rendered errors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    /// Non-fatal problems.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// ToolResult
// ---------------------------------------------------------------------------

/// The discriminated union over all three result shapes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolResult {
    /// A session operation's result.
    Session(SessionToolResult),
    /// The ship pipeline's result.
    Forge(ForgeToolResult),
    /// A query's result.
    Query(QueryToolResult),
}

impl ToolResult {
    /// Whether the underlying operation succeeded.
    #[must_use]
    pub const fn success(&self) -> bool {
        match self {
            Self::Session(r) => r.success,
            Self::Forge(r) => r.success,
            Self::Query(r) => r.success,
        }
    }

    /// The process exit code for this result: 0 on success, 2 for
    /// pre-flight refusals, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.success() {
            return 0;
        }
        let pre_flight = match self {
            Self::Session(r) => r.failed_pre_flight(),
            Self::Forge(r) => r.failed_pre_flight(),
            Self::Query(_) => false,
        };
        if pre_flight { 2 } else { 1 }
    }

    /// Errors carried by the result.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        match self {
            Self::Session(r) => &r.errors,
            Self::Forge(r) => &r.errors,
            Self::Query(r) => &r.errors,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
