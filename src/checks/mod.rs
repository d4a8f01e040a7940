//! The pre-flight / post-flight check framework.
//!
//! A check is a named function returning a [`CheckResult`]. A [`CheckSet`]
//! executes its checks sequentially and stops after the first
//! `error`-severity failure unless `force` is set, in which case errors are
//! demoted to warnings in the aggregate outcome but still reported.
//!
//! Checks read Git and forge state; they never mutate durable state, and
//! the engine never retries — retries are the caller's responsibility.

pub mod postflight;
pub mod preflight;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CheckResult
// ---------------------------------------------------------------------------

/// Severity of a failed check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocks the operation (unless forced).
    Error,
    /// Reported but non-blocking.
    Warning,
    /// Informational only.
    Info,
}

/// Expected/actual/suggestion detail attached to a check result.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckDetails {
    /// What the check wanted to see.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    /// What it actually saw.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    /// One-line remediation hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// The outcome of one named check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Stable check name, e.g. `"On main branch"`.
    pub name: String,
    /// Whether the check passed.
    pub passed: bool,
    /// Severity when failed (checks that passed keep their configured
    /// severity for context).
    pub severity: Severity,
    /// Human-readable result message.
    pub message: String,
    /// Structured detail.
    #[serde(default, skip_serializing_if = "is_default_details")]
    pub details: CheckDetails,
}

fn is_default_details(details: &CheckDetails) -> bool {
    details == &CheckDetails::default()
}

impl CheckResult {
    /// A passing check.
    #[must_use]
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            severity: Severity::Info,
            message: message.into(),
            details: CheckDetails::default(),
        }
    }

    /// A failing, blocking check.
    #[must_use]
    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            severity: Severity::Error,
            message: message.into(),
            details: CheckDetails::default(),
        }
    }

    /// A failing, non-blocking check.
    #[must_use]
    pub fn warn(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            severity: Severity::Warning,
            message: message.into(),
            details: CheckDetails::default(),
        }
    }

    /// Attach an expected/actual pair.
    #[must_use]
    pub fn with_expectation(
        mut self,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        self.details.expected = Some(expected.into());
        self.details.actual = Some(actual.into());
        self
    }

    /// Attach a remediation hint.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.details.suggestion = Some(suggestion.into());
        self
    }

    /// `true` for a failed check at error severity.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        !self.passed && self.severity == Severity::Error
    }
}

// ---------------------------------------------------------------------------
// CheckSet / CheckOutcome
// ---------------------------------------------------------------------------

/// An ordered list of lazily evaluated checks.
///
/// Laziness matters: once a blocking failure occurs, later checks are never
/// run (they may depend on conditions the earlier check just refuted).
pub struct CheckSet<'a> {
    checks: Vec<Box<dyn FnOnce() -> CheckResult + 'a>>,
}

impl<'a> CheckSet<'a> {
    /// An empty check set.
    #[must_use]
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    /// Append a check.
    pub fn add(&mut self, check: impl FnOnce() -> CheckResult + 'a) -> &mut Self {
        self.checks.push(Box::new(check));
        self
    }

    /// Execute the set.
    ///
    /// Stops after the first `error`-severity failure unless `force` is
    /// set; with `force`, errors are demoted to warnings in the aggregate
    /// (the individual results keep their original severity so the caller
    /// can see what was overridden).
    #[must_use]
    pub fn run(self, force: bool) -> CheckOutcome {
        let mut outcome = CheckOutcome::default();
        for check in self.checks {
            let result = check();
            let blocking = result.is_blocking();
            outcome.record(&result);
            outcome.results.push(result);
            if blocking && !force {
                outcome.blocked = true;
                break;
            }
        }
        if force {
            // Demote: forced runs never block, but the failure counts stay
            // visible as warnings.
            outcome.warnings += outcome.failed;
            outcome.failed = 0;
            outcome.blocked = false;
        }
        outcome
    }
}

impl Default for CheckSet<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregate result of running a check set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    /// Individual results, in execution order.
    pub results: Vec<CheckResult>,
    /// Count of passed checks.
    pub passed: usize,
    /// Count of error-severity failures (zero after a forced run).
    pub failed: usize,
    /// Count of warning-severity failures (plus demoted errors when forced).
    pub warnings: usize,
    /// Aggregated suggestions from every failed check.
    pub suggestions: Vec<String>,
    /// Whether a blocking failure stopped execution.
    pub blocked: bool,
}

impl CheckOutcome {
    fn record(&mut self, result: &CheckResult) {
        if result.passed {
            self.passed += 1;
        } else {
            match result.severity {
                Severity::Error => self.failed += 1,
                Severity::Warning | Severity::Info => self.warnings += 1,
            }
            if let Some(suggestion) = result.details.suggestion.clone() {
                self.suggestions.push(suggestion);
            }
        }
    }

    /// Names and messages of failed checks, for error reporting.
    #[must_use]
    pub fn failures(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| !r.passed)
            .map(|r| format!("{}: {}", r.name, r.message))
            .collect()
    }

    /// The first blocking result, if any.
    #[must_use]
    pub fn first_blocker(&self) -> Option<&CheckResult> {
        self.results.iter().find(|r| r.is_blocking())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn stops_at_first_blocking_failure() {
        let later_ran = Cell::new(false);
        let mut set = CheckSet::new();
        set.add(|| CheckResult::pass("first", "ok"));
        set.add(|| CheckResult::fail("second", "broken").with_suggestion("fix it"));
        set.add(|| {
            later_ran.set(true);
            CheckResult::pass("third", "ok")
        });

        let outcome = set.run(false);
        assert!(outcome.blocked);
        assert_eq!(outcome.passed, 1);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.suggestions, vec!["fix it"]);
        assert!(!later_ran.get(), "checks after a blocker must not run");
        assert_eq!(outcome.first_blocker().expect("blocker").name, "second");
    }

    #[test]
    fn force_demotes_errors_to_warnings_and_keeps_going() {
        let mut set = CheckSet::new();
        set.add(|| CheckResult::fail("gate", "broken"));
        set.add(|| CheckResult::pass("after", "ok"));

        let outcome = set.run(true);
        assert!(!outcome.blocked);
        assert_eq!(outcome.failed, 0);
        assert_eq!(outcome.warnings, 1);
        assert_eq!(outcome.passed, 1);
        assert_eq!(outcome.results.len(), 2, "forced runs execute everything");
        // The individual result keeps its original severity.
        assert_eq!(outcome.results[0].severity, Severity::Error);
    }

    #[test]
    fn warnings_do_not_block() {
        let mut set = CheckSet::new();
        set.add(|| CheckResult::warn("advice", "could be better"));
        set.add(|| CheckResult::pass("after", "ok"));

        let outcome = set.run(false);
        assert!(!outcome.blocked);
        assert_eq!(outcome.warnings, 1);
        assert_eq!(outcome.passed, 1);
    }

    #[test]
    fn failures_include_name_and_message() {
        let mut set = CheckSet::new();
        set.add(|| CheckResult::fail("Branch name available", "feature/x is retired"));
        let outcome = set.run(false);
        assert_eq!(
            outcome.failures(),
            vec!["Branch name available: feature/x is retired"]
        );
    }
}
