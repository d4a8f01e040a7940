//! Error types for forge operations.
//!
//! [`ForgeError`] is the single error type returned by all
//! [`ForgePort`](crate::ForgePort) trait methods. Variants distinguish the
//! failure modes the ship pipeline reacts to differently: an unavailable
//! CLI, a merge conflict reported by the forge, and plain command failures.

use thiserror::Error;

/// Errors returned by [`ForgePort`](crate::ForgePort) operations.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// The forge CLI is missing or not authenticated.
    #[error("forge CLI unavailable: {message}")]
    Unavailable {
        /// What was missing (binary absent, auth rejected).
        message: String,
    },

    /// No pull request exists where one was expected.
    #[error("no pull request found: {message}")]
    NoPullRequest {
        /// Which lookup came up empty.
        message: String,
    },

    /// The forge refused a merge because the PR has conflicts.
    #[error("merge conflict reported by forge: {message}")]
    MergeConflict {
        /// The forge's description of the conflict.
        message: String,
    },

    /// A forge command exceeded the per-call timeout and was killed.
    #[error("`{command}` timed out after {secs}s")]
    Timeout {
        /// The command that was killed.
        command: String,
        /// The timeout that elapsed.
        secs: u64,
    },

    /// A forge command exited non-zero.
    #[error("`{command}` failed: {stderr}")]
    Command {
        /// The full command line that was run.
        command: String,
        /// Captured stderr, trimmed.
        stderr: String,
        /// The process exit code (`None` if killed by signal).
        exit_code: Option<i32>,
    },

    /// The forge's JSON output did not match the expected shape.
    #[error("could not parse {context} output: {detail}")]
    Parse {
        /// What was being parsed (e.g. `"gh pr list"`).
        context: String,
        /// The underlying parse failure.
        detail: String,
    },

    /// An I/O error occurred (process spawn).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ForgeError {
    /// Build a [`ForgeError::Command`] from a finished CLI invocation.
    #[must_use]
    pub fn from_output(command: String, output: &std::process::Output) -> Self {
        Self::Command {
            command,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            exit_code: output.status.code(),
        }
    }

    /// Whether retrying the same call later could plausibly succeed
    /// (rate limits, transient network failures).
    ///
    /// The core never retries on its own; callers use this to phrase
    /// suggestions.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Command { stderr, .. } => {
                let lower = stderr.to_lowercase();
                lower.contains("rate limit")
                    || lower.contains("429")
                    || lower.contains("timeout")
                    || lower.contains("timed out")
                    || lower.contains("connection")
                    || lower.contains("network")
            }
            Self::Timeout { .. } | Self::Io(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retriable_sniffing() {
        let retriable = ForgeError::Command {
            command: "gh pr list".to_owned(),
            stderr: "API rate limit exceeded".to_owned(),
            exit_code: Some(1),
        };
        assert!(retriable.is_retriable());

        let fatal = ForgeError::Command {
            command: "gh pr merge".to_owned(),
            stderr: "pull request not found".to_owned(),
            exit_code: Some(1),
        };
        assert!(!fatal.is_retriable());

        assert!(!ForgeError::Unavailable {
            message: "gh not installed".to_owned()
        }
        .is_retriable());
    }
}
