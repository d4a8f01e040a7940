//! shipline repository configuration (`.shipline/config.yaml`).
//!
//! Typed configuration with serde defaults: a missing field uses its
//! default, an unknown field is an error (catches typos), and a missing
//! file means the repository is not initialized — unlike most tools,
//! shipline refuses to run on implicit defaults because the forge kind and
//! main-branch name gate destructive operations.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;

/// Name of the project-local state directory.
pub const STATE_DIR_NAME: &str = ".shipline";
/// Name of the config file inside the state directory.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level shipline configuration, parsed from `.shipline/config.yaml`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShiplineConfig {
    /// Forge settings.
    #[serde(default)]
    pub forge: ForgeConfig,

    /// Repository-level settings.
    #[serde(default)]
    pub repo: RepoConfig,

    /// CI wait settings.
    #[serde(default)]
    pub ci: CiConfig,

    /// Session store settings.
    #[serde(default)]
    pub sessions: SessionConfig,

    /// User identity recorded on sessions.
    #[serde(default)]
    pub user: UserConfig,
}

impl ShiplineConfig {
    /// The state directory for a project root.
    #[must_use]
    pub fn state_dir(project_root: &Path) -> PathBuf {
        project_root.join(STATE_DIR_NAME)
    }

    /// Whether a config file exists under `state_dir`.
    #[must_use]
    pub fn exists(state_dir: &Path) -> bool {
        state_dir.join(CONFIG_FILE_NAME).exists()
    }

    /// Load the configuration from `state_dir/config.yaml`.
    ///
    /// # Errors
    /// [`WorkflowError::NotInitialized`] when the file is absent;
    /// [`WorkflowError::Persistence`] when it exists but cannot be parsed.
    pub fn load(state_dir: &Path) -> Result<Self, WorkflowError> {
        let path = state_dir.join(CONFIG_FILE_NAME);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WorkflowError::NotInitialized {
                    dir: state_dir.to_owned(),
                })
            }
            Err(e) => {
                return Err(WorkflowError::Persistence {
                    path,
                    detail: e.to_string(),
                })
            }
        };
        serde_yaml::from_str(&contents).map_err(|e| WorkflowError::Persistence {
            path,
            detail: format!("invalid config: {e}"),
        })
    }

    /// Write a commented default config to `state_dir/config.yaml`.
    /// Refuses to overwrite an existing file.
    ///
    /// # Errors
    /// [`WorkflowError::Persistence`] on I/O failure or when the file
    /// already exists.
    pub fn write_default(state_dir: &Path) -> Result<PathBuf, WorkflowError> {
        let path = state_dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            return Err(WorkflowError::Persistence {
                path,
                detail: "config.yaml already exists; edit it instead".to_owned(),
            });
        }
        fs::create_dir_all(state_dir).map_err(|e| WorkflowError::Persistence {
            path: state_dir.to_owned(),
            detail: e.to_string(),
        })?;
        fs::write(&path, DEFAULT_CONFIG_YAML).map_err(|e| WorkflowError::Persistence {
            path: path.clone(),
            detail: e.to_string(),
        })?;
        Ok(path)
    }
}

/// The commented template `shipline init` writes.
const DEFAULT_CONFIG_YAML: &str = "\
# shipline configuration
forge:
  # The remote forge hosting pull requests. Supported: github
  kind: github
  # Owner/repo are auto-detected from the remote by the gh CLI; set them
  # only to override.
  # owner: acme
  # repo: widgets
  # Per-forge-call timeout in seconds.
  # call_timeout_secs: 30

repo:
  # The protected linear-history branch.
  main_branch: main
  # The remote everything is pushed to and pulled from.
  remote: origin

ci:
  # How long `shipline ship` waits for checks, in seconds.
  wait_timeout_secs: 1200
  # Interval between check polls, in seconds.
  poll_interval_secs: 30

sessions:
  # Days after which an untouched session expires.
  ttl_days: 30

user: {}
";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// The kind of forge the project ships through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForgeKind {
    /// GitHub, via the `gh` CLI.
    #[default]
    GitHub,
}

impl fmt::Display for ForgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GitHub => f.write_str("github"),
        }
    }
}

/// Forge settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForgeConfig {
    /// Which forge to use.
    #[serde(default)]
    pub kind: ForgeKind,
    /// Repository owner override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Repository name override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    /// Per-forge-call timeout, in seconds (default 30).
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

impl ForgeConfig {
    /// The per-call timeout as a [`Duration`].
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            kind: ForgeKind::default(),
            owner: None,
            repo: None,
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

const fn default_call_timeout_secs() -> u64 {
    30
}

/// Repository-level settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepoConfig {
    /// The protected linear-history branch (default `"main"`).
    #[serde(default = "default_main_branch")]
    pub main_branch: String,
    /// The remote name (default `"origin"`).
    #[serde(default = "default_remote")]
    pub remote: String,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            main_branch: default_main_branch(),
            remote: default_remote(),
        }
    }
}

fn default_main_branch() -> String {
    "main".to_owned()
}

fn default_remote() -> String {
    "origin".to_owned()
}

/// CI wait settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CiConfig {
    /// How long ship waits for checks, in seconds (default 20 minutes).
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
    /// Interval between check polls, in seconds (default 30).
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl CiConfig {
    /// The wait timeout as a [`Duration`].
    #[must_use]
    pub const fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    /// The poll interval as a [`Duration`].
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for CiConfig {
    fn default() -> Self {
        Self {
            wait_timeout_secs: default_wait_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

const fn default_wait_timeout_secs() -> u64 {
    20 * 60
}

const fn default_poll_interval_secs() -> u64 {
    30
}

/// Session store settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Days after which an untouched session expires (default 30).
    #[serde(default = "default_ttl_days")]
    pub ttl_days: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_days: default_ttl_days(),
        }
    }
}

const fn default_ttl_days() -> i64 {
    30
}

/// User identity recorded on sessions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserConfig {
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_template_parses_back_to_defaults() {
        let config: ShiplineConfig =
            serde_yaml::from_str(DEFAULT_CONFIG_YAML).expect("template must parse");
        assert_eq!(config, ShiplineConfig::default());
    }

    #[test]
    fn missing_file_is_not_initialized() {
        let dir = TempDir::new().expect("temp dir");
        let err = ShiplineConfig::load(dir.path()).expect_err("absent config");
        assert!(matches!(err, WorkflowError::NotInitialized { .. }));
    }

    #[test]
    fn write_then_load_round_trips() {
        let dir = TempDir::new().expect("temp dir");
        let state = dir.path().join(STATE_DIR_NAME);
        ShiplineConfig::write_default(&state).expect("write");
        let config = ShiplineConfig::load(&state).expect("load");
        assert_eq!(config.repo.main_branch, "main");
        assert_eq!(config.ci.wait_timeout(), Duration::from_secs(1200));

        // A second init must refuse to clobber.
        let err = ShiplineConfig::write_default(&state).expect_err("no overwrite");
        assert!(matches!(err, WorkflowError::Persistence { .. }));
    }

    #[test]
    fn partial_config_uses_defaults() {
        let config: ShiplineConfig =
            serde_yaml::from_str("repo:\n  main_branch: trunk\n").expect("parse");
        assert_eq!(config.repo.main_branch, "trunk");
        assert_eq!(config.repo.remote, "origin");
        assert_eq!(config.sessions.ttl_days, 30);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = serde_yaml::from_str::<ShiplineConfig>("typo_section: {}\n");
        assert!(result.is_err());
    }
}
