//! `.agentpm.json`: which epic document to use, plus hint and policy knobs.

use crate::error::ErrorCode;
use crate::hints::HintConfig;
use crate::lifecycle::TransitionArgs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".agentpm.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Path to the epic XML document, relative to the config file.
    pub current_epic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_assignee: Option<String>,
    #[serde(default)]
    pub hints: HintConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Allow `fail-test` on a passing test.
    #[serde(default = "default_true")]
    pub allow_fail_regression: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            allow_fail_regression: default_true(),
        }
    }
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no .agentpm.json found at {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{} does not name an epic document (current_epic is empty)", .path.display())]
    MissingEpic { path: PathBuf },

    #[error("failed to write {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } | Self::MissingEpic { .. } => ErrorCode::NotInitialized,
            Self::Read { .. } | Self::Parse { .. } => ErrorCode::ConfigParseError,
            Self::Write { .. } => ErrorCode::DocumentWriteFailed,
        }
    }
}

impl Config {
    #[must_use]
    pub fn new(current_epic: impl Into<String>) -> Self {
        Self {
            current_epic: current_epic.into(),
            default_assignee: None,
            hints: HintConfig::default(),
            policy: PolicyConfig::default(),
        }
    }

    /// The epic path; relative paths resolve against the config file's
    /// directory.
    #[must_use]
    pub fn epic_path(&self, config_path: &Path) -> PathBuf {
        let epic = Path::new(&self.current_epic);
        if epic.is_absolute() {
            return epic.to_path_buf();
        }
        match config_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join(epic),
            _ => epic.to_path_buf(),
        }
    }

    /// Baseline transition arguments implied by this config.
    #[must_use]
    pub fn transition_args(&self) -> TransitionArgs {
        TransitionArgs {
            agent: self.default_assignee.clone(),
            allow_fail_regression: self.policy.allow_fail_regression,
            ..TransitionArgs::default()
        }
    }
}

/// Load the config at `path`.
///
/// # Errors
///
/// [`ConfigError::NotFound`] when the file does not exist, otherwise read,
/// parse or missing-epic errors.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    load_optional(path)?.ok_or_else(|| ConfigError::NotFound {
        path: path.to_path_buf(),
    })
}

/// Like [`load`], but a missing file is `Ok(None)`.
///
/// # Errors
///
/// Read, parse or missing-epic errors.
pub fn load_optional(path: &Path) -> Result<Option<Config>, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file");
            return Ok(None);
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let config: Config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if config.current_epic.trim().is_empty() {
        return Err(ConfigError::MissingEpic {
            path: path.to_path_buf(),
        });
    }
    tracing::debug!(path = %path.display(), epic = %config.current_epic, "loaded config");
    Ok(Some(config))
}

/// Write `config` as pretty JSON, replacing any existing file atomically.
///
/// # Errors
///
/// [`ConfigError::Write`] on any I/O failure.
pub fn save(path: &Path, config: &Config) -> Result<(), ConfigError> {
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut json = serde_json::to_string_pretty(config)
        .map_err(|e| write_err(io::Error::other(e)))?;
    json.push('\n');

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(write_err)?;
    fs::rename(&tmp, path).map_err(write_err)?;
    Ok(())
}
