//! Resolves the config file, the epic document, and the clock for one
//! invocation.

use crate::output::OutputMode;
use agentpm_core::config::{self, CONFIG_FILE, Config, ConfigError};
use agentpm_core::hints::HintConfig;
use agentpm_core::lifecycle::TransitionArgs;
use agentpm_core::model::{Epic, Timestamp, parse_timestamp};
use agentpm_core::store::{self, DocumentError, Loaded};
use clap::Args;
use std::path::{Path, PathBuf};

/// Flags accepted by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Epic document to operate on (overrides .agentpm.json).
    #[arg(short, long, global = true, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Config file to use instead of ./.agentpm.json.
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Timestamp recorded on changes (RFC3339); defaults to now.
    #[arg(short, long, global = true, value_name = "RFC3339", value_parser = parse_time)]
    pub time: Option<Timestamp>,

    /// Output format (falls back to AGENTPM_FORMAT, then text).
    #[arg(short = 'F', long, global = true, value_enum)]
    pub format: Option<OutputMode>,

    /// Enable debug logging on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

fn parse_time(raw: &str) -> Result<Timestamp, String> {
    parse_timestamp(raw.trim()).map_err(|e| format!("expected RFC3339 such as 2025-01-02T15:04:05Z ({e})"))
}

impl GlobalArgs {
    /// Config path: `--config`, else `.agentpm.json` under `cwd`.
    pub fn config_path(&self, cwd: &Path) -> PathBuf {
        self.config
            .as_ref()
            .map_or_else(|| cwd.join(CONFIG_FILE), |p| absolute(cwd, p))
    }

    /// Hint settings for error rendering. Never fails: a broken or missing
    /// config means defaults.
    pub fn hint_config(&self, cwd: &Path) -> HintConfig {
        config::load_optional(&self.config_path(cwd))
            .ok()
            .flatten()
            .map(|c| c.hints)
            .unwrap_or_default()
    }
}

fn absolute(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// Everything a command needs to find and change the document.
#[derive(Debug, Clone)]
pub struct Project {
    pub config: Option<Config>,
    pub epic_path: PathBuf,
    pub now: Timestamp,
}

impl Project {
    /// Resolve the document path. `--file` makes a missing config non-fatal.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] when no document can be located or the config is
    /// broken.
    pub fn open(global: &GlobalArgs, cwd: &Path) -> Result<Self, ConfigError> {
        let config_path = global.config_path(cwd);
        let now = global.time.unwrap_or_else(chrono::Utc::now);

        let (config, epic_path) = match &global.file {
            Some(file) => (config::load_optional(&config_path)?, absolute(cwd, file)),
            None => {
                let config = config::load(&config_path)?;
                let epic_path = absolute(cwd, &config.epic_path(&config_path));
                (Some(config), epic_path)
            }
        };
        tracing::debug!(
            config = %config_path.display(),
            epic = %epic_path.display(),
            "resolved project"
        );

        Ok(Self {
            config,
            epic_path,
            now,
        })
    }

    /// # Errors
    ///
    /// Any [`DocumentError`] from reading or parsing the document.
    pub fn load(&self) -> Result<Loaded, DocumentError> {
        store::load(&self.epic_path)
    }

    /// # Errors
    ///
    /// [`DocumentError::Write`] when the document cannot be replaced.
    pub fn save(&self, epic: &Epic) -> Result<(), DocumentError> {
        store::save(&self.epic_path, epic)
    }

    /// Baseline transition arguments from config policy.
    pub fn transition_args(&self) -> TransitionArgs {
        self.config
            .as_ref()
            .map(Config::transition_args)
            .unwrap_or_default()
    }

    /// Agent recorded on appended events.
    pub fn agent(&self) -> Option<String> {
        self.config.as_ref().and_then(|c| c.default_assignee.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentpm_core::error::ErrorCode;
    use tempfile::TempDir;

    #[test]
    fn time_flag_parses_rfc3339() {
        let ts = parse_time("2025-03-04T05:06:07Z").unwrap();
        assert_eq!(agentpm_core::model::format_timestamp(&ts), "2025-03-04T05:06:07Z");
        assert!(parse_time("yesterday").is_err());
    }

    #[test]
    fn missing_config_is_fatal_without_file_flag() {
        let dir = TempDir::new().unwrap();
        let err = Project::open(&GlobalArgs::default(), dir.path()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotInitialized);
    }

    #[test]
    fn file_flag_works_without_config() {
        let dir = TempDir::new().unwrap();
        let global = GlobalArgs {
            file: Some(PathBuf::from("epic.xml")),
            ..GlobalArgs::default()
        };
        let project = Project::open(&global, dir.path()).unwrap();
        assert!(project.config.is_none());
        assert_eq!(project.epic_path, dir.path().join("epic.xml"));
        assert!(project.transition_args().allow_fail_regression);
    }

    #[test]
    fn config_resolves_epic_relative_to_itself() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::new("plans/epic.xml");
        cfg.default_assignee = Some("agent-7".into());
        config::save(&dir.path().join(CONFIG_FILE), &cfg).unwrap();

        let project = Project::open(&GlobalArgs::default(), dir.path()).unwrap();
        assert_eq!(project.epic_path, dir.path().join("plans/epic.xml"));
        assert_eq!(project.agent().as_deref(), Some("agent-7"));
    }

    #[test]
    fn hint_config_defaults_on_broken_config() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{oops").unwrap();
        assert_eq!(GlobalArgs::default().hint_config(dir.path()), HintConfig::default());
    }
}
