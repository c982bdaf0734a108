//! `agentpm init`: Point `.agentpm.json` at an existing epic document.

use crate::context::GlobalArgs;
use crate::errors::CommandError;
use crate::output::{OutputMode, kv, render};
use agentpm_core::config::{self, Config};
use agentpm_core::store;
use clap::Args;
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Epic XML document to manage.
    #[arg(long, value_name = "PATH")]
    pub epic: PathBuf,

    /// Agent recorded on events and used as the default assignee.
    #[arg(long, value_name = "NAME")]
    pub assignee: Option<String>,

    /// Overwrite an existing config.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
struct InitOutput {
    config_path: String,
    current_epic: String,
    epic_id: String,
    epic_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    default_assignee: Option<String>,
    warnings: Vec<String>,
}

/// `current_epic` as stored: relative to the config's directory when the
/// document lives under it, absolute otherwise.
fn stored_epic_path(config_path: &Path, epic: &Path) -> String {
    config_path
        .parent()
        .and_then(|dir| epic.strip_prefix(dir).ok())
        .unwrap_or(epic)
        .to_string_lossy()
        .into_owned()
}

fn render_text(out: &InitOutput, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "✓ wrote {}", out.config_path)?;
    kv(w, "epic", format!("{} {}", out.epic_id, out.epic_name))?;
    kv(w, "document", &out.current_epic)?;
    if let Some(assignee) = &out.default_assignee {
        kv(w, "assignee", assignee)?;
    }
    for warning in &out.warnings {
        writeln!(w, "  warning: {warning}")?;
    }
    Ok(())
}

pub fn run_init(
    args: &InitArgs,
    global: &GlobalArgs,
    cwd: &Path,
    output: OutputMode,
) -> anyhow::Result<()> {
    let config_path = global.config_path(cwd);
    if config_path.exists() && !args.force {
        return Err(CommandError::AlreadyInitialized {
            path: config_path.display().to_string(),
        }
        .into());
    }

    let epic_path = if args.epic.is_absolute() {
        args.epic.clone()
    } else {
        cwd.join(&args.epic)
    };
    let loaded = store::load(&epic_path)?;

    let mut cfg = Config::new(stored_epic_path(&config_path, &epic_path));
    cfg.default_assignee = args
        .assignee
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string);
    config::save(&config_path, &cfg)?;
    tracing::info!(
        config = %config_path.display(),
        epic = %cfg.current_epic,
        "initialized"
    );

    let out = InitOutput {
        config_path: config_path.display().to_string(),
        current_epic: cfg.current_epic,
        epic_id: loaded.epic.id,
        epic_name: loaded.epic.name,
        default_assignee: cfg.default_assignee,
        warnings: loaded.warnings,
    };
    render(output, &out, render_text)
}
