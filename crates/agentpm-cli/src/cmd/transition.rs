//! Shared plumbing for commands that move one entity through its lifecycle.

use crate::context::Project;
use crate::errors::CommandError;
use crate::output::{OutputMode, render};
use agentpm_core::engine::{self, Outcome, current};
use agentpm_core::lifecycle::{TransitionArgs, TransitionRequest, Verb};
use agentpm_core::model::{CurrentState, EntityKind, Epic, StateToken};
use agentpm_core::router;
use clap::Args;
use serde::Serialize;
use std::io::{self, Write};

/// `epic`, `<kind> <id>`, or a bare ID routed by its shape.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// `epic`, an entity kind (`phase`, `task`, `test`), or a bare ID such as 1A_2.
    #[arg(value_name = "TARGET")]
    pub target: String,

    /// Entity ID when TARGET names a kind.
    #[arg(value_name = "ID")]
    pub id: Option<String>,
}

impl TargetArgs {
    /// Resolve to the entity kind and ID the command addresses.
    pub fn resolve(&self) -> anyhow::Result<(EntityKind, String)> {
        match self.target.parse::<EntityKind>() {
            Ok(EntityKind::Epic) => Ok((
                EntityKind::Epic,
                self.id.as_deref().map(str::trim).unwrap_or_default().to_string(),
            )),
            Ok(kind) => {
                let id = self
                    .id
                    .as_deref()
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| CommandError::usage(format!("missing {kind} ID after '{kind}'")))?;
                Ok((kind, id.to_string()))
            }
            Err(_) => {
                if let Some(extra) = &self.id {
                    return Err(CommandError::usage(format!(
                        "unexpected argument '{extra}' after bare ID '{}'",
                        self.target
                    ))
                    .into());
                }
                let kind = router::resolve(&self.target)?;
                Ok((kind, self.target.trim().to_string()))
            }
        }
    }

    pub fn request(&self, verb: Verb, args: TransitionArgs) -> anyhow::Result<TransitionRequest> {
        let (kind, id) = self.resolve()?;
        Ok(TransitionRequest::new(kind, id, verb).with_args(args))
    }
}

/// Result payload for every single-entity transition command.
#[derive(Debug, Serialize)]
pub struct TransitionOutput {
    pub kind: EntityKind,
    pub id: String,
    pub verb: Verb,
    /// False when the entity already held the target state.
    pub changed: bool,
    pub from: StateToken,
    pub to: StateToken,
    pub events_appended: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub current_state: CurrentState,
}

impl TransitionOutput {
    fn from_outcome(outcome: Outcome, doc: &Epic) -> Self {
        match outcome {
            Outcome::Applied(report) => Self {
                kind: report.kind,
                id: report.id,
                verb: report.verb,
                changed: true,
                from: report.from,
                to: report.to,
                events_appended: report.events_appended,
                warnings: report.warnings,
                current_state: report.current_state,
            },
            Outcome::AlreadyInTarget {
                kind,
                id,
                verb,
                state,
            } => Self {
                kind,
                id,
                verb,
                changed: false,
                from: state,
                to: state,
                events_appended: 0,
                warnings: Vec::new(),
                current_state: doc
                    .current_state
                    .clone()
                    .unwrap_or_else(|| current::recompute(doc)),
            },
        }
    }
}

pub fn render_transition_text(out: &TransitionOutput, w: &mut dyn Write) -> io::Result<()> {
    if out.changed {
        writeln!(
            w,
            "✓ {} {}: {} → {}",
            out.kind.label(),
            out.id,
            out.from,
            out.to
        )?;
    } else {
        writeln!(
            w,
            "• {} {} is already {}; nothing to do",
            out.kind.label(),
            out.id,
            out.to
        )?;
    }
    for warning in &out.warnings {
        writeln!(w, "  warning: {warning}")?;
    }
    writeln!(w, "  next: {}", out.current_state.next_action)
}

/// Load, apply, save when something changed, render.
pub fn run_transition(
    project: &Project,
    req: &TransitionRequest,
    output: OutputMode,
) -> anyhow::Result<()> {
    let mut doc = project.load()?.epic;
    let outcome = engine::apply(&mut doc, req, project.now)?;

    if outcome.is_applied() {
        project.save(&doc)?;
        tracing::info!(kind = %req.kind, id = %req.id, verb = %req.verb, "transition applied");
    } else {
        tracing::debug!(kind = %req.kind, id = %req.id, verb = %req.verb, "already in target state");
    }

    let out = TransitionOutput::from_outcome(outcome, &doc);
    render(output, &out, render_transition_text)
}
