//! `agentpm log`: Append a free-form event to the epic's log.

use crate::context::Project;
use crate::errors::CommandError;
use crate::output::{OutputMode, render};
use agentpm_core::model::{Event, EventType, format_timestamp};
use clap::Args;
use serde::Serialize;
use std::io::{self, Write};

#[derive(Args, Debug)]
pub struct LogArgs {
    /// What happened.
    #[arg(required = true)]
    pub message: Vec<String>,

    /// Event category: implementation, decision, blocker, issue, milestone, note.
    #[arg(long = "type", value_name = "TYPE", default_value = "note")]
    pub event_type: String,

    /// Comma-separated files touched.
    #[arg(long, value_delimiter = ',')]
    pub files: Vec<String>,

    /// Entity the entry is about (defaults to the active task).
    #[arg(long, value_name = "ID")]
    pub entity: Option<String>,
}

#[derive(Debug, Serialize)]
struct LogOutput {
    event: Event,
    total_events: usize,
}

pub fn run_log(args: &LogArgs, project: &Project, output: OutputMode) -> anyhow::Result<()> {
    let event_type = EventType::parse_log_type(&args.event_type)?;
    let message = args.message.join(" ");
    if message.trim().is_empty() {
        return Err(CommandError::usage("log message is empty").into());
    }
    let files: Vec<String> = args
        .files
        .iter()
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .collect();

    let mut doc = project.load()?.epic;
    let entity = args.entity.clone().or_else(|| {
        doc.current_state
            .as_ref()
            .and_then(|s| s.active_task.clone().or_else(|| s.active_phase.clone()))
    });

    let mut event = Event::new(project.now, event_type, message.trim())
        .by_agent(project.agent())
        .with_files(files);
    if let Some(id) = entity {
        event = event.for_entity(id);
    }
    doc.append_event(event.clone());
    project.save(&doc)?;
    tracing::info!(event_type = %event.event_type, "event logged");

    let out = LogOutput {
        event,
        total_events: doc.events.len(),
    };
    render(output, &out, |o, w: &mut dyn Write| -> io::Result<()> {
        write!(
            w,
            "✓ logged {} at {}",
            o.event.event_type,
            format_timestamp(&o.event.timestamp)
        )?;
        if let Some(id) = &o.event.entity_id {
            write!(w, " on {id}")?;
        }
        writeln!(w)
    })
}
