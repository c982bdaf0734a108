//! `agentpm events`: The event log, newest first.

use crate::context::Project;
use crate::output::{OutputMode, render};
use agentpm_core::model::{Event, EventType, format_timestamp};
use agentpm_core::query::{self, EventFilter};
use clap::Args;
use serde::Serialize;
use std::io::{self, Write};

#[derive(Args, Debug)]
pub struct EventsArgs {
    /// Maximum number of events to show.
    #[arg(short = 'n', long, default_value_t = 10)]
    pub limit: usize,

    /// Only events of this type (e.g. task_started, decision).
    #[arg(long = "type", value_name = "TYPE")]
    pub event_type: Option<String>,

    /// Only events about this entity.
    #[arg(long, value_name = "ID")]
    pub entity: Option<String>,
}

impl EventsArgs {
    /// Custom event types recorded by hand-edits are matched verbatim.
    fn filter(&self) -> EventFilter {
        EventFilter {
            limit: Some(self.limit),
            event_type: self
                .event_type
                .as_deref()
                .and_then(|raw| raw.parse::<EventType>().ok()),
            entity_id: self
                .entity
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string),
        }
    }
}

#[derive(Debug, Serialize)]
struct EventsOutput {
    total: usize,
    events: Vec<Event>,
}

pub fn write_event(w: &mut dyn Write, event: &Event) -> io::Result<()> {
    write!(
        w,
        "  {}  {:<15}",
        format_timestamp(&event.timestamp),
        event.event_type.as_str()
    )?;
    if let Some(id) = &event.entity_id {
        write!(w, " {id:<8}")?;
    }
    write!(w, " {}", event.data)?;
    if let Some(agent) = &event.agent {
        write!(w, " [{agent}]")?;
    }
    writeln!(w)?;
    if !event.files.is_empty() {
        writeln!(w, "      files: {}", event.files.join(", "))?;
    }
    Ok(())
}

fn render_text(out: &EventsOutput, w: &mut dyn Write) -> io::Result<()> {
    if out.events.is_empty() {
        return writeln!(w, "No matching events.");
    }
    for event in &out.events {
        write_event(w, event)?;
    }
    writeln!(w, "({} of {} events)", out.events.len(), out.total)
}

pub fn run_events(args: &EventsArgs, project: &Project, output: OutputMode) -> anyhow::Result<()> {
    let filter = args.filter();
    let doc = project.load()?.epic;
    let out = EventsOutput {
        total: doc.events.len(),
        events: query::recent_events(&doc, &filter),
    };
    render(output, &out, render_text)
}
