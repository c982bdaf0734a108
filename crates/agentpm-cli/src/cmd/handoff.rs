//! `agentpm handoff`: A summary for the next agent picking up the epic.

use crate::cmd::events::write_event;
use crate::context::Project;
use crate::output::{OutputMode, kv, render, rule, section};
use agentpm_core::model::format_timestamp;
use agentpm_core::query::{self, HANDOFF_EVENTS, HandoffReport};
use clap::Args;
use std::io::{self, Write};

#[derive(Args, Debug)]
pub struct HandoffArgs {
    /// Number of recent events to include.
    #[arg(long, default_value_t = HANDOFF_EVENTS)]
    pub events: usize,
}

fn render_text(r: &HandoffReport, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "Handoff: epic {} {} [{}]", r.epic_id, r.epic_name, r.status)?;
    rule(w)?;
    kv(w, "generated", format_timestamp(&r.generated_at))?;
    if !r.assignee.is_empty() {
        kv(w, "assignee", &r.assignee)?;
    }
    match &r.active_phase {
        Some(p) => kv(
            w,
            "phase",
            format!(
                "{} {} ({}/{} tasks done)",
                p.id, p.name, p.progress.tasks_done, p.progress.tasks_total
            ),
        )?,
        None => kv(w, "phase", "none active")?,
    }
    match &r.active_task {
        Some(t) => kv(w, "task", format!("{} {}", t.id, t.name))?,
        None => kv(w, "task", "none active")?,
    }
    kv(w, "next", &r.current_state.next_action)?;

    if !r.failing_tests.is_empty() {
        writeln!(w)?;
        section(w, &format!("Failing tests ({})", r.failing_tests.len()))?;
        for test in &r.failing_tests {
            write!(w, "  {:<10} {}", test.id, test.name)?;
            if let Some(note) = &test.note {
                write!(w, " ({note})")?;
            }
            writeln!(w)?;
        }
    }
    if !r.recent_events.is_empty() {
        writeln!(w)?;
        section(w, "Recent events")?;
        for event in &r.recent_events {
            write_event(w, event)?;
        }
    }
    Ok(())
}

pub fn run_handoff(args: &HandoffArgs, project: &Project, output: OutputMode) -> anyhow::Result<()> {
    let doc = project.load()?.epic;
    let report = query::handoff(&doc, project.now, args.events);
    render(output, &report, render_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentpm_core::model::{Epic, Event, EventType, parse_timestamp};
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: HandoffArgs,
    }

    #[test]
    fn default_event_count() {
        assert_eq!(Wrapper::parse_from(["test"]).args.events, HANDOFF_EVENTS);
        assert_eq!(Wrapper::parse_from(["test", "--events", "3"]).args.events, 3);
    }

    #[test]
    fn text_includes_recent_events() {
        let at = parse_timestamp("2025-06-01T12:00:00Z").unwrap();
        let mut doc = Epic::new("9", "Sync");
        doc.append_event(Event::new(at, EventType::Decision, "use quick-xml"));

        let report = query::handoff(&doc, at, 5);
        let mut buf = Vec::new();
        render_text(&report, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Handoff: epic 9 Sync"));
        assert!(text.contains("generated:     2025-06-01T12:00:00Z"));
        assert!(text.contains("use quick-xml"));
        assert!(text.contains("task:          none active"));
    }
}
