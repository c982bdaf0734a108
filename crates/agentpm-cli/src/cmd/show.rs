//! `agentpm show`: One phase, task, or test with its context.

use crate::cmd::events::write_event;
use crate::cmd::transition::TargetArgs;
use crate::context::Project;
use crate::output::{OutputMode, kv, render, rule, section};
use agentpm_core::model::{EntityKind, Event, Timestamp, format_timestamp};
use agentpm_core::query::{self, Detail, TaskRow, TestRow};
use clap::Args;
use std::io::{self, Write};

#[derive(Args, Debug)]
pub struct ShowArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Include the entity's event history.
    #[arg(long)]
    pub full: bool,
}

fn write_stamp(
    w: &mut dyn Write,
    key: &str,
    at: Option<&Timestamp>,
) -> io::Result<()> {
    match at {
        Some(ts) => kv(w, key, format_timestamp(ts)),
        None => Ok(()),
    }
}

fn write_text_block(w: &mut dyn Write, key: &str, body: &str) -> io::Result<()> {
    if body.trim().is_empty() {
        return Ok(());
    }
    writeln!(w)?;
    writeln!(w, "{key}:")?;
    for line in body.trim().lines() {
        writeln!(w, "  {}", line.trim_end())?;
    }
    Ok(())
}

fn write_tasks(w: &mut dyn Write, tasks: &[TaskRow]) -> io::Result<()> {
    if tasks.is_empty() {
        return Ok(());
    }
    writeln!(w)?;
    section(w, &format!("Tasks ({})", tasks.len()))?;
    for task in tasks {
        writeln!(w, "  {:<8} {:<10} {}", task.id, task.status.to_string(), task.name)?;
    }
    Ok(())
}

fn write_tests(w: &mut dyn Write, tests: &[TestRow]) -> io::Result<()> {
    if tests.is_empty() {
        return Ok(());
    }
    writeln!(w)?;
    section(w, &format!("Tests ({})", tests.len()))?;
    for test in tests {
        write!(w, "  {:<10} {:<12} {}", test.id, test.status.to_string(), test.name)?;
        if let Some(note) = &test.note {
            write!(w, " ({note})")?;
        }
        writeln!(w)?;
    }
    Ok(())
}

fn write_events(w: &mut dyn Write, events: &[Event]) -> io::Result<()> {
    if events.is_empty() {
        return Ok(());
    }
    writeln!(w)?;
    section(w, &format!("Events ({})", events.len()))?;
    for event in events {
        write_event(w, event)?;
    }
    Ok(())
}

fn render_text(detail: &Detail, w: &mut dyn Write) -> io::Result<()> {
    match detail {
        Detail::Phase(d) => {
            let p = &d.phase;
            writeln!(w, "Phase {}: {} [{}]", p.id, p.name, p.status)?;
            rule(w)?;
            kv(
                w,
                "progress",
                format!(
                    "{}/{} tasks done, {}/{} tests passing",
                    d.progress.tasks_done,
                    d.progress.tasks_total,
                    d.progress.tests_passing,
                    d.progress.tests_total
                ),
            )?;
            write_stamp(w, "started", p.started_at.as_ref())?;
            write_stamp(w, "completed", p.completed_at.as_ref())?;
            write_text_block(w, "Description", &p.description)?;
            write_text_block(w, "Deliverables", &p.deliverables)?;
            write_tasks(w, &d.tasks)?;
            write_tests(w, &d.tests)?;
            write_events(w, &d.events)
        }
        Detail::Task(d) => {
            let t = &d.task;
            writeln!(w, "Task {}: {} [{}]", t.id, t.name, t.status)?;
            rule(w)?;
            kv(w, "phase", format!("{} {} [{}]", d.phase.id, d.phase.name, d.phase.status))?;
            if !t.assignee.is_empty() {
                kv(w, "assignee", &t.assignee)?;
            }
            write_stamp(w, "started", t.started_at.as_ref())?;
            write_stamp(w, "completed", t.completed_at.as_ref())?;
            write_stamp(w, "cancelled", t.cancelled_at.as_ref())?;
            if let Some(reason) = &t.cancellation_reason {
                kv(w, "reason", reason)?;
            }
            write_text_block(w, "Description", &t.description)?;
            write_text_block(w, "Acceptance criteria", &t.acceptance_criteria)?;
            write_tests(w, &d.tests)?;
            write_events(w, &d.events)
        }
        Detail::Test(d) => {
            let t = &d.test;
            writeln!(w, "Test {}: {} [{}]", t.id, t.name, t.status)?;
            rule(w)?;
            kv(w, "task", format!("{} {} [{}]", d.task.id, d.task.name, d.task.status))?;
            kv(w, "phase", format!("{} {}", d.phase.id, d.phase.name))?;
            write_stamp(w, "started", t.started_at.as_ref())?;
            write_stamp(w, "passed", t.passed_at.as_ref())?;
            write_stamp(w, "failed", t.failed_at.as_ref())?;
            write_stamp(w, "cancelled", t.cancelled_at.as_ref())?;
            if let Some(note) = &t.failure_note {
                kv(w, "failure", note)?;
            }
            if let Some(reason) = &t.cancellation_reason {
                kv(w, "reason", reason)?;
            }
            write_text_block(w, "Description", &t.description)?;
            write_events(w, &d.events)
        }
    }
}

pub fn run_show(args: &ShowArgs, project: &Project, output: OutputMode) -> anyhow::Result<()> {
    let (kind, id) = args.target.resolve()?;
    let doc = project.load()?.epic;
    if kind == EntityKind::Epic {
        return render(output, &query::status_summary(&doc), |s, w| {
            writeln!(w, "Epic {}: {} [{}]", s.epic_id, s.epic_name, s.status)?;
            rule(w)?;
            kv(w, "phases", format!("{}/{} done", s.phases_done, s.phases_total))?;
            write_text_block(w, "Description", &doc.description)?;
            writeln!(w)?;
            writeln!(w, "next: {}", s.current_state.next_action)
        });
    }
    let detail = query::show(&doc, kind, &id, args.full)?;
    render(output, &detail, render_text)
}
