//! `agentpm pending` and `agentpm failing`: Outstanding work lists.

use crate::context::Project;
use crate::output::{OutputMode, render, section};
use agentpm_core::query::{self, PendingReport, TestRow};
use clap::Args;
use serde::Serialize;
use std::io::{self, Write};

#[derive(Args, Debug, Default)]
pub struct PhaseFilterArgs {
    /// Only this phase.
    #[arg(long, value_name = "PHASE_ID")]
    pub phase: Option<String>,
}

impl PhaseFilterArgs {
    fn phase(&self) -> Option<&str> {
        self.phase.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }
}

#[derive(Debug, Serialize)]
struct FailingOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    phase: Option<String>,
    tests: Vec<TestRow>,
}

fn write_tests(w: &mut dyn Write, tests: &[TestRow]) -> io::Result<()> {
    for test in tests {
        write!(
            w,
            "  {:<10} {:<8} {:<12} {}",
            test.id,
            test.task_id,
            test.status.to_string(),
            test.name
        )?;
        if let Some(note) = &test.note {
            write!(w, " ({note})")?;
        }
        writeln!(w)?;
    }
    Ok(())
}

fn render_pending(report: &PendingReport, w: &mut dyn Write) -> io::Result<()> {
    if report.tasks.is_empty() && report.tests.is_empty() {
        return writeln!(w, "Nothing pending.");
    }
    section(w, &format!("Pending tasks ({})", report.tasks.len()))?;
    for task in &report.tasks {
        writeln!(w, "  {:<8} {:<6} {}", task.id, task.phase_id, task.name)?;
    }
    section(w, &format!("Open tests ({})", report.tests.len()))?;
    write_tests(w, &report.tests)
}

fn render_failing(out: &FailingOutput, w: &mut dyn Write) -> io::Result<()> {
    if out.tests.is_empty() {
        return writeln!(w, "No failing tests.");
    }
    section(w, &format!("Failing tests ({})", out.tests.len()))?;
    write_tests(w, &out.tests)
}

pub fn run_pending(
    args: &PhaseFilterArgs,
    project: &Project,
    output: OutputMode,
) -> anyhow::Result<()> {
    let doc = project.load()?.epic;
    let report = query::pending(&doc, args.phase())?;
    render(output, &report, render_pending)
}

pub fn run_failing(
    args: &PhaseFilterArgs,
    project: &Project,
    output: OutputMode,
) -> anyhow::Result<()> {
    let doc = project.load()?.epic;
    let out = FailingOutput {
        phase: args.phase().map(str::to_string),
        tests: query::failing(&doc, args.phase())?,
    };
    render(output, &out, render_failing)
}
