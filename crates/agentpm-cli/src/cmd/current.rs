//! `agentpm current`: What is active right now and what to do next.

use crate::context::Project;
use crate::output::{OutputMode, render, section};
use agentpm_core::query::{self, CurrentView, TestRow};
use std::io::{self, Write};

fn write_test(w: &mut dyn Write, test: &TestRow) -> io::Result<()> {
    write!(w, "  {:<10} {:<10} {}", test.id, test.status.to_string(), test.name)?;
    if let Some(note) = &test.note {
        write!(w, " ({note})")?;
    }
    writeln!(w)
}

fn render_text(view: &CurrentView, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "Epic {} [{}]", view.epic_id, view.epic_status)?;
    match &view.active_phase {
        Some(phase) => writeln!(w, "phase: {} {} [{}]", phase.id, phase.name, phase.status)?,
        None => writeln!(w, "phase: none active")?,
    }
    match &view.active_task {
        Some(task) => writeln!(w, "task:  {} {} [{}]", task.id, task.name, task.status)?,
        None => writeln!(w, "task:  none active")?,
    }
    if !view.tests.is_empty() {
        section(w, "Tests")?;
        for test in &view.tests {
            write_test(w, test)?;
        }
    }
    if !view.failing_tests.is_empty() {
        section(w, "Failing")?;
        for test in &view.failing_tests {
            write_test(w, test)?;
        }
    }
    writeln!(w)?;
    writeln!(w, "next: {}", view.next_action)
}

pub fn run_current(project: &Project, output: OutputMode) -> anyhow::Result<()> {
    let doc = project.load()?.epic;
    render(output, &query::current(&doc), render_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentpm_core::model::{Epic, Phase, Status, Task, Test, TestStatus};

    #[test]
    fn shows_active_task_and_failures() {
        let mut doc = Epic::new("3", "Importer");
        doc.status = Status::Wip;
        let mut phase = Phase::new("1A", "Read");
        phase.status = Status::Wip;
        doc.phases = vec![phase];
        doc.tasks = vec![Task::new("1A_1", "1A", "CSV reader").with_status(Status::Wip)];
        doc.tests = vec![
            Test::new("1A_T1", "1A_1", "1A", "reads header").with_status(TestStatus::FAILING),
        ];

        let mut buf = Vec::new();
        render_text(&query::current(&doc), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("task:  1A_1 CSV reader [wip]"));
        assert!(text.contains("Failing"));
        assert!(text.contains("1A_T1"));
    }

    #[test]
    fn idle_epic_says_none_active() {
        let doc = Epic::new("3", "Importer");
        let mut buf = Vec::new();
        render_text(&query::current(&doc), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("phase: none active"));
    }
}
