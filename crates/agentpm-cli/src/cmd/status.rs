//! `agentpm status`: Epic overview with per-phase progress.

use crate::context::Project;
use crate::output::{OutputMode, kv, render, rule};
use agentpm_core::query::{self, StatusSummary};
use std::io::{self, Write};

fn render_text(s: &StatusSummary, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "Epic {}: {} [{}]", s.epic_id, s.epic_name, s.status)?;
    rule(w)?;
    if !s.assignee.is_empty() {
        kv(w, "assignee", &s.assignee)?;
    }
    kv(w, "phases", &format!("{}/{} done", s.phases_done, s.phases_total))?;
    kv(
        w,
        "tasks",
        &format!(
            "{}/{} done ({}%)",
            s.progress.tasks_done,
            s.progress.tasks_total,
            s.progress.percent_complete()
        ),
    )?;
    kv(
        w,
        "tests",
        &format!(
            "{} passing, {} failing, {} total",
            s.progress.tests_passing, s.progress.tests_failing, s.progress.tests_total
        ),
    )?;
    writeln!(w)?;
    for phase in &s.phases {
        writeln!(
            w,
            "  {:<6} {:<10} {:>3}%  {}",
            phase.id,
            phase.status.to_string(),
            phase.progress.percent_complete(),
            phase.name
        )?;
    }
    writeln!(w)?;
    writeln!(w, "next: {}", s.current_state.next_action)
}

pub fn run_status(project: &Project, output: OutputMode) -> anyhow::Result<()> {
    let doc = project.load()?.epic;
    render(output, &query::status_summary(&doc), render_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentpm_core::model::{Epic, Phase, Status, Task};

    #[test]
    fn text_lists_phases_and_next_action() {
        let mut doc = Epic::new("7", "Renderer");
        doc.status = Status::Wip;
        let mut phase = Phase::new("1A", "Scaffold");
        phase.status = Status::Wip;
        doc.phases = vec![phase, Phase::new("1B", "Polish")];
        doc.tasks = vec![Task::new("1A_1", "1A", "Layout")];

        let summary = query::status_summary(&doc);
        let mut buf = Vec::new();
        render_text(&summary, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Epic 7: Renderer [wip]"));
        assert!(text.contains("phases"));
        assert!(text.contains("1B"));
        assert!(text.contains("next: "));
    }
}
