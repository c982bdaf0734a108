//! Structural validation of a loaded document (`agentpm validate`).
//!
//! The engine keeps these properties true for documents it writes; hand
//! edits can break them, and this is where that gets reported.

use crate::engine::current;
use crate::model::{EntityKind, Epic, Status, Timestamp};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    SingleActivePhase,
    SingleActiveTask,
    DanglingReference,
    CurrentStateConsistent,
    TimestampOrder,
    DuplicateId,
    // warnings
    TaskWithoutTests,
    EmptyPhase,
    StaleCurrentState,
    WipOutsideActivePhase,
}

impl Rule {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SingleActivePhase => "single_active_phase",
            Self::SingleActiveTask => "single_active_task",
            Self::DanglingReference => "dangling_reference",
            Self::CurrentStateConsistent => "current_state_consistent",
            Self::TimestampOrder => "timestamp_order",
            Self::DuplicateId => "duplicate_id",
            Self::TaskWithoutTests => "task_without_tests",
            Self::EmptyPhase => "empty_phase",
            Self::StaleCurrentState => "stale_current_state",
            Self::WipOutsideActivePhase => "wip_outside_active_phase",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub rule: Rule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    pub message: String,
}

impl Finding {
    fn new(rule: Rule, entity: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            rule,
            entity: entity.map(str::to_string),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub valid: bool,
    pub errors: Vec<Finding>,
    pub warnings: Vec<Finding>,
}

impl CheckReport {
    #[must_use]
    pub fn has_rule(&self, rule: Rule) -> bool {
        self.errors.iter().chain(&self.warnings).any(|f| f.rule == rule)
    }
}

/// Check every structural rule; `valid` is false when any error was found.
#[must_use]
pub fn check(doc: &Epic) -> CheckReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    unique_ids(doc, &mut errors);
    references(doc, &mut errors);
    active_counts(doc, &mut errors);
    current_state(doc, &mut errors, &mut warnings);
    timestamps(doc, &mut errors);
    soft_checks(doc, &mut warnings);

    CheckReport {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

fn unique_ids(doc: &Epic, errors: &mut Vec<Finding>) {
    let lists: [(EntityKind, Vec<&str>); 3] = [
        (EntityKind::Phase, doc.phases.iter().map(|p| p.id.as_str()).collect()),
        (EntityKind::Task, doc.tasks.iter().map(|t| t.id.as_str()).collect()),
        (EntityKind::Test, doc.tests.iter().map(|t| t.id.as_str()).collect()),
    ];
    for (kind, ids) in lists {
        let mut seen = HashSet::new();
        for id in ids {
            if !seen.insert(id) {
                errors.push(Finding::new(
                    Rule::DuplicateId,
                    Some(id),
                    format!("duplicate {kind} ID {id}"),
                ));
            }
        }
    }
}

fn references(doc: &Epic, errors: &mut Vec<Finding>) {
    for task in &doc.tasks {
        if doc.find_phase(&task.phase_id).is_none() {
            errors.push(Finding::new(
                Rule::DanglingReference,
                Some(&task.id),
                format!("task {} references unknown phase {}", task.id, task.phase_id),
            ));
        }
    }
    for test in &doc.tests {
        match doc.find_task(&test.task_id) {
            None => errors.push(Finding::new(
                Rule::DanglingReference,
                Some(&test.id),
                format!("test {} references unknown task {}", test.id, test.task_id),
            )),
            Some(task) if task.phase_id != test.phase_id => errors.push(Finding::new(
                Rule::DanglingReference,
                Some(&test.id),
                format!(
                    "test {} is in phase {} but its task {} is in phase {}",
                    test.id, test.phase_id, task.id, task.phase_id
                ),
            )),
            Some(_) => {}
        }
    }
}

fn active_counts(doc: &Epic, errors: &mut Vec<Finding>) {
    let wip_phases: Vec<&str> = doc
        .phases
        .iter()
        .filter(|p| p.status == Status::Wip)
        .map(|p| p.id.as_str())
        .collect();
    if wip_phases.len() > 1 {
        errors.push(Finding::new(
            Rule::SingleActivePhase,
            None,
            format!("more than one phase is wip: {}", wip_phases.join(", ")),
        ));
    }

    for phase in &doc.phases {
        let wip_tasks: Vec<&str> = doc
            .tasks_in(&phase.id)
            .filter(|t| t.status == Status::Wip)
            .map(|t| t.id.as_str())
            .collect();
        if wip_tasks.len() > 1 {
            errors.push(Finding::new(
                Rule::SingleActiveTask,
                Some(&phase.id),
                format!(
                    "phase {} has more than one wip task: {}",
                    phase.id,
                    wip_tasks.join(", ")
                ),
            ));
        }
    }
}

fn current_state(doc: &Epic, errors: &mut Vec<Finding>, warnings: &mut Vec<Finding>) {
    let Some(state) = &doc.current_state else {
        return;
    };

    if let Some(phase_id) = &state.active_phase {
        let wip = doc
            .find_phase(phase_id)
            .is_some_and(|p| p.status == Status::Wip);
        if !wip {
            errors.push(Finding::new(
                Rule::CurrentStateConsistent,
                Some(phase_id),
                format!("current_state.active_phase {phase_id} is not a wip phase"),
            ));
        }
    }
    if let Some(task_id) = &state.active_task {
        let consistent = doc.find_task(task_id).is_some_and(|t| {
            t.status == Status::Wip && state.active_phase.as_deref() == Some(t.phase_id.as_str())
        });
        if !consistent {
            errors.push(Finding::new(
                Rule::CurrentStateConsistent,
                Some(task_id),
                format!(
                    "current_state.active_task {task_id} is not a wip task in the active phase"
                ),
            ));
        }
    }

    if current::recompute(doc) != *state {
        warnings.push(Finding::new(
            Rule::StaleCurrentState,
            None,
            "current_state does not match the document; the next transition will refresh it",
        ));
    }
}

fn order(
    errors: &mut Vec<Finding>,
    entity: &str,
    started: Option<Timestamp>,
    ended: Option<Timestamp>,
    field: &str,
) {
    if let (Some(started), Some(ended)) = (started, ended)
        && ended < started
    {
        errors.push(Finding::new(
            Rule::TimestampOrder,
            Some(entity),
            format!("{entity}: {field} precedes started_at"),
        ));
    }
}

fn timestamps(doc: &Epic, errors: &mut Vec<Finding>) {
    order(errors, &doc.id, doc.started_at, doc.completed_at, "completed_at");
    for p in &doc.phases {
        order(errors, &p.id, p.started_at, p.completed_at, "completed_at");
    }
    for t in &doc.tasks {
        order(errors, &t.id, t.started_at, t.completed_at, "completed_at");
        order(errors, &t.id, t.started_at, t.cancelled_at, "cancelled_at");
    }
    for t in &doc.tests {
        order(errors, &t.id, t.started_at, t.passed_at, "passed_at");
        order(errors, &t.id, t.started_at, t.failed_at, "failed_at");
        order(errors, &t.id, t.started_at, t.cancelled_at, "cancelled_at");
    }
}

fn soft_checks(doc: &Epic, warnings: &mut Vec<Finding>) {
    for phase in &doc.phases {
        if doc.tasks_in(&phase.id).next().is_none() {
            warnings.push(Finding::new(
                Rule::EmptyPhase,
                Some(&phase.id),
                format!("phase {} has no tasks", phase.id),
            ));
        }
    }
    for task in &doc.tasks {
        if task.status != Status::Cancelled && doc.tests_for_task(&task.id).next().is_none() {
            warnings.push(Finding::new(
                Rule::TaskWithoutTests,
                Some(&task.id),
                format!("task {} has no tests", task.id),
            ));
        }
        let phase_active = doc
            .find_phase(&task.phase_id)
            .is_some_and(|p| p.status == Status::Wip);
        if task.status == Status::Wip && !phase_active {
            warnings.push(Finding::new(
                Rule::WipOutsideActivePhase,
                Some(&task.id),
                format!("task {} is wip but phase {} is not", task.id, task.phase_id),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CurrentState, Phase, Task, Test, parse_timestamp};

    fn clean() -> Epic {
        let mut epic = Epic::new("1", "Clean");
        epic.phases = vec![Phase::new("1A", "One").with_status(Status::Wip)];
        epic.tasks = vec![Task::new("1A_1", "1A", "Work").with_status(Status::Wip)];
        epic.tests = vec![Test::new("1A_T1", "1A_1", "1A", "works")];
        epic.current_state = Some(current::recompute(&epic));
        epic
    }

    #[test]
    fn clean_document_passes() {
        let report = check(&clean());
        assert!(report.valid, "{report:?}");
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    }

    #[test]
    fn detects_two_active_phases_and_tasks() {
        let mut epic = clean();
        epic.phases.push(Phase::new("2A", "Two").with_status(Status::Wip));
        epic.tasks.push(Task::new("1A_2", "1A", "More").with_status(Status::Wip));
        let report = check(&epic);
        assert!(!report.valid);
        assert!(report.has_rule(Rule::SingleActivePhase));
        assert!(report.has_rule(Rule::SingleActiveTask));
    }

    #[test]
    fn detects_inconsistent_current_state() {
        let mut epic = clean();
        epic.current_state = Some(CurrentState {
            active_phase: Some("1A".into()),
            active_task: Some("1A_9".into()),
            next_action: String::new(),
        });
        let report = check(&epic);
        assert!(report.has_rule(Rule::CurrentStateConsistent));
        assert!(report.has_rule(Rule::StaleCurrentState));
    }

    #[test]
    fn detects_reversed_timestamps() {
        let mut epic = clean();
        epic.tasks[0].started_at = Some(parse_timestamp("2025-01-02T00:00:00Z").unwrap());
        epic.tasks[0].completed_at = Some(parse_timestamp("2025-01-01T00:00:00Z").unwrap());
        let report = check(&epic);
        assert!(report.has_rule(Rule::TimestampOrder));
        assert_eq!(report.errors[0].entity.as_deref(), Some("1A_1"));
    }

    #[test]
    fn detects_duplicates_and_dangling() {
        let mut epic = clean();
        epic.tests.push(Test::new("1A_T1", "1A_1", "1A", "dup"));
        epic.tests.push(Test::new("1A_T2", "9Z_1", "1A", "orphan"));
        let report = check(&epic);
        assert!(report.has_rule(Rule::DuplicateId));
        assert!(report.has_rule(Rule::DanglingReference));
    }

    #[test]
    fn soft_warnings() {
        let mut epic = clean();
        epic.phases.push(Phase::new("2A", "Empty"));
        epic.tasks.push(Task::new("1A_2", "1A", "Untested"));
        epic.current_state = Some(current::recompute(&epic));
        let report = check(&epic);
        assert!(report.valid);
        assert!(report.has_rule(Rule::EmptyPhase));
        assert!(report.has_rule(Rule::TaskWithoutTests));
    }
}
