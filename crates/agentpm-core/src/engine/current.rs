//! `current_state` derivation.
//!
//! The state is recomputed from the whole document after every successful
//! transition, so the active-task pointer can never disagree with task
//! statuses.

use crate::model::{CurrentState, Epic, Status};

/// Derive the active phase, active task, and suggested next action.
///
/// Next-action precedence: failing tests, the active task, the next pending
/// task in the active phase, completing the active phase, the next pending
/// phase, and finally completing the epic.
#[must_use]
pub fn recompute(doc: &Epic) -> CurrentState {
    let active_phase = doc.active_phase();
    let active_task = active_phase.and_then(|p| doc.active_task_in(&p.id));

    CurrentState {
        active_phase: active_phase.map(|p| p.id.clone()),
        active_task: active_task.map(|t| t.id.clone()),
        next_action: next_action(doc),
    }
}

/// The deterministic next-action string for `doc`.
#[must_use]
pub fn next_action(doc: &Epic) -> String {
    if doc.status == Status::Done {
        return "Epic complete".to_string();
    }

    let failing: Vec<&str> = doc.failing_tests().map(|t| t.id.as_str()).collect();
    if !failing.is_empty() {
        return format!("Fix failing tests: {}", failing.join(", "));
    }

    if let Some(phase) = doc.active_phase() {
        if let Some(task) = doc.active_task_in(&phase.id) {
            return format!("Continue work on: {}", task.name);
        }
        if let Some(task) = doc
            .tasks_in(&phase.id)
            .find(|t| t.status == Status::Pending)
        {
            return format!("Start next task: {}", task.name);
        }
        return "Complete current phase".to_string();
    }

    if let Some(phase) = doc.phases.iter().find(|p| p.status == Status::Pending) {
        return format!("Start next phase: {}", phase.name);
    }

    "Epic ready for completion".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Phase, Task, Test, TestStatus};

    fn base() -> Epic {
        let mut epic = Epic::new("1", "Demo");
        epic.phases = vec![
            Phase::new("1A", "Build").with_status(Status::Wip),
            Phase::new("2A", "Ship"),
        ];
        epic.tasks = vec![
            Task::new("1A_1", "1A", "Parser"),
            Task::new("1A_2", "1A", "Printer"),
        ];
        epic
    }

    #[test]
    fn failing_tests_take_precedence() {
        let mut epic = base();
        epic.tasks[0].status = Status::Wip;
        epic.tests = vec![
            Test::new("1A_T1", "1A_1", "1A", "a").with_status(TestStatus::FAILING),
            Test::new("1A_T2", "1A_1", "1A", "b").with_status(TestStatus::FAILING),
        ];
        assert_eq!(next_action(&epic), "Fix failing tests: 1A_T1, 1A_T2");
    }

    #[test]
    fn active_task_then_next_pending_task() {
        let mut epic = base();
        epic.tasks[0].status = Status::Wip;
        let state = recompute(&epic);
        assert_eq!(state.active_phase.as_deref(), Some("1A"));
        assert_eq!(state.active_task.as_deref(), Some("1A_1"));
        assert_eq!(state.next_action, "Continue work on: Parser");

        epic.tasks[0].status = Status::Done;
        let state = recompute(&epic);
        assert_eq!(state.active_task, None);
        assert_eq!(state.next_action, "Start next task: Printer");
    }

    #[test]
    fn phase_with_no_pending_tasks_should_complete() {
        let mut epic = base();
        epic.tasks[0].status = Status::Done;
        epic.tasks[1].status = Status::Cancelled;
        assert_eq!(next_action(&epic), "Complete current phase");
    }

    #[test]
    fn next_phase_then_epic_completion() {
        let mut epic = base();
        epic.phases[0].status = Status::Done;
        assert_eq!(next_action(&epic), "Start next phase: Ship");

        epic.phases[1].status = Status::Done;
        assert_eq!(next_action(&epic), "Epic ready for completion");

        epic.status = Status::Done;
        assert_eq!(next_action(&epic), "Epic complete");
    }
}
