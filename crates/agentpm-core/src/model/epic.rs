//! The epic document: root container plus ID lookups.
//!
//! Every mutation of phases, tasks, and tests goes through
//! [`crate::engine`] (single transitions) or [`crate::batch`]; the mutable
//! lookups here are crate-private for that reason. The only public writers
//! are [`Epic::append_event`] and [`Epic::update_current_state`].

use super::Timestamp;
use super::entity::{Phase, Task, Test};
use super::event::Event;
use super::status::Status;
use serde::Serialize;

/// Derived pointer to the active work plus a suggested next step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct CurrentState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_task: Option<String>,
    pub next_action: String,
}

/// Root of the document tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct Epic {
    pub id: String,
    pub name: String,
    pub status: Status,
    pub created_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub assignee: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_state: Option<CurrentState>,
    pub phases: Vec<Phase>,
    pub tasks: Vec<Task>,
    pub tests: Vec<Test>,
    pub events: Vec<Event>,
}

impl Epic {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn find_phase(&self, id: &str) -> Option<&Phase> {
        self.phases.iter().find(|p| p.id == id)
    }

    #[must_use]
    pub fn find_task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    #[must_use]
    pub fn find_test(&self, id: &str) -> Option<&Test> {
        self.tests.iter().find(|t| t.id == id)
    }

    pub(crate) fn find_phase_mut(&mut self, id: &str) -> Option<&mut Phase> {
        self.phases.iter_mut().find(|p| p.id == id)
    }

    pub(crate) fn find_task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    pub(crate) fn find_test_mut(&mut self, id: &str) -> Option<&mut Test> {
        self.tests.iter_mut().find(|t| t.id == id)
    }

    /// The first `wip` phase in document order.
    ///
    /// Uniqueness is an engine guarantee; a hand-edited document may hold
    /// several, which `check` reports.
    #[must_use]
    pub fn active_phase(&self) -> Option<&Phase> {
        self.phases.iter().find(|p| p.status == Status::Wip)
    }

    #[must_use]
    pub fn active_task_in(&self, phase_id: &str) -> Option<&Task> {
        self.tasks
            .iter()
            .find(|t| t.phase_id == phase_id && t.status == Status::Wip)
    }

    /// Position of a phase in document order.
    #[must_use]
    pub fn phase_index(&self, phase_id: &str) -> Option<usize> {
        self.phases.iter().position(|p| p.id == phase_id)
    }

    /// Phases strictly before `phase_id`.
    #[must_use]
    pub fn earlier_phases(&self, phase_id: &str) -> &[Phase] {
        match self.phase_index(phase_id) {
            Some(idx) => &self.phases[..idx],
            None => &[],
        }
    }

    pub fn tasks_in<'a>(&'a self, phase_id: &'a str) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks.iter().filter(move |t| t.phase_id == phase_id)
    }

    pub fn tests_in_phase<'a>(&'a self, phase_id: &'a str) -> impl Iterator<Item = &'a Test> + 'a {
        self.tests.iter().filter(move |t| t.phase_id == phase_id)
    }

    pub fn tests_for_task<'a>(&'a self, task_id: &'a str) -> impl Iterator<Item = &'a Test> + 'a {
        self.tests.iter().filter(move |t| t.task_id == task_id)
    }

    pub fn failing_tests(&self) -> impl Iterator<Item = &Test> {
        self.tests.iter().filter(|t| t.status.is_failing())
    }

    /// Append unconditionally; the caller supplies the timestamp.
    pub fn append_event(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn update_current_state(
        &mut self,
        phase_id: Option<String>,
        task_id: Option<String>,
        next_action: impl Into<String>,
    ) {
        self.current_state = Some(CurrentState {
            active_phase: phase_id,
            active_task: task_id,
            next_action: next_action.into(),
        });
    }
}
