//! Read-only views over the document: status, current, pending, failing,
//! events, show, handoff.
//!
//! Views own their data so the CLI can serialize them to JSON or XML as-is.

use crate::engine::current;
use crate::error::ErrorCode;
use crate::model::{
    CurrentState, EntityKind, Epic, Event, EventType, Phase, Status, Task, Test, TestStatus,
    Timestamp,
};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("{} {id} not found", .kind.label())]
    NotFound { kind: EntityKind, id: String },
}

impl QueryError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::EntityNotFound,
        }
    }
}

fn not_found(kind: EntityKind, id: &str) -> QueryError {
    QueryError::NotFound {
        kind,
        id: id.to_string(),
    }
}

/// Completion counters for a scope (epic or one phase).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub tasks_total: usize,
    pub tasks_done: usize,
    pub tasks_cancelled: usize,
    pub tasks_wip: usize,
    pub tests_total: usize,
    pub tests_passing: usize,
    pub tests_failing: usize,
    pub tests_cancelled: usize,
}

impl Progress {
    fn tally<'a>(
        tasks: impl Iterator<Item = &'a Task>,
        tests: impl Iterator<Item = &'a Test>,
    ) -> Self {
        let mut p = Self::default();
        for task in tasks {
            p.tasks_total += 1;
            match task.status {
                Status::Done => p.tasks_done += 1,
                Status::Cancelled => p.tasks_cancelled += 1,
                Status::Wip => p.tasks_wip += 1,
                Status::Pending => {}
            }
        }
        for test in tests {
            p.tests_total += 1;
            if test.status.is_passing() {
                p.tests_passing += 1;
            } else if test.status.is_failing() {
                p.tests_failing += 1;
            } else if test.status == TestStatus::Cancelled {
                p.tests_cancelled += 1;
            }
        }
        p
    }

    /// Share of tasks in a terminal state, 0-100.
    #[must_use]
    pub fn percent_complete(&self) -> u8 {
        if self.tasks_total == 0 {
            return 0;
        }
        let finished = self.tasks_done + self.tasks_cancelled;
        u8::try_from(finished * 100 / self.tasks_total).unwrap_or(100)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseRef {
    pub id: String,
    pub name: String,
    pub status: Status,
}

impl From<&Phase> for PhaseRef {
    fn from(p: &Phase) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            status: p.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRow {
    pub id: String,
    pub phase_id: String,
    pub name: String,
    pub status: Status,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub assignee: String,
}

impl From<&Task> for TaskRow {
    fn from(t: &Task) -> Self {
        Self {
            id: t.id.clone(),
            phase_id: t.phase_id.clone(),
            name: t.name.clone(),
            status: t.status,
            assignee: t.assignee.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestRow {
    pub id: String,
    pub task_id: String,
    pub phase_id: String,
    pub name: String,
    pub status: TestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl From<&Test> for TestRow {
    fn from(t: &Test) -> Self {
        Self {
            id: t.id.clone(),
            task_id: t.task_id.clone(),
            phase_id: t.phase_id.clone(),
            name: t.name.clone(),
            status: t.status,
            note: t
                .failure_note
                .clone()
                .or_else(|| t.cancellation_reason.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// status / current
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseProgress {
    pub id: String,
    pub name: String,
    pub status: Status,
    pub progress: Progress,
}

impl PhaseProgress {
    fn of(doc: &Epic, p: &Phase) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            status: p.status,
            progress: Progress::tally(doc.tasks_in(&p.id), doc.tests_in_phase(&p.id)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub epic_id: String,
    pub epic_name: String,
    pub status: Status,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub assignee: String,
    pub phases_done: usize,
    pub phases_total: usize,
    pub progress: Progress,
    pub phases: Vec<PhaseProgress>,
    pub current_state: CurrentState,
}

#[must_use]
pub fn status_summary(doc: &Epic) -> StatusSummary {
    let phases = doc
        .phases
        .iter()
        .map(|p| PhaseProgress::of(doc, p))
        .collect();
    StatusSummary {
        epic_id: doc.id.clone(),
        epic_name: doc.name.clone(),
        status: doc.status,
        assignee: doc.assignee.clone(),
        phases_done: doc.phases.iter().filter(|p| p.status == Status::Done).count(),
        phases_total: doc.phases.len(),
        progress: Progress::tally(doc.tasks.iter(), doc.tests.iter()),
        phases,
        current_state: current::recompute(doc),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentView {
    pub epic_id: String,
    pub epic_status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_phase: Option<PhaseRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_task: Option<TaskRow>,
    /// Tests of the active task, or of the active phase when no task is wip.
    pub tests: Vec<TestRow>,
    pub failing_tests: Vec<TestRow>,
    pub next_action: String,
}

/// What is being worked on right now.
#[must_use]
pub fn current(doc: &Epic) -> CurrentView {
    let phase = doc.active_phase();
    let task = phase.and_then(|p| doc.active_task_in(&p.id));
    let tests = match (task, phase) {
        (Some(t), _) => doc.tests_for_task(&t.id).map(TestRow::from).collect(),
        (None, Some(p)) => doc.tests_in_phase(&p.id).map(TestRow::from).collect(),
        (None, None) => Vec::new(),
    };
    CurrentView {
        epic_id: doc.id.clone(),
        epic_status: doc.status,
        active_phase: phase.map(PhaseRef::from),
        active_task: task.map(TaskRow::from),
        tests,
        failing_tests: doc.failing_tests().map(TestRow::from).collect(),
        next_action: current::next_action(doc),
    }
}

// ---------------------------------------------------------------------------
// pending / failing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    pub tasks: Vec<TaskRow>,
    pub tests: Vec<TestRow>,
}

fn phase_filter<'a>(doc: &Epic, phase: Option<&'a str>) -> Result<Option<&'a str>, QueryError> {
    match phase {
        Some(id) if doc.find_phase(id).is_none() => Err(not_found(EntityKind::Phase, id)),
        other => Ok(other),
    }
}

/// Pending tasks and open tests, optionally limited to one phase.
///
/// # Errors
///
/// [`QueryError::NotFound`] when `phase` names an unknown phase.
pub fn pending(doc: &Epic, phase: Option<&str>) -> Result<PendingReport, QueryError> {
    let phase = phase_filter(doc, phase)?;
    let in_scope = |phase_id: &str| phase.is_none_or(|p| p == phase_id);
    Ok(PendingReport {
        phase: phase.map(str::to_string),
        tasks: doc
            .tasks
            .iter()
            .filter(|t| t.status == Status::Pending && in_scope(&t.phase_id))
            .map(TaskRow::from)
            .collect(),
        tests: doc
            .tests
            .iter()
            .filter(|t| t.status.is_open() && in_scope(&t.phase_id))
            .map(TestRow::from)
            .collect(),
    })
}

/// Tests whose latest result is failing.
///
/// # Errors
///
/// [`QueryError::NotFound`] when `phase` names an unknown phase.
pub fn failing(doc: &Epic, phase: Option<&str>) -> Result<Vec<TestRow>, QueryError> {
    let phase = phase_filter(doc, phase)?;
    Ok(doc
        .failing_tests()
        .filter(|t| phase.is_none_or(|p| p == t.phase_id))
        .map(TestRow::from)
        .collect())
}

// ---------------------------------------------------------------------------
// events
// ---------------------------------------------------------------------------

/// Filter for [`recent_events`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub limit: Option<usize>,
    pub event_type: Option<EventType>,
    pub entity_id: Option<String>,
}

/// Matching events, newest first.
#[must_use]
pub fn recent_events(doc: &Epic, filter: &EventFilter) -> Vec<Event> {
    doc.events
        .iter()
        .rev()
        .filter(|e| filter.event_type.as_ref().is_none_or(|t| *t == e.event_type))
        .filter(|e| {
            filter
                .entity_id
                .as_deref()
                .is_none_or(|id| e.entity_id.as_deref() == Some(id))
        })
        .take(filter.limit.unwrap_or(usize::MAX))
        .cloned()
        .collect()
}

fn events_for(doc: &Epic, id: &str, full: bool) -> Vec<Event> {
    if !full {
        return Vec::new();
    }
    recent_events(
        doc,
        &EventFilter {
            entity_id: Some(id.to_string()),
            ..EventFilter::default()
        },
    )
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseDetail {
    pub phase: Phase,
    pub progress: Progress,
    pub tasks: Vec<TaskRow>,
    pub tests: Vec<TestRow>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskDetail {
    pub task: Task,
    pub phase: PhaseRef,
    pub tests: Vec<TestRow>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestDetail {
    pub test: Test,
    pub task: TaskRow,
    pub phase: PhaseRef,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<Event>,
}

/// One entity with its surrounding context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Detail {
    Phase(PhaseDetail),
    Task(TaskDetail),
    Test(TestDetail),
}

/// # Errors
///
/// [`QueryError::NotFound`] for an unknown phase.
pub fn show_phase(doc: &Epic, id: &str, full: bool) -> Result<PhaseDetail, QueryError> {
    let phase = doc
        .find_phase(id)
        .ok_or_else(|| not_found(EntityKind::Phase, id))?;
    Ok(PhaseDetail {
        phase: phase.clone(),
        progress: Progress::tally(doc.tasks_in(id), doc.tests_in_phase(id)),
        tasks: doc.tasks_in(id).map(TaskRow::from).collect(),
        tests: doc.tests_in_phase(id).map(TestRow::from).collect(),
        events: events_for(doc, id, full),
    })
}

/// # Errors
///
/// [`QueryError::NotFound`] for an unknown task (or its phase).
pub fn show_task(doc: &Epic, id: &str, full: bool) -> Result<TaskDetail, QueryError> {
    let task = doc
        .find_task(id)
        .ok_or_else(|| not_found(EntityKind::Task, id))?;
    let phase = doc
        .find_phase(&task.phase_id)
        .ok_or_else(|| not_found(EntityKind::Phase, &task.phase_id))?;
    Ok(TaskDetail {
        task: task.clone(),
        phase: phase.into(),
        tests: doc.tests_for_task(id).map(TestRow::from).collect(),
        events: events_for(doc, id, full),
    })
}

/// # Errors
///
/// [`QueryError::NotFound`] for an unknown test (or its task or phase).
pub fn show_test(doc: &Epic, id: &str, full: bool) -> Result<TestDetail, QueryError> {
    let test = doc
        .find_test(id)
        .ok_or_else(|| not_found(EntityKind::Test, id))?;
    let task = doc
        .find_task(&test.task_id)
        .ok_or_else(|| not_found(EntityKind::Task, &test.task_id))?;
    let phase = doc
        .find_phase(&test.phase_id)
        .ok_or_else(|| not_found(EntityKind::Phase, &test.phase_id))?;
    Ok(TestDetail {
        test: test.clone(),
        task: task.into(),
        phase: phase.into(),
        events: events_for(doc, id, full),
    })
}

/// Dispatch on kind.
///
/// # Errors
///
/// [`QueryError::NotFound`] for an unknown entity. The epic itself is
/// reported through [`status_summary`], so `Epic` is always not-found here.
pub fn show(doc: &Epic, kind: EntityKind, id: &str, full: bool) -> Result<Detail, QueryError> {
    match kind {
        EntityKind::Phase => show_phase(doc, id, full).map(Detail::Phase),
        EntityKind::Task => show_task(doc, id, full).map(Detail::Task),
        EntityKind::Test => show_test(doc, id, full).map(Detail::Test),
        EntityKind::Epic => Err(not_found(kind, id)),
    }
}

// ---------------------------------------------------------------------------
// handoff
// ---------------------------------------------------------------------------

/// Default number of events in a handoff report.
pub const HANDOFF_EVENTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandoffReport {
    pub generated_at: Timestamp,
    pub epic_id: String,
    pub epic_name: String,
    pub status: Status,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub assignee: String,
    pub current_state: CurrentState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_phase: Option<PhaseProgress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_task: Option<TaskRow>,
    pub failing_tests: Vec<TestRow>,
    pub recent_events: Vec<Event>,
}

/// Summary for the next agent picking up the epic.
#[must_use]
pub fn handoff(doc: &Epic, generated_at: Timestamp, events: usize) -> HandoffReport {
    let phase = doc.active_phase();
    HandoffReport {
        generated_at,
        epic_id: doc.id.clone(),
        epic_name: doc.name.clone(),
        status: doc.status,
        assignee: doc.assignee.clone(),
        current_state: current::recompute(doc),
        active_phase: phase.map(|p| PhaseProgress::of(doc, p)),
        active_task: phase
            .and_then(|p| doc.active_task_in(&p.id))
            .map(TaskRow::from),
        failing_tests: doc.failing_tests().map(TestRow::from).collect(),
        recent_events: recent_events(
            doc,
            &EventFilter {
                limit: Some(events),
                ..EventFilter::default()
            },
        ),
    }
}
