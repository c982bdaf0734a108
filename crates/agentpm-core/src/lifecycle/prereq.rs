//! Cross-entity prerequisites.
//!
//! Each predicate inspects an immutable document and reports every unmet
//! condition in evaluation order. The first entry is the primary failure.

use super::{TransitionRequest, Verb};
use crate::model::{EntityKind, Epic, Phase, Status, Task, Test};
use std::fmt;

/// A prerequisite that does not hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unmet {
    /// Another phase is already `wip` (one active phase at a time).
    OtherPhaseActive { phase_id: String },
    /// Tests in earlier phases are not resolved.
    PhaseTestPrerequisite { test_ids: Vec<String> },
    /// The entity's phase is not the active phase.
    PhaseNotActive {
        phase_id: String,
        active_phase: Option<String>,
    },
    /// Another task in the same phase is `wip`.
    SiblingTaskActive { task_id: String },
    TasksNotTerminal { task_ids: Vec<String> },
    TestsNotTerminal { test_ids: Vec<String> },
    FailingTestsPresent { test_ids: Vec<String> },
    PhasesNotDone { phase_ids: Vec<String> },
    CancelReasonMissing,
    /// Resume requires an epic that was started and then paused.
    EpicNeverStarted,
}

impl Unmet {
    /// Stable predicate name used in structured output and hint matching.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::OtherPhaseActive { .. } => "other_phase_active",
            Self::PhaseTestPrerequisite { .. } => "phase_test_prerequisite",
            Self::PhaseNotActive { .. } => "phase_not_active",
            Self::SiblingTaskActive { .. } => "sibling_task_active",
            Self::TasksNotTerminal { .. } => "tasks_not_terminal",
            Self::TestsNotTerminal { .. } => "tests_not_terminal",
            Self::FailingTestsPresent { .. } => "failing_tests_present",
            Self::PhasesNotDone { .. } => "phases_not_done",
            Self::CancelReasonMissing => "cancel_reason_missing",
            Self::EpicNeverStarted => "epic_never_started",
        }
    }

    /// IDs of the entities that block the transition.
    #[must_use]
    pub fn entities(&self) -> Vec<String> {
        match self {
            Self::OtherPhaseActive { phase_id } | Self::PhaseNotActive { phase_id, .. } => {
                vec![phase_id.clone()]
            }
            Self::SiblingTaskActive { task_id } => vec![task_id.clone()],
            Self::PhaseTestPrerequisite { test_ids }
            | Self::TestsNotTerminal { test_ids }
            | Self::FailingTestsPresent { test_ids } => test_ids.clone(),
            Self::TasksNotTerminal { task_ids } => task_ids.clone(),
            Self::PhasesNotDone { phase_ids } => phase_ids.clone(),
            Self::CancelReasonMissing | Self::EpicNeverStarted => Vec::new(),
        }
    }

    /// Whether the failure is about phase membership rather than status.
    #[must_use]
    pub const fn is_phase_violation(&self) -> bool {
        matches!(self, Self::PhaseNotActive { .. })
    }
}

impl fmt::Display for Unmet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OtherPhaseActive { phase_id } => {
                write!(f, "phase {phase_id} is already active")
            }
            Self::PhaseTestPrerequisite { test_ids } => write!(
                f,
                "tests in earlier phases are not resolved: {}",
                test_ids.join(", ")
            ),
            Self::PhaseNotActive {
                phase_id,
                active_phase: Some(active),
            } => write!(
                f,
                "phase {phase_id} is not the active phase (active phase: {active})"
            ),
            Self::PhaseNotActive {
                phase_id,
                active_phase: None,
            } => write!(f, "phase {phase_id} is not active (no phase is active)"),
            Self::SiblingTaskActive { task_id } => {
                write!(f, "task {task_id} is already in progress in this phase")
            }
            Self::TasksNotTerminal { task_ids } => {
                write!(f, "tasks not done or cancelled: {}", task_ids.join(", "))
            }
            Self::TestsNotTerminal { test_ids } => {
                write!(f, "tests not finished: {}", test_ids.join(", "))
            }
            Self::FailingTestsPresent { test_ids } => {
                write!(f, "failing tests: {}", test_ids.join(", "))
            }
            Self::PhasesNotDone { phase_ids } => {
                write!(f, "phases not done: {}", phase_ids.join(", "))
            }
            Self::CancelReasonMissing => f.write_str("a cancellation reason is required"),
            Self::EpicNeverStarted => f.write_str("the epic was never started"),
        }
    }
}

/// Evaluate every prerequisite that applies to `req`.
///
/// The entity must exist; lookups that fail here yield no findings because
/// the caller already reported `not_found`.
#[must_use]
pub fn check(doc: &Epic, req: &TransitionRequest) -> Vec<Unmet> {
    match (req.kind, req.verb) {
        (EntityKind::Epic, Verb::Resume) => resume_epic(doc),
        (EntityKind::Epic, Verb::Complete) => complete_epic(doc),
        (EntityKind::Phase, Verb::Start) => doc
            .find_phase(&req.id)
            .map(|p| start_phase(doc, p, req.args.allow_failing_tests))
            .unwrap_or_default(),
        (EntityKind::Phase, Verb::Complete) => doc
            .find_phase(&req.id)
            .map(|p| complete_phase(doc, p))
            .unwrap_or_default(),
        (EntityKind::Task, Verb::Start) => doc
            .find_task(&req.id)
            .map(|t| start_task(doc, t))
            .unwrap_or_default(),
        (EntityKind::Task, Verb::Complete) => doc
            .find_task(&req.id)
            .map(|t| complete_task(doc, t, req.args.allow_open_tests))
            .unwrap_or_default(),
        (EntityKind::Test, Verb::Start | Verb::Pass | Verb::Fail) => doc
            .find_test(&req.id)
            .map(|t| test_in_active_phase(doc, t))
            .unwrap_or_default(),
        (EntityKind::Test, Verb::Cancel) => {
            if req.args.trimmed_reason().is_none() {
                vec![Unmet::CancelReasonMissing]
            } else {
                Vec::new()
            }
        }
        _ => Vec::new(),
    }
}

fn ids<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    items.map(str::to_string).collect()
}

fn resume_epic(doc: &Epic) -> Vec<Unmet> {
    if doc.started_at.is_none() {
        vec![Unmet::EpicNeverStarted]
    } else {
        Vec::new()
    }
}

fn complete_epic(doc: &Epic) -> Vec<Unmet> {
    let mut unmet = Vec::new();
    let open_phases = ids(
        doc.phases.iter().filter(|p| p.status != Status::Done).map(|e| e.id.as_str()),
    );
    if !open_phases.is_empty() {
        unmet.push(Unmet::PhasesNotDone {
            phase_ids: open_phases,
        });
    }
    let failing = ids(doc.failing_tests().map(|t| t.id.as_str()));
    if !failing.is_empty() {
        unmet.push(Unmet::FailingTestsPresent { test_ids: failing });
    }
    unmet
}

fn start_phase(doc: &Epic, phase: &Phase, allow_failing: bool) -> Vec<Unmet> {
    let mut unmet = Vec::new();
    if let Some(active) = doc
        .phases
        .iter()
        .find(|p| p.status == Status::Wip && p.id != phase.id)
    {
        unmet.push(Unmet::OtherPhaseActive {
            phase_id: active.id.clone(),
        });
    }

    let blocking: Vec<String> = doc
        .earlier_phases(&phase.id)
        .iter()
        .flat_map(|earlier| doc.tests_in_phase(&earlier.id))
        .filter(|t| !(t.status.is_resolved() || (allow_failing && t.status.is_failing())))
        .map(|t| t.id.clone())
        .collect();
    if !blocking.is_empty() {
        unmet.push(Unmet::PhaseTestPrerequisite { test_ids: blocking });
    }
    unmet
}

fn complete_phase(doc: &Epic, phase: &Phase) -> Vec<Unmet> {
    let mut unmet = Vec::new();
    let open_tasks = ids(
        doc.tasks_in(&phase.id).filter(|t| !t.status.is_terminal()).map(|e| e.id.as_str()),
    );
    if !open_tasks.is_empty() {
        unmet.push(Unmet::TasksNotTerminal {
            task_ids: open_tasks,
        });
    }
    let open_tests = ids(
        doc.tests_in_phase(&phase.id).filter(|t| t.status.is_open()).map(|e| e.id.as_str()),
    );
    if !open_tests.is_empty() {
        unmet.push(Unmet::TestsNotTerminal {
            test_ids: open_tests,
        });
    }
    let failing = ids(
        doc.tests_in_phase(&phase.id).filter(|t| t.status.is_failing()).map(|e| e.id.as_str()),
    );
    if !failing.is_empty() {
        unmet.push(Unmet::FailingTestsPresent { test_ids: failing });
    }
    unmet
}

fn phase_must_be_active(doc: &Epic, phase_id: &str) -> Option<Unmet> {
    let active = doc
        .find_phase(phase_id)
        .is_some_and(|p| p.status == Status::Wip);
    if active {
        None
    } else {
        Some(Unmet::PhaseNotActive {
            phase_id: phase_id.to_string(),
            active_phase: doc.active_phase().map(|p| p.id.clone()),
        })
    }
}

fn start_task(doc: &Epic, task: &Task) -> Vec<Unmet> {
    let mut unmet: Vec<Unmet> = phase_must_be_active(doc, &task.phase_id)
        .into_iter()
        .collect();
    if let Some(sibling) = doc
        .tasks_in(&task.phase_id)
        .find(|t| t.status == Status::Wip && t.id != task.id)
    {
        unmet.push(Unmet::SiblingTaskActive {
            task_id: sibling.id.clone(),
        });
    }
    unmet
}

fn complete_task(doc: &Epic, task: &Task, allow_open: bool) -> Vec<Unmet> {
    let mut unmet = Vec::new();
    let failing = ids(
        doc.tests_for_task(&task.id).filter(|t| t.status.is_failing()).map(|e| e.id.as_str()),
    );
    if !failing.is_empty() {
        unmet.push(Unmet::FailingTestsPresent { test_ids: failing });
    }
    if !allow_open {
        let open = ids(
            doc.tests_for_task(&task.id).filter(|t| t.status.is_open()).map(|e| e.id.as_str()),
        );
        if !open.is_empty() {
            unmet.push(Unmet::TestsNotTerminal { test_ids: open });
        }
    }
    unmet
}

fn test_in_active_phase(doc: &Epic, test: &Test) -> Vec<Unmet> {
    phase_must_be_active(doc, &test.phase_id)
        .into_iter()
        .collect()
}
