//! XML wire records.
//!
//! These mirror the document layout one-to-one (attributes carry the `@`
//! prefix, `$text` is element text) and hold everything as strings. The
//! conversion into the model is where timestamps are parsed, statuses are
//! normalized, and references are checked.

use super::DocumentError;
use crate::model::{
    CurrentState, EntityKind, Epic, Event, EventType, Phase, Status, Task, Test, TestResult,
    TestStatus, Timestamp, format_timestamp, parse_timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename = "epic")]
pub(crate) struct EpicWire {
    #[serde(rename = "@id", default)]
    id: String,
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "@status", default)]
    status: String,
    #[serde(rename = "@created_at", default, skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
    #[serde(rename = "@started_at", default, skip_serializing_if = "Option::is_none")]
    started_at: Option<String>,
    #[serde(rename = "@completed_at", default, skip_serializing_if = "Option::is_none")]
    completed_at: Option<String>,
    #[serde(rename = "@assignee", default, skip_serializing_if = "Option::is_none")]
    assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    current_state: Option<CurrentStateWire>,
    #[serde(default)]
    phases: PhasesWire,
    #[serde(default)]
    tasks: TasksWire,
    #[serde(default)]
    tests: TestsWire,
    #[serde(default)]
    events: EventsWire,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CurrentStateWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    active_phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    active_task: Option<String>,
    #[serde(default)]
    next_action: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PhasesWire {
    #[serde(rename = "phase", default)]
    items: Vec<PhaseWire>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TasksWire {
    #[serde(rename = "task", default)]
    items: Vec<TaskWire>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TestsWire {
    #[serde(rename = "test", default)]
    items: Vec<TestWire>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct EventsWire {
    #[serde(rename = "event", default)]
    items: Vec<EventWire>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PhaseWire {
    #[serde(rename = "@id", default)]
    id: String,
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "@status", default)]
    status: String,
    #[serde(rename = "@started_at", default, skip_serializing_if = "Option::is_none")]
    started_at: Option<String>,
    #[serde(rename = "@completed_at", default, skip_serializing_if = "Option::is_none")]
    completed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deliverables: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TaskWire {
    #[serde(rename = "@id", default)]
    id: String,
    #[serde(rename = "@phase_id", default)]
    phase_id: String,
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "@status", default)]
    status: String,
    #[serde(rename = "@assignee", default, skip_serializing_if = "Option::is_none")]
    assignee: Option<String>,
    #[serde(rename = "@started_at", default, skip_serializing_if = "Option::is_none")]
    started_at: Option<String>,
    #[serde(rename = "@completed_at", default, skip_serializing_if = "Option::is_none")]
    completed_at: Option<String>,
    #[serde(rename = "@cancelled_at", default, skip_serializing_if = "Option::is_none")]
    cancelled_at: Option<String>,
    #[serde(
        rename = "@cancellation_reason",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    cancellation_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    acceptance_criteria: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TestWire {
    #[serde(rename = "@id", default)]
    id: String,
    #[serde(rename = "@task_id", default)]
    task_id: String,
    #[serde(rename = "@phase_id", default, skip_serializing_if = "Option::is_none")]
    phase_id: Option<String>,
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "@status", default, skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    #[serde(rename = "@test_status", default, skip_serializing_if = "Option::is_none")]
    test_status: Option<String>,
    #[serde(rename = "@test_result", default, skip_serializing_if = "Option::is_none")]
    test_result: Option<String>,
    #[serde(rename = "@started_at", default, skip_serializing_if = "Option::is_none")]
    started_at: Option<String>,
    #[serde(rename = "@passed_at", default, skip_serializing_if = "Option::is_none")]
    passed_at: Option<String>,
    #[serde(rename = "@failed_at", default, skip_serializing_if = "Option::is_none")]
    failed_at: Option<String>,
    #[serde(rename = "@cancelled_at", default, skip_serializing_if = "Option::is_none")]
    cancelled_at: Option<String>,
    #[serde(rename = "@failure_note", default, skip_serializing_if = "Option::is_none")]
    failure_note: Option<String>,
    #[serde(
        rename = "@cancellation_reason",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    cancellation_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct EventWire {
    #[serde(rename = "@timestamp", default)]
    timestamp: String,
    #[serde(rename = "@type", default)]
    event_type: String,
    #[serde(rename = "@entity_id", default, skip_serializing_if = "Option::is_none")]
    entity_id: Option<String>,
    #[serde(rename = "@agent", default, skip_serializing_if = "Option::is_none")]
    agent: Option<String>,
    #[serde(rename = "@files", default, skip_serializing_if = "Option::is_none")]
    files: Option<String>,
    #[serde(rename = "$text", default)]
    data: String,
}

// ---------------------------------------------------------------------------
// model -> wire
// ---------------------------------------------------------------------------

fn text(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

fn stamp(ts: Option<Timestamp>) -> Option<String> {
    ts.as_ref().map(format_timestamp)
}

impl From<&Epic> for EpicWire {
    fn from(epic: &Epic) -> Self {
        Self {
            id: epic.id.clone(),
            name: epic.name.clone(),
            status: epic.status.to_string(),
            created_at: stamp(epic.created_at),
            started_at: stamp(epic.started_at),
            completed_at: stamp(epic.completed_at),
            assignee: text(&epic.assignee),
            description: text(&epic.description),
            current_state: epic.current_state.as_ref().map(|cs| CurrentStateWire {
                active_phase: cs.active_phase.clone(),
                active_task: cs.active_task.clone(),
                next_action: cs.next_action.clone(),
            }),
            phases: PhasesWire {
                items: epic.phases.iter().map(phase_to_wire).collect(),
            },
            tasks: TasksWire {
                items: epic.tasks.iter().map(task_to_wire).collect(),
            },
            tests: TestsWire {
                items: epic.tests.iter().map(test_to_wire).collect(),
            },
            events: EventsWire {
                items: epic.events.iter().map(event_to_wire).collect(),
            },
        }
    }
}

fn phase_to_wire(p: &Phase) -> PhaseWire {
    PhaseWire {
        id: p.id.clone(),
        name: p.name.clone(),
        status: p.status.to_string(),
        started_at: stamp(p.started_at),
        completed_at: stamp(p.completed_at),
        description: text(&p.description),
        deliverables: text(&p.deliverables),
    }
}

fn task_to_wire(t: &Task) -> TaskWire {
    TaskWire {
        id: t.id.clone(),
        phase_id: t.phase_id.clone(),
        name: t.name.clone(),
        status: t.status.to_string(),
        assignee: text(&t.assignee),
        started_at: stamp(t.started_at),
        completed_at: stamp(t.completed_at),
        cancelled_at: stamp(t.cancelled_at),
        cancellation_reason: t.cancellation_reason.clone(),
        description: text(&t.description),
        acceptance_criteria: text(&t.acceptance_criteria),
    }
}

fn test_to_wire(t: &Test) -> TestWire {
    let lifecycle = t.status.lifecycle().to_string();
    TestWire {
        id: t.id.clone(),
        task_id: t.task_id.clone(),
        phase_id: text(&t.phase_id),
        name: t.name.clone(),
        status: Some(lifecycle.clone()),
        test_status: Some(lifecycle),
        test_result: t.status.result().map(|r| r.to_string()),
        started_at: stamp(t.started_at),
        passed_at: stamp(t.passed_at),
        failed_at: stamp(t.failed_at),
        cancelled_at: stamp(t.cancelled_at),
        failure_note: t.failure_note.clone(),
        cancellation_reason: t.cancellation_reason.clone(),
        description: text(&t.description),
    }
}

fn event_to_wire(e: &Event) -> EventWire {
    EventWire {
        timestamp: format_timestamp(&e.timestamp),
        event_type: e.event_type.to_string(),
        entity_id: e.entity_id.clone(),
        agent: e.agent.clone(),
        files: (!e.files.is_empty()).then(|| e.files.join(",")),
        data: e.data.clone(),
    }
}

// ---------------------------------------------------------------------------
// wire -> model
// ---------------------------------------------------------------------------

/// Collects normalization warnings while converting one document.
struct Decoder {
    warnings: Vec<String>,
}

fn present(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn parse_stamp(
    raw: Option<String>,
    entity: &str,
    field: &'static str,
) -> Result<Option<Timestamp>, DocumentError> {
    present(raw)
        .map(|value| {
            parse_timestamp(&value).map_err(|_| DocumentError::InvalidTimestamp {
                entity: entity.to_string(),
                field,
                value,
            })
        })
        .transpose()
}

impl Decoder {
    /// Blank means pending; anything unknown is normalized with a warning.
    fn status(&mut self, raw: &str, entity: &str) -> Status {
        if raw.trim().is_empty() {
            return Status::Pending;
        }
        match raw.parse::<Status>() {
            Ok(status) => status,
            Err(_) => {
                self.warnings.push(format!(
                    "{entity}: unknown status '{raw}' normalized to pending"
                ));
                Status::Pending
            }
        }
    }

    fn test_status(&mut self, wire: &TestWire) -> TestStatus {
        let raw = wire
            .test_status
            .as_deref()
            .or(wire.status.as_deref())
            .unwrap_or_default();
        let lifecycle = self.status(raw, &format!("test {}", wire.id));
        let result = match present(wire.test_result.clone()) {
            None => None,
            Some(raw) => match raw.parse::<TestResult>() {
                Ok(r) => Some(r),
                Err(_) => {
                    self.warnings.push(format!(
                        "test {}: unknown test_result '{raw}' ignored",
                        wire.id
                    ));
                    None
                }
            },
        };
        match (lifecycle, result) {
            (Status::Done, None) => self.warnings.push(format!(
                "test {}: done without a result, treated as failing",
                wire.id
            )),
            (Status::Pending | Status::Wip | Status::Cancelled, Some(_)) => {
                self.warnings.push(format!(
                    "test {}: test_result ignored because the test is not done",
                    wire.id
                ));
            }
            _ => {}
        }
        TestStatus::from_parts(lifecycle, result)
    }
}

fn check_unique<'a>(
    kind: EntityKind,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), DocumentError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(DocumentError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}

impl EpicWire {
    /// Convert into the model, returning normalization warnings.
    pub(crate) fn into_model(self) -> Result<(Epic, Vec<String>), DocumentError> {
        let mut dec = Decoder {
            warnings: Vec::new(),
        };

        if self.id.trim().is_empty() {
            return Err(DocumentError::Parse {
                message: "<epic> is missing its id attribute".into(),
            });
        }
        let epic_label = format!("epic {}", self.id);
        let status = dec.status(&self.status, &epic_label);

        let mut phases = Vec::with_capacity(self.phases.items.len());
        for w in self.phases.items {
            let label = format!("phase {}", w.id);
            phases.push(Phase {
                status: dec.status(&w.status, &label),
                started_at: parse_stamp(w.started_at, &label, "started_at")?,
                completed_at: parse_stamp(w.completed_at, &label, "completed_at")?,
                description: present(w.description).unwrap_or_default(),
                deliverables: present(w.deliverables).unwrap_or_default(),
                id: w.id,
                name: w.name,
            });
        }
        check_unique(EntityKind::Phase, phases.iter().map(|p| p.id.as_str()))?;

        let mut tasks = Vec::with_capacity(self.tasks.items.len());
        for w in self.tasks.items {
            let label = format!("task {}", w.id);
            if !phases.iter().any(|p| p.id == w.phase_id) {
                return Err(DocumentError::DanglingReference {
                    kind: EntityKind::Task,
                    id: w.id,
                    field: "phase_id",
                    target: w.phase_id,
                });
            }
            tasks.push(Task {
                status: dec.status(&w.status, &label),
                started_at: parse_stamp(w.started_at, &label, "started_at")?,
                completed_at: parse_stamp(w.completed_at, &label, "completed_at")?,
                cancelled_at: parse_stamp(w.cancelled_at, &label, "cancelled_at")?,
                cancellation_reason: present(w.cancellation_reason),
                assignee: present(w.assignee).unwrap_or_default(),
                description: present(w.description).unwrap_or_default(),
                acceptance_criteria: present(w.acceptance_criteria).unwrap_or_default(),
                id: w.id,
                phase_id: w.phase_id,
                name: w.name,
            });
        }
        check_unique(EntityKind::Task, tasks.iter().map(|t| t.id.as_str()))?;

        let mut tests = Vec::with_capacity(self.tests.items.len());
        for w in self.tests.items {
            let label = format!("test {}", w.id);
            let Some(task) = tasks.iter().find(|t| t.id == w.task_id) else {
                return Err(DocumentError::DanglingReference {
                    kind: EntityKind::Test,
                    id: w.id,
                    field: "task_id",
                    target: w.task_id,
                });
            };
            // A missing phase_id is inferred from the task.
            let phase_id = present(w.phase_id.clone()).unwrap_or_else(|| task.phase_id.clone());
            if phase_id != task.phase_id {
                return Err(DocumentError::DanglingReference {
                    kind: EntityKind::Test,
                    id: w.id,
                    field: "phase_id",
                    target: phase_id,
                });
            }
            tests.push(Test {
                status: dec.test_status(&w),
                started_at: parse_stamp(w.started_at, &label, "started_at")?,
                passed_at: parse_stamp(w.passed_at, &label, "passed_at")?,
                failed_at: parse_stamp(w.failed_at, &label, "failed_at")?,
                cancelled_at: parse_stamp(w.cancelled_at, &label, "cancelled_at")?,
                failure_note: present(w.failure_note),
                cancellation_reason: present(w.cancellation_reason),
                description: present(w.description).unwrap_or_default(),
                id: w.id,
                task_id: w.task_id,
                phase_id,
                name: w.name,
            });
        }
        check_unique(EntityKind::Test, tests.iter().map(|t| t.id.as_str()))?;

        let mut events = Vec::with_capacity(self.events.items.len());
        for (idx, w) in self.events.items.into_iter().enumerate() {
            let label = format!("event #{}", idx + 1);
            let timestamp = parse_stamp(Some(w.timestamp.clone()), &label, "timestamp")?
                .ok_or_else(|| DocumentError::InvalidTimestamp {
                    entity: label.clone(),
                    field: "timestamp",
                    value: w.timestamp.clone(),
                })?;
            let event_type = w
                .event_type
                .parse::<EventType>()
                .unwrap_or_else(|()| EventType::Note);
            let files = present(w.files)
                .map(|f| {
                    f.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            let mut event = Event::new(timestamp, event_type, w.data.trim())
                .by_agent(present(w.agent))
                .with_files(files);
            event.entity_id = present(w.entity_id);
            events.push(event);
        }

        let current_state = self.current_state.map(|cs| CurrentState {
            active_phase: present(cs.active_phase),
            active_task: present(cs.active_task),
            next_action: cs.next_action.trim().to_string(),
        });

        let epic = Epic {
            created_at: parse_stamp(self.created_at, &epic_label, "created_at")?,
            started_at: parse_stamp(self.started_at, &epic_label, "started_at")?,
            completed_at: parse_stamp(self.completed_at, &epic_label, "completed_at")?,
            assignee: present(self.assignee).unwrap_or_default(),
            description: present(self.description).unwrap_or_default(),
            id: self.id,
            name: self.name,
            status,
            current_state,
            phases,
            tasks,
            tests,
            events,
        };
        Ok((epic, dec.warnings))
    }
}
