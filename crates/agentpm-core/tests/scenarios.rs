//! End-to-end lifecycle scenarios against the public engine, batch, and
//! store APIs.

use agentpm_core::batch::{self, BatchError, TestOp, Violation};
use agentpm_core::check;
use agentpm_core::engine::{self, Outcome, TransitionError};
use agentpm_core::lifecycle::prereq::Unmet;
use agentpm_core::lifecycle::{TransitionArgs, TransitionRequest, Verb};
use agentpm_core::model::{
    EntityKind, Epic, EventType, Phase, StateToken, Status, Task, Test, TestStatus, Timestamp,
};
use agentpm_core::store;
use chrono::{TimeZone, Utc};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn at(hour: u32) -> Timestamp {
    Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap()
}

fn one_phase(tasks: Vec<Task>) -> Epic {
    let mut epic = Epic::new("1", "Scenario");
    epic.status = Status::Wip;
    epic.started_at = Some(at(0));
    epic.phases = vec![Phase::new("1A", "Build").with_status(Status::Wip)];
    epic.tasks = tasks;
    epic
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[test]
fn start_then_complete_task() {
    let mut doc = one_phase(vec![
        Task::new("1A_1", "1A", "Parser"),
        Task::new("1A_2", "1A", "Printer"),
    ]);

    let started = engine::apply(&mut doc, &TransitionRequest::task("1A_1", Verb::Start), at(1))
        .expect("start task");
    assert!(started.is_applied());

    let task = doc.find_task("1A_1").unwrap();
    assert_eq!(task.status, Status::Wip);
    assert_eq!(task.started_at, Some(at(1)));
    let state = doc.current_state.clone().unwrap();
    assert_eq!(state.active_task.as_deref(), Some("1A_1"));
    assert_eq!(doc.events.last().unwrap().event_type, EventType::TaskStarted);

    engine::apply(&mut doc, &TransitionRequest::task("1A_1", Verb::Complete), at(2))
        .expect("complete task");

    let task = doc.find_task("1A_1").unwrap();
    assert_eq!(task.status, Status::Done);
    assert_eq!(task.completed_at, Some(at(2)));
    let state = doc.current_state.clone().unwrap();
    assert_eq!(state.active_task, None);
    assert_eq!(state.next_action, "Start next task: Printer");
    assert_eq!(doc.events.len(), 2);
    assert!(check::check(&doc).valid);
}

#[test]
fn completing_last_task_suggests_completing_phase() {
    let mut doc = one_phase(vec![Task::new("1A_1", "1A", "Only").with_status(Status::Wip)]);
    engine::apply(&mut doc, &TransitionRequest::task("1A_1", Verb::Complete), at(3)).unwrap();
    assert_eq!(
        doc.current_state.unwrap().next_action,
        "Complete current phase"
    );
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

#[test]
fn second_wip_task_is_rejected() {
    let mut doc = one_phase(vec![
        Task::new("1A_1", "1A", "First").with_status(Status::Wip),
        Task::new("1A_2", "1A", "Second"),
    ]);
    let before = doc.clone();

    let err = engine::apply(&mut doc, &TransitionRequest::task("1A_2", Verb::Start), at(1))
        .unwrap_err();

    let TransitionError::PreconditionFailed { failures, .. } = &err else {
        panic!("expected precondition failure, got {err:?}");
    };
    assert_eq!(
        failures[0],
        Unmet::SiblingTaskActive {
            task_id: "1A_1".into()
        }
    );
    assert_eq!(doc, before);
}

#[test]
fn cancel_test_requires_reason() {
    let mut doc = one_phase(vec![Task::new("1A_1", "1A", "Work").with_status(Status::Wip)]);
    doc.tests = vec![Test::new("1A_T1", "1A_1", "1A", "case").with_status(TestStatus::Wip)];

    let req = TransitionRequest::test("1A_T1", Verb::Cancel).with_reason("");
    let err = engine::apply(&mut doc, &req, at(1)).unwrap_err();
    assert_eq!(err.primary(), Some(&Unmet::CancelReasonMissing));

    let blank = TransitionRequest::test("1A_T1", Verb::Cancel).with_reason("   ");
    assert!(engine::apply(&mut doc, &blank, at(1)).is_err());
    assert_eq!(doc.find_test("1A_T1").unwrap().status, TestStatus::Wip);
}

#[test]
fn complete_epic_requires_all_phases_done() {
    let mut doc = Epic::new("5", "Gate");
    doc.status = Status::Wip;
    doc.phases = vec![
        Phase::new("1A", "Done").with_status(Status::Done),
        Phase::new("2A", "Pending"),
    ];

    let err = engine::apply(&mut doc, &TransitionRequest::epic(Verb::Complete), at(1))
        .unwrap_err();
    assert_eq!(
        err.primary(),
        Some(&Unmet::PhasesNotDone {
            phase_ids: vec!["2A".into()]
        })
    );
    assert_eq!(doc.status, Status::Wip);
}

// ---------------------------------------------------------------------------
// Idempotence
// ---------------------------------------------------------------------------

#[test]
fn starting_active_phase_is_already_in_target() {
    let mut doc = one_phase(Vec::new());
    let before = store::to_xml(&doc).unwrap();

    let outcome =
        engine::apply(&mut doc, &TransitionRequest::phase("1A", Verb::Start), at(1)).unwrap();

    assert_eq!(
        outcome,
        Outcome::AlreadyInTarget {
            kind: EntityKind::Phase,
            id: "1A".into(),
            verb: Verb::Start,
            state: StateToken::Wip,
        }
    );
    assert!(doc.events.is_empty());
    assert_eq!(store::to_xml(&doc).unwrap(), before);
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

fn batch_doc() -> Epic {
    let mut doc = one_phase(vec![Task::new("1A_1", "1A", "Work").with_status(Status::Wip)]);
    doc.phases.push(Phase::new("2A", "Later"));
    doc.tasks.push(Task::new("2A_1", "2A", "Later work"));
    doc.tests = vec![
        Test::new("1A_T1", "1A_1", "1A", "t1").with_status(TestStatus::Wip),
        Test::new("1A_T2", "1A_1", "1A", "t2").with_status(TestStatus::PASSING),
        Test::new("2A_T1", "2A_1", "2A", "t3").with_status(TestStatus::Wip),
    ];
    doc
}

#[test]
fn batch_is_all_or_nothing() {
    let mut doc = batch_doc();
    let before = doc.clone();
    let ops = vec![
        TestOp::new("1A_T1", Verb::Pass),
        TestOp::new("2A_T1", Verb::Pass),
        TestOp::new("1A_T2", Verb::Fail).with_reason("issue"),
    ];

    let validation = batch::validate_batch(&doc, &ops, &TransitionArgs::default()).unwrap();
    assert!(!validation.valid);
    assert_eq!(validation.summary.total, 3);
    assert_eq!(validation.summary.invalid, 1);
    assert_eq!(validation.summary.phase_violations, 1);
    assert_eq!(
        validation.invalid_operations[0].error.violation,
        Violation::PhaseViolation
    );
    let message = validation.error_message.clone().unwrap();
    assert!(message.contains("1 of 3 operations are invalid"), "{message}");
    assert!(message.contains("2A_T1"), "{message}");

    let err = batch::apply_batch(&mut doc, &ops, &TransitionArgs::default(), at(4)).unwrap_err();
    assert!(matches!(err, BatchError::Invalid(_)));
    assert_eq!(doc, before);
}

#[test]
fn valid_batch_applies_every_operation() {
    let mut doc = batch_doc();
    let ops = vec![
        TestOp::new("1A_T1", Verb::Pass),
        TestOp::new("1A_T2", Verb::Fail).with_reason("regressed"),
    ];

    let report = batch::apply_batch(&mut doc, &ops, &TransitionArgs::default(), at(5)).unwrap();

    assert_eq!(report.events_appended, 2);
    assert_eq!(doc.find_test("1A_T1").unwrap().status, TestStatus::PASSING);
    let failed = doc.find_test("1A_T2").unwrap();
    assert_eq!(failed.status, TestStatus::FAILING);
    assert_eq!(failed.failure_note.as_deref(), Some("regressed"));
    assert_eq!(
        doc.current_state.unwrap().next_action,
        "Fix failing tests: 1A_T2"
    );
}

// ---------------------------------------------------------------------------
// Whole-epic walk through the store
// ---------------------------------------------------------------------------

#[test]
fn full_epic_walk_survives_save_and_load() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("epic.xml");

    let mut doc = Epic::new("9", "Walk");
    doc.phases = vec![Phase::new("1A", "Only")];
    doc.tasks = vec![Task::new("1A_1", "1A", "Task")];
    doc.tests = vec![Test::new("1A_T1", "1A_1", "1A", "case")];
    store::save(&path, &doc).unwrap();

    let steps = [
        TransitionRequest::epic(Verb::Start),
        TransitionRequest::phase("1A", Verb::Start),
        TransitionRequest::task("1A_1", Verb::Start),
        TransitionRequest::test("1A_T1", Verb::Start),
        TransitionRequest::test("1A_T1", Verb::Pass),
        TransitionRequest::task("1A_1", Verb::Complete),
        TransitionRequest::phase("1A", Verb::Complete),
        TransitionRequest::epic(Verb::Complete),
    ];
    for (hour, req) in (1..).zip(steps.iter()) {
        let mut loaded = store::load(&path).unwrap().epic;
        engine::apply(&mut loaded, req, at(hour))
            .unwrap_or_else(|e| panic!("{} {:?}: {e}", req.verb, req.kind));
        store::save(&path, &loaded).unwrap();
    }

    let done = store::load(&path).unwrap();
    assert!(done.warnings.is_empty(), "{:?}", done.warnings);
    assert_eq!(done.epic.status, Status::Done);
    assert_eq!(done.epic.events.len(), steps.len());
    assert_eq!(done.epic.current_state.unwrap().next_action, "Epic complete");
    assert!(check::check(&store::load(&path).unwrap().epic).valid);
}
