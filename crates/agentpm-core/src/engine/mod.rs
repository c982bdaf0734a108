//! Transition engine.
//!
//! [`can_apply`] is the pure decision procedure shared with the batch
//! validator: lookup, idempotence, table row, prerequisites. [`apply`] runs
//! it, then performs every write of the transition in one step. Nothing is
//! written when `can_apply` fails, and the event is built before the
//! document is touched, so a call either lands completely or not at all.

pub mod current;

use crate::error::{ErrorCode, ErrorKind};
use crate::lifecycle::{TransitionRequest, TransitionRule, Unmet, Verb, prereq, rule_for};
use crate::model::{
    CurrentState, EntityKind, Epic, Event, StateToken, Status, TestResult, TestStatus, Timestamp,
};
use serde::Serialize;

/// Why a transition was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("{} {id} not found", .kind.label())]
    NotFound { kind: EntityKind, id: String },

    #[error("{} does not support '{verb}'", .kind.label())]
    UnsupportedVerb { kind: EntityKind, verb: Verb },

    #[error("cannot {verb} {kind} {id}: invalid transition from {from} to {to}")]
    InvalidTransition {
        kind: EntityKind,
        id: String,
        verb: Verb,
        from: StateToken,
        to: StateToken,
    },

    #[error("cannot {verb} {kind} {id}: {}", summarize(.failures))]
    PreconditionFailed {
        kind: EntityKind,
        id: String,
        verb: Verb,
        failures: Vec<Unmet>,
    },
}

fn summarize(failures: &[Unmet]) -> String {
    match failures {
        [] => "prerequisites not met".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (+{} more)", rest.len()),
    }
}

impl TransitionError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::EntityNotFound,
            Self::UnsupportedVerb { .. } | Self::InvalidTransition { .. } => {
                ErrorCode::InvalidStateTransition
            }
            Self::PreconditionFailed { .. } => ErrorCode::PreconditionFailed,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.code().kind()
    }

    /// Every unmet prerequisite, in evaluation order.
    #[must_use]
    pub fn failures(&self) -> &[Unmet] {
        match self {
            Self::PreconditionFailed { failures, .. } => failures,
            _ => &[],
        }
    }

    /// The first unmet prerequisite.
    #[must_use]
    pub fn primary(&self) -> Option<&Unmet> {
        self.failures().first()
    }

    /// The refused verb; lookups fail before a verb is considered.
    #[must_use]
    pub const fn verb(&self) -> Option<Verb> {
        match self {
            Self::NotFound { .. } => None,
            Self::UnsupportedVerb { verb, .. }
            | Self::InvalidTransition { verb, .. }
            | Self::PreconditionFailed { verb, .. } => Some(*verb),
        }
    }

    #[must_use]
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            Self::NotFound { kind, .. }
            | Self::UnsupportedVerb { kind, .. }
            | Self::InvalidTransition { kind, .. }
            | Self::PreconditionFailed { kind, .. } => *kind,
        }
    }

    #[must_use]
    pub fn entity_id(&self) -> Option<&str> {
        match self {
            Self::NotFound { id, .. }
            | Self::InvalidTransition { id, .. }
            | Self::PreconditionFailed { id, .. } => Some(id),
            Self::UnsupportedVerb { .. } => None,
        }
    }
}

/// Decision produced by [`can_apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// The verb's effect already holds; nothing to do.
    AlreadyInTarget { id: String, state: StateToken },
    Transition {
        id: String,
        from: StateToken,
        rule: &'static TransitionRule,
    },
}

/// Summary of one applied transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionReport {
    pub kind: EntityKind,
    pub id: String,
    pub verb: Verb,
    pub from: StateToken,
    pub to: StateToken,
    pub events_appended: usize,
    pub warnings: Vec<String>,
    pub current_state: CurrentState,
}

/// Result of [`apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied(TransitionReport),
    /// Distinguished success: the document was not touched.
    AlreadyInTarget {
        kind: EntityKind,
        id: String,
        verb: Verb,
        state: StateToken,
    },
}

impl Outcome {
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    #[must_use]
    pub const fn report(&self) -> Option<&TransitionReport> {
        match self {
            Self::Applied(report) => Some(report),
            Self::AlreadyInTarget { .. } => None,
        }
    }
}

/// Current state of an entity, with the epic's empty ID resolved.
///
/// # Errors
///
/// Returns [`TransitionError::NotFound`] when the entity does not exist.
pub fn state_of(
    doc: &Epic,
    kind: EntityKind,
    id: &str,
) -> Result<(String, StateToken), TransitionError> {
    let not_found = || TransitionError::NotFound {
        kind,
        id: id.to_string(),
    };
    match kind {
        EntityKind::Epic => {
            if id.is_empty() || id == doc.id {
                Ok((doc.id.clone(), doc.status.into()))
            } else {
                Err(not_found())
            }
        }
        EntityKind::Phase => doc
            .find_phase(id)
            .map(|p| (p.id.clone(), p.status.into()))
            .ok_or_else(not_found),
        EntityKind::Task => doc
            .find_task(id)
            .map(|t| (t.id.clone(), t.status.into()))
            .ok_or_else(not_found),
        EntityKind::Test => doc
            .find_test(id)
            .map(|t| (t.id.clone(), t.status.into()))
            .ok_or_else(not_found),
    }
}

/// Decide whether `req` may be applied to `doc`, without mutating it.
///
/// # Errors
///
/// Returns the first reason the transition is refused: unknown entity,
/// unsupported verb, no table row for the current state, or unmet
/// prerequisites (all of them, in evaluation order).
pub fn can_apply(doc: &Epic, req: &TransitionRequest) -> Result<Plan, TransitionError> {
    let (id, current) = state_of(doc, req.kind, &req.id)?;
    let rule = rule_for(req.kind, req.verb).ok_or(TransitionError::UnsupportedVerb {
        kind: req.kind,
        verb: req.verb,
    })?;

    if current == rule.to {
        return Ok(Plan::AlreadyInTarget { id, state: current });
    }

    let regression_blocked = req.kind == EntityKind::Test
        && req.verb == Verb::Fail
        && current == StateToken::Passing
        && !req.args.allow_fail_regression;
    if !rule.accepts(current) || regression_blocked {
        return Err(TransitionError::InvalidTransition {
            kind: req.kind,
            id,
            verb: req.verb,
            from: current,
            to: rule.to,
        });
    }

    let failures = prereq::check(doc, req);
    if !failures.is_empty() {
        return Err(TransitionError::PreconditionFailed {
            kind: req.kind,
            id,
            verb: req.verb,
            failures,
        });
    }

    Ok(Plan::Transition {
        id,
        from: current,
        rule,
    })
}

/// Apply one transition at `at`.
///
/// # Errors
///
/// Any error from [`can_apply`]; the document is unchanged in that case.
pub fn apply(
    doc: &mut Epic,
    req: &TransitionRequest,
    at: Timestamp,
) -> Result<Outcome, TransitionError> {
    let (id, from, rule) = match can_apply(doc, req)? {
        Plan::AlreadyInTarget { id, state } => {
            return Ok(Outcome::AlreadyInTarget {
                kind: req.kind,
                id,
                verb: req.verb,
                state,
            });
        }
        Plan::Transition { id, from, rule } => (id, from, rule),
    };

    let mut warnings = opt_in_warnings(doc, req);
    let event = build_event(doc, req, &id, rule, at);
    let stamp = stamp_for(doc, req.kind, &id, at, &mut warnings);

    write_status(doc, req, &id, rule.to, stamp)?;
    let state = current::recompute(doc);
    doc.update_current_state(
        state.active_phase.clone(),
        state.active_task.clone(),
        state.next_action.clone(),
    );
    doc.append_event(event);

    Ok(Outcome::Applied(TransitionReport {
        kind: req.kind,
        id,
        verb: req.verb,
        from,
        to: rule.to,
        events_appended: 1,
        warnings,
        current_state: state,
    }))
}

const fn status_for(token: StateToken) -> Status {
    match token {
        StateToken::Pending => Status::Pending,
        StateToken::Wip => Status::Wip,
        StateToken::Done | StateToken::Passing | StateToken::Failing => Status::Done,
        StateToken::Cancelled => Status::Cancelled,
    }
}

const fn test_status_for(token: StateToken) -> TestStatus {
    match token {
        StateToken::Pending => TestStatus::Pending,
        StateToken::Wip => TestStatus::Wip,
        StateToken::Passing | StateToken::Done => TestStatus::Done(TestResult::Passing),
        StateToken::Failing => TestStatus::Done(TestResult::Failing),
        StateToken::Cancelled => TestStatus::Cancelled,
    }
}

/// Terminal stamps never precede the entity's `started_at`.
fn stamp_for(
    doc: &Epic,
    kind: EntityKind,
    id: &str,
    at: Timestamp,
    warnings: &mut Vec<String>,
) -> Timestamp {
    let started = match kind {
        EntityKind::Epic => doc.started_at,
        EntityKind::Phase => doc.find_phase(id).and_then(|p| p.started_at),
        EntityKind::Task => doc.find_task(id).and_then(|t| t.started_at),
        EntityKind::Test => doc.find_test(id).and_then(|t| t.started_at),
    };
    match started {
        Some(started) if started > at => {
            warnings.push(format!(
                "timestamp {} precedes started_at {}; using started_at",
                crate::model::format_timestamp(&at),
                crate::model::format_timestamp(&started)
            ));
            started
        }
        _ => at,
    }
}

fn opt_in_warnings(doc: &Epic, req: &TransitionRequest) -> Vec<String> {
    let mut warnings = Vec::new();
    match (req.kind, req.verb) {
        (EntityKind::Phase, Verb::Start) if req.args.allow_failing_tests => {
            let failing: Vec<&str> = doc
                .earlier_phases(&req.id)
                .iter()
                .flat_map(|p| doc.tests_in_phase(&p.id))
                .filter(|t| t.status.is_failing())
                .map(|t| t.id.as_str())
                .collect();
            if !failing.is_empty() {
                warnings.push(format!(
                    "started with failing tests in earlier phases: {}",
                    failing.join(", ")
                ));
            }
        }
        (EntityKind::Task, Verb::Complete) if req.args.allow_open_tests => {
            let open: Vec<&str> = doc
                .tests_for_task(&req.id)
                .filter(|t| t.status.is_open())
                .map(|t| t.id.as_str())
                .collect();
            if !open.is_empty() {
                warnings.push(format!(
                    "completed with unfinished tests: {}",
                    open.join(", ")
                ));
            }
        }
        _ => {}
    }
    warnings
}

fn entity_name<'a>(doc: &'a Epic, kind: EntityKind, id: &str) -> &'a str {
    match kind {
        EntityKind::Epic => &doc.name,
        EntityKind::Phase => doc.find_phase(id).map_or("", |p| p.name.as_str()),
        EntityKind::Task => doc.find_task(id).map_or("", |t| t.name.as_str()),
        EntityKind::Test => doc.find_test(id).map_or("", |t| t.name.as_str()),
    }
}

fn build_event(
    doc: &Epic,
    req: &TransitionRequest,
    id: &str,
    rule: &TransitionRule,
    at: Timestamp,
) -> Event {
    let name = entity_name(doc, req.kind, id);
    let headline = format!("{} {} {}", req.kind.label(), id, req.verb.past_tense());
    let data = match (req.verb, req.args.trimmed_reason()) {
        (Verb::Cancel | Verb::Fail, Some(reason)) => format!("{headline}: {reason}"),
        _ if name.is_empty() => headline,
        _ => format!("{headline}: {name}"),
    };
    Event::new(at, rule.event.clone(), data)
        .for_entity(id)
        .by_agent(req.args.agent.clone())
}

fn write_status(
    doc: &mut Epic,
    req: &TransitionRequest,
    id: &str,
    to: StateToken,
    at: Timestamp,
) -> Result<(), TransitionError> {
    let not_found = || TransitionError::NotFound {
        kind: req.kind,
        id: id.to_string(),
    };
    let reason = req.args.trimmed_reason().map(str::to_string);

    match req.kind {
        EntityKind::Epic => {
            doc.status = status_for(to);
            match to {
                StateToken::Wip => {
                    doc.started_at.get_or_insert(at);
                }
                StateToken::Done => doc.completed_at = Some(at),
                _ => {}
            }
        }
        EntityKind::Phase => {
            let phase = doc.find_phase_mut(id).ok_or_else(not_found)?;
            phase.status = status_for(to);
            match to {
                StateToken::Wip => {
                    phase.started_at.get_or_insert(at);
                }
                StateToken::Done => phase.completed_at = Some(at),
                _ => {}
            }
        }
        EntityKind::Task => {
            let task = doc.find_task_mut(id).ok_or_else(not_found)?;
            task.status = status_for(to);
            match to {
                StateToken::Wip => {
                    task.started_at.get_or_insert(at);
                }
                StateToken::Done => task.completed_at = Some(at),
                StateToken::Cancelled => {
                    task.cancelled_at = Some(at);
                    task.cancellation_reason = reason;
                }
                _ => {}
            }
        }
        EntityKind::Test => {
            let test = doc.find_test_mut(id).ok_or_else(not_found)?;
            test.status = test_status_for(to);
            match to {
                StateToken::Wip => {
                    test.started_at.get_or_insert(at);
                }
                StateToken::Passing => {
                    test.passed_at = Some(at);
                    test.failed_at = None;
                    test.failure_note = None;
                }
                StateToken::Failing => {
                    test.failed_at = Some(at);
                    test.passed_at = None;
                    test.failure_note = reason;
                }
                StateToken::Cancelled => {
                    test.cancelled_at = Some(at);
                    test.cancellation_reason = reason;
                }
                _ => {}
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EventType, Phase, Task, Test};
    use chrono::{Duration, TimeZone, Utc};

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn doc() -> Epic {
        let mut epic = Epic::new("7", "Engine");
        epic.phases = vec![
            Phase::new("1A", "Build").with_status(Status::Wip),
            Phase::new("2A", "Ship"),
        ];
        epic.tasks = vec![
            Task::new("1A_1", "1A", "Parser"),
            Task::new("1A_2", "1A", "Printer"),
            Task::new("2A_1", "2A", "Release"),
        ];
        epic.tests = vec![
            Test::new("1A_T1", "1A_1", "1A", "parses"),
            Test::new("2A_T1", "2A_1", "2A", "released"),
        ];
        epic
    }

    #[test]
    fn start_task_stamps_and_logs() {
        let mut epic = doc();
        let outcome = apply(&mut epic, &TransitionRequest::task("1A_1", Verb::Start), t0())
            .unwrap();
        let report = outcome.report().unwrap();
        assert_eq!(report.from, StateToken::Pending);
        assert_eq!(report.to, StateToken::Wip);
        assert_eq!(report.events_appended, 1);

        let task = epic.find_task("1A_1").unwrap();
        assert_eq!(task.status, Status::Wip);
        assert_eq!(task.started_at, Some(t0()));

        let event = epic.events.last().unwrap();
        assert_eq!(event.event_type, EventType::TaskStarted);
        assert_eq!(event.entity_id.as_deref(), Some("1A_1"));
        assert_eq!(event.data, "Task 1A_1 started: Parser");

        let state = epic.current_state.as_ref().unwrap();
        assert_eq!(state.active_task.as_deref(), Some("1A_1"));
        assert_eq!(state.next_action, "Continue work on: Parser");
    }

    #[test]
    fn stale_current_state_is_replaced_by_report_state() {
        let mut epic = doc();
        epic.update_current_state(Some("2A".into()), Some("2A_1".into()), "stale");
        let outcome = apply(&mut epic, &TransitionRequest::test("1A_T1", Verb::Pass), t0())
            .unwrap();
        let report = outcome.report().unwrap();
        assert_eq!(epic.current_state.as_ref(), Some(&report.current_state));
        assert_eq!(report.current_state.active_phase.as_deref(), Some("1A"));
        assert_eq!(report.current_state.active_task, None);
    }

    #[test]
    fn refused_transition_leaves_document_untouched() {
        let mut epic = doc();
        epic.tasks[0].status = Status::Wip;
        let before = epic.clone();
        let err = apply(&mut epic, &TransitionRequest::task("1A_2", Verb::Start), t0())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
        assert_eq!(err.primary().map(Unmet::name), Some("sibling_task_active"));
        assert_eq!(epic, before);
    }

    #[test]
    fn unknown_entity_is_not_found() {
        let mut epic = doc();
        let err = apply(&mut epic, &TransitionRequest::test("9Z_T9", Verb::Pass), t0())
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError::NotFound {
                kind: EntityKind::Test,
                id: "9Z_T9".into()
            }
        );
        assert_eq!(err.to_string(), "Test 9Z_T9 not found");
    }

    #[test]
    fn no_row_is_invalid_transition() {
        let mut epic = doc();
        let err = apply(&mut epic, &TransitionRequest::task("1A_1", Verb::Complete), t0())
            .unwrap_err();
        assert!(matches!(
            err,
            TransitionError::InvalidTransition {
                from: StateToken::Pending,
                to: StateToken::Done,
                ..
            }
        ));
    }

    #[test]
    fn unsupported_verb() {
        let mut epic = doc();
        let err = apply(&mut epic, &TransitionRequest::phase("1A", Verb::Cancel), t0())
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidStateTransition);
        assert_eq!(err.to_string(), "Phase does not support 'cancel'");
    }

    #[test]
    fn already_in_target_appends_nothing() {
        let mut epic = doc();
        let before = epic.clone();
        let outcome = apply(&mut epic, &TransitionRequest::phase("1A", Verb::Start), t0())
            .unwrap();
        assert!(!outcome.is_applied());
        assert!(matches!(
            outcome,
            Outcome::AlreadyInTarget {
                state: StateToken::Wip,
                ..
            }
        ));
        assert_eq!(epic, before);
    }

    #[test]
    fn fail_stores_note_and_regression_is_configurable() {
        let mut epic = doc();
        epic.tests[0].status = TestStatus::PASSING;
        epic.tests[0].passed_at = Some(t0());

        let mut strict = TransitionRequest::test("1A_T1", Verb::Fail).with_reason("flaky");
        strict.args.allow_fail_regression = false;
        assert!(matches!(
            apply(&mut epic, &strict, t0()),
            Err(TransitionError::InvalidTransition { .. })
        ));

        let later = t0() + Duration::minutes(5);
        let req = TransitionRequest::test("1A_T1", Verb::Fail).with_reason("  flaky  ");
        apply(&mut epic, &req, later).unwrap();
        let test = epic.find_test("1A_T1").unwrap();
        assert_eq!(test.status, TestStatus::FAILING);
        assert_eq!(test.failure_note.as_deref(), Some("flaky"));
        assert_eq!(test.failed_at, Some(later));
        assert!(test.passed_at.is_none());
        assert_eq!(epic.events.last().unwrap().data, "Test 1A_T1 failed: flaky");
    }

    #[test]
    fn failing_test_can_be_rerun_to_passing() {
        let mut epic = doc();
        epic.tests[0].status = TestStatus::FAILING;
        epic.tests[0].failure_note = Some("boom".into());
        apply(&mut epic, &TransitionRequest::test("1A_T1", Verb::Pass), t0()).unwrap();
        let test = epic.find_test("1A_T1").unwrap();
        assert_eq!(test.status, TestStatus::PASSING);
        assert!(test.failure_note.is_none());
    }

    #[test]
    fn task_cancel_records_reason() {
        let mut epic = doc();
        let req = TransitionRequest::task("1A_2", Verb::Cancel).with_reason("descoped");
        apply(&mut epic, &req, t0()).unwrap();
        let task = epic.find_task("1A_2").unwrap();
        assert_eq!(task.status, Status::Cancelled);
        assert_eq!(task.cancellation_reason.as_deref(), Some("descoped"));
        assert_eq!(task.cancelled_at, Some(t0()));
    }

    #[test]
    fn epic_pause_keeps_started_at_and_resume_reuses_it() {
        let mut epic = doc();
        apply(&mut epic, &TransitionRequest::epic(Verb::Start), t0()).unwrap();
        let later = t0() + Duration::hours(1);
        apply(&mut epic, &TransitionRequest::epic(Verb::Pause), later).unwrap();
        assert_eq!(epic.status, Status::Pending);
        assert_eq!(epic.started_at, Some(t0()));

        apply(&mut epic, &TransitionRequest::epic(Verb::Resume), later).unwrap();
        assert_eq!(epic.status, Status::Wip);
        assert_eq!(epic.started_at, Some(t0()));
        let types: Vec<_> = epic.events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, ["epic_started", "epic_paused", "epic_resumed"]);
    }

    #[test]
    fn epic_id_must_match_when_given() {
        let epic = doc();
        assert!(state_of(&epic, EntityKind::Epic, "7").is_ok());
        assert!(state_of(&epic, EntityKind::Epic, "").is_ok());
        assert!(state_of(&epic, EntityKind::Epic, "8").is_err());
    }

    #[test]
    fn completion_stamp_never_precedes_start() {
        let mut epic = doc();
        let start = t0() + Duration::hours(2);
        apply(&mut epic, &TransitionRequest::task("1A_1", Verb::Start), start).unwrap();
        let mut req = TransitionRequest::task("1A_1", Verb::Complete);
        req.args.allow_open_tests = true;
        let outcome = apply(&mut epic, &req, t0()).unwrap();
        let task = epic.find_task("1A_1").unwrap();
        assert_eq!(task.completed_at, Some(start));
        let warnings = &outcome.report().unwrap().warnings;
        assert!(warnings.iter().any(|w| w.contains("precedes started_at")));
        assert!(warnings.iter().any(|w| w.contains("unfinished tests: 1A_T1")));
    }
}
