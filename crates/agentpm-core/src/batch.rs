//! All-or-nothing batch of test transitions.
//!
//! [`validate_batch`] is pure: it runs every operation through
//! [`engine::can_apply`] against the unmodified document and classifies the
//! failures. [`apply_batch`] only touches the caller's document when the
//! whole batch validated and every operation applied cleanly to a scratch
//! copy.

use crate::engine::{self, Plan, TransitionError, TransitionReport};
use crate::error::{ErrorCode, ErrorKind};
use crate::lifecycle::{TransitionArgs, TransitionRequest, Verb};
use crate::model::{CurrentState, Epic, StateToken, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::str::FromStr;

/// One requested test transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOp {
    pub test_id: String,
    pub verb: Verb,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TestOp {
    #[must_use]
    pub fn new(test_id: impl Into<String>, verb: Verb) -> Self {
        Self {
            test_id: test_id.into(),
            verb,
            reason: None,
        }
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    fn request(&self, base: &TransitionArgs) -> TransitionRequest {
        let mut args = base.clone();
        args.reason.clone_from(&self.reason);
        TransitionRequest::test(self.test_id.clone(), self.verb).with_args(args)
    }
}

/// Error parsing the `verb:ID[:reason]` shorthand.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid batch operation '{raw}': {reason}")]
pub struct ParseOpError {
    pub raw: String,
    pub reason: &'static str,
}

impl FromStr for TestOp {
    type Err = ParseOpError;

    /// `pass:1A_T1`, `fail:1A_T1[:note]`, `cancel:1A_T1:reason`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason| ParseOpError {
            raw: s.to_string(),
            reason,
        };
        let mut parts = s.splitn(3, ':');
        let verb = match parts.next().map(str::trim) {
            Some("pass") => Verb::Pass,
            Some("fail") => Verb::Fail,
            Some("cancel") => Verb::Cancel,
            _ => return Err(err("expected pass, fail or cancel")),
        };
        let id = parts.next().map(str::trim).unwrap_or_default();
        if id.is_empty() {
            return Err(err("missing test ID"));
        }
        let op = Self::new(id, verb);
        Ok(match parts.next() {
            Some(reason) => op.with_reason(reason),
            None => op,
        })
    }
}

/// How an invalid operation is counted in the summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Violation {
    TestNotFound,
    PhaseViolation,
    StatusViolation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidOperation {
    pub test_id: String,
    pub test_name: String,
    pub verb: Verb,
    pub from: StateToken,
    pub to: StateToken,
    /// The test already holds the target; applying is a no-op.
    pub already_in_target: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationError {
    pub kind: ErrorKind,
    pub code: &'static str,
    pub violation: Violation,
    pub message: String,
    pub entity: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidOperation {
    pub test_id: String,
    pub verb: Verb,
    pub error: OperationError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub tests_not_found: usize,
    pub phase_violations: usize,
    pub status_violations: usize,
}

/// Result of [`validate_batch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchValidation {
    pub valid: bool,
    pub valid_operations: Vec<ValidOperation>,
    pub invalid_operations: Vec<InvalidOperation>,
    pub summary: BatchSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Result of [`apply_batch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub applied: Vec<TransitionReport>,
    pub unchanged: Vec<String>,
    pub events_appended: usize,
    pub current_state: Option<CurrentState>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    #[error("batch contains no operations")]
    Empty,

    #[error("{}", .0.error_message.as_deref().unwrap_or("batch validation failed"))]
    Invalid(Box<BatchValidation>),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl BatchError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Empty => ErrorCode::EmptyBatch,
            Self::Invalid(_) => ErrorCode::BatchInvalid,
            Self::Transition(err) => err.code(),
        }
    }

    #[must_use]
    pub fn validation(&self) -> Option<&BatchValidation> {
        match self {
            Self::Invalid(v) => Some(v),
            _ => None,
        }
    }
}

fn classify(err: &TransitionError) -> Violation {
    match err {
        TransitionError::NotFound { .. } => Violation::TestNotFound,
        TransitionError::PreconditionFailed { failures, .. }
            if failures.first().is_some_and(|u| u.is_phase_violation()) =>
        {
            Violation::PhaseViolation
        }
        _ => Violation::StatusViolation,
    }
}

fn invalid(op: &TestOp, violation: Violation, code: ErrorCode, message: String) -> InvalidOperation {
    InvalidOperation {
        test_id: op.test_id.clone(),
        verb: op.verb,
        error: OperationError {
            kind: code.kind(),
            code: code.code(),
            violation,
            message,
            entity: op.test_id.clone(),
        },
    }
}

/// Validate every operation against `doc` without mutating it.
///
/// Only `pass`, `fail` and `cancel` are batchable. A test named twice in
/// one batch is a status violation for every occurrence after the first.
///
/// # Errors
///
/// Returns [`BatchError::Empty`] when `ops` is empty.
pub fn validate_batch(
    doc: &Epic,
    ops: &[TestOp],
    base: &TransitionArgs,
) -> Result<BatchValidation, BatchError> {
    if ops.is_empty() {
        return Err(BatchError::Empty);
    }

    let mut seen = HashSet::new();
    let mut valid_operations = Vec::new();
    let mut invalid_operations = Vec::new();

    for op in ops {
        if !matches!(op.verb, Verb::Pass | Verb::Fail | Verb::Cancel) {
            invalid_operations.push(invalid(
                op,
                Violation::StatusViolation,
                ErrorCode::InvalidArgument,
                format!("'{}' is not a batch operation (use pass, fail or cancel)", op.verb),
            ));
            continue;
        }
        if !seen.insert(op.test_id.as_str()) {
            invalid_operations.push(invalid(
                op,
                Violation::StatusViolation,
                ErrorCode::InvalidArgument,
                format!("test {} appears more than once in the batch", op.test_id),
            ));
            continue;
        }

        match engine::can_apply(doc, &op.request(base)) {
            Ok(plan) => {
                let test_name = doc
                    .find_test(&op.test_id)
                    .map(|t| t.name.clone())
                    .unwrap_or_default();
                let (from, to, already_in_target) = match plan {
                    Plan::AlreadyInTarget { state, .. } => (state, state, true),
                    Plan::Transition { from, rule, .. } => (from, rule.to, false),
                };
                valid_operations.push(ValidOperation {
                    test_id: op.test_id.clone(),
                    test_name,
                    verb: op.verb,
                    from,
                    to,
                    already_in_target,
                });
            }
            Err(err) => {
                invalid_operations.push(invalid(op, classify(&err), err.code(), err.to_string()));
            }
        }
    }

    let mut summary = BatchSummary {
        total: ops.len(),
        valid: valid_operations.len(),
        invalid: invalid_operations.len(),
        ..BatchSummary::default()
    };
    for op in &invalid_operations {
        match op.error.violation {
            Violation::TestNotFound => summary.tests_not_found += 1,
            Violation::PhaseViolation => summary.phase_violations += 1,
            Violation::StatusViolation => summary.status_violations += 1,
        }
    }

    let error_message =
        (!invalid_operations.is_empty()).then(|| error_message(&summary, &invalid_operations));

    Ok(BatchValidation {
        valid: invalid_operations.is_empty(),
        valid_operations,
        invalid_operations,
        summary,
        error_message,
    })
}

fn error_message(summary: &BatchSummary, invalid: &[InvalidOperation]) -> String {
    let mut msg = format!(
        "Batch rejected: {} of {} operations are invalid; nothing was applied \
         (not found: {}, phase violations: {}, status violations: {})",
        summary.invalid,
        summary.total,
        summary.tests_not_found,
        summary.phase_violations,
        summary.status_violations
    );
    for op in invalid {
        let _ = write!(msg, "\n  - {} {}: {}", op.verb, op.test_id, op.error.message);
    }
    msg
}

/// Validate, then apply every operation in order.
///
/// Operations run against a scratch copy that replaces `doc` only after
/// the last one succeeded.
///
/// # Errors
///
/// [`BatchError::Empty`], [`BatchError::Invalid`] with the full
/// validation, or the engine error of an operation that failed during
/// application. `doc` is unchanged in every error case.
pub fn apply_batch(
    doc: &mut Epic,
    ops: &[TestOp],
    base: &TransitionArgs,
    at: Timestamp,
) -> Result<BatchReport, BatchError> {
    let validation = validate_batch(doc, ops, base)?;
    if !validation.valid {
        return Err(BatchError::Invalid(Box::new(validation)));
    }

    let mut scratch = doc.clone();
    let mut applied = Vec::new();
    let mut unchanged = Vec::new();
    for op in ops {
        match engine::apply(&mut scratch, &op.request(base), at)? {
            engine::Outcome::Applied(report) => applied.push(report),
            engine::Outcome::AlreadyInTarget { id, .. } => unchanged.push(id),
        }
    }

    *doc = scratch;
    Ok(BatchReport {
        events_appended: applied.iter().map(|r| r.events_appended).sum(),
        applied,
        unchanged,
        current_state: doc.current_state.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Phase, Status, Task, Test, TestStatus};
    use chrono::{TimeZone, Utc};

    fn doc() -> Epic {
        let mut epic = Epic::new("3", "Batch");
        epic.phases = vec![
            Phase::new("1A", "Active").with_status(Status::Wip),
            Phase::new("2A", "Later"),
        ];
        epic.tasks = vec![
            Task::new("1A_1", "1A", "Core").with_status(Status::Wip),
            Task::new("2A_1", "2A", "Next"),
        ];
        epic.tests = vec![
            Test::new("1A_T1", "1A_1", "1A", "first").with_status(TestStatus::Wip),
            Test::new("1A_T2", "1A_1", "1A", "second").with_status(TestStatus::PASSING),
            Test::new("2A_T1", "2A_1", "2A", "later").with_status(TestStatus::Wip),
        ];
        epic
    }

    fn at() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 4, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn parse_shorthand() {
        assert_eq!("pass:1A_T1".parse::<TestOp>().unwrap(), TestOp::new("1A_T1", Verb::Pass));
        assert_eq!(
            "cancel:1A_T1:no longer relevant".parse::<TestOp>().unwrap(),
            TestOp::new("1A_T1", Verb::Cancel).with_reason("no longer relevant")
        );
        assert_eq!(
            "fail:1A_T1:a:b".parse::<TestOp>().unwrap().reason.as_deref(),
            Some("a:b")
        );
        assert!("start:1A_T1".parse::<TestOp>().is_err());
        assert!("pass:".parse::<TestOp>().is_err());
    }

    #[test]
    fn empty_batch_is_fatal() {
        let err = validate_batch(&doc(), &[], &TransitionArgs::default()).unwrap_err();
        assert_eq!(err, BatchError::Empty);
        assert_eq!(err.code(), ErrorCode::EmptyBatch);
    }

    #[test]
    fn mixed_batch_is_rejected_and_classified() {
        let ops = [
            TestOp::new("1A_T1", Verb::Pass),
            TestOp::new("2A_T1", Verb::Pass),
            TestOp::new("1A_T2", Verb::Fail).with_reason("issue"),
            TestOp::new("9Z_T1", Verb::Pass),
            TestOp::new("1A_T1", Verb::Cancel),
        ];
        let v = validate_batch(&doc(), &ops, &TransitionArgs::default()).unwrap();
        assert!(!v.valid);
        assert_eq!(
            v.summary,
            BatchSummary {
                total: 5,
                valid: 2,
                invalid: 3,
                tests_not_found: 1,
                phase_violations: 1,
                status_violations: 1,
            }
        );
        let msg = v.error_message.unwrap();
        assert!(msg.contains("3 of 5 operations are invalid"), "{msg}");
        assert!(msg.contains("- pass 2A_T1"), "{msg}");
        assert!(msg.contains("- pass 9Z_T1"), "{msg}");
    }

    #[test]
    fn cancel_without_reason_is_a_status_violation() {
        let ops = [TestOp::new("1A_T1", Verb::Cancel)];
        let v = validate_batch(&doc(), &ops, &TransitionArgs::default()).unwrap();
        assert_eq!(v.summary.status_violations, 1);
        assert_eq!(v.invalid_operations[0].error.kind, ErrorKind::PreconditionFailed);
    }

    #[test]
    fn apply_leaves_document_unchanged_when_invalid() {
        let mut epic = doc();
        let before = epic.clone();
        let ops = [TestOp::new("1A_T1", Verb::Pass), TestOp::new("2A_T1", Verb::Pass)];
        let err = apply_batch(&mut epic, &ops, &TransitionArgs::default(), at()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::BatchInvalid);
        assert!(err.to_string().contains("1 of 2 operations are invalid"));
        assert_eq!(epic, before);
    }

    #[test]
    fn apply_valid_batch() {
        let mut epic = doc();
        let ops = [
            TestOp::new("1A_T1", Verb::Pass),
            TestOp::new("1A_T2", Verb::Pass),
        ];
        let report = apply_batch(&mut epic, &ops, &TransitionArgs::default(), at()).unwrap();
        assert_eq!(report.applied.len(), 1);
        assert_eq!(report.unchanged, ["1A_T2"]);
        assert_eq!(report.events_appended, 1);
        assert_eq!(epic.find_test("1A_T1").unwrap().status, TestStatus::PASSING);
        assert_eq!(epic.events.len(), 1);
    }
}
