//! Bare-ID routing: `2A` is a phase, `2A_3` a task, `2A_T3` a test.
//!
//! Routing is purely lexical and never consults the document, so an ID
//! that routes may still be `not_found` at the engine.

use crate::error::ErrorCode;
use crate::lifecycle::{TransitionRequest, Verb};
use crate::model::EntityKind;
use regex::Regex;
use std::sync::LazyLock;

static TEST_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+[A-Z]_T[0-9]+$").expect("test id regex is valid"));
static TASK_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+[A-Z]_[0-9]+$").expect("task id regex is valid"));
static PHASE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+[A-Z]$").expect("phase id regex is valid"));

/// Patterns in match order: test before task before phase.
fn patterns() -> [(EntityKind, &'static Regex); 3] {
    [
        (EntityKind::Test, &*TEST_ID),
        (EntityKind::Task, &*TASK_ID),
        (EntityKind::Phase, &*PHASE_ID),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("ambiguous ID '{id}': matches {}", join(.candidates))]
    Ambiguous {
        id: String,
        candidates: Vec<EntityKind>,
    },

    #[error("unrecognized ID '{id}': expected a phase (1A), task (1A_1) or test (1A_T1) ID")]
    Unrecognized { id: String },
}

fn join(kinds: &[EntityKind]) -> String {
    kinds
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl RouteError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Ambiguous { .. } => ErrorCode::AmbiguousId,
            Self::Unrecognized { .. } => ErrorCode::UnrecognizedId,
        }
    }
}

/// Every kind whose pattern matches `id`, in match order.
#[must_use]
pub fn candidates(id: &str) -> Vec<EntityKind> {
    let id = id.trim();
    patterns()
        .into_iter()
        .filter(|(_, re)| re.is_match(id))
        .map(|(kind, _)| kind)
        .collect()
}

/// Resolve `id` to exactly one entity kind.
///
/// # Errors
///
/// [`RouteError::Unrecognized`] when no pattern matches,
/// [`RouteError::Ambiguous`] when several do.
pub fn resolve(id: &str) -> Result<EntityKind, RouteError> {
    match candidates(id).as_slice() {
        [] => Err(RouteError::Unrecognized { id: id.to_string() }),
        [kind] => Ok(*kind),
        many => Err(RouteError::Ambiguous {
            id: id.to_string(),
            candidates: many.to_vec(),
        }),
    }
}

/// Build the engine request for a bare ID.
///
/// # Errors
///
/// Any [`resolve`] error.
pub fn dispatch(id: &str, verb: Verb) -> Result<TransitionRequest, RouteError> {
    let kind = resolve(id)?;
    Ok(TransitionRequest::new(kind, id.trim(), verb))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_ids_route_to_one_kind() {
        assert_eq!(resolve("1A"), Ok(EntityKind::Phase));
        assert_eq!(resolve("12B_4"), Ok(EntityKind::Task));
        assert_eq!(resolve("3C_T12"), Ok(EntityKind::Test));
        assert_eq!(resolve(" 1A_T1 "), Ok(EntityKind::Test));
    }

    #[test]
    fn non_canonical_ids_are_unrecognized() {
        for raw in ["", "A1", "1a", "1A_", "1A_T", "1AB", "1A_1_2", "epic", "1A-T1"] {
            let err = resolve(raw).unwrap_err();
            assert_eq!(err.code(), ErrorCode::UnrecognizedId, "{raw}");
        }
    }

    #[test]
    fn dispatch_builds_request() {
        let req = dispatch("2A_T3", Verb::Pass).unwrap();
        assert_eq!(req.kind, EntityKind::Test);
        assert_eq!(req.id, "2A_T3");
        assert_eq!(req.verb, Verb::Pass);
    }

    #[test]
    fn ambiguous_message_lists_candidates() {
        let err = RouteError::Ambiguous {
            id: "x".into(),
            candidates: vec![EntityKind::Task, EntityKind::Phase],
        };
        assert_eq!(err.to_string(), "ambiguous ID 'x': matches task, phase");
        assert_eq!(err.code(), ErrorCode::AmbiguousId);
    }
}
