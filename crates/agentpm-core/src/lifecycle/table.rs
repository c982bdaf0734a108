//! The transition table as data.
//!
//! One row per `(kind, verb)`: the set of source states the verb accepts,
//! the state it produces, and the event type it appends. A verb whose
//! target already holds is reported as already-in-target before the source
//! set is consulted.

use super::Verb;
use crate::model::{EntityKind, EventType, StateToken};

use StateToken::{Cancelled, Done, Failing, Passing, Pending, Wip};

/// One row of the transition table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRule {
    pub kind: EntityKind,
    pub verb: Verb,
    pub from: &'static [StateToken],
    pub to: StateToken,
    pub event: EventType,
}

impl TransitionRule {
    #[must_use]
    pub fn accepts(&self, current: StateToken) -> bool {
        self.from.contains(&current)
    }
}

const fn row(
    kind: EntityKind,
    verb: Verb,
    from: &'static [StateToken],
    to: StateToken,
    event: EventType,
) -> TransitionRule {
    TransitionRule {
        kind,
        verb,
        from,
        to,
        event,
    }
}

static TABLE: [TransitionRule; 13] = [
    row(EntityKind::Epic, Verb::Start, &[Pending], Wip, EventType::EpicStarted),
    row(EntityKind::Epic, Verb::Pause, &[Wip], Pending, EventType::EpicPaused),
    row(EntityKind::Epic, Verb::Resume, &[Pending], Wip, EventType::EpicResumed),
    row(EntityKind::Epic, Verb::Complete, &[Wip], Done, EventType::EpicCompleted),
    row(EntityKind::Phase, Verb::Start, &[Pending], Wip, EventType::PhaseStarted),
    row(EntityKind::Phase, Verb::Complete, &[Wip], Done, EventType::PhaseCompleted),
    row(EntityKind::Task, Verb::Start, &[Pending], Wip, EventType::TaskStarted),
    row(EntityKind::Task, Verb::Complete, &[Wip], Done, EventType::TaskCompleted),
    row(EntityKind::Task, Verb::Cancel, &[Pending, Wip], Cancelled, EventType::TaskCancelled),
    row(EntityKind::Test, Verb::Start, &[Pending], Wip, EventType::TestStarted),
    // A failing test may be re-run to passing once fixed.
    row(EntityKind::Test, Verb::Pass, &[Pending, Wip, Failing], Passing, EventType::TestPassed),
    row(EntityKind::Test, Verb::Fail, &[Pending, Wip, Passing], Failing, EventType::TestFailed),
    row(EntityKind::Test, Verb::Cancel, &[Pending, Wip], Cancelled, EventType::TestCancelled),
];

/// All rows in table order.
#[must_use]
pub fn rules() -> &'static [TransitionRule] {
    &TABLE
}

/// The row for `(kind, verb)`, if the kind supports the verb at all.
#[must_use]
pub fn rule_for(kind: EntityKind, verb: Verb) -> Option<&'static TransitionRule> {
    TABLE.iter().find(|r| r.kind == kind && r.verb == verb)
}

/// Verbs a kind supports, in table order.
pub fn verbs_for(kind: EntityKind) -> impl Iterator<Item = Verb> {
    TABLE.iter().filter(move |r| r.kind == kind).map(|r| r.verb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn one_row_per_kind_and_verb() {
        let mut seen = HashSet::new();
        for rule in rules() {
            assert!(
                seen.insert((rule.kind, rule.verb)),
                "duplicate row for {} {}",
                rule.kind,
                rule.verb
            );
        }
    }

    #[test]
    fn no_row_accepts_its_own_target() {
        for rule in rules() {
            assert!(
                !rule.accepts(rule.to),
                "{} {} lists its target as a source",
                rule.kind,
                rule.verb
            );
        }
    }

    #[test]
    fn event_types_follow_kind_and_verb() {
        for rule in rules() {
            let expected = format!("{}_{}", rule.kind, rule.verb.past_tense());
            assert_eq!(rule.event.as_str(), expected);
        }
    }

    #[test]
    fn phases_cannot_be_cancelled() {
        assert!(rule_for(EntityKind::Phase, Verb::Cancel).is_none());
        assert!(rule_for(EntityKind::Epic, Verb::Pass).is_none());
    }

    #[test]
    fn test_verbs() {
        let verbs: Vec<_> = verbs_for(EntityKind::Test).collect();
        assert_eq!(verbs, [Verb::Start, Verb::Pass, Verb::Fail, Verb::Cancel]);
        let fail = rule_for(EntityKind::Test, Verb::Fail).unwrap();
        assert!(fail.accepts(Passing));
        assert!(!fail.accepts(Cancelled));
    }

    #[test]
    fn task_cancel_from_pending_or_wip() {
        let cancel = rule_for(EntityKind::Task, Verb::Cancel).unwrap();
        assert!(cancel.accepts(Pending));
        assert!(cancel.accepts(Wip));
        assert!(!cancel.accepts(Done));
    }
}
