//! Status algebra: verbs, the transition table, and cross-entity
//! prerequisites.
//!
//! Everything in this module is pure. The engine and the batch validator
//! both consult it through [`crate::engine::can_apply`].

pub mod prereq;
pub mod table;

pub use prereq::Unmet;
pub use table::{TransitionRule, rule_for};

use crate::model::EntityKind;
use crate::model::status::ParseEnumError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Requested lifecycle action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Start,
    Pause,
    Resume,
    Complete,
    Cancel,
    Pass,
    Fail,
}

impl Verb {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Complete => "complete",
            Self::Cancel => "cancel",
            Self::Pass => "pass",
            Self::Fail => "fail",
        }
    }

    /// Past tense used in event payloads ("started", "passed").
    #[must_use]
    pub const fn past_tense(self) -> &'static str {
        match self {
            Self::Start => "started",
            Self::Pause => "paused",
            Self::Resume => "resumed",
            Self::Complete => "completed",
            Self::Cancel => "cancelled",
            Self::Pass => "passed",
            Self::Fail => "failed",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "pause" => Ok(Self::Pause),
            "resume" => Ok(Self::Resume),
            "complete" | "done" => Ok(Self::Complete),
            "cancel" => Ok(Self::Cancel),
            "pass" => Ok(Self::Pass),
            "fail" => Ok(Self::Fail),
            _ => Err(ParseEnumError {
                expected: "verb",
                got: s.to_string(),
            }),
        }
    }
}

/// Caller-supplied arguments and opt-ins for one transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionArgs {
    /// Cancellation reason or failure note.
    pub reason: Option<String>,
    /// Agent recorded on the appended event.
    pub agent: Option<String>,
    /// Start-phase: accept `done/failing` tests in earlier phases.
    pub allow_failing_tests: bool,
    /// Complete-task: accept pending or wip tests under the task.
    pub allow_open_tests: bool,
    /// Fail-test: accept `done/passing` as a source state (regression).
    pub allow_fail_regression: bool,
}

impl Default for TransitionArgs {
    fn default() -> Self {
        Self {
            reason: None,
            agent: None,
            allow_failing_tests: false,
            allow_open_tests: false,
            allow_fail_regression: true,
        }
    }
}

impl TransitionArgs {
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// The reason with surrounding whitespace removed, if anything remains.
    #[must_use]
    pub fn trimmed_reason(&self) -> Option<&str> {
        self.reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }
}

/// One transition request: which entity, which verb, with which arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    pub kind: EntityKind,
    /// Entity ID. For the epic an empty ID means "the document's epic".
    pub id: String,
    pub verb: Verb,
    pub args: TransitionArgs,
}

impl TransitionRequest {
    #[must_use]
    pub fn new(kind: EntityKind, id: impl Into<String>, verb: Verb) -> Self {
        Self {
            kind,
            id: id.into(),
            verb,
            args: TransitionArgs::default(),
        }
    }

    #[must_use]
    pub fn epic(verb: Verb) -> Self {
        Self::new(EntityKind::Epic, "", verb)
    }

    #[must_use]
    pub fn phase(id: impl Into<String>, verb: Verb) -> Self {
        Self::new(EntityKind::Phase, id, verb)
    }

    #[must_use]
    pub fn task(id: impl Into<String>, verb: Verb) -> Self {
        Self::new(EntityKind::Task, id, verb)
    }

    #[must_use]
    pub fn test(id: impl Into<String>, verb: Verb) -> Self {
        Self::new(EntityKind::Test, id, verb)
    }

    #[must_use]
    pub fn with_args(mut self, args: TransitionArgs) -> Self {
        self.args = args;
        self
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.args.reason = Some(reason.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verb_parse_accepts_done_alias() {
        assert_eq!("done".parse::<Verb>().unwrap(), Verb::Complete);
        assert_eq!(" PASS ".parse::<Verb>().unwrap(), Verb::Pass);
        assert!("archive".parse::<Verb>().is_err());
    }

    #[test]
    fn default_args_allow_regression_only() {
        let args = TransitionArgs::default();
        assert!(args.allow_fail_regression);
        assert!(!args.allow_failing_tests);
        assert!(!args.allow_open_tests);
    }

    #[test]
    fn trimmed_reason_ignores_blank() {
        assert_eq!(TransitionArgs::default().with_reason("   ").trimmed_reason(), None);
        assert_eq!(
            TransitionArgs::default().with_reason(" flaky ").trimmed_reason(),
            Some("flaky")
        );
    }
}
