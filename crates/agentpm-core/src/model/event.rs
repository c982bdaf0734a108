//! Event log records attached to the epic.
//!
//! Lifecycle events use the `{kind}_{verb}` naming (`task_started`,
//! `test_failed`). Log events written by `agentpm log` use a short category
//! (`implementation`, `blocker`, ...). Unknown types read from disk are kept
//! verbatim so that a round trip never loses history.

use super::Timestamp;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Event type catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    EpicStarted,
    EpicPaused,
    EpicResumed,
    EpicCompleted,
    PhaseStarted,
    PhaseCompleted,
    TaskStarted,
    TaskCompleted,
    TaskCancelled,
    TestStarted,
    TestPassed,
    TestFailed,
    TestCancelled,
    Implementation,
    Decision,
    Blocker,
    Issue,
    Milestone,
    Note,
    /// A type this version does not know; preserved as written.
    Other(String),
}

/// Error returned when a log category is not one of the known log types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLogType {
    pub raw: String,
}

impl fmt::Display for UnknownLogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown log type '{}': expected one of implementation, decision, \
             blocker, issue, milestone, note",
            self.raw
        )
    }
}

impl std::error::Error for UnknownLogType {}

impl EventType {
    /// Categories accepted by `agentpm log --type`.
    pub const LOG_TYPES: [Self; 6] = [
        Self::Implementation,
        Self::Decision,
        Self::Blocker,
        Self::Issue,
        Self::Milestone,
        Self::Note,
    ];

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::EpicStarted => "epic_started",
            Self::EpicPaused => "epic_paused",
            Self::EpicResumed => "epic_resumed",
            Self::EpicCompleted => "epic_completed",
            Self::PhaseStarted => "phase_started",
            Self::PhaseCompleted => "phase_completed",
            Self::TaskStarted => "task_started",
            Self::TaskCompleted => "task_completed",
            Self::TaskCancelled => "task_cancelled",
            Self::TestStarted => "test_started",
            Self::TestPassed => "test_passed",
            Self::TestFailed => "test_failed",
            Self::TestCancelled => "test_cancelled",
            Self::Implementation => "implementation",
            Self::Decision => "decision",
            Self::Blocker => "blocker",
            Self::Issue => "issue",
            Self::Milestone => "milestone",
            Self::Note => "note",
            Self::Other(raw) => raw,
        }
    }

    /// Whether this event was produced by a lifecycle transition.
    #[must_use]
    pub const fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::EpicStarted
                | Self::EpicPaused
                | Self::EpicResumed
                | Self::EpicCompleted
                | Self::PhaseStarted
                | Self::PhaseCompleted
                | Self::TaskStarted
                | Self::TaskCompleted
                | Self::TaskCancelled
                | Self::TestStarted
                | Self::TestPassed
                | Self::TestFailed
                | Self::TestCancelled
        )
    }

    /// Parse a category for a manual log entry, rejecting lifecycle and
    /// unknown types.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownLogType`] when `raw` is not a log category.
    pub fn parse_log_type(raw: &str) -> Result<Self, UnknownLogType> {
        let parsed: Self = raw.parse().map_err(|()| UnknownLogType {
            raw: raw.to_string(),
        })?;
        if Self::LOG_TYPES.contains(&parsed) {
            Ok(parsed)
        } else {
            Err(UnknownLogType {
                raw: raw.to_string(),
            })
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    /// Only blank input is rejected; anything else becomes [`EventType::Other`].
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(());
        }
        Ok(match trimmed.to_ascii_lowercase().as_str() {
            "epic_started" => Self::EpicStarted,
            "epic_paused" => Self::EpicPaused,
            "epic_resumed" => Self::EpicResumed,
            "epic_completed" => Self::EpicCompleted,
            "phase_started" => Self::PhaseStarted,
            "phase_completed" => Self::PhaseCompleted,
            "task_started" => Self::TaskStarted,
            "task_completed" => Self::TaskCompleted,
            "task_cancelled" => Self::TaskCancelled,
            "test_started" => Self::TestStarted,
            "test_passed" => Self::TestPassed,
            "test_failed" => Self::TestFailed,
            "test_cancelled" => Self::TestCancelled,
            "implementation" => Self::Implementation,
            "decision" => Self::Decision,
            "blocker" => Self::Blocker,
            "issue" => Self::Issue,
            "milestone" => Self::Milestone,
            "note" => Self::Note,
            _ => Self::Other(trimmed.to_string()),
        })
    }
}

impl Serialize for EventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One append-only record in the epic's event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub timestamp: Timestamp,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    pub data: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

impl Event {
    #[must_use]
    pub fn new(timestamp: Timestamp, event_type: EventType, data: impl Into<String>) -> Self {
        Self {
            timestamp,
            event_type,
            entity_id: None,
            agent: None,
            data: data.into(),
            files: Vec::new(),
        }
    }

    #[must_use]
    pub fn for_entity(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    #[must_use]
    pub fn by_agent(mut self, agent: Option<String>) -> Self {
        self.agent = agent.filter(|a| !a.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.files = files;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_types_roundtrip() {
        for ty in [
            EventType::TaskStarted,
            EventType::TestFailed,
            EventType::EpicPaused,
            EventType::Blocker,
        ] {
            assert_eq!(ty.as_str().parse::<EventType>(), Ok(ty.clone()));
        }
    }

    #[test]
    fn unknown_types_are_preserved() {
        let parsed: EventType = "legacy_checkpoint".parse().unwrap();
        assert_eq!(parsed, EventType::Other("legacy_checkpoint".into()));
        assert_eq!(parsed.to_string(), "legacy_checkpoint");
        assert!("  ".parse::<EventType>().is_err());
    }

    #[test]
    fn log_types_exclude_lifecycle_events() {
        assert_eq!(
            EventType::parse_log_type("Blocker"),
            Ok(EventType::Blocker)
        );
        assert!(EventType::parse_log_type("task_started").is_err());
        assert!(EventType::parse_log_type("gossip").is_err());
        assert!(EventType::TaskStarted.is_lifecycle());
        assert!(!EventType::Note.is_lifecycle());
    }
}
