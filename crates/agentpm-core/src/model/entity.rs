use super::Timestamp;
use super::status::{ParseEnumError, Status, TestStatus};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The four entity kinds in an epic document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Epic,
    Phase,
    Task,
    Test,
}

impl EntityKind {
    pub const ALL: [Self; 4] = [Self::Epic, Self::Phase, Self::Task, Self::Test];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Epic => "epic",
            Self::Phase => "phase",
            Self::Task => "task",
            Self::Test => "test",
        }
    }

    /// Capitalized label for sentences ("Task 1A_1 ...").
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Epic => "Epic",
            Self::Phase => "Phase",
            Self::Task => "Task",
            Self::Test => "Test",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "epic" => Ok(Self::Epic),
            "phase" => Ok(Self::Phase),
            "task" => Ok(Self::Task),
            "test" => Ok(Self::Test),
            _ => Err(ParseEnumError {
                expected: "entity kind",
                got: s.to_string(),
            }),
        }
    }
}

/// A top-level stage of the epic. List order defines "earlier".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Phase {
    pub id: String,
    pub name: String,
    pub status: Status,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub deliverables: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
}

impl Phase {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }
}

/// Unit of work inside one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Task {
    pub id: String,
    pub phase_id: String,
    pub name: String,
    pub status: Status,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub acceptance_criteria: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub assignee: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
}

impl Task {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        phase_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            phase_id: phase_id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }
}

/// Verifiable unit attached to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Test {
    pub id: String,
    pub task_id: String,
    pub phase_id: String,
    pub name: String,
    pub status: TestStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
}

impl Test {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        task_id: impl Into<String>,
        phase_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            task_id: task_id.into(),
            phase_id: phase_id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_status(mut self, status: TestStatus) -> Self {
        self.status = status;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_kind_display_parse_roundtrips() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_str(&kind.to_string()).unwrap(), kind);
        }
        assert!(EntityKind::from_str("story").is_err());
    }

    #[test]
    fn constructors_default_to_pending() {
        let phase = Phase::new("1A", "Setup");
        let task = Task::new("1A_1", "1A", "Scaffold");
        let test = Test::new("1A_T1", "1A_1", "1A", "Builds");
        assert_eq!(phase.status, Status::Pending);
        assert_eq!(task.status, Status::Pending);
        assert_eq!(test.status, TestStatus::Pending);
        assert!(task.started_at.is_none());
        assert!(test.failure_note.is_none());
    }

    #[test]
    fn json_omits_empty_optional_fields() {
        let task = Task::new("1A_1", "1A", "Scaffold");
        let json = serde_json::to_value(&task).unwrap();
        assert!(json.get("description").is_none());
        assert!(json.get("started_at").is_none());
        assert_eq!(json["status"], "pending");
    }
}
