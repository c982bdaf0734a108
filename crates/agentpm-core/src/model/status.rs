use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

/// Lifecycle status shared by the epic, phases, and tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Pending,
    Wip,
    Done,
    Cancelled,
}

impl Status {
    pub const ALL: [Self; 4] = [Self::Pending, Self::Wip, Self::Done, Self::Cancelled];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Wip => "wip",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        }
    }

    /// `done` and `cancelled` are terminal; nothing leaves them except a
    /// test regression.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }
}

/// Outcome of a test that has finished executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestResult {
    Passing,
    Failing,
}

impl TestResult {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passing => "passing",
            Self::Failing => "failing",
        }
    }
}

/// Test status as one product type.
///
/// The XML document stores `test_status` and `test_result` separately;
/// collapsing them here makes "result present iff done" hold by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TestStatus {
    #[default]
    Pending,
    Wip,
    Done(TestResult),
    Cancelled,
}

impl TestStatus {
    pub const PASSING: Self = Self::Done(TestResult::Passing);
    pub const FAILING: Self = Self::Done(TestResult::Failing);

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Wip => "wip",
            Self::Done(TestResult::Passing) => "done/passing",
            Self::Done(TestResult::Failing) => "done/failing",
            Self::Cancelled => "cancelled",
        }
    }

    /// Execution-lifecycle half of the pair.
    #[must_use]
    pub const fn lifecycle(self) -> Status {
        match self {
            Self::Pending => Status::Pending,
            Self::Wip => Status::Wip,
            Self::Done(_) => Status::Done,
            Self::Cancelled => Status::Cancelled,
        }
    }

    /// Result half of the pair; `None` unless the test is done.
    #[must_use]
    pub const fn result(self) -> Option<TestResult> {
        match self {
            Self::Done(result) => Some(result),
            _ => None,
        }
    }

    /// Rebuild the product from the two serialized dimensions.
    ///
    /// A `done` status without a result reads as failing so that an
    /// unverified test never counts as passing.
    #[must_use]
    pub const fn from_parts(status: Status, result: Option<TestResult>) -> Self {
        match (status, result) {
            (Status::Pending, _) => Self::Pending,
            (Status::Wip, _) => Self::Wip,
            (Status::Done, Some(r)) => Self::Done(r),
            (Status::Done, None) => Self::FAILING,
            (Status::Cancelled, _) => Self::Cancelled,
        }
    }

    #[must_use]
    pub const fn is_failing(self) -> bool {
        matches!(self, Self::Done(TestResult::Failing))
    }

    #[must_use]
    pub const fn is_passing(self) -> bool {
        matches!(self, Self::Done(TestResult::Passing))
    }

    /// Passing or cancelled: nothing left to do for this test.
    #[must_use]
    pub const fn is_resolved(self) -> bool {
        matches!(self, Self::Done(TestResult::Passing) | Self::Cancelled)
    }

    /// Pending or wip.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::Wip)
    }
}

/// A single state label usable across all four entity kinds.
///
/// The transition table and error payloads speak in tokens so that a test
/// state (`done/passing`) and a task state (`done`) share one vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateToken {
    Pending,
    Wip,
    Done,
    Passing,
    Failing,
    Cancelled,
}

impl StateToken {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Wip => "wip",
            Self::Done => "done",
            Self::Passing => "done/passing",
            Self::Failing => "done/failing",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<Status> for StateToken {
    fn from(status: Status) -> Self {
        match status {
            Status::Pending => Self::Pending,
            Status::Wip => Self::Wip,
            Status::Done => Self::Done,
            Status::Cancelled => Self::Cancelled,
        }
    }
}

impl From<TestStatus> for StateToken {
    fn from(status: TestStatus) -> Self {
        match status {
            TestStatus::Pending => Self::Pending,
            TestStatus::Wip => Self::Wip,
            TestStatus::Done(TestResult::Passing) => Self::Passing,
            TestStatus::Done(TestResult::Failing) => Self::Failing,
            TestStatus::Cancelled => Self::Cancelled,
        }
    }
}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for StateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalize(input: &str) -> String {
    input.trim().to_ascii_lowercase()
}

impl FromStr for Status {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "pending" => Ok(Self::Pending),
            "wip" => Ok(Self::Wip),
            "done" => Ok(Self::Done),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ParseEnumError {
                expected: "status",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for TestResult {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "passing" => Ok(Self::Passing),
            "failing" => Ok(Self::Failing),
            _ => Err(ParseEnumError {
                expected: "test result",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for TestStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "pending" => Ok(Self::Pending),
            "wip" => Ok(Self::Wip),
            "done/passing" | "passing" => Ok(Self::PASSING),
            "done/failing" | "failing" => Ok(Self::FAILING),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ParseEnumError {
                expected: "test status",
                got: s.to_string(),
            }),
        }
    }
}

impl Serialize for TestStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TestStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl Serialize for StateToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
