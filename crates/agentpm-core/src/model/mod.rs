//! In-memory document model: epic → phases → tasks → tests, plus events.

pub mod entity;
pub mod epic;
pub mod event;
pub mod status;

pub use entity::{EntityKind, Phase, Task, Test};
pub use epic::{CurrentState, Epic};
pub use event::{Event, EventType};
pub use status::{StateToken, Status, TestResult, TestStatus};

use chrono::{DateTime, SecondsFormat, Utc};

/// All stamps are UTC; the document stores them as RFC3339 with a `Z` suffix.
pub type Timestamp = DateTime<Utc>;

/// Render a stamp the way the document stores it (`2006-01-02T15:04:05Z`).
#[must_use]
pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse an RFC3339 stamp with any offset into UTC.
///
/// # Errors
///
/// Returns the chrono parse error when `raw` is not RFC3339.
pub fn parse_timestamp(raw: &str) -> Result<Timestamp, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw.trim()).map(|dt| dt.with_timezone(&Utc))
}
