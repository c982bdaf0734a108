//! Load and save the epic XML document.
//!
//! Saves write `<file>.tmp` next to the target and rename it over the
//! original, so a crash leaves either the old or the new document.

mod wire;

use crate::error::ErrorCode;
use crate::model::{EntityKind, Epic};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use quick_xml::events::Event as XmlEvent;
use wire::EpicWire;

const ROOT: &str = "epic";
const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("failed to read {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse epic document: {message}")]
    Parse { message: String },

    #[error("{entity}: invalid {field} timestamp '{value}'")]
    InvalidTimestamp {
        entity: String,
        field: &'static str,
        value: String,
    },

    #[error("duplicate {kind} ID '{id}'")]
    DuplicateId { kind: EntityKind, id: String },

    #[error("{kind} {id}: {field} references unknown '{target}'")]
    DanglingReference {
        kind: EntityKind,
        id: String,
        field: &'static str,
        target: String,
    },

    #[error("failed to serialize epic document: {message}")]
    Serialize { message: String },

    #[error("failed to write {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DocumentError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Read { .. } => ErrorCode::DocumentReadFailed,
            Self::Parse { .. } => ErrorCode::DocumentParseError,
            Self::InvalidTimestamp { .. } => ErrorCode::InvalidTimestamp,
            Self::DuplicateId { .. } => ErrorCode::DuplicateId,
            Self::DanglingReference { .. } => ErrorCode::DanglingReference,
            Self::Serialize { .. } => ErrorCode::InternalUnexpected,
            Self::Write { .. } => ErrorCode::DocumentWriteFailed,
        }
    }
}

/// A parsed document plus the normalizations applied while loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Loaded {
    pub epic: Epic,
    pub warnings: Vec<String>,
}

fn parse_error(message: impl Into<String>) -> DocumentError {
    DocumentError::Parse {
        message: message.into(),
    }
}

/// The root element must be `<epic>`; the serde decoder ignores the tag.
fn check_root(raw: &str) -> Result<(), DocumentError> {
    let mut reader = quick_xml::Reader::from_str(raw);
    loop {
        match reader.read_event() {
            Ok(XmlEvent::Start(start) | XmlEvent::Empty(start)) => {
                let name = start.name();
                return if name.as_ref() == ROOT.as_bytes() {
                    Ok(())
                } else {
                    Err(parse_error(format!(
                        "root element is <{}>, expected <{ROOT}>",
                        String::from_utf8_lossy(name.as_ref())
                    )))
                };
            }
            Ok(XmlEvent::Eof) => return Err(parse_error("document has no root element")),
            Ok(_) => {}
            Err(e) => return Err(parse_error(e.to_string())),
        }
    }
}

/// Parse a document from XML text.
///
/// # Errors
///
/// [`DocumentError::Parse`] for malformed XML, a root other than
/// `<epic>` or a missing epic `id`, otherwise the first timestamp,
/// duplicate-ID or dangling-reference error found.
pub fn from_xml(raw: &str) -> Result<Loaded, DocumentError> {
    check_root(raw)?;
    let wire: EpicWire = quick_xml::de::from_str(raw).map_err(|e| parse_error(e.to_string()))?;
    let (epic, warnings) = wire.into_model()?;
    Ok(Loaded { epic, warnings })
}

/// Render a document as XML with a declaration and 2-space indentation.
///
/// # Errors
///
/// [`DocumentError::Serialize`] if the serializer rejects the document.
pub fn to_xml(epic: &Epic) -> Result<String, DocumentError> {
    let wire = EpicWire::from(epic);
    let mut body = String::new();
    let mut ser = quick_xml::se::Serializer::with_root(&mut body, Some(ROOT)).map_err(|e| {
        DocumentError::Serialize {
            message: e.to_string(),
        }
    })?;
    ser.indent(' ', 2);
    wire.serialize(ser).map_err(|e| DocumentError::Serialize {
        message: e.to_string(),
    })?;

    let mut out = String::with_capacity(XML_DECLARATION.len() + body.len() + 1);
    out.push_str(XML_DECLARATION);
    out.push_str(&body);
    out.push('\n');
    Ok(out)
}

/// Read and parse the document at `path`.
///
/// # Errors
///
/// [`DocumentError::Read`] when the file cannot be read, or any
/// [`from_xml`] error.
pub fn load(path: &Path) -> Result<Loaded, DocumentError> {
    let raw = fs::read_to_string(path).map_err(|source| DocumentError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let loaded = from_xml(&raw)?;
    for warning in &loaded.warnings {
        tracing::warn!(path = %path.display(), "{warning}");
    }
    tracing::debug!(
        path = %path.display(),
        phases = loaded.epic.phases.len(),
        tasks = loaded.epic.tasks.len(),
        tests = loaded.epic.tests.len(),
        events = loaded.epic.events.len(),
        "loaded epic document"
    );
    Ok(loaded)
}

/// Atomically replace the document at `path`.
///
/// # Errors
///
/// [`DocumentError::Serialize`] or [`DocumentError::Write`]. On a write
/// error the previous file is left in place.
pub fn save(path: &Path, epic: &Epic) -> Result<(), DocumentError> {
    let xml = to_xml(epic)?;
    let tmp = tmp_path(path);
    let write_err = |source| DocumentError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(&tmp, xml.as_bytes()).map_err(write_err)?;
    if let Err(source) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(write_err(source));
    }
    tracing::debug!(path = %path.display(), bytes = xml.len(), "saved epic document");
    Ok(())
}

/// `epic.xml` → `epic.xml.tmp`.
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        CurrentState, Event, EventType, Phase, Status, Task, Test, TestStatus, parse_timestamp,
    };
    use tempfile::TempDir;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<epic id="8" name="Ledger" status="wip" created_at="2025-01-02T15:04:05Z" started_at="2025-01-03T09:00:00Z" assignee="agent_a">
  <description>Double-entry ledger</description>
  <current_state>
    <active_phase>1A</active_phase>
    <active_task>1A_1</active_task>
    <next_action>Continue work on: Schema</next_action>
  </current_state>
  <phases>
    <phase id="1A" name="Model" status="wip" started_at="2025-01-03T09:00:00Z">
      <description>Core types</description>
    </phase>
    <phase id="2A" name="API" status="blocked"/>
  </phases>
  <tasks>
    <task id="1A_1" phase_id="1A" name="Schema" status="wip" started_at="2025-01-03T09:05:00Z"/>
    <task id="2A_1" phase_id="2A" name="Routes" status="pending"/>
  </tasks>
  <tests>
    <test id="1A_T1" task_id="1A_1" phase_id="1A" name="balances" test_status="done" test_result="failing" failed_at="2025-01-03T10:00:00Z" failure_note="off by one"/>
    <test id="2A_T1" task_id="2A_1" name="routes" test_status="pending"/>
  </tests>
  <events>
    <event timestamp="2025-01-03T09:00:00Z" type="phase_started" entity_id="1A">Phase 1A started: Model</event>
    <event timestamp="2025-01-03T09:30:00Z" type="decision" agent="agent_a" files="src/a.rs, src/b.rs">Use i64 cents</event>
  </events>
</epic>
"#;

    fn ts(raw: &str) -> crate::model::Timestamp {
        parse_timestamp(raw).unwrap()
    }

    #[test]
    fn parses_sample_document() {
        let loaded = from_xml(SAMPLE).unwrap();
        let epic = &loaded.epic;
        assert_eq!(epic.id, "8");
        assert_eq!(epic.status, Status::Wip);
        assert_eq!(epic.assignee, "agent_a");
        assert_eq!(epic.description, "Double-entry ledger");
        assert_eq!(epic.phases.len(), 2);
        assert_eq!(epic.phases[0].description, "Core types");

        // unknown status normalized with a warning
        assert_eq!(epic.phases[1].status, Status::Pending);
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("blocked"));

        let failing = epic.find_test("1A_T1").unwrap();
        assert_eq!(failing.status, TestStatus::FAILING);
        assert_eq!(failing.failure_note.as_deref(), Some("off by one"));
        assert_eq!(failing.failed_at, Some(ts("2025-01-03T10:00:00Z")));

        // phase_id inferred from the task
        assert_eq!(epic.find_test("2A_T1").unwrap().phase_id, "2A");

        assert_eq!(epic.events.len(), 2);
        assert_eq!(epic.events[0].event_type, EventType::PhaseStarted);
        assert_eq!(epic.events[1].files, ["src/a.rs", "src/b.rs"]);
        assert_eq!(epic.events[1].data, "Use i64 cents");
        assert_eq!(
            epic.current_state.as_ref().unwrap().active_task.as_deref(),
            Some("1A_1")
        );
    }

    #[test]
    fn rejects_duplicate_ids() {
        let raw = r#"<epic id="1" name="x" status="pending">
  <phases><phase id="1A" name="a" status="pending"/><phase id="1A" name="b" status="pending"/></phases>
</epic>"#;
        let err = from_xml(raw).unwrap_err();
        assert_eq!(err.code(), ErrorCode::DuplicateId);
    }

    #[test]
    fn rejects_dangling_references() {
        let raw = r#"<epic id="1" name="x" status="pending">
  <phases><phase id="1A" name="a" status="pending"/></phases>
  <tasks><task id="2A_1" phase_id="2A" name="t" status="pending"/></tasks>
</epic>"#;
        let err = from_xml(raw).unwrap_err();
        assert_eq!(err.code(), ErrorCode::DanglingReference);
        assert!(err.to_string().contains("2A"), "{err}");
    }

    #[test]
    fn rejects_test_in_wrong_phase() {
        let raw = r#"<epic id="1" name="x" status="pending">
  <phases><phase id="1A" name="a" status="pending"/><phase id="2A" name="b" status="pending"/></phases>
  <tasks><task id="1A_1" phase_id="1A" name="t" status="pending"/></tasks>
  <tests><test id="1A_T1" task_id="1A_1" phase_id="2A" name="x" test_status="pending"/></tests>
</epic>"#;
        assert_eq!(from_xml(raw).unwrap_err().code(), ErrorCode::DanglingReference);
    }

    #[test]
    fn rejects_bad_timestamp() {
        let raw = r#"<epic id="1" name="x" status="pending" created_at="yesterday"/>"#;
        let err = from_xml(raw).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidTimestamp);
    }

    #[test]
    fn malformed_xml_is_a_parse_error() {
        let err = from_xml("<epic id=\"1\"><phases>").unwrap_err();
        assert_eq!(err.code(), ErrorCode::DocumentParseError);
    }

    #[test]
    fn rejects_foreign_root_element() {
        let err = from_xml("<other/>").unwrap_err();
        assert_eq!(err.code(), ErrorCode::DocumentParseError);
        assert!(err.to_string().contains("<other>"), "{err}");

        let pom = r#"<?xml version="1.0"?>
<!-- build -->
<project><modelVersion>4.0.0</modelVersion></project>"#;
        assert_eq!(from_xml(pom).unwrap_err().code(), ErrorCode::DocumentParseError);
    }

    #[test]
    fn rejects_epic_without_id() {
        for raw in [
            r#"<epic name="x" status="pending"/>"#,
            r#"<epic id="  " name="x" status="pending"/>"#,
        ] {
            let err = from_xml(raw).unwrap_err();
            assert_eq!(err.code(), ErrorCode::DocumentParseError, "{raw}");
            assert!(err.to_string().contains("id"), "{err}");
        }
    }

    #[test]
    fn empty_input_has_no_root() {
        assert_eq!(from_xml("  ").unwrap_err().code(), ErrorCode::DocumentParseError);
    }

    #[test]
    fn missing_status_is_pending_without_warning() {
        let raw = r#"<epic id="1" name="x">
  <phases><phase id="1A" name="a"/></phases>
  <tasks><task id="1A_1" phase_id="1A" name="t"/></tasks>
  <tests><test id="1A_T1" task_id="1A_1" name="x"/></tests>
</epic>"#;
        let loaded = from_xml(raw).unwrap();
        assert!(loaded.warnings.is_empty(), "{:?}", loaded.warnings);
        assert_eq!(loaded.epic.status, Status::Pending);
        assert_eq!(loaded.epic.phases[0].status, Status::Pending);
        assert_eq!(loaded.epic.tasks[0].status, Status::Pending);
        assert_eq!(loaded.epic.tests[0].status, TestStatus::Pending);
    }

    #[test]
    fn read_error_names_cause_once() {
        use std::error::Error as _;
        let dir = TempDir::new().unwrap();
        let err = load(&dir.path().join("absent.xml")).unwrap_err();
        let cause = err.source().unwrap().to_string();
        assert!(!err.to_string().contains(&cause), "{err}");
    }

    #[test]
    fn save_then_load_preserves_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("epic.xml");

        let mut epic = Epic::new("9", "Round & trip <ok>");
        epic.created_at = Some(ts("2025-02-01T08:00:00Z"));
        epic.description = "quotes \"and\" ampersands &".into();
        epic.phases = vec![Phase::new("1A", "One").with_status(Status::Wip)];
        epic.tasks = vec![Task::new("1A_1", "1A", "Task")];
        epic.tests = vec![
            Test::new("1A_T1", "1A_1", "1A", "passes").with_status(TestStatus::PASSING),
            Test::new("1A_T2", "1A_1", "1A", "cancelled").with_status(TestStatus::Cancelled),
        ];
        epic.tests[1].cancellation_reason = Some("obsolete".into());
        epic.current_state = Some(CurrentState {
            active_phase: Some("1A".into()),
            active_task: None,
            next_action: "Start next task: Task".into(),
        });
        epic.events = vec![
            Event::new(ts("2025-02-01T08:01:00Z"), EventType::Note, "hello world")
                .by_agent(Some("bot".into()))
                .with_files(vec!["a.rs".into()]),
        ];

        save(&path, &epic).unwrap();
        assert!(!tmp_path(&path).exists());
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("<?xml version=\"1.0\""));
        assert!(written.contains("test_result=\"passing\""));

        let loaded = load(&path).unwrap();
        assert!(loaded.warnings.is_empty(), "{:?}", loaded.warnings);
        assert_eq!(loaded.epic, epic);
    }

    #[test]
    fn load_missing_file_is_read_error() {
        let dir = TempDir::new().unwrap();
        let err = load(&dir.path().join("absent.xml")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::DocumentReadFailed);
    }

    #[test]
    fn tmp_path_appends_suffix() {
        assert_eq!(tmp_path(Path::new("/a/epic.xml")), PathBuf::from("/a/epic.xml.tmp"));
    }
}
