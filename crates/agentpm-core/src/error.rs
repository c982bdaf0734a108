use serde::Serialize;
use std::fmt;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    DocumentParseError,
    EntityNotFound,
    InvalidStateTransition,
    PreconditionFailed,
    AmbiguousId,
    UnrecognizedId,
    DanglingReference,
    DuplicateId,
    InvalidTimestamp,
    ValidationFailed,
    BatchInvalid,
    EmptyBatch,
    DocumentWriteFailed,
    DocumentReadFailed,
    InvalidArgument,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::DocumentParseError => "E1003",
            Self::EntityNotFound => "E2001",
            Self::InvalidStateTransition => "E2002",
            Self::PreconditionFailed => "E2003",
            Self::AmbiguousId => "E2004",
            Self::UnrecognizedId => "E2005",
            Self::DanglingReference => "E3001",
            Self::DuplicateId => "E3002",
            Self::InvalidTimestamp => "E3003",
            Self::ValidationFailed => "E3004",
            Self::BatchInvalid => "E4001",
            Self::EmptyBatch => "E4002",
            Self::DocumentWriteFailed => "E5001",
            Self::DocumentReadFailed => "E5002",
            Self::InvalidArgument => "E6001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Project not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::DocumentParseError => "Epic document parse error",
            Self::EntityNotFound => "Entity not found",
            Self::InvalidStateTransition => "Invalid state transition",
            Self::PreconditionFailed => "Transition prerequisite not met",
            Self::AmbiguousId => "Ambiguous entity ID",
            Self::UnrecognizedId => "Unrecognized entity ID",
            Self::DanglingReference => "Dangling entity reference",
            Self::DuplicateId => "Duplicate entity ID",
            Self::InvalidTimestamp => "Invalid timestamp",
            Self::ValidationFailed => "Document failed validation",
            Self::BatchInvalid => "Batch validation failed",
            Self::EmptyBatch => "Empty batch",
            Self::DocumentWriteFailed => "Epic document write failed",
            Self::DocumentReadFailed => "Epic document read failed",
            Self::InvalidArgument => "Invalid argument",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => {
                Some("Run `agentpm init --epic <path>` or pass --file <epic.xml>.")
            }
            Self::ConfigParseError => Some("Fix the JSON syntax in .agentpm.json and retry."),
            Self::DocumentParseError => Some("Fix the XML syntax of the epic document and retry."),
            Self::EntityNotFound => None,
            Self::InvalidStateTransition => {
                Some("Follow valid transitions: pending -> wip -> done (or cancelled).")
            }
            Self::PreconditionFailed => Some("Resolve the listed prerequisites and retry."),
            Self::AmbiguousId => Some("Name the entity kind explicitly (phase, task, test)."),
            Self::UnrecognizedId => {
                Some("Use IDs like 1A (phase), 1A_1 (task) or 1A_T1 (test).")
            }
            Self::DanglingReference => Some("Point the reference at an existing entity."),
            Self::DuplicateId => Some("Give every phase, task and test a unique ID."),
            Self::InvalidTimestamp => Some("Use RFC3339 timestamps such as 2025-01-02T15:04:05Z."),
            Self::ValidationFailed => Some("Fix the reported errors, then rerun `agentpm validate`."),
            Self::BatchInvalid => Some("Fix the invalid operations; nothing was applied."),
            Self::EmptyBatch => Some("Pass at least one operation such as pass:1A_T1."),
            Self::DocumentWriteFailed => Some("Check disk space and write permissions."),
            Self::DocumentReadFailed => Some("Check that the epic document path exists."),
            Self::InvalidArgument => Some("Run `agentpm help` for usage."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }

    /// Taxonomy bucket used by hint selection and exit-code mapping.
    #[must_use]
    pub const fn kind(self) -> ErrorKind {
        match self {
            Self::EntityNotFound => ErrorKind::NotFound,
            Self::InvalidStateTransition => ErrorKind::InvalidTransition,
            Self::PreconditionFailed => ErrorKind::PreconditionFailed,
            Self::BatchInvalid | Self::EmptyBatch => ErrorKind::BatchInvalid,
            Self::ValidationFailed => ErrorKind::ValidationFailed,
            Self::NotInitialized | Self::ConfigParseError => ErrorKind::ConfigError,
            Self::DocumentParseError
            | Self::DanglingReference
            | Self::DuplicateId
            | Self::InvalidTimestamp
            | Self::DocumentWriteFailed
            | Self::DocumentReadFailed
            | Self::InternalUnexpected => ErrorKind::IoError,
            Self::AmbiguousId | Self::UnrecognizedId | Self::InvalidArgument => {
                ErrorKind::UsageError
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Error taxonomy shared by the engine, the CLI, and the hint registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidTransition,
    PreconditionFailed,
    /// Not a failure: the requested effect already holds.
    AlreadyInTarget,
    BatchInvalid,
    ValidationFailed,
    IoError,
    ConfigError,
    UsageError,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidTransition => "invalid_transition",
            Self::PreconditionFailed => "precondition_failed",
            Self::AlreadyInTarget => "already_in_target",
            Self::BatchInvalid => "batch_invalid",
            Self::ValidationFailed => "validation_failed",
            Self::IoError => "io_error",
            Self::ConfigError => "config_error",
            Self::UsageError => "usage_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorCode, ErrorKind};
    use std::collections::HashSet;

    const ALL: [ErrorCode; 18] = [
        ErrorCode::NotInitialized,
        ErrorCode::ConfigParseError,
        ErrorCode::DocumentParseError,
        ErrorCode::EntityNotFound,
        ErrorCode::InvalidStateTransition,
        ErrorCode::PreconditionFailed,
        ErrorCode::AmbiguousId,
        ErrorCode::UnrecognizedId,
        ErrorCode::DanglingReference,
        ErrorCode::DuplicateId,
        ErrorCode::InvalidTimestamp,
        ErrorCode::ValidationFailed,
        ErrorCode::BatchInvalid,
        ErrorCode::EmptyBatch,
        ErrorCode::DocumentWriteFailed,
        ErrorCode::DocumentReadFailed,
        ErrorCode::InvalidArgument,
        ErrorCode::InternalUnexpected,
    ];

    #[test]
    fn all_codes_are_unique() {
        let mut seen = HashSet::new();
        for code in ALL {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        for code in ALL {
            let s = code.code();
            assert_eq!(s.len(), 5);
            assert!(s.starts_with('E'));
            assert!(s.chars().skip(1).all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn kinds_cover_taxonomy() {
        assert_eq!(ErrorCode::EntityNotFound.kind(), ErrorKind::NotFound);
        assert_eq!(ErrorCode::NotInitialized.kind(), ErrorKind::ConfigError);
        assert_eq!(ErrorCode::UnrecognizedId.kind(), ErrorKind::UsageError);
        assert_eq!(ErrorCode::DocumentWriteFailed.kind(), ErrorKind::IoError);
        assert_eq!(ErrorKind::AlreadyInTarget.to_string(), "already_in_target");
    }
}
