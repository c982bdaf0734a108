//! Turns a command failure into an exit code and a rendered [`CliError`].
//!
//! Commands return `anyhow::Error`; the root cause is one of the core
//! error enums (or [`CommandError`]) and is found by downcasting.

use crate::output::CliError;
use agentpm_core::batch::{BatchError, ParseOpError};
use agentpm_core::config::ConfigError;
use agentpm_core::engine::TransitionError;
use agentpm_core::error::{ErrorCode, ErrorKind};
use agentpm_core::hints::{self, ErrorContext, Hint, HintCategory, HintConfig, HintPriority};
use agentpm_core::model::event::UnknownLogType;
use agentpm_core::query::QueryError;
use agentpm_core::router::RouteError;
use agentpm_core::store::DocumentError;
use serde_json::json;

/// Process exit codes.
pub mod exit {
    pub const SUCCESS: u8 = 0;
    /// Rejected transition, invalid batch, failed validation.
    pub const REJECTED: u8 = 1;
    /// Configuration or I/O error.
    pub const ENVIRONMENT: u8 = 2;
    /// Bad arguments or unroutable IDs.
    pub const USAGE: u8 = 3;
}

/// Failures raised by the CLI itself rather than the core.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{message}")]
    Usage { message: String },

    #[error("{path} already exists (pass --force to overwrite)")]
    AlreadyInitialized { path: String },

    #[error("document failed validation with {errors} error(s)")]
    ValidationFailed { errors: usize },
}

impl CommandError {
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Usage { .. } | Self::AlreadyInitialized { .. } => ErrorCode::InvalidArgument,
            Self::ValidationFailed { .. } => ErrorCode::ValidationFailed,
        }
    }
}

pub const fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::NotFound
        | ErrorKind::InvalidTransition
        | ErrorKind::PreconditionFailed
        | ErrorKind::AlreadyInTarget
        | ErrorKind::BatchInvalid
        | ErrorKind::ValidationFailed => exit::REJECTED,
        ErrorKind::IoError | ErrorKind::ConfigError => exit::ENVIRONMENT,
        ErrorKind::UsageError => exit::USAGE,
    }
}

/// What the renderer needs to know about a failure.
#[derive(Debug)]
struct Classified {
    code: ErrorCode,
    context: ErrorContext,
    details: Option<serde_json::Value>,
}

impl Classified {
    fn new(code: ErrorCode) -> Self {
        Self {
            code,
            context: ErrorContext::new(code.kind()),
            details: None,
        }
    }
}

fn transition_details(err: &TransitionError) -> Option<serde_json::Value> {
    let failures: Vec<_> = err
        .failures()
        .iter()
        .map(|f| {
            json!({
                "predicate": f.name(),
                "message": f.to_string(),
                "entities": f.entities(),
            })
        })
        .collect();
    (!failures.is_empty()).then(|| json!({ "failures": failures }))
}

fn classify_transition(err: &TransitionError) -> Classified {
    Classified {
        code: err.code(),
        context: ErrorContext::from_transition(err),
        details: transition_details(err),
    }
}

fn classify(err: &anyhow::Error) -> Classified {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<TransitionError>() {
            return classify_transition(e);
        }
        if let Some(e) = cause.downcast_ref::<BatchError>() {
            return match e {
                BatchError::Transition(inner) => classify_transition(inner),
                BatchError::Invalid(validation) => Classified {
                    code: e.code(),
                    context: ErrorContext::from_batch(validation),
                    details: serde_json::to_value(validation.as_ref()).ok(),
                },
                BatchError::Empty => Classified::new(e.code()),
            };
        }
        if let Some(e) = cause.downcast_ref::<RouteError>() {
            let (RouteError::Ambiguous { id, .. } | RouteError::Unrecognized { id }) = e;
            let mut classified = Classified::new(e.code());
            classified.context.entity_id = Some(id.clone());
            return classified;
        }
        if let Some(e) = cause.downcast_ref::<QueryError>() {
            let QueryError::NotFound { kind, id } = e;
            let mut classified = Classified::new(e.code());
            classified.context = classified.context.with_entity(*kind, id.clone());
            return classified;
        }
        if let Some(e) = cause.downcast_ref::<ConfigError>() {
            return Classified::new(e.code());
        }
        if let Some(e) = cause.downcast_ref::<DocumentError>() {
            return Classified::new(e.code());
        }
        if let Some(e) = cause.downcast_ref::<CommandError>() {
            return Classified::new(e.code());
        }
        if cause.downcast_ref::<ParseOpError>().is_some()
            || cause.downcast_ref::<UnknownLogType>().is_some()
        {
            return Classified::new(ErrorCode::InvalidArgument);
        }
    }
    Classified::new(ErrorCode::InternalUnexpected)
}

/// Environment failures get the code's static remediation; workflow
/// failures go through the hint rules.
fn pick_hint(classified: &Classified, config: &HintConfig) -> Option<Hint> {
    let static_hint = matches!(
        classified.code,
        ErrorCode::ConfigParseError | ErrorCode::InternalUnexpected
    ) || classified.code.kind() == ErrorKind::IoError;

    if static_hint {
        return classified
            .code
            .hint()
            .map(|h| Hint::new(h, HintCategory::Diagnostic, HintPriority::Medium))
            .and_then(|h| config.admit(h));
    }
    hints::generate(&classified.context, config)
}

/// Exit code and renderable error for `err`.
pub fn report(err: &anyhow::Error, config: &HintConfig) -> (u8, CliError) {
    let classified = classify(err);
    let hint = pick_hint(&classified, config);
    tracing::debug!(code = %classified.code, kind = %classified.code.kind(), "command failed: {err:#}");

    let mut cli_error = CliError::new(
        format!("{err:#}"),
        classified.code.code(),
        classified.code.kind().as_str(),
    )
    .with_hint(hint);
    if let Some(details) = classified.details {
        cli_error = cli_error.with_details(details);
    }
    (exit_code(classified.code.kind()), cli_error)
}
