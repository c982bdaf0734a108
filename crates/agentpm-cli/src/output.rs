//! Shared output layer for text/JSON/XML parity across all CLI commands.
//!
//! Every command handler receives an [`OutputMode`] and formats its payload
//! accordingly: compact text for humans and agents, or a stable JSON or XML
//! document for tools.
//!
//! # Output mode resolution
//!
//! Precedence (highest wins):
//! 1. `--format`
//! 2. `AGENTPM_FORMAT` env var → `"text"` | `"json"` | `"xml"`
//! 3. Default: [`OutputMode::Text`].

use agentpm_core::hints::Hint;
use clap::ValueEnum;
use serde::Serialize;
use std::io::{self, Write};

/// Root element for XML payloads.
pub const XML_ROOT: &str = "agentpm";

/// Shared width for text separators.
pub const RULE_WIDTH: usize = 72;

/// Write a horizontal separator.
pub fn rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{:-<width$}", "", width = RULE_WIDTH)
}

/// Write a section heading followed by a separator.
pub fn section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    rule(w)
}

/// Render a left-aligned key/value line.
pub fn kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<14} {}", format!("{key}:"), value.as_ref())
}

/// The three output formats supported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputMode {
    /// Plain text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
    /// Indented XML under an `<agentpm>` root.
    Xml,
}

/// Core resolution logic, separated from I/O for testability.
fn resolve_output_mode_inner(format_flag: Option<OutputMode>, format_env: Option<&str>) -> OutputMode {
    if let Some(mode) = format_flag {
        return mode;
    }
    if let Some(val) = format_env {
        match val.trim().to_lowercase().as_str() {
            "json" => return OutputMode::Json,
            "xml" => return OutputMode::Xml,
            "text" => return OutputMode::Text,
            other => tracing::debug!(value = other, "ignoring unknown AGENTPM_FORMAT"),
        }
    }
    OutputMode::Text
}

/// Resolve the output mode from the `--format` flag and `AGENTPM_FORMAT`.
pub fn resolve_output_mode(format_flag: Option<OutputMode>) -> OutputMode {
    let env_val = std::env::var("AGENTPM_FORMAT").ok();
    resolve_output_mode_inner(format_flag, env_val.as_deref())
}

/// Serialize `value` as an indented XML document rooted at `root`.
pub fn to_xml<T: Serialize>(root: &str, value: &T) -> anyhow::Result<String> {
    let mut body = String::new();
    let mut ser = quick_xml::se::Serializer::with_root(&mut body, Some(root))?;
    ser.indent(' ', 2);
    value.serialize(ser)?;
    Ok(format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{body}\n"))
}

/// Write `value` to `w` in the requested format; text uses `text_fn`.
pub fn write_payload<T: Serialize>(
    w: &mut dyn Write,
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut *w, value)?;
            writeln!(w)?;
        }
        OutputMode::Xml => w.write_all(to_xml(XML_ROOT, value)?.as_bytes())?,
        OutputMode::Text => text_fn(value, w)?,
    }
    Ok(())
}

/// Render a serializable value to stdout in the requested format.
pub fn render<T: Serialize>(
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_payload(&mut out, mode, value, text_fn)
}

/// A structured error with an optional remediation hint.
#[derive(Debug, Clone, Serialize)]
pub struct CliError {
    /// Human-readable error message.
    pub message: String,
    /// Machine-readable error code (e.g. "E2003").
    pub error_code: String,
    /// Taxonomy bucket (e.g. "precondition_failed").
    pub kind: String,
    /// Suggestion for how to fix the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Command that moves things forward, when one applies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Where to read more (a doc section or config key).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint_priority: Option<String>,
    /// Structured payload (batch validation, prerequisite list).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CliError {
    pub fn new(message: impl Into<String>, error_code: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_code: error_code.into(),
            kind: kind.into(),
            suggestion: None,
            command: None,
            reference: None,
            hint_category: None,
            hint_priority: None,
            details: None,
        }
    }

    /// Attach every part of `hint`; `None` clears the suggestion fields.
    #[must_use]
    pub fn with_hint(mut self, hint: Option<Hint>) -> Self {
        self.hint_category = hint.as_ref().map(|h| h.category.to_string());
        self.hint_priority = hint.as_ref().map(|h| h.priority.to_string());
        self.suggestion = hint.as_ref().map(|h| h.content.clone());
        self.command = hint.as_ref().and_then(|h| h.command.clone());
        self.reference = hint.and_then(|h| h.reference);
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: &'a CliError,
}

/// Write `error` to `w` in the requested format.
pub fn write_error(w: &mut dyn Write, mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut *w, &ErrorEnvelope { error })?;
            writeln!(w)?;
        }
        OutputMode::Xml => {
            // Arbitrary JSON details do not always map onto XML names.
            let xml = to_xml("error", error).or_else(|_| {
                let mut plain = error.clone();
                plain.details = None;
                to_xml("error", &plain)
            })?;
            w.write_all(xml.as_bytes())?;
        }
        OutputMode::Text => {
            writeln!(w, "error[{}]: {}", error.error_code, error.message)?;
            if let Some(ref suggestion) = error.suggestion {
                writeln!(w, "  hint: {suggestion}")?;
            }
            if let Some(ref command) = error.command {
                writeln!(w, "  try:  {command}")?;
            }
            if let Some(ref reference) = error.reference {
                writeln!(w, "  see:  {reference}")?;
            }
        }
    }
    Ok(())
}

/// Render an error to stderr in the requested format.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    write_error(&mut out, mode, error)
}
