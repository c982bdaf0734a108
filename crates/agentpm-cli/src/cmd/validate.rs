//! `agentpm validate`: Structural checks on the epic document.
//!
//! The report always goes to stdout. When any error-level finding exists
//! the command then fails with `validation_failed` so scripts can gate on
//! the exit code.

use crate::context::Project;
use crate::errors::CommandError;
use crate::output::{OutputMode, render, section};
use agentpm_core::check::{self, CheckReport, Finding};
use serde::Serialize;
use std::io::{self, Write};

#[derive(Debug, Serialize)]
struct ValidateOutput {
    path: String,
    /// Issues the parser tolerated while loading.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    load_warnings: Vec<String>,
    #[serde(flatten)]
    report: CheckReport,
}

fn write_findings(w: &mut dyn Write, label: &str, findings: &[Finding]) -> io::Result<()> {
    for f in findings {
        write!(w, "  {label} [{}]", f.rule.as_str())?;
        if let Some(entity) = &f.entity {
            write!(w, " {entity}:")?;
        }
        writeln!(w, " {}", f.message)?;
    }
    Ok(())
}

fn render_text(out: &ValidateOutput, w: &mut dyn Write) -> io::Result<()> {
    let report = &out.report;
    if report.valid {
        writeln!(
            w,
            "✓ {} is valid ({} warning(s))",
            out.path,
            report.warnings.len() + out.load_warnings.len()
        )?;
    } else {
        writeln!(
            w,
            "✗ {} has {} error(s), {} warning(s)",
            out.path,
            report.errors.len(),
            report.warnings.len() + out.load_warnings.len()
        )?;
    }
    if report.errors.is_empty() && report.warnings.is_empty() && out.load_warnings.is_empty() {
        return Ok(());
    }
    writeln!(w)?;
    section(w, "Findings")?;
    write_findings(w, "error", &report.errors)?;
    write_findings(w, "warning", &report.warnings)?;
    for warning in &out.load_warnings {
        writeln!(w, "  warning [load] {warning}")?;
    }
    Ok(())
}

pub fn run_validate(project: &Project, output: OutputMode) -> anyhow::Result<()> {
    let loaded = project.load()?;
    let report = check::check(&loaded.epic);
    let errors = report.errors.len();
    tracing::debug!(
        errors,
        warnings = report.warnings.len(),
        "validated {}",
        project.epic_path.display()
    );

    let out = ValidateOutput {
        path: project.epic_path.display().to_string(),
        load_warnings: loaded.warnings,
        report,
    };
    let valid = out.report.valid;
    render(output, &out, render_text)?;
    if valid {
        Ok(())
    } else {
        Err(CommandError::ValidationFailed { errors }.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentpm_core::model::{Epic, Phase, Status};

    fn output_for(doc: &Epic) -> ValidateOutput {
        ValidateOutput {
            path: "epic.xml".into(),
            load_warnings: Vec::new(),
            report: check::check(doc),
        }
    }

    #[test]
    fn two_active_phases_are_reported() {
        let mut doc = Epic::new("1", "Broken");
        doc.status = Status::Wip;
        doc.phases = vec![
            Phase::new("1A", "One").with_status(Status::Wip),
            Phase::new("1B", "Two").with_status(Status::Wip),
        ];
        let out = output_for(&doc);
        assert!(!out.report.valid);

        let mut buf = Vec::new();
        render_text(&out, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("✗ epic.xml has"));
        assert!(text.contains("error [single_active_phase]"));
    }

    #[test]
    fn json_flattens_report() {
        let out = output_for(&Epic::new("1", "Empty"));
        let value = serde_json::to_value(&out).unwrap();
        assert!(value["valid"].is_boolean());
        assert!(value["errors"].is_array());
        assert!(value.get("load_warnings").is_none());
    }
}
