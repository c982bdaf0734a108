//! Remediation hints for failed operations.
//!
//! Failures are described by an [`ErrorContext`]; the closed rule table in
//! [`rules`] maps a context to at most one [`Hint`]. The highest-priority
//! matching rule wins, ties going to the earlier rule. A fallback rule
//! matches everything, so there is always a candidate.

pub mod rules;

use crate::batch::BatchValidation;
use crate::engine::TransitionError;
use crate::error::ErrorKind;
use crate::lifecycle::Verb;
use crate::model::{EntityKind, StateToken};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub use rules::{HintRule, registry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HintCategory {
    Actionable,
    Informational,
    Diagnostic,
    Workflow,
    Configuration,
}

impl HintCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Actionable => "actionable",
            Self::Informational => "informational",
            Self::Diagnostic => "diagnostic",
            Self::Workflow => "workflow",
            Self::Configuration => "configuration",
        }
    }
}

impl fmt::Display for HintCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum HintPriority {
    #[default]
    Low,
    Medium,
    High,
}

impl HintPriority {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for HintPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hint {
    pub content: String,
    pub category: HintCategory,
    pub priority: HintPriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl Hint {
    #[must_use]
    pub fn new(content: impl Into<String>, category: HintCategory, priority: HintPriority) -> Self {
        Self {
            content: content.into(),
            category,
            priority,
            command: None,
            reference: None,
        }
    }

    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// The `hints` section of `.agentpm.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HintConfig {
    pub enabled: bool,
    pub show_commands: bool,
    pub show_references: bool,
    pub min_priority: HintPriority,
}

impl Default for HintConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            show_commands: true,
            show_references: true,
            min_priority: HintPriority::Low,
        }
    }
}

impl HintConfig {
    /// `hint` with hidden parts removed, or `None` when hints are disabled
    /// or it falls below `min_priority`.
    #[must_use]
    pub fn admit(&self, mut hint: Hint) -> Option<Hint> {
        if !self.enabled || hint.priority < self.min_priority {
            return None;
        }
        if !self.show_commands {
            hint.command = None;
        }
        if !self.show_references {
            hint.reference = None;
        }
        Some(hint)
    }
}

/// Everything a rule may inspect about a failure.
///
/// `extra` carries rule-specific facts: `predicate` (name of the primary
/// unmet prerequisite), `blocking` (comma-separated entity IDs),
/// `active_phase`, `phase_id`, `reason_required`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ErrorContext {
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verb: Option<Verb>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<EntityKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_status: Option<StateToken>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_status: Option<StateToken>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl ErrorContext {
    #[must_use]
    pub fn new(error_kind: ErrorKind) -> Self {
        Self {
            error_kind: Some(error_kind),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_entity(mut self, kind: EntityKind, id: impl Into<String>) -> Self {
        self.kind = Some(kind);
        self.entity_id = Some(id.into());
        self
    }

    #[must_use]
    pub const fn with_verb(mut self, verb: Verb) -> Self {
        self.verb = Some(verb);
        self
    }

    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extra.get(key).map(String::as_str)
    }

    /// Name of the primary unmet prerequisite, if any.
    #[must_use]
    pub fn predicate(&self) -> Option<&str> {
        self.extra("predicate")
    }

    /// First blocking entity ID, if any.
    #[must_use]
    pub fn first_blocking(&self) -> Option<&str> {
        self.extra("blocking")
            .and_then(|b| b.split(',').next())
            .filter(|id| !id.is_empty())
    }

    #[must_use]
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.error_kind == Some(kind)
    }

    /// Describe a refused transition.
    #[must_use]
    pub fn from_transition(err: &TransitionError) -> Self {
        let mut ctx = Self::new(err.kind());
        ctx.verb = err.verb();
        ctx.kind = Some(err.entity_kind());
        ctx.entity_id = err.entity_id().map(str::to_string);

        match err {
            TransitionError::InvalidTransition { from, to, .. } => {
                ctx.current_status = Some(*from);
                ctx.target_status = Some(*to);
            }
            TransitionError::PreconditionFailed { failures, .. } => {
                if let Some(primary) = failures.first() {
                    ctx = ctx
                        .with_extra("predicate", primary.name())
                        .with_extra("blocking", primary.entities().join(","));
                    if let crate::lifecycle::Unmet::PhaseNotActive {
                        phase_id,
                        active_phase,
                    } = primary
                    {
                        ctx = ctx.with_extra("phase_id", phase_id.clone());
                        if let Some(active) = active_phase {
                            ctx = ctx.with_extra("active_phase", active.clone());
                        }
                    }
                }
            }
            TransitionError::NotFound { .. } | TransitionError::UnsupportedVerb { .. } => {}
        }
        ctx
    }

    /// Describe a rejected batch: the dominant violation class decides the
    /// hint.
    #[must_use]
    pub fn from_batch(validation: &BatchValidation) -> Self {
        let s = &validation.summary;
        let dominant = if s.phase_violations >= s.tests_not_found.max(s.status_violations) {
            "phase_violations"
        } else if s.tests_not_found >= s.status_violations {
            "tests_not_found"
        } else {
            "status_violations"
        };
        let blocking: Vec<&str> = validation
            .invalid_operations
            .iter()
            .map(|op| op.test_id.as_str())
            .collect();
        Self::new(ErrorKind::BatchInvalid)
            .with_extra("dominant", dominant)
            .with_extra("blocking", blocking.join(","))
    }
}

/// The hint for `ctx` under `config`, or `None` when hints are disabled or
/// every candidate falls below the priority floor.
#[must_use]
pub fn generate(ctx: &ErrorContext, config: &HintConfig) -> Option<Hint> {
    if !config.enabled {
        return None;
    }
    candidates(ctx).into_iter().find_map(|h| config.admit(h))
}

/// Hints from every matching rule, best first.
#[must_use]
pub fn candidates(ctx: &ErrorContext) -> Vec<Hint> {
    let mut matching: Vec<&HintRule> = registry().iter().filter(|r| (r.matches)(ctx)).collect();
    // Stable sort keeps registry order among equal priorities.
    matching.sort_by(|a, b| b.priority.cmp(&a.priority));
    matching.into_iter().map(|r| (r.build)(ctx)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Unmet;

    fn sibling_ctx() -> ErrorContext {
        let err = TransitionError::PreconditionFailed {
            kind: EntityKind::Task,
            id: "1A_2".into(),
            verb: Verb::Start,
            failures: vec![Unmet::SiblingTaskActive {
                task_id: "1A_1".into(),
            }],
        };
        ErrorContext::from_transition(&err)
    }

    #[test]
    fn context_from_precondition() {
        let ctx = sibling_ctx();
        assert_eq!(ctx.error_kind, Some(ErrorKind::PreconditionFailed));
        assert_eq!(ctx.entity_id.as_deref(), Some("1A_2"));
        assert_eq!(ctx.predicate(), Some("sibling_task_active"));
        assert_eq!(ctx.first_blocking(), Some("1A_1"));
    }

    #[test]
    fn specific_rule_beats_fallback() {
        let hint = generate(&sibling_ctx(), &HintConfig::default()).unwrap();
        assert_eq!(hint.category, HintCategory::Actionable);
        assert_eq!(hint.priority, HintPriority::High);
        assert_eq!(hint.command.as_deref(), Some("agentpm done task 1A_1"));
    }

    #[test]
    fn fallback_always_present() {
        let all = candidates(&ErrorContext::default());
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].category, HintCategory::Workflow);
        assert_eq!(all[0].priority, HintPriority::Low);
    }

    #[test]
    fn config_filters() {
        let off = HintConfig {
            enabled: false,
            ..HintConfig::default()
        };
        assert!(generate(&sibling_ctx(), &off).is_none());

        let bare = HintConfig {
            show_commands: false,
            show_references: false,
            ..HintConfig::default()
        };
        let hint = generate(&sibling_ctx(), &bare).unwrap();
        assert!(hint.command.is_none());
        assert!(hint.reference.is_none());

        let floor = HintConfig {
            min_priority: HintPriority::Medium,
            ..HintConfig::default()
        };
        assert!(generate(&ErrorContext::default(), &floor).is_none());
    }

    #[test]
    fn admit_applies_floor_and_toggles() {
        let hint = Hint::new("check the path", HintCategory::Diagnostic, HintPriority::Medium)
            .with_reference("docs");
        let high = HintConfig {
            min_priority: HintPriority::High,
            ..HintConfig::default()
        };
        assert!(high.admit(hint.clone()).is_none());

        let no_refs = HintConfig {
            show_references: false,
            ..HintConfig::default()
        };
        let admitted = no_refs.admit(hint).unwrap();
        assert_eq!(admitted.content, "check the path");
        assert!(admitted.reference.is_none());
    }

    #[test]
    fn hint_config_deserializes_partial() {
        let cfg: HintConfig = serde_json::from_str(r#"{"min_priority":"high"}"#).unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.min_priority, HintPriority::High);
    }
}
