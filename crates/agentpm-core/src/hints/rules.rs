//! The hint rule table.

use super::{ErrorContext, Hint, HintCategory, HintPriority};
use crate::error::ErrorKind;
use crate::model::EntityKind;

/// One rule: a predicate over the context and a hint builder.
pub struct HintRule {
    pub name: &'static str,
    /// Higher wins.
    pub priority: u8,
    pub matches: fn(&ErrorContext) -> bool,
    pub build: fn(&ErrorContext) -> Hint,
}

impl std::fmt::Debug for HintRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HintRule")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

static REGISTRY: [HintRule; 18] = [
    HintRule {
        name: "cancel_reason_missing",
        priority: 95,
        matches: |c| c.predicate() == Some("cancel_reason_missing"),
        build: cancel_reason_missing,
    },
    HintRule {
        name: "sibling_task_active",
        priority: 90,
        matches: |c| c.predicate() == Some("sibling_task_active"),
        build: sibling_task_active,
    },
    HintRule {
        name: "phase_not_active",
        priority: 85,
        matches: |c| c.predicate() == Some("phase_not_active"),
        build: phase_not_active,
    },
    HintRule {
        name: "other_phase_active",
        priority: 85,
        matches: |c| c.predicate() == Some("other_phase_active"),
        build: other_phase_active,
    },
    HintRule {
        name: "failing_tests_present",
        priority: 82,
        matches: |c| c.predicate() == Some("failing_tests_present"),
        build: failing_tests_present,
    },
    HintRule {
        name: "phase_test_prerequisite",
        priority: 80,
        matches: |c| c.predicate() == Some("phase_test_prerequisite"),
        build: phase_test_prerequisite,
    },
    HintRule {
        name: "tests_not_terminal",
        priority: 80,
        matches: |c| c.predicate() == Some("tests_not_terminal"),
        build: tests_not_terminal,
    },
    HintRule {
        name: "tasks_not_terminal",
        priority: 80,
        matches: |c| c.predicate() == Some("tasks_not_terminal"),
        build: tasks_not_terminal,
    },
    HintRule {
        name: "phases_not_done",
        priority: 75,
        matches: |c| c.predicate() == Some("phases_not_done"),
        build: phases_not_done,
    },
    HintRule {
        name: "epic_never_started",
        priority: 70,
        matches: |c| c.predicate() == Some("epic_never_started"),
        build: |_| {
            Hint::new(
                "The epic was never started, so there is nothing to resume",
                HintCategory::Actionable,
                HintPriority::High,
            )
            .with_command("agentpm start epic")
        },
    },
    HintRule {
        name: "terminal_state",
        priority: 65,
        matches: |c| {
            c.is(ErrorKind::InvalidTransition)
                && c.current_status.is_some_and(|s| {
                    matches!(
                        s,
                        crate::model::StateToken::Done | crate::model::StateToken::Cancelled
                    )
                })
        },
        build: terminal_state,
    },
    HintRule {
        name: "invalid_transition",
        priority: 60,
        matches: |c| c.is(ErrorKind::InvalidTransition),
        build: invalid_transition,
    },
    HintRule {
        name: "not_found",
        priority: 60,
        matches: |c| c.is(ErrorKind::NotFound),
        build: not_found,
    },
    HintRule {
        name: "batch_invalid",
        priority: 60,
        matches: |c| c.is(ErrorKind::BatchInvalid),
        build: batch_invalid,
    },
    HintRule {
        name: "validation_failed",
        priority: 58,
        matches: |c| c.is(ErrorKind::ValidationFailed),
        build: |_| {
            Hint::new(
                "The document breaks structural rules; fix the reported entities by hand",
                HintCategory::Diagnostic,
                HintPriority::Medium,
            )
            .with_command("agentpm validate --format json")
        },
    },
    HintRule {
        name: "config_error",
        priority: 55,
        matches: |c| c.is(ErrorKind::ConfigError),
        build: |_| {
            Hint::new(
                "No epic document is configured for this directory",
                HintCategory::Configuration,
                HintPriority::High,
            )
            .with_command("agentpm init --epic <path/to/epic.xml>")
            .with_reference(".agentpm.json: {\"current_epic\": \"...\"}")
        },
    },
    HintRule {
        name: "usage_error",
        priority: 50,
        matches: |c| c.is(ErrorKind::UsageError),
        build: |_| {
            Hint::new(
                "IDs look like 1A (phase), 1A_1 (task) or 1A_T1 (test)",
                HintCategory::Informational,
                HintPriority::Medium,
            )
            .with_command("agentpm show <id>")
        },
    },
    HintRule {
        name: "fallback",
        priority: 0,
        matches: |_| true,
        build: |_| {
            Hint::new(
                "Check the current state and the suggested next action",
                HintCategory::Workflow,
                HintPriority::Low,
            )
            .with_command("agentpm current")
        },
    },
];

/// All rules in registry order.
#[must_use]
pub fn registry() -> &'static [HintRule] {
    &REGISTRY
}

fn entity_id(ctx: &ErrorContext) -> &str {
    ctx.entity_id.as_deref().unwrap_or("<id>")
}

fn blocking(ctx: &ErrorContext) -> String {
    ctx.extra("blocking").unwrap_or_default().replace(',', ", ")
}

fn cancel_reason_missing(ctx: &ErrorContext) -> Hint {
    let command = match ctx.kind {
        Some(EntityKind::Task) => format!("agentpm cancel-task {} \"<reason>\"", entity_id(ctx)),
        _ => format!("agentpm cancel-test {} \"<reason>\"", entity_id(ctx)),
    };
    Hint::new(
        "Cancelling requires a non-empty reason",
        HintCategory::Actionable,
        HintPriority::High,
    )
    .with_command(command)
}

fn sibling_task_active(ctx: &ErrorContext) -> Hint {
    let active = ctx.first_blocking().unwrap_or("<task>");
    Hint::new(
        format!("Task {active} is still in progress; finish or cancel it first"),
        HintCategory::Actionable,
        HintPriority::High,
    )
    .with_command(format!("agentpm done task {active}"))
    .with_reference("Only one task per phase may be wip")
}

fn phase_not_active(ctx: &ErrorContext) -> Hint {
    let phase = ctx.extra("phase_id").unwrap_or("<phase>");
    match ctx.extra("active_phase") {
        Some(active) => Hint::new(
            format!("{} belongs to phase {phase}, but phase {active} is active", entity_id(ctx)),
            HintCategory::Workflow,
            HintPriority::High,
        )
        .with_command(format!("agentpm done phase {active}")),
        None => Hint::new(
            format!("Phase {phase} has not been started"),
            HintCategory::Actionable,
            HintPriority::High,
        )
        .with_command(format!("agentpm start phase {phase}")),
    }
}

fn other_phase_active(ctx: &ErrorContext) -> Hint {
    let active = ctx.first_blocking().unwrap_or("<phase>");
    Hint::new(
        format!("Phase {active} is still active; complete it before starting another"),
        HintCategory::Workflow,
        HintPriority::High,
    )
    .with_command(format!("agentpm done phase {active}"))
    .with_reference("Only one phase may be wip at a time")
}

fn failing_tests_present(ctx: &ErrorContext) -> Hint {
    Hint::new(
        format!("Fix the failing tests first: {}", blocking(ctx)),
        HintCategory::Actionable,
        HintPriority::High,
    )
    .with_command("agentpm failing")
}

fn phase_test_prerequisite(ctx: &ErrorContext) -> Hint {
    let first = ctx.first_blocking().unwrap_or("<test>");
    Hint::new(
        format!("Tests in earlier phases are unresolved: {}", blocking(ctx)),
        HintCategory::Actionable,
        HintPriority::High,
    )
    .with_command(format!("agentpm pass-test {first}"))
    .with_reference("--allow-failing-tests accepts failing tests in earlier phases")
}

fn tests_not_terminal(ctx: &ErrorContext) -> Hint {
    let first = ctx.first_blocking().unwrap_or("<test>");
    Hint::new(
        format!("Tests are still open: {}", blocking(ctx)),
        HintCategory::Actionable,
        HintPriority::High,
    )
    .with_command(format!("agentpm pass-test {first}"))
    .with_reference("--allow-open-tests completes a task with pending tests")
}

fn tasks_not_terminal(ctx: &ErrorContext) -> Hint {
    let first = ctx.first_blocking().unwrap_or("<task>");
    Hint::new(
        format!("Tasks are not finished: {}", blocking(ctx)),
        HintCategory::Actionable,
        HintPriority::High,
    )
    .with_command(format!("agentpm done task {first}"))
}

fn phases_not_done(ctx: &ErrorContext) -> Hint {
    let first = ctx.first_blocking().unwrap_or("<phase>");
    Hint::new(
        format!("Phases are not done: {}", blocking(ctx)),
        HintCategory::Workflow,
        HintPriority::Medium,
    )
    .with_command(format!("agentpm start phase {first}"))
}

fn terminal_state(ctx: &ErrorContext) -> Hint {
    let state = ctx.current_status.map_or("terminal", |s| s.as_str());
    Hint::new(
        format!("{} is {state}; terminal states cannot change", entity_id(ctx)),
        HintCategory::Informational,
        HintPriority::Medium,
    )
    .with_command("agentpm current")
}

fn invalid_transition(ctx: &ErrorContext) -> Hint {
    let verb = ctx.verb.map_or("this action", |v| v.as_str());
    let state = ctx.current_status.map_or("its current state", |s| s.as_str());
    let id = entity_id(ctx);
    Hint::new(
        format!("{id} is {state}, which does not allow '{verb}'"),
        HintCategory::Informational,
        HintPriority::Medium,
    )
    .with_command(format!("agentpm show {id}"))
}

fn not_found(ctx: &ErrorContext) -> Hint {
    let noun = ctx.kind.map_or("entity", EntityKind::as_str);
    Hint::new(
        format!("No {noun} with ID {} exists in this epic", entity_id(ctx)),
        HintCategory::Diagnostic,
        HintPriority::Medium,
    )
    .with_command("agentpm status")
}

fn batch_invalid(ctx: &ErrorContext) -> Hint {
    let content = match ctx.extra("dominant") {
        Some("phase_violations") => {
            "Some tests are outside the active phase; drop them or switch phases"
        }
        Some("tests_not_found") => "Some test IDs do not exist; check them with `agentpm status`",
        _ => "Fix the listed operations and resubmit the whole batch",
    };
    Hint::new(content, HintCategory::Actionable, HintPriority::Medium)
        .with_command("agentpm current")
        .with_reference("Batches are all-or-nothing; nothing was applied")
}
