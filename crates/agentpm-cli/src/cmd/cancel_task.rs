//! `agentpm cancel-task`: Terminally cancel a pending or wip task.

use crate::cmd::transition::run_transition;
use crate::context::Project;
use crate::output::OutputMode;
use agentpm_core::lifecycle::{TransitionRequest, Verb};
use clap::Args;

#[derive(Args, Debug)]
pub struct CancelTaskArgs {
    /// Task ID (e.g. 1A_2).
    pub id: String,

    /// Why the task is dropped; recorded on the task and the event.
    #[arg(value_name = "REASON")]
    pub reason: Vec<String>,
}

pub fn run_cancel_task(
    args: &CancelTaskArgs,
    project: &Project,
    output: OutputMode,
) -> anyhow::Result<()> {
    let mut base = project.transition_args();
    if !args.reason.is_empty() {
        base.reason = Some(args.reason.join(" "));
    }
    let req = TransitionRequest::task(args.id.trim(), Verb::Cancel).with_args(base);
    run_transition(project, &req, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: CancelTaskArgs,
    }

    #[test]
    fn reason_words_are_collected() {
        let w = Wrapper::parse_from(["test", "1A_2", "superseded", "by", "1A_3"]);
        assert_eq!(w.args.id, "1A_2");
        assert_eq!(w.args.reason.join(" "), "superseded by 1A_3");
    }

    #[test]
    fn reason_is_optional() {
        let w = Wrapper::parse_from(["test", "1A_2"]);
        assert!(w.args.reason.is_empty());
    }
}
