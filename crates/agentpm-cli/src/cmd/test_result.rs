//! `agentpm pass-test`, `fail-test`, `cancel-test`: Record a test outcome.

use crate::cmd::transition::run_transition;
use crate::context::Project;
use crate::output::OutputMode;
use agentpm_core::lifecycle::{TransitionRequest, Verb};
use clap::Args;

#[derive(Args, Debug)]
pub struct PassTestArgs {
    /// Test ID (e.g. 1A_T1).
    pub id: String,
}

#[derive(Args, Debug)]
pub struct FailTestArgs {
    /// Test ID (e.g. 1A_T1).
    pub id: String,

    /// Optional failure note stored on the test.
    #[arg(value_name = "NOTE")]
    pub note: Vec<String>,
}

#[derive(Args, Debug)]
pub struct CancelTestArgs {
    /// Test ID (e.g. 1A_T1).
    pub id: String,

    /// Why the test no longer applies (required).
    #[arg(value_name = "REASON", required = true)]
    pub reason: Vec<String>,
}

fn run_test(
    id: &str,
    verb: Verb,
    words: &[String],
    project: &Project,
    output: OutputMode,
) -> anyhow::Result<()> {
    let mut base = project.transition_args();
    if !words.is_empty() {
        base.reason = Some(words.join(" "));
    }
    let req = TransitionRequest::test(id.trim(), verb).with_args(base);
    run_transition(project, &req, output)
}

pub fn run_pass_test(args: &PassTestArgs, project: &Project, output: OutputMode) -> anyhow::Result<()> {
    run_test(&args.id, Verb::Pass, &[], project, output)
}

pub fn run_fail_test(args: &FailTestArgs, project: &Project, output: OutputMode) -> anyhow::Result<()> {
    run_test(&args.id, Verb::Fail, &args.note, project, output)
}

pub fn run_cancel_test(
    args: &CancelTestArgs,
    project: &Project,
    output: OutputMode,
) -> anyhow::Result<()> {
    run_test(&args.id, Verb::Cancel, &args.reason, project, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct FailWrapper {
        #[command(flatten)]
        args: FailTestArgs,
    }

    #[derive(Parser)]
    struct CancelWrapper {
        #[command(flatten)]
        args: CancelTestArgs,
    }

    #[test]
    fn fail_note_optional() {
        let w = FailWrapper::parse_from(["test", "1A_T1"]);
        assert!(w.args.note.is_empty());
        let w = FailWrapper::parse_from(["test", "1A_T1", "off", "by", "one"]);
        assert_eq!(w.args.note.join(" "), "off by one");
    }

    #[test]
    fn cancel_requires_reason() {
        assert!(CancelWrapper::try_parse_from(["test", "1A_T1"]).is_err());
        let w = CancelWrapper::try_parse_from(["test", "1A_T1", "obsolete"]).unwrap();
        assert_eq!(w.args.reason, vec!["obsolete".to_string()]);
    }
}
