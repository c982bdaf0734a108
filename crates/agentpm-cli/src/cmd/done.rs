//! `agentpm done`: Complete the epic, a phase, or a task.

use crate::cmd::transition::{TargetArgs, run_transition};
use crate::context::Project;
use crate::output::OutputMode;
use agentpm_core::lifecycle::Verb;
use clap::Args;

#[derive(Args, Debug)]
pub struct DoneArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Complete a task whose tests are still pending or wip.
    #[arg(long)]
    pub allow_open_tests: bool,
}

pub fn run_done(args: &DoneArgs, project: &Project, output: OutputMode) -> anyhow::Result<()> {
    let mut base = project.transition_args();
    base.allow_open_tests = args.allow_open_tests;
    let req = args.target.request(Verb::Complete, base)?;
    run_transition(project, &req, output)
}
