//! `agentpm pause` / `agentpm resume`: Suspend and continue the epic.
//!
//! A paused epic is `pending` with its `started_at` kept.

use crate::cmd::transition::run_transition;
use crate::context::Project;
use crate::output::OutputMode;
use agentpm_core::lifecycle::{TransitionRequest, Verb};

fn run_epic(verb: Verb, project: &Project, output: OutputMode) -> anyhow::Result<()> {
    let req = TransitionRequest::epic(verb).with_args(project.transition_args());
    run_transition(project, &req, output)
}

pub fn run_pause(project: &Project, output: OutputMode) -> anyhow::Result<()> {
    run_epic(Verb::Pause, project, output)
}

pub fn run_resume(project: &Project, output: OutputMode) -> anyhow::Result<()> {
    run_epic(Verb::Resume, project, output)
}
