#![forbid(unsafe_code)]

mod cmd;
mod context;
mod errors;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use context::{GlobalArgs, Project};
use output::{OutputMode, render_error, resolve_output_mode};
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "agentpm: project manager for coding agents",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Point .agentpm.json at an epic document",
        long_about = "Write .agentpm.json naming an existing epic XML document.",
        after_help = "EXAMPLES:\n    # Manage plans/epic-4.xml from this directory\n    agentpm init --epic plans/epic-4.xml\n\n    # Record events as a named agent\n    agentpm init --epic plans/epic-4.xml --assignee agent-7 --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Check the document's structure",
        long_about = "Check IDs, references, single-active rules, current_state and timestamps.",
        after_help = "EXAMPLES:\n    # Validate the configured epic\n    agentpm validate\n\n    # Validate a specific file as JSON\n    agentpm validate --file epic.xml --format json"
    )]
    Validate,

    #[command(
        next_help_heading = "Read",
        about = "Epic overview with per-phase progress",
        after_help = "EXAMPLES:\n    agentpm status\n    agentpm status --format json"
    )]
    Status,

    #[command(
        next_help_heading = "Read",
        about = "Active phase, task, tests and next action",
        after_help = "EXAMPLES:\n    agentpm current"
    )]
    Current,

    #[command(
        next_help_heading = "Read",
        about = "Pending tasks and open tests",
        after_help = "EXAMPLES:\n    # Everything outstanding\n    agentpm pending\n\n    # Only phase 2A\n    agentpm pending --phase 2A"
    )]
    Pending(cmd::pending::PhaseFilterArgs),

    #[command(
        next_help_heading = "Read",
        about = "Tests whose latest result is failing",
        after_help = "EXAMPLES:\n    agentpm failing\n    agentpm failing --phase 1A --format json"
    )]
    Failing(cmd::pending::PhaseFilterArgs),

    #[command(
        next_help_heading = "Read",
        about = "Recent events, newest first",
        after_help = "EXAMPLES:\n    # Last 10 events\n    agentpm events\n\n    # Decisions only\n    agentpm events --type decision --limit 20"
    )]
    Events(cmd::events::EventsArgs),

    #[command(
        next_help_heading = "Read",
        about = "Summary for the next agent",
        long_about = "Summarize the epic, the active work, failing tests and recent events for a handoff.",
        after_help = "EXAMPLES:\n    agentpm handoff\n    agentpm handoff --events 25 --format xml"
    )]
    Handoff(cmd::handoff::HandoffArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one phase, task or test",
        after_help = "EXAMPLES:\n    # Kind and ID\n    agentpm show task 1A_2\n\n    # Bare ID, with event history\n    agentpm show 1A_T3 --full"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Start the epic, a phase, a task or a test",
        after_help = "EXAMPLES:\n    agentpm start epic\n    agentpm start phase 1A\n    agentpm start 1A_1\n\n    # Start a phase despite failing tests in earlier phases\n    agentpm start 2A --allow-failing-tests"
    )]
    Start(cmd::start::StartArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Complete the epic, a phase or a task",
        after_help = "EXAMPLES:\n    agentpm done task 1A_1\n    agentpm done 1A\n    agentpm done epic"
    )]
    Done(cmd::done::DoneArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Pause the epic",
        after_help = "EXAMPLES:\n    agentpm pause"
    )]
    Pause,

    #[command(
        next_help_heading = "Lifecycle",
        about = "Resume a paused epic",
        after_help = "EXAMPLES:\n    agentpm resume"
    )]
    Resume,

    #[command(
        next_help_heading = "Lifecycle",
        about = "Cancel a task",
        after_help = "EXAMPLES:\n    agentpm cancel-task 1A_3 superseded by 1A_4"
    )]
    CancelTask(cmd::cancel_task::CancelTaskArgs),

    #[command(
        next_help_heading = "Tests",
        about = "Record a passing test",
        after_help = "EXAMPLES:\n    agentpm pass-test 1A_T1"
    )]
    PassTest(cmd::test_result::PassTestArgs),

    #[command(
        next_help_heading = "Tests",
        about = "Record a failing test",
        after_help = "EXAMPLES:\n    agentpm fail-test 1A_T2 off by one in the header row"
    )]
    FailTest(cmd::test_result::FailTestArgs),

    #[command(
        next_help_heading = "Tests",
        about = "Cancel a test",
        after_help = "EXAMPLES:\n    agentpm cancel-test 1A_T4 covered by 1A_T2"
    )]
    CancelTest(cmd::test_result::CancelTestArgs),

    #[command(
        next_help_heading = "Tests",
        about = "Record several test results at once",
        long_about = "Validate every operation first; apply all of them or none.",
        after_help = "EXAMPLES:\n    agentpm batch-test pass:1A_T1 pass:1A_T2 \"fail:1A_T3:timeout\"\n\n    # From a JSON file, validating only\n    agentpm batch-test --input results.json --dry-run"
    )]
    BatchTest(cmd::batch_test::BatchTestArgs),

    #[command(
        next_help_heading = "Journal",
        about = "Append a note, decision or blocker to the event log",
        after_help = "EXAMPLES:\n    agentpm log switched the parser to quick-xml --type decision\n    agentpm log wired the writer --type implementation --files src/a.rs,src/b.rs"
    )]
    Log(cmd::log::LogArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    agentpm completions bash\n    agentpm completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("AGENTPM_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "agentpm=debug"
        } else {
            "agentpm=warn"
        })
    });

    let format = env::var("AGENTPM_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: &Cli, cwd: &Path, output: OutputMode) -> anyhow::Result<()> {
    let global = &cli.global;
    let project = || Project::open(global, cwd);

    match &cli.command {
        Commands::Init(args) => cmd::init::run_init(args, global, cwd, output),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
        Commands::Validate => cmd::validate::run_validate(&project()?, output),
        Commands::Status => cmd::status::run_status(&project()?, output),
        Commands::Current => cmd::current::run_current(&project()?, output),
        Commands::Pending(args) => cmd::pending::run_pending(args, &project()?, output),
        Commands::Failing(args) => cmd::pending::run_failing(args, &project()?, output),
        Commands::Events(args) => cmd::events::run_events(args, &project()?, output),
        Commands::Handoff(args) => cmd::handoff::run_handoff(args, &project()?, output),
        Commands::Show(args) => cmd::show::run_show(args, &project()?, output),
        Commands::Start(args) => cmd::start::run_start(args, &project()?, output),
        Commands::Done(args) => cmd::done::run_done(args, &project()?, output),
        Commands::Pause => cmd::epic::run_pause(&project()?, output),
        Commands::Resume => cmd::epic::run_resume(&project()?, output),
        Commands::CancelTask(args) => cmd::cancel_task::run_cancel_task(args, &project()?, output),
        Commands::PassTest(args) => cmd::test_result::run_pass_test(args, &project()?, output),
        Commands::FailTest(args) => cmd::test_result::run_fail_test(args, &project()?, output),
        Commands::CancelTest(args) => cmd::test_result::run_cancel_test(args, &project()?, output),
        Commands::BatchTest(args) => cmd::batch_test::run_batch_test(args, &project()?, output),
        Commands::Log(args) => cmd::log::run_log(args, &project()?, output),
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version come through here too.
            let code = if err.use_stderr() {
                errors::exit::USAGE
            } else {
                errors::exit::SUCCESS
            };
            let _ = err.print();
            return ExitCode::from(code);
        }
    };

    init_tracing(cli.global.verbose);
    let output = resolve_output_mode(cli.global.format);
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    match run(&cli, &cwd, output) {
        Ok(()) => ExitCode::from(errors::exit::SUCCESS),
        Err(err) => {
            let (code, error) = errors::report(&err, &cli.global.hint_config(&cwd));
            if let Err(render_err) = render_error(output, &error) {
                tracing::error!("failed to render error: {render_err:#}");
                eprintln!("error: {err:#}");
            }
            ExitCode::from(code)
        }
    }
}
