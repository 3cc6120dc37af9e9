//! Run CLI command handler

use crate::cli::commands::RunArgs;
use crate::core::git::{GitRepository, PushMode};
use crate::core::prompt::{StatusLevel, Terminal, UserInteraction};
use crate::core::runner::SystemRunner;
use crate::core::session::Session;
use crate::core::sync::SyncOutcome;
use crate::core::workflow::Workflow;
use crate::error::Result;

/// Handle `shipit run`
pub fn handle_run(args: RunArgs) -> Result<()> {
    let session = Session::open_default()?;
    let cwd = std::env::current_dir()?;
    let runner = SystemRunner::in_dir(GitRepository::discover_root(&cwd).unwrap_or_else(|| cwd.clone()));
    let mut git = GitRepository::new(cwd, session.ssh_keys().clone());
    let ui = Terminal::new();

    let mut workflow = Workflow::new(&mut git, &runner, &ui, session);
    run_workflow(&mut workflow, &ui, &args)
}

/// Tests, commit, pull, push
pub fn run_workflow(
    workflow: &mut Workflow<'_>,
    ui: &dyn UserInteraction,
    args: &RunArgs,
) -> Result<()> {
    workflow.load_config()?;
    workflow.load_project()?;

    if let Some(branch) = args.new_branch.as_deref() {
        if !workflow.switch_branch_if_exists(branch)? {
            workflow.create_branch_and_switch(branch)?;
        }
    }

    ui.status(StatusLevel::Info, "Running tests...");
    workflow.check_tests_and_run()?;

    ui.status(StatusLevel::Info, "Staging changes...");
    workflow.stage_changes()?;

    ui.status(StatusLevel::Info, "Pulling remote changes...");
    if let SyncOutcome::AwaitingUpload { .. } = workflow.pull(false)? {
        return Ok(());
    }

    ui.status(StatusLevel::Info, "Pushing changes...");
    let mode = PushMode {
        force: args.force,
        // a new branch has no upstream yet
        set_upstream: args.set_upstream || args.new_branch.is_some(),
    };
    workflow.push(mode)?;
    Ok(())
}
