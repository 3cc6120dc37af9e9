//! Init CLI command handler

use crate::core::git::GitRepository;
use crate::core::prompt::{StatusLevel, Terminal, UserInteraction};
use crate::core::runner::SystemRunner;
use crate::core::session::Session;
use crate::core::ssh::KeyStatus;
use crate::core::sync::SyncOutcome;
use crate::core::workflow::Workflow;
use crate::error::{Result, ShipitError};

/// Handle `shipit init`
pub fn handle_init() -> Result<()> {
    let session = Session::open_default()?;
    let cwd = std::env::current_dir()?;
    let runner = SystemRunner::in_dir(GitRepository::discover_root(&cwd).unwrap_or_else(|| cwd.clone()));
    let mut git = GitRepository::new(cwd, session.ssh_keys().clone());
    let ui = Terminal::new();

    let mut workflow = Workflow::new(&mut git, &runner, &ui, session);
    run_init(&mut workflow, &ui)
}

/// Preferences, repository, remote and credentials, then a first sync
pub fn run_init(workflow: &mut Workflow<'_>, ui: &dyn UserInteraction) -> Result<()> {
    workflow.set_user_preference()?;

    if let Err(err) = workflow.load_project() {
        match err {
            ShipitError::NotGitRepository => workflow.initialize_repo()?,
            ShipitError::RemoteNotFound | ShipitError::RemoteNotLoaded(_) => {}
            other => return Err(other),
        }

        workflow.load_config()?;
        workflow.initialize_remote()?;
        ui.status(StatusLevel::Success, "remote initialized");
    }

    match workflow.set_remote_http_auth() {
        Ok(()) => {}
        Err(ShipitError::InvalidAuthMethod { .. }) => {
            if let KeyStatus::AwaitingUpload { .. } = workflow.set_remote_ssh_auth()? {
                return Ok(());
            }
        }
        Err(e) => return Err(e),
    }
    ui.status(StatusLevel::Success, "authorization set");

    workflow.load_config()?;

    ui.status(StatusLevel::Info, "Staging changes...");
    workflow.stage_changes()?;

    ui.status(StatusLevel::Info, "Pulling remote commits...");
    if let SyncOutcome::AwaitingUpload { .. } = workflow.pull(true)? {
        return Ok(());
    }

    ui.status(
        StatusLevel::StrictInfo,
        "Now you will be able to use \"shipit run\" for your workflow. See \"shipit run --help\" for details.",
    );
    Ok(())
}
