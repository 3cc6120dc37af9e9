//! Workflow steps shared by the `init` and `run` commands

use tracing::info;

use crate::core::config::{StoredCredentials, DEFAULT_REMOTE};
use crate::core::git::{PushMode, VcsProvider};
use crate::core::project::{self, TestOutcome};
use crate::core::prompt::{PromptOptions, StatusLevel, UserInteraction};
use crate::core::remote::{AuthMode, Remote};
use crate::core::runner::CommandRunner;
use crate::core::session::Session;
use crate::core::ssh::{self, KeyStatus};
use crate::core::sync::{SyncOrchestrator, SyncOutcome};
use crate::error::{Result, ShipitError};

/// Commit types offered when staging, as shown in the menu
pub const COMMIT_TYPES: &[&str] = &["fix", "feature", "chore", "refactor", "ci"];

/// Conventional-commit prefix for a menu entry
fn commit_prefix(commit_type: &str) -> &str {
    match commit_type {
        "feature" => "feat",
        "refactor" => "ref",
        other => other,
    }
}

/// One command invocation: the capabilities plus the session they act on
pub struct Workflow<'a> {
    vcs: &'a mut dyn VcsProvider,
    runner: &'a dyn CommandRunner,
    ui: &'a dyn UserInteraction,
    session: Session,
}

impl<'a> Workflow<'a> {
    pub fn new(
        vcs: &'a mut dyn VcsProvider,
        runner: &'a dyn CommandRunner,
        ui: &'a dyn UserInteraction,
        session: Session,
    ) -> Self {
        Self {
            vcs,
            runner,
            ui,
            session,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Open the repository and load the configured remote
    pub fn load_project(&mut self) -> Result<Remote> {
        self.vcs.open()?;

        let name = self
            .session
            .config()
            .map(|c| c.remote_name().to_string())
            .unwrap_or_else(|| DEFAULT_REMOTE.to_string());
        self.vcs.load_remote(&name)
    }

    pub fn initialize_repo(&mut self) -> Result<()> {
        self.ui.status(StatusLevel::Info, "Initializing repository...");
        self.vcs.init()?;
        self.ui.status(StatusLevel::Success, "repository initialized");
        Ok(())
    }

    /// Ask for the remote URL and add it under the configured name
    pub fn initialize_remote(&mut self) -> Result<Remote> {
        let name = self
            .session
            .config()
            .ok_or(ShipitError::ConfigNotLoaded)?
            .remote_name()
            .to_string();

        self.ui.status(StatusLevel::Info, "Adding remote...");
        let url = self.ui.prompt("remote url", PromptOptions::default())?;
        let remote = Remote::new(name, url.trim());

        self.vcs.add_remote(&remote)?;
        self.ui.status(StatusLevel::Success, "remote added");
        Ok(remote)
    }

    /// Fill in unset preferences and save them
    pub fn set_user_preference(&mut self) -> Result<()> {
        let store = self.session.store().clone();
        let mut config = store.load_or_default()?;

        self.ui.status(StatusLevel::Info, "Gathering default settings...");
        if config.default_remote.is_empty() {
            let name = self
                .ui
                .prompt("remote (default=origin)", PromptOptions::optional())?;
            config.default_remote = if name.trim().is_empty() {
                DEFAULT_REMOTE.to_string()
            } else {
                name.trim().to_string()
            };
        }
        if config.branch_prefix.is_empty() {
            let prefix = self
                .ui
                .prompt("branch prefix (default=empty)", PromptOptions::optional())?;
            config.branch_prefix = prefix.trim().to_string();
        }

        store.save(&config)?;
        self.session.set_config(config);
        Ok(())
    }

    /// Make sure HTTP credentials are stored for the remote's provider
    pub fn set_remote_http_auth(&mut self) -> Result<()> {
        let remote = self.vcs.remote_details()?;
        if remote.auth_mode() != AuthMode::Http {
            return Err(ShipitError::InvalidAuthMethod { url: remote.url });
        }

        let store = self.session.store().clone();
        let mut config = store.load_or_default()?;
        let provider = remote.provider();

        self.ui.status(StatusLevel::Info, "Gathering auth details...");
        if config.provider_auth(provider).is_some() {
            self.ui.status(StatusLevel::Success, "auth found");
        } else {
            self.ui.status(StatusLevel::Failure, "auth credentials not found");
            let username = self
                .ui
                .prompt(&format!("{} username", provider), PromptOptions::default())?;
            let token = self
                .ui
                .prompt(&format!("{} token", provider), PromptOptions::masked())?;

            config.set_provider_auth(
                provider,
                StoredCredentials {
                    username: username.trim().to_string(),
                    token: token.trim().to_string(),
                },
            )?;
            self.ui.status(StatusLevel::Success, "auth generated");
        }

        store.save(&config)?;
        self.session.set_config(config);
        Ok(())
    }

    /// Make sure the SSH keypair exists for an SSH remote
    pub fn set_remote_ssh_auth(&mut self) -> Result<KeyStatus> {
        let remote = self.vcs.remote_details()?;
        if remote.auth_mode() != AuthMode::Ssh {
            return Err(ShipitError::InvalidAuthMethod { url: remote.url });
        }

        let status = ssh::ensure_key(
            self.session.ssh_keys(),
            remote.provider(),
            self.ui,
            self.runner,
        )?;
        if status == KeyStatus::Ready {
            self.session.mark_key_ready();
        }
        Ok(status)
    }

    /// Load the saved config into the session
    pub fn load_config(&mut self) -> Result<()> {
        let config = self
            .session
            .store()
            .load()?
            .ok_or(ShipitError::ConfigNotFound)?;
        self.session.set_config(config);
        Ok(())
    }

    /// Commit every change under a conventional-commit message
    pub fn stage_changes(&mut self) -> Result<()> {
        if !self.vcs.has_uncommitted_changes()? {
            self.ui.status(StatusLevel::Success, "no files changed");
            return Ok(());
        }

        let choice = self.ui.select("commit type", COMMIT_TYPES)?;
        let commit_type = COMMIT_TYPES
            .get(choice)
            .ok_or_else(|| ShipitError::InvalidInput(format!("No commit type #{}", choice + 1)))?;
        let message = self.ui.prompt("commit message", PromptOptions::default())?;

        let full_message = format!("{}: {}", commit_prefix(commit_type), message.trim());
        let id = self.vcs.commit_all(&full_message)?;
        info!(commit = %id, "committed");

        self.ui.status(StatusLevel::Success, "files added");
        Ok(())
    }

    /// Check out `branch` if it exists locally; returns whether it did
    pub fn switch_branch_if_exists(&mut self, branch: &str) -> Result<bool> {
        let branch = self.branch_name(branch);
        if !self.vcs.list_branches()?.contains(&branch) {
            return Ok(false);
        }
        self.vcs.checkout(&branch)?;
        self.ui
            .status(StatusLevel::Success, &format!("switched to {}", branch));
        Ok(true)
    }

    pub fn create_branch_and_switch(&mut self, branch: &str) -> Result<()> {
        let branch = self.branch_name(branch);
        self.vcs.create_branch(&branch)?;
        self.vcs.checkout(&branch)?;
        self.ui
            .status(StatusLevel::Success, &format!("created {}", branch));
        Ok(())
    }

    fn branch_name(&self, name: &str) -> String {
        match self.session.config() {
            Some(config) => config.prefixed_branch(name),
            None => name.to_string(),
        }
    }

    /// Run the project's tests, failing the workflow when they fail
    pub fn check_tests_and_run(&mut self) -> Result<TestOutcome> {
        let root = self.vcs.root_dir()?;
        let outcome = project::run_tests(&root, self.runner)?;

        match &outcome {
            TestOutcome::NotFound => {
                self.ui.status(StatusLevel::Success, "no tests found");
            }
            TestOutcome::Passed(output) => {
                self.print_output(output);
                self.ui.status(StatusLevel::Success, "tests passed");
            }
            TestOutcome::Failed(output) => {
                self.print_output(output);
                return Err(ShipitError::TestsFailed);
            }
        }
        Ok(outcome)
    }

    fn print_output(&self, output: &str) {
        if !output.trim().is_empty() {
            self.ui.status(StatusLevel::Info, output);
        }
    }

    fn orchestrator(&mut self) -> SyncOrchestrator<'_> {
        SyncOrchestrator::new(&mut *self.vcs, self.runner, self.ui, &mut self.session)
    }

    /// Pull the current branch from the loaded remote
    pub fn pull(&mut self, allow_unrelated: bool) -> Result<SyncOutcome> {
        self.orchestrator().pull(allow_unrelated)
    }

    /// Push the current branch to the loaded remote
    pub fn push(&mut self, mode: PushMode) -> Result<SyncOutcome> {
        self.orchestrator().push(mode)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::core::config::{Config, ConfigStore};
    use crate::core::git::testing::FakeVcs;
    use crate::core::prompt::testing::ScriptedUi;
    use crate::core::remote::Provider;
    use crate::core::runner::testing::ScriptedRunner;
    use crate::core::transport::TransferResult;

    fn new_session() -> (tempfile::TempDir, Session) {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::new(ConfigStore::new(dir.path()));
        (dir, session)
    }

    fn github_http() -> FakeVcs {
        FakeVcs::with_remote(Remote::new("origin", "https://github.com/octocat/hello.git"))
    }

    #[test]
    fn test_commit_prefix() {
        assert_eq!(commit_prefix("feature"), "feat");
        assert_eq!(commit_prefix("refactor"), "ref");
        assert_eq!(commit_prefix("fix"), "fix");
        assert_eq!(commit_prefix("ci"), "ci");
    }

    #[test]
    fn test_load_project_uses_configured_remote() {
        let (_dir, mut session) = new_session();
        session.set_config(Config {
            default_remote: "upstream".into(),
            ..Config::default()
        });
        let mut vcs = github_http();
        vcs.remotes
            .push(Remote::new("upstream", "git@gitlab.com:team/repo.git"));
        let (runner, ui) = (ScriptedRunner::new(), ScriptedUi::new());

        let mut wf = Workflow::new(&mut vcs, &runner, &ui, session);
        let remote = wf.load_project().unwrap();
        assert_eq!(remote.name, "upstream");
    }

    #[test]
    fn test_load_project_outside_repository() {
        let (_dir, session) = new_session();
        let mut vcs = FakeVcs::default();
        let (runner, ui) = (ScriptedRunner::new(), ScriptedUi::new());

        let mut wf = Workflow::new(&mut vcs, &runner, &ui, session);
        assert!(matches!(wf.load_project(), Err(ShipitError::NotGitRepository)));
    }

    #[test]
    fn test_initialize_remote_requires_config() {
        let (_dir, session) = new_session();
        let mut vcs = FakeVcs::default();
        let (runner, ui) = (ScriptedRunner::new(), ScriptedUi::with_answers(&["x"]));

        let mut wf = Workflow::new(&mut vcs, &runner, &ui, session);
        assert!(matches!(wf.initialize_remote(), Err(ShipitError::ConfigNotLoaded)));
        assert_eq!(ui.prompt_count(), 0);
    }

    #[test]
    fn test_initialize_repo_and_remote() {
        let (_dir, mut session) = new_session();
        session.set_config(Config::default());
        let mut vcs = FakeVcs::default();
        let runner = ScriptedRunner::new();
        let ui = ScriptedUi::with_answers(&["  git@github.com:octocat/hello.git "]);

        let mut wf = Workflow::new(&mut vcs, &runner, &ui, session);
        wf.initialize_repo().unwrap();
        let remote = wf.initialize_remote().unwrap();

        assert_eq!(remote, Remote::new("origin", "git@github.com:octocat/hello.git"));
        assert!(matches!(wf.initialize_repo(), Err(ShipitError::RepoAlreadyExists)));
        drop(wf);
        assert_eq!(vcs.loaded, Some(remote));
    }

    #[test]
    fn test_user_preference_defaults_and_persists() {
        let (dir, session) = new_session();
        let mut vcs = FakeVcs::default();
        let runner = ScriptedRunner::new();
        let ui = ScriptedUi::with_answers(&["", "dev/"]);

        let mut wf = Workflow::new(&mut vcs, &runner, &ui, session);
        wf.set_user_preference().unwrap();

        let saved = ConfigStore::new(dir.path()).load().unwrap().unwrap();
        assert_eq!(saved.default_remote, "origin");
        assert_eq!(saved.branch_prefix, "dev/");

        // already set: nothing asked
        wf.set_user_preference().unwrap();
        assert_eq!(ui.prompt_count(), 2);
    }

    #[test]
    fn test_http_auth_prompts_once_and_saves() {
        let (dir, session) = new_session();
        let mut vcs = github_http();
        let runner = ScriptedRunner::new();
        let ui = ScriptedUi::with_answers(&["octocat", "ghp_secret"]);

        let mut wf = Workflow::new(&mut vcs, &runner, &ui, session);
        wf.set_remote_http_auth().unwrap();
        wf.set_remote_http_auth().unwrap();

        assert_eq!(ui.prompt_labels(), vec!["GitHub username", "GitHub token"]);
        assert!(ui.prompts.borrow()[1].1, "token prompt must be masked");
        assert!(ui.saw_status(StatusLevel::Success, "auth found"));

        let saved = ConfigStore::new(dir.path()).load().unwrap().unwrap();
        let creds = saved.provider_auth(Provider::GitHub).unwrap();
        assert_eq!(creds.username, "octocat");
        assert_eq!(creds.token, "ghp_secret");
    }

    #[test]
    fn test_auth_setup_checks_remote_kind() {
        let (_dir, session) = new_session();
        let mut vcs = FakeVcs::with_remote(Remote::new("origin", "git@github.com:o/r.git"));
        let (runner, ui) = (ScriptedRunner::new(), ScriptedUi::new());

        let mut wf = Workflow::new(&mut vcs, &runner, &ui, session);
        assert!(matches!(
            wf.set_remote_http_auth(),
            Err(ShipitError::InvalidAuthMethod { .. })
        ));
        drop(wf);

        let (_dir, session) = new_session();
        let mut vcs = github_http();
        let mut wf = Workflow::new(&mut vcs, &runner, &ui, session);
        assert!(matches!(
            wf.set_remote_ssh_auth(),
            Err(ShipitError::InvalidAuthMethod { .. })
        ));
    }

    #[test]
    fn test_load_config_missing_file() {
        let (_dir, session) = new_session();
        let mut vcs = FakeVcs::default();
        let (runner, ui) = (ScriptedRunner::new(), ScriptedUi::new());

        let mut wf = Workflow::new(&mut vcs, &runner, &ui, session);
        assert!(matches!(wf.load_config(), Err(ShipitError::ConfigNotFound)));
        assert!(wf.session().config().is_none());
    }

    #[test]
    fn test_stage_changes_commits_with_type_prefix() {
        let (_dir, session) = new_session();
        let mut vcs = github_http();
        vcs.dirty = true;
        let runner = ScriptedRunner::new();
        let ui = ScriptedUi::with_answers(&["add login page"]);
        ui.queue_selection(1);

        let mut wf = Workflow::new(&mut vcs, &runner, &ui, session);
        wf.stage_changes().unwrap();
        wf.stage_changes().unwrap();
        drop(wf);

        assert_eq!(vcs.commits, vec!["feat: add login page"]);
        assert!(ui.saw_status(StatusLevel::Success, "no files changed"));
    }

    #[test]
    fn test_branch_switch_and_create_apply_prefix() {
        let (_dir, mut session) = new_session();
        session.set_config(Config {
            branch_prefix: "dev/".into(),
            ..Config::default()
        });
        let mut vcs = github_http();
        vcs.branches.push("dev/existing".into());
        let (runner, ui) = (ScriptedRunner::new(), ScriptedUi::new());

        let mut wf = Workflow::new(&mut vcs, &runner, &ui, session);
        assert!(wf.switch_branch_if_exists("existing").unwrap());
        assert!(!wf.switch_branch_if_exists("login").unwrap());
        wf.create_branch_and_switch("login").unwrap();
        drop(wf);

        assert_eq!(vcs.current, "dev/login");
        assert!(vcs.branches.contains(&"dev/login".to_string()));
    }

    #[test]
    fn test_failing_tests_stop_the_workflow() {
        let (_dir, session) = new_session();
        let project = tempfile::tempdir().unwrap();
        fs::write(project.path().join("Cargo.toml"), "[package]\n").unwrap();
        let mut vcs = github_http();
        vcs.root = project.path().to_path_buf();
        let runner = ScriptedRunner::new();
        runner.respond(false, "test result: FAILED");
        let ui = ScriptedUi::new();

        let mut wf = Workflow::new(&mut vcs, &runner, &ui, session);
        assert!(matches!(wf.check_tests_and_run(), Err(ShipitError::TestsFailed)));
        assert!(ui.saw_status(StatusLevel::Info, "FAILED"));
    }

    #[test]
    fn test_no_tests_found() {
        let (_dir, session) = new_session();
        let project = tempfile::tempdir().unwrap();
        let mut vcs = github_http();
        vcs.root = project.path().to_path_buf();
        let (runner, ui) = (ScriptedRunner::new(), ScriptedUi::new());

        let mut wf = Workflow::new(&mut vcs, &runner, &ui, session);
        assert_eq!(wf.check_tests_and_run().unwrap(), TestOutcome::NotFound);
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn test_pull_then_push_through_workflow() {
        let (_dir, mut session) = new_session();
        let mut config = Config::default();
        config
            .set_provider_auth(
                Provider::GitHub,
                StoredCredentials {
                    username: "octocat".into(),
                    token: "tok".into(),
                },
            )
            .unwrap();
        session.set_config(config);
        let mut vcs = github_http();
        vcs.queue_pull(Ok(TransferResult::UpToDate))
            .queue_push(Ok(TransferResult::Updated));
        let (runner, ui) = (ScriptedRunner::new(), ScriptedUi::new());

        let mut wf = Workflow::new(&mut vcs, &runner, &ui, session);
        assert_eq!(wf.pull(false).unwrap(), SyncOutcome::UpToDate);
        assert_eq!(
            wf.push(PushMode::default()).unwrap(),
            SyncOutcome::Transferred
        );
    }
}
