//! Pull/push synchronization
//!
//! Pull and push share one state machine:
//!
//! ```text
//! Resolving -> Executing -> Success | Retrying | AwaitingUpload | Failed
//! ```
//!
//! Resolving makes sure an SSH keypair exists and obtains credentials.
//! Executing hands them to the [`VcsProvider`] and classifies the result. A
//! wrong passphrase loops back to Resolving a bounded number of times; every
//! other result ends the machine.

use tracing::{debug, warn};

use crate::core::credentials::{self, Credentials};
use crate::core::git::{PushMode, VcsProvider};
use crate::core::prompt::{StatusLevel, UserInteraction};
use crate::core::remote::{AuthMode, Remote};
use crate::core::runner::CommandRunner;
use crate::core::session::Session;
use crate::core::ssh::{self, KeyStatus};
use crate::core::transport::TransferResult;
use crate::error::{Result, ShipitError};

/// Passphrase attempts before giving up
pub const MAX_PASSPHRASE_ATTEMPTS: u32 = 3;

/// How a synchronization ended successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Refs were transferred
    Transferred,
    /// Local and remote already matched
    UpToDate,
    /// The branch does not exist on the remote yet
    NothingToPull,
    /// Histories diverged and the merge fallback succeeded
    Merged { output: String },
    /// A keypair was just generated and must be uploaded before retrying
    AwaitingUpload { public_key: String, host: String },
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Pull { allow_unrelated: bool },
    Push(PushMode),
}

/// Drives one pull or push against the loaded remote
pub struct SyncOrchestrator<'a> {
    vcs: &'a mut dyn VcsProvider,
    runner: &'a dyn CommandRunner,
    ui: &'a dyn UserInteraction,
    session: &'a mut Session,
}

impl<'a> SyncOrchestrator<'a> {
    pub fn new(
        vcs: &'a mut dyn VcsProvider,
        runner: &'a dyn CommandRunner,
        ui: &'a dyn UserInteraction,
        session: &'a mut Session,
    ) -> Self {
        Self {
            vcs,
            runner,
            ui,
            session,
        }
    }

    /// Pull the current branch.
    ///
    /// Diverged histories are merged with `git pull`; `allow_unrelated` lets
    /// that merge join histories with no common ancestor.
    pub fn pull(&mut self, allow_unrelated: bool) -> Result<SyncOutcome> {
        self.synchronize(Direction::Pull { allow_unrelated })
    }

    /// Push the current branch
    pub fn push(&mut self, mode: PushMode) -> Result<SyncOutcome> {
        self.synchronize(Direction::Push(mode))
    }

    fn synchronize(&mut self, direction: Direction) -> Result<SyncOutcome> {
        let branch = self.vcs.current_branch()?;
        let remote = self.vcs.remote_details()?;
        debug!(?direction, %branch, remote = %remote.name, "synchronizing");

        if remote.auth_mode() == AuthMode::Ssh && !self.session.key_ready() {
            let status = ssh::ensure_key(
                self.session.ssh_keys(),
                remote.provider(),
                self.ui,
                self.runner,
            )?;
            if let KeyStatus::AwaitingUpload { public_key, host } = status {
                return Ok(SyncOutcome::AwaitingUpload {
                    public_key: public_key.display().to_string(),
                    host,
                });
            }
            self.session.mark_key_ready();
        }

        let mut attempts = 0;
        loop {
            let credentials = credentials::resolve(self.session, &remote, self.ui)?;
            attempts += 1;

            let result = self.execute(direction, &remote, &branch, &credentials)?;
            debug!(?result, attempts, "transfer finished");

            match result {
                TransferResult::Updated => {
                    let message = match direction {
                        Direction::Pull { .. } => "changes pulled",
                        Direction::Push(_) => "push successful",
                    };
                    self.ui.status(StatusLevel::Success, message);
                    return Ok(SyncOutcome::Transferred);
                }
                TransferResult::UpToDate => {
                    self.ui.status(StatusLevel::Success, "already up-to-date");
                    return Ok(SyncOutcome::UpToDate);
                }
                TransferResult::RemoteBranchMissing => {
                    self.ui.status(StatusLevel::Success, "nothing to pull");
                    return Ok(SyncOutcome::NothingToPull);
                }
                TransferResult::InvalidPassphrase => {
                    self.session.clear_passphrase();
                    if attempts >= MAX_PASSPHRASE_ATTEMPTS {
                        return Err(ShipitError::TooManyPassphraseAttempts { attempts });
                    }
                    self.ui.status(StatusLevel::Failure, "invalid passphrase");
                }
                TransferResult::KeyRejected => return Err(self.rejected(&remote)),
                TransferResult::NonFastForward => {
                    return match direction {
                        Direction::Pull { allow_unrelated } => {
                            self.merge(&remote, &branch, allow_unrelated)
                        }
                        Direction::Push(_) => Err(ShipitError::PushRejected),
                    };
                }
            }
        }
    }

    fn execute(
        &mut self,
        direction: Direction,
        remote: &Remote,
        branch: &str,
        credentials: &Credentials,
    ) -> Result<TransferResult> {
        match direction {
            Direction::Pull { allow_unrelated } => {
                self.vcs.pull(remote, branch, credentials, allow_unrelated)
            }
            Direction::Push(mode) => self.vcs.push(remote, branch, credentials, mode),
        }
    }

    /// Tell the user where the key has to go and build the terminal error
    fn rejected(&self, remote: &Remote) -> ShipitError {
        let keys = self.session.ssh_keys();
        let provider = remote.provider();
        warn!(remote = %remote.name, %provider, "credentials rejected");

        match remote.auth_mode() {
            AuthMode::Ssh => self.ui.status(
                StatusLevel::StrictInfo,
                &ssh::upload_instructions(&keys.public_key, provider),
            ),
            _ => self.ui.status(
                StatusLevel::Failure,
                &format!("{} rejected the stored token", provider),
            ),
        }

        ShipitError::KeyNotSupported {
            public_key: keys.public_key.display().to_string(),
            host: ssh::provider_host(provider),
        }
    }

    /// Merge diverged histories with the git command line
    fn merge(&self, remote: &Remote, branch: &str, allow_unrelated: bool) -> Result<SyncOutcome> {
        self.ui.status(StatusLevel::Info, "Merging remote changes...");

        let ssh_command = match remote.auth_mode() {
            AuthMode::Ssh => Some(format!(
                "core.sshCommand=ssh -i {} -o IdentitiesOnly=yes",
                shell_quote(&self.session.ssh_keys().private_key.display().to_string())
            )),
            _ => None,
        };

        let mut args: Vec<&str> = Vec::new();
        if let Some(command) = ssh_command.as_deref() {
            args.extend(["-c", command]);
        }
        args.extend(["pull", "--no-rebase", remote.name.as_str(), branch]);
        if allow_unrelated {
            args.push("--allow-unrelated-histories");
        }

        let result = self.runner.run("git", &args)?;
        if result.success {
            self.ui.status(StatusLevel::Success, "changes merged");
            Ok(SyncOutcome::Merged {
                output: result.output,
            })
        } else {
            self.ui.status(StatusLevel::Failure, &result.output);
            Err(ShipitError::MergeFailed {
                output: result.output,
            })
        }
    }
}

/// Single-quote `value` for `sh`; git runs `core.sshCommand` through the shell
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
