//! Local git repository operations
//!
//! This module provides the [`VcsProvider`] capability and its git2-backed
//! implementation:
//! - Repository discovery and initialisation
//! - Branch management
//! - Remote loading
//! - Staging and committing
//! - Authenticated pull and push with classified outcomes

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};

use git2::build::CheckoutBuilder;
use git2::{
    BranchType, Cred, CredentialType, ErrorCode, FetchOptions, FetchPrune, IndexAddOption, PushOptions,
    RemoteCallbacks, Repository, RepositoryInitOptions, Signature, StatusOptions,
};
use secrecy::ExposeSecret;
use tracing::{debug, info};

use crate::core::credentials::Credentials;
use crate::core::remote::Remote;
use crate::core::ssh::SshKeyPaths;
use crate::core::transport::{
    classify_push_status, classify_transport_error, TransferResult,
    CREDENTIALS_REJECTED_MESSAGE,
};
use crate::error::{Result, ShipitError};

/// Branch created by `init`
const INITIAL_BRANCH: &str = "main";

/// How a push updates the remote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushMode {
    /// Overwrite the remote branch
    pub force: bool,
    /// Record the remote branch as the local branch's upstream
    pub set_upstream: bool,
}

impl PushMode {
    /// Refspec pushing `branch` to the same name on the remote
    pub fn refspec(&self, branch: &str) -> String {
        let prefix = if self.force { "+" } else { "" };
        format!("{}refs/heads/{}:refs/heads/{}", prefix, branch, branch)
    }
}

/// Version-control capability consumed by the workflow
pub trait VcsProvider {
    /// Open the repository containing the working directory
    fn open(&mut self) -> Result<()>;

    /// Create a new repository in the working directory
    fn init(&mut self) -> Result<()>;

    /// Repository root directory
    fn root_dir(&self) -> Result<PathBuf>;

    /// Local branch names, sorted
    fn list_branches(&self) -> Result<Vec<String>>;

    /// Create a branch at HEAD without switching to it
    fn create_branch(&mut self, name: &str) -> Result<()>;

    /// Switch to an existing local branch, keeping local changes
    fn checkout(&mut self, name: &str) -> Result<()>;

    /// Current branch name
    fn current_branch(&self) -> Result<String>;

    /// Add a remote and make it the loaded remote
    fn add_remote(&mut self, remote: &Remote) -> Result<()>;

    /// Load the named remote for subsequent pulls and pushes
    fn load_remote(&mut self, name: &str) -> Result<Remote>;

    /// The loaded remote
    fn remote_details(&self) -> Result<Remote>;

    /// Whether the working tree has staged, unstaged or untracked changes
    fn has_uncommitted_changes(&self) -> Result<bool>;

    /// Stage everything and commit; returns the commit id
    fn commit_all(&mut self, message: &str) -> Result<String>;

    /// Fetch `branch` from `remote` and fast-forward the local branch
    fn pull(
        &mut self,
        remote: &Remote,
        branch: &str,
        credentials: &Credentials,
        allow_unrelated: bool,
    ) -> Result<TransferResult>;

    /// Push `branch` to `remote`
    fn push(
        &mut self,
        remote: &Remote,
        branch: &str,
        credentials: &Credentials,
        mode: PushMode,
    ) -> Result<TransferResult>;
}

/// Wrapper for local git repository operations
pub struct GitRepository {
    workdir: PathBuf,
    ssh_keys: SshKeyPaths,
    repo: Option<Repository>,
    remote: Option<Remote>,
}

impl GitRepository {
    /// Repository handle for `workdir`; nothing is opened until `open`/`init`
    pub fn new(workdir: impl Into<PathBuf>, ssh_keys: SshKeyPaths) -> Self {
        Self {
            workdir: workdir.into(),
            ssh_keys,
            repo: None,
            remote: None,
        }
    }

    /// Working-tree root of the repository containing `path`, if any
    pub fn discover_root(path: &Path) -> Option<PathBuf> {
        Repository::discover(path)
            .ok()
            .and_then(|repo| repo.workdir().map(Path::to_path_buf))
    }

    fn repo(&self) -> Result<&Repository> {
        self.repo.as_ref().ok_or(ShipitError::NotGitRepository)
    }

    /// Credential callbacks for one transport operation.
    ///
    /// libgit2 asks again after a rejection; the second request is refused so
    /// a bad key or token surfaces as an error instead of looping.
    fn remote_callbacks<'a>(&'a self, credentials: &'a Credentials) -> RemoteCallbacks<'a> {
        let mut asked = false;
        let keys = &self.ssh_keys;

        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(move |_url, username_from_url, allowed| {
            let username = username_from_url.unwrap_or("git");

            if allowed.contains(CredentialType::USERNAME) {
                return Cred::username(username);
            }
            if asked {
                return Err(git2::Error::new(
                    git2::ErrorCode::Auth,
                    git2::ErrorClass::Callback,
                    CREDENTIALS_REJECTED_MESSAGE,
                ));
            }
            asked = true;

            match credentials {
                Credentials::Http { username, token } if allowed.is_user_pass_plaintext() => {
                    Cred::userpass_plaintext(username, token.expose_secret())
                }
                Credentials::Ssh { passphrase } if allowed.is_ssh_key() => Cred::ssh_key(
                    username,
                    Some(keys.public_key.as_path()),
                    &keys.private_key,
                    Some(passphrase.expose_secret()),
                ),
                _ => Err(git2::Error::new(
                    git2::ErrorCode::Auth,
                    git2::ErrorClass::Callback,
                    CREDENTIALS_REJECTED_MESSAGE,
                )),
            }
        });
        callbacks
    }

    /// Point the local branch at `target` and update the working tree
    fn fast_forward(&self, branch: &str, target: git2::Oid) -> Result<()> {
        let repo = self.repo()?;
        let local_ref = format!("refs/heads/{}", branch);

        // checkout against the old HEAD first so new files are created
        let commit = repo.find_object(target, None)?;
        repo.checkout_tree(&commit, Some(CheckoutBuilder::default().safe()))?;

        match repo.find_reference(&local_ref) {
            Ok(mut reference) => {
                reference.set_target(target, &format!("shipit: fast-forward {}", branch))?;
            }
            Err(_) => {
                repo.reference(&local_ref, target, true, "shipit: pull")?;
            }
        }

        repo.set_head(&local_ref)?;
        Ok(())
    }
}

impl VcsProvider for GitRepository {
    fn open(&mut self) -> Result<()> {
        let repo = Repository::discover(&self.workdir).map_err(|_| ShipitError::NotGitRepository)?;
        self.repo = Some(repo);
        Ok(())
    }

    fn init(&mut self) -> Result<()> {
        if Repository::open(&self.workdir).is_ok() {
            return Err(ShipitError::RepoAlreadyExists);
        }

        let mut opts = RepositoryInitOptions::new();
        opts.initial_head(INITIAL_BRANCH);
        let repo = Repository::init_opts(&self.workdir, &opts)?;

        info!(path = %self.workdir.display(), "initialized repository");
        self.repo = Some(repo);
        Ok(())
    }

    fn root_dir(&self) -> Result<PathBuf> {
        self.repo()?
            .workdir()
            .map(|p| p.to_path_buf())
            .ok_or(ShipitError::NotGitRepository)
    }

    fn list_branches(&self) -> Result<Vec<String>> {
        let branches = self.repo()?.branches(Some(BranchType::Local))?;
        let mut names = Vec::new();

        for branch in branches {
            let (branch, _) = branch?;
            if let Some(name) = branch.name()? {
                names.push(name.to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    fn create_branch(&mut self, name: &str) -> Result<()> {
        let repo = self.repo()?;
        let head = repo.head()?.peel_to_commit()?;
        repo.branch(name, &head, false)?;
        Ok(())
    }

    fn checkout(&mut self, name: &str) -> Result<()> {
        let repo = self.repo()?;
        let refname = format!("refs/heads/{}", name);
        let target = repo.revparse_single(&refname)?;

        repo.checkout_tree(&target, Some(CheckoutBuilder::default().safe()))?;
        repo.set_head(&refname)?;
        Ok(())
    }

    fn current_branch(&self) -> Result<String> {
        let repo = self.repo()?;
        match repo.head() {
            Ok(head) => {
                if head.is_branch() {
                    Ok(head.shorthand().unwrap_or(INITIAL_BRANCH).to_string())
                } else {
                    Err(ShipitError::InvalidInput(
                        "HEAD is detached.\n\n  → Check out a branch before running shipit.".into(),
                    ))
                }
            }
            Err(e) => {
                // Handle unborn HEAD (no commits yet)
                if e.code() == git2::ErrorCode::UnbornBranch {
                    let head = repo.find_reference("HEAD")?;
                    if let Some(target) = head.symbolic_target() {
                        if let Some(name) = target.strip_prefix("refs/heads/") {
                            return Ok(name.to_string());
                        }
                    }
                    Ok(INITIAL_BRANCH.to_string())
                } else {
                    Err(e.into())
                }
            }
        }
    }

    fn add_remote(&mut self, remote: &Remote) -> Result<()> {
        let repo = self.repo()?;
        if repo.find_remote(&remote.name).is_ok() {
            return Err(ShipitError::RemoteAlreadyExists(remote.name.clone()));
        }
        repo.remote(&remote.name, &remote.url)?;
        self.remote = Some(remote.clone());
        Ok(())
    }

    fn load_remote(&mut self, name: &str) -> Result<Remote> {
        let repo = self.repo()?;
        if repo.remotes()?.is_empty() {
            return Err(ShipitError::RemoteNotFound);
        }

        let url = {
            let found = repo
                .find_remote(name)
                .map_err(|_| ShipitError::RemoteNotLoaded(name.to_string()))?;
            found
                .url()
                .ok_or_else(|| ShipitError::RemoteNotLoaded(name.to_string()))?
                .to_string()
        };

        debug!(name, %url, "loaded remote");
        let remote = Remote::new(name, url);
        self.remote = Some(remote.clone());
        Ok(remote)
    }

    fn remote_details(&self) -> Result<Remote> {
        self.remote
            .clone()
            .ok_or_else(|| ShipitError::RemoteNotLoaded(crate::core::config::DEFAULT_REMOTE.into()))
    }

    fn has_uncommitted_changes(&self) -> Result<bool> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true);
        opts.recurse_untracked_dirs(true);
        opts.include_ignored(false);

        let statuses = self.repo()?.statuses(Some(&mut opts))?;
        Ok(statuses
            .iter()
            .any(|entry| !entry.status().is_empty() && !entry.status().is_ignored()))
    }

    fn commit_all(&mut self, message: &str) -> Result<String> {
        let repo = self.repo()?;

        let mut index = repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        // stage deletions too
        index.update_all(["*"].iter(), None)?;
        index.write()?;

        let tree_id = index.write_tree()?;
        let tree = repo.find_tree(tree_id)?;

        let signature = repo.signature().or_else(|_| {
            // Fallback signature if not configured
            Signature::now("shipit", "shipit@localhost")
        })?;

        let parent = match repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => None,
            Err(e) => return Err(e.into()),
        };
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        let commit_id = repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &parents,
        )?;

        Ok(commit_id.to_string())
    }

    fn pull(
        &mut self,
        remote: &Remote,
        branch: &str,
        credentials: &Credentials,
        allow_unrelated: bool,
    ) -> Result<TransferResult> {
        let repo = self.repo()?;
        let mut git_remote = repo
            .find_remote(&remote.name)
            .or_else(|_| repo.remote_anonymous(&remote.url))?;

        let tracking_ref = format!("refs/remotes/{}/{}", remote.name, branch);
        let refspec = format!("+refs/heads/{}:{}", branch, tracking_ref);

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(self.remote_callbacks(credentials));
        // a branch deleted on the remote must not leave a stale tracking ref
        fetch_options.prune(FetchPrune::On);

        debug!(remote = %remote.name, branch, "fetching");
        if let Err(e) = git_remote.fetch(&[refspec.as_str()], Some(&mut fetch_options), None) {
            return classify_transport_error(e);
        }

        let fetched_oid = match repo.refname_to_id(&tracking_ref) {
            Ok(oid) => oid,
            Err(e) if e.code() == ErrorCode::NotFound => {
                debug!(branch, "branch not on remote");
                return Ok(TransferResult::RemoteBranchMissing);
            }
            Err(e) => return Err(e.into()),
        };
        let annotated = repo.find_annotated_commit(fetched_oid)?;
        let (analysis, _) = repo.merge_analysis(&[&annotated])?;

        if analysis.is_up_to_date() {
            return Ok(TransferResult::UpToDate);
        }

        if analysis.is_unborn() || analysis.is_fast_forward() {
            self.fast_forward(branch, fetched_oid)?;
            return Ok(TransferResult::Updated);
        }

        let head_oid = repo.head()?.peel_to_commit()?.id();
        if repo.merge_base(head_oid, fetched_oid).is_err() && !allow_unrelated {
            return Err(ShipitError::UnrelatedHistories {
                branch: branch.to_string(),
            });
        }

        Ok(TransferResult::NonFastForward)
    }

    fn push(
        &mut self,
        remote: &Remote,
        branch: &str,
        credentials: &Credentials,
        mode: PushMode,
    ) -> Result<TransferResult> {
        let repo = self.repo()?;
        let mut git_remote = repo.find_remote(&remote.name)?;
        let refspec = mode.refspec(branch);

        let up_to_date = Cell::new(false);
        let rejection: RefCell<Option<String>> = RefCell::new(None);

        {
            let mut callbacks = self.remote_callbacks(credentials);
            callbacks.push_negotiation(|updates| {
                up_to_date.set(updates.iter().all(|u| u.src() == u.dst()));
                Ok(())
            });
            callbacks.push_update_reference(|_refname, status| {
                if let Some(msg) = status {
                    *rejection.borrow_mut() = Some(msg.to_string());
                }
                Ok(())
            });

            let mut push_options = PushOptions::new();
            push_options.remote_callbacks(callbacks);

            debug!(remote = %remote.name, %refspec, "pushing");
            if let Err(e) = git_remote.push(&[refspec.as_str()], Some(&mut push_options)) {
                return classify_transport_error(e);
            }
        }

        if let Some(status) = rejection.into_inner() {
            return classify_push_status(&status);
        }

        // mirror what the remote now has, as `git push` does
        let local_oid = repo.refname_to_id(&format!("refs/heads/{}", branch))?;
        repo.reference(
            &format!("refs/remotes/{}/{}", remote.name, branch),
            local_oid,
            true,
            "shipit: push",
        )?;

        if mode.set_upstream {
            let mut local = repo.find_branch(branch, BranchType::Local)?;
            local.set_upstream(Some(&format!("{}/{}", remote.name, branch)))?;
            info!(branch, remote = %remote.name, "upstream set");
        }

        if up_to_date.get() {
            Ok(TransferResult::UpToDate)
        } else {
            Ok(TransferResult::Updated)
        }
    }
}
