//! Custom error types for shipit
//!
//! User-friendly error messages for all failure scenarios. Each variant is a
//! distinct kind so callers can decide between retry, report and abort.

use thiserror::Error;

use crate::core::remote::Provider;

/// Main error type for the shipit application
#[derive(Error, Debug)]
pub enum ShipitError {
    /// Not running in a git repository
    #[error("This directory is not a git repository.\n\n  → Run 'shipit init' to create one, or navigate to an existing git project.")]
    NotGitRepository,

    /// `init` was asked to create a repository that already exists
    #[error("A git repository already exists in this directory.")]
    RepoAlreadyExists,

    /// The repository has no remotes at all
    #[error("No remotes found in this repository.\n\n  → Run 'shipit init' to add one, or 'git remote add origin <url>'.")]
    RemoteNotFound,

    /// A remote-dependent operation ran before a remote was loaded
    #[error("Remote '{0}' is not loaded.\n\n  → Run 'git remote -v' to check your remotes.")]
    RemoteNotLoaded(String),

    /// Remote with the same name already exists
    #[error("Remote '{0}' already exists.")]
    RemoteAlreadyExists(String),

    /// The config file does not exist on disk
    #[error("Config file not found.\n\n  → Use 'shipit init' to generate your config file.")]
    ConfigNotFound,

    /// A credential lookup ran before the config was loaded
    #[error("Config not loaded.")]
    ConfigNotLoaded,

    /// No stored HTTP credentials for the remote's provider
    #[error("Auth credentials for {provider} not found.\n\n  → Run 'shipit init' to set up auth credentials.")]
    AuthNotFound {
        /// Provider the remote belongs to
        provider: Provider,
    },

    /// Remote URL is neither HTTP(S) nor SSH
    #[error("Invalid auth method for remote '{url}'.\n\n  → Expected an https:// URL or an SSH URL like git@github.com:owner/repo.git")]
    InvalidAuthMethod {
        /// The remote URL that failed classification
        url: String,
    },

    /// Passphrase was rejected more times than allowed
    #[error("Invalid passphrase, giving up after {attempts} attempts.")]
    TooManyPassphraseAttempts {
        /// Number of attempts made
        attempts: u32,
    },

    /// Remote refused the local SSH key or HTTP token
    #[error("The remote rejected your credentials.\n\n  → Upload {public_key} on {host}, or check your token.")]
    KeyNotSupported {
        /// Path of the local public key
        public_key: String,
        /// Host the key must be uploaded to
        host: String,
    },

    /// Local and remote branches share no history
    #[error("Refusing to merge unrelated histories on '{branch}'.\n\n  → Run 'shipit init' to join the local repository with the remote.")]
    UnrelatedHistories {
        /// Branch being pulled
        branch: String,
    },

    /// Push was refused because the remote branch moved
    #[error("Push rejected by remote: the branch has diverged.\n\n  → Run 'shipit run' again to pull and merge first.")]
    PushRejected,

    /// Merge fallback after a non-fast-forward pull failed
    #[error("Merge failed:\n{output}\n\n  → Resolve the conflicts, commit, and run 'shipit run' again.")]
    MergeFailed {
        /// Raw output of the merge tool
        output: String,
    },

    /// Project tests failed
    #[error("Tests failed.")]
    TestsFailed,

    /// External command exited unsuccessfully
    #[error("'{program}' failed:\n{output}")]
    CommandFailed {
        /// Program that was run
        program: String,
        /// Combined stdout/stderr
        output: String,
    },

    /// Git operation error
    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization/deserialization error
    #[error("Configuration file is invalid: {0}")]
    Toml(String),

    /// Invalid input from user
    #[error("{0}")]
    InvalidInput(String),

    /// Operation cancelled by user
    #[error("Operation cancelled.")]
    Cancelled,
}

impl From<toml::de::Error> for ShipitError {
    fn from(err: toml::de::Error) -> Self {
        ShipitError::Toml(err.to_string())
    }
}

impl From<toml::ser::Error> for ShipitError {
    fn from(err: toml::ser::Error) -> Self {
        ShipitError::Toml(err.to_string())
    }
}

/// Result type alias using ShipitError
pub type Result<T> = std::result::Result<T, ShipitError>;
