//! Core functionality for shipit
//!
//! This module contains the business logic behind both commands:
//! - Remote classification and credential resolution
//! - SSH key bootstrap
//! - Git repository operations
//! - Pull/push synchronization
//! - Application configuration
//! - Workflow steps (tests, staging, branches)

pub mod config;
pub mod credentials;
pub mod git;
pub mod project;
pub mod prompt;
pub mod remote;
pub mod runner;
pub mod session;
pub mod ssh;
pub mod sync;
pub mod transport;
pub mod workflow;

pub use config::{Config, ConfigStore};
pub use credentials::Credentials;
pub use git::{GitRepository, PushMode, VcsProvider};
pub use remote::{AuthMode, Provider, Remote};
pub use session::Session;
pub use sync::{SyncOrchestrator, SyncOutcome};
pub use workflow::Workflow;
