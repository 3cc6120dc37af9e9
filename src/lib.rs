//! shipit - test, commit, pull and push in one command
//!
//! This library holds the credential resolution and synchronization logic
//! behind the `shipit` binary, along with the workflow steps it chains
//! together: running project tests, staging a conventional commit, pulling
//! with a merge fallback and pushing.

pub mod cli;
pub mod core;
pub mod error;

pub use error::{Result, ShipitError};
