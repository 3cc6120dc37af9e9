//! CLI module for shipit
//!
//! This module contains the CLI command definitions and handlers using clap.

pub mod commands;
pub mod init;
pub mod run;

pub use commands::{Cli, Commands};
