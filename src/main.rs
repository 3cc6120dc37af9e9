//! shipit - test, commit, pull and push in one step
//!
//! Run `shipit init` once per repository, then `shipit run` for every change.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use shipit::cli::commands::{Cli, Commands};
use shipit::cli::{init, run};
use shipit::core::prompt::error_symbol;
use shipit::error::Result;

fn main() {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = dispatch() {
        eprintln!("{} Error: {}", error_symbol(), e);
        std::process::exit(1);
    }
}

fn dispatch() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => init::handle_init(),
        Commands::Run(args) => run::handle_run(args),
    }
}
