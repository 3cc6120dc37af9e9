//! CLI command definitions using clap
//!
//! Defines the command structure for the `shipit` CLI tool.

use clap::{Args, Parser, Subcommand};

/// shipit - test, commit, pull and push in one step
///
/// Keeps per-provider credentials and an SSH key in ~/.shipit (or
/// $SHIPIT_HOME) so a single command can sync the current branch.
#[derive(Parser, Debug)]
#[command(name = "shipit", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the repository, remote and credentials
    ///
    /// Settings such as the remote name and branch prefix are stored in
    /// shipit_config.toml inside the tool directory.
    Init,

    /// Run tests, commit, pull and push the current branch
    ///
    /// Remote changes are pulled and merged into the current branch before
    /// pushing.
    Run(RunArgs),
}

/// Options for `shipit run`
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Switch to this branch, creating it if needed, and push it upstream
    #[arg(short = 'b', long = "new-branch", conflicts_with = "set_upstream")]
    pub new_branch: Option<String>,

    /// Set the pushed branch's upstream on the remote
    #[arg(short = 'u', long = "set-upstream")]
    pub set_upstream: bool,

    /// Force push, overwriting the remote branch
    #[arg(short, long)]
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_flags() {
        let cli = Cli::try_parse_from(["shipit", "run", "-b", "login", "-f"]).unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.new_branch.as_deref(), Some("login"));
                assert!(args.force);
                assert!(!args.set_upstream);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_new_branch_conflicts_with_set_upstream() {
        assert!(Cli::try_parse_from(["shipit", "run", "-b", "login", "-u"]).is_err());
    }

    #[test]
    fn test_init_takes_no_arguments() {
        assert!(Cli::try_parse_from(["shipit", "init", "extra"]).is_err());
    }
}
