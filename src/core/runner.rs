//! External command execution
//!
//! Tests, mock generation, `ssh-keygen` and the merge fallback all run
//! through [`CommandRunner`].

use std::path::PathBuf;
use std::process::Command;

use tracing::debug;

use crate::error::{Result, ShipitError};

/// Captured result of an external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Whether the command exited with status 0
    pub success: bool,
    /// Combined stdout and stderr
    pub output: String,
}

impl CommandOutput {
    /// Turn an unsuccessful run into `CommandFailed`
    pub fn into_result(self, program: &str) -> Result<String> {
        if self.success {
            Ok(self.output)
        } else {
            Err(ShipitError::CommandFailed {
                program: program.to_string(),
                output: self.output,
            })
        }
    }
}

/// Capability for running external programs
pub trait CommandRunner {
    /// Run `program` with `args`, capturing combined output.
    ///
    /// A non-zero exit is reported through `CommandOutput::success`; failing to
    /// spawn the process is an error.
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;
}

/// Runs commands on the host system
#[derive(Debug, Default)]
pub struct SystemRunner {
    workdir: Option<PathBuf>,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every command from `dir` instead of the process working directory
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: Some(dir.into()),
        }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        debug!(program, ?args, "running command");

        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }

        let output = cmd.output().map_err(|e| {
            ShipitError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to execute {}: {}", program, e),
            ))
        })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CommandOutput {
            success: output.status.success(),
            output: combined.trim_end().to_string(),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_result() {
        let ok = CommandOutput {
            success: true,
            output: "fine".into(),
        };
        assert_eq!(ok.into_result("git").unwrap(), "fine");

        let failed = CommandOutput {
            success: false,
            output: "CONFLICT".into(),
        };
        match failed.into_result("git") {
            Err(ShipitError::CommandFailed { program, output }) => {
                assert_eq!(program, "git");
                assert_eq!(output, "CONFLICT");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_missing_program_is_io_error() {
        let runner = SystemRunner::new();
        let result = runner.run("shipit-definitely-not-a-real-program", &[]);
        assert!(matches!(result, Err(ShipitError::Io(_))));
    }
}
