//! Project test detection and execution

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::core::runner::CommandRunner;
use crate::error::Result;

/// Directories never searched for test files
const SKIPPED_DIRS: &[&str] = &[".git", "target", "vendor", "node_modules"];

/// Kind of project found at the repository root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectKind {
    Cargo,
    Go,
    Unknown,
}

impl ProjectKind {
    /// Detect the project kind from marker files in `root`
    pub fn detect(root: &Path) -> Self {
        if root.join("Cargo.toml").is_file() {
            ProjectKind::Cargo
        } else if root.join("go.mod").is_file() {
            ProjectKind::Go
        } else {
            ProjectKind::Unknown
        }
    }
}

/// Result of running the project's tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOutcome {
    /// Nothing to run
    NotFound,
    Passed(String),
    Failed(String),
}

/// Run the project's test suite, if one can be found.
///
/// Go projects get `go generate ./...` first so generated mocks are fresh;
/// its failure is reported in the output but does not stop the tests.
pub fn run_tests(root: &Path, runner: &dyn CommandRunner) -> Result<TestOutcome> {
    let kind = ProjectKind::detect(root);
    debug!(?kind, root = %root.display(), "detected project kind");

    match kind {
        ProjectKind::Cargo => {
            let result = runner.run("cargo", &["test"])?;
            Ok(outcome(result.success, result.output))
        }
        ProjectKind::Go => {
            if !has_go_tests(root)? {
                return Ok(TestOutcome::NotFound);
            }
            let generate = runner.run("go", &["generate", "./..."])?;
            let test = runner.run("go", &["test", "./..."])?;

            let mut output = generate.output;
            if !output.is_empty() {
                output.push('\n');
            }
            output.push_str(&test.output);
            Ok(outcome(test.success, output))
        }
        ProjectKind::Unknown => Ok(TestOutcome::NotFound),
    }
}

fn outcome(success: bool, output: String) -> TestOutcome {
    if success {
        TestOutcome::Passed(output)
    } else {
        TestOutcome::Failed(output)
    }
}

/// Whether any `*_test.go` file exists below `dir`
fn has_go_tests(dir: &Path) -> Result<bool> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if entry.file_type()?.is_dir() {
            if SKIPPED_DIRS.contains(&name.as_ref()) {
                continue;
            }
            if has_go_tests(&path)? {
                return Ok(true);
            }
        } else if name.ends_with("_test.go") {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::runner::testing::ScriptedRunner;

    #[test]
    fn test_detect() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(ProjectKind::detect(dir.path()), ProjectKind::Unknown);

        fs::write(dir.path().join("go.mod"), "module example.com/x\n").unwrap();
        assert_eq!(ProjectKind::detect(dir.path()), ProjectKind::Go);

        fs::write(dir.path().join("Cargo.toml"), "[package]\n").unwrap();
        assert_eq!(ProjectKind::detect(dir.path()), ProjectKind::Cargo);
    }

    #[test]
    fn test_unknown_project_runs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new();
        assert_eq!(
            run_tests(dir.path(), &runner).unwrap(),
            TestOutcome::NotFound
        );
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn test_go_project_without_tests() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("go.mod"), "module example.com/x\n").unwrap();
        fs::write(dir.path().join("main.go"), "package main\n").unwrap();

        let runner = ScriptedRunner::new();
        assert_eq!(
            run_tests(dir.path(), &runner).unwrap(),
            TestOutcome::NotFound
        );
        assert!(runner.calls.borrow().is_empty());
    }

    #[test]
    fn test_go_project_generates_then_tests() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("go.mod"), "module example.com/x\n").unwrap();
        fs::create_dir(dir.path().join("pkg")).unwrap();
        fs::write(dir.path().join("pkg/a_test.go"), "package pkg\n").unwrap();

        let runner = ScriptedRunner::new();
        runner.respond(true, "").respond(false, "FAIL pkg");

        assert_eq!(
            run_tests(dir.path(), &runner).unwrap(),
            TestOutcome::Failed("FAIL pkg".into())
        );
        assert_eq!(
            runner.command_lines(),
            vec!["go generate ./...", "go test ./..."]
        );
    }

    #[test]
    fn test_cargo_project_runs_cargo_test() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Cargo.toml"), "[package]\n").unwrap();

        let runner = ScriptedRunner::new();
        runner.respond(true, "test result: ok");

        assert_eq!(
            run_tests(dir.path(), &runner).unwrap(),
            TestOutcome::Passed("test result: ok".into())
        );
        assert_eq!(runner.command_lines(), vec!["cargo test"]);
    }
}
