use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{Error, Result};

/// Exit status reported when a program cannot be found, as a shell would.
pub const NOT_FOUND_STATUS: i32 = 127;

/// A single external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Build from an argv-style list; the first element is the program.
    pub fn from_argv(argv: &[String], cwd: impl Into<PathBuf>) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::config("command must name a program"))?;
        Ok(CommandSpec::new(program.clone(), cwd).args(args.iter().cloned()))
    }

    /// Program path to execute.
    ///
    /// A relative path containing a separator is taken relative to `cwd`;
    /// bare names are left for `PATH` lookup.
    pub fn resolved_program(&self) -> PathBuf {
        let program = Path::new(&self.program);
        if program.is_relative() && program.components().count() > 1 {
            self.cwd.join(program)
        } else {
            program.to_path_buf()
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Runs external commands for the task targets.
pub trait CommandRunner {
    /// Run with inherited stdio and return the exit status.
    fn run(&self, command: &CommandSpec) -> Result<i32>;

    /// Run capturing stdout; stderr is inherited.
    fn capture(&self, command: &CommandSpec) -> Result<(i32, String)>;
}

/// [`CommandRunner`] backed by real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ProcessRunner {
    fn command(spec: &CommandSpec) -> Command {
        let mut cmd = Command::new(spec.resolved_program());
        cmd.args(&spec.args).current_dir(&spec.cwd);
        cmd
    }
}

fn status_code(status: std::process::ExitStatus) -> i32 {
    // Killed by a signal: no code, report generic failure
    status.code().unwrap_or(1)
}

fn spawn_error(spec: &CommandSpec, err: std::io::Error) -> Error {
    if err.kind() == ErrorKind::NotFound {
        tracing::error!(command = %spec, "Program not found");
        Error::CommandFailed {
            command: spec.to_string(),
            code: NOT_FOUND_STATUS,
        }
    } else {
        Error::Io(err)
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, spec: &CommandSpec) -> Result<i32> {
        tracing::debug!(command = %spec, cwd = %spec.cwd.display(), "Spawning command");
        let status = Self::command(spec)
            .status()
            .map_err(|e| spawn_error(spec, e))?;
        Ok(status_code(status))
    }

    fn capture(&self, spec: &CommandSpec) -> Result<(i32, String)> {
        tracing::debug!(command = %spec, cwd = %spec.cwd.display(), "Spawning command (captured)");
        let output = Self::command(spec)
            .stderr(Stdio::inherit())
            .output()
            .map_err(|e| spawn_error(spec, e))?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        Ok((status_code(output.status), stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_joins_args() {
        let spec = CommandSpec::new("env/bin/pip", ".").args(["install", "-e", "."]);
        assert_eq!(spec.to_string(), "env/bin/pip install -e .");
    }

    #[test]
    fn test_resolved_program() {
        let spec = CommandSpec::new("env/bin/pip", "/project");
        assert_eq!(spec.resolved_program(), PathBuf::from("/project/env/bin/pip"));

        let spec = CommandSpec::new("python3", "/project");
        assert_eq!(spec.resolved_program(), PathBuf::from("python3"));

        let spec = CommandSpec::new("/usr/bin/git", "/project");
        assert_eq!(spec.resolved_program(), PathBuf::from("/usr/bin/git"));
    }

    #[test]
    fn test_from_argv_requires_program() {
        assert!(CommandSpec::from_argv(&[], ".").is_err());
        let spec = CommandSpec::from_argv(&["sh".to_string(), "-c".to_string()], ".").unwrap();
        assert_eq!(spec.program, "sh");
        assert_eq!(spec.args, vec!["-c".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn test_process_runner_reports_status() {
        let dir = tempfile::tempdir().unwrap();
        let spec = CommandSpec::new("sh", dir.path()).args(["-c", "exit 3"]);
        assert_eq!(ProcessRunner.run(&spec).unwrap(), 3);

        let spec = CommandSpec::new("sh", dir.path()).args(["-c", "echo hello"]);
        let (code, stdout) = ProcessRunner.capture(&spec).unwrap();
        assert_eq!(code, 0);
        assert_eq!(stdout, "hello\n");
    }

    #[test]
    fn test_missing_program_is_127() {
        let dir = tempfile::tempdir().unwrap();
        let spec = CommandSpec::new("definitely-not-a-real-program-xyz", dir.path());
        let err = ProcessRunner.run(&spec).unwrap_err();
        assert_eq!(err.exit_code(), NOT_FOUND_STATUS);
    }
}
