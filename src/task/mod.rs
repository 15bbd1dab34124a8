//! Development targets: `dep`, `clean`, `test` and `release`.
//!
//! Each target is a fixed sequence of steps run one after another. The first
//! step that exits non-zero stops the sequence and its status becomes the
//! target's result ([`Error::CommandFailed`]). Nothing is retried.

pub mod clean;
pub mod command;
pub mod mock;
pub mod release;

pub use command::{CommandRunner, CommandSpec, ProcessRunner};
pub use mock::RecordingRunner;

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::git::{Git2Repository, TagRepository};
use crate::ui;

/// A development target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::Subcommand)]
pub enum Target {
    /// Recreate the environment, install the package and freeze its dependencies
    Dep,
    /// Remove build output, distributions, the environment and packaging metadata
    Clean,
    /// Run the test suite verbosely
    Test,
    /// Tag HEAD with the version from the packaging descriptor
    Release,
}

impl Target {
    pub fn name(&self) -> &'static str {
        match self {
            Target::Dep => "dep",
            Target::Clean => "clean",
            Target::Test => "test",
            Target::Release => "release",
        }
    }
}

/// Runs targets for the project rooted at `root`.
pub struct TaskRunner<R: CommandRunner> {
    root: PathBuf,
    config: Config,
    runner: R,
}

impl<R: CommandRunner> TaskRunner<R> {
    pub fn new(root: impl Into<PathBuf>, config: Config, runner: R) -> Self {
        TaskRunner {
            root: root.into(),
            config,
            runner,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run one target; `release` uses the git repository containing `root`.
    pub fn run(&self, target: Target) -> Result<()> {
        tracing::info!(task = target.name(), root = %self.root.display(), "Running target");
        match target {
            Target::Dep => self.dep(),
            Target::Clean => {
                self.clean();
                Ok(())
            }
            Target::Test => self.test(),
            Target::Release => {
                let repo = Git2Repository::open(&self.root)?;
                self.release(&repo).map(|_| ())
            }
        }
    }

    /// Remove build artifacts. Never fails.
    pub fn clean(&self) -> Vec<PathBuf> {
        let removed = clean::clean(&self.root, &self.config);
        ui::display_success(&format!("Removed {} path(s)", removed.len()));
        removed
    }

    /// Recreate the environment and install the package with its dependencies.
    pub fn dep(&self) -> Result<()> {
        self.clean();

        let env_dir = self.config.expand(&self.config.environment.dir);
        let python = self.config.expand(&self.config.environment.python);
        let pip = self.config.expand(&self.config.environment.pip);

        self.step(&self.command(&python).args(["-m", "venv", env_dir.as_str()]))?;
        self.step(&self.command(&pip).args(["install", "-e", "."]))?;

        let freeze = self.command(&pip).arg("freeze");
        ui::display_status(&format!("Running: {}", freeze));
        let (code, listing) = self.runner.capture(&freeze)?;
        check_status(&freeze, code)?;
        let freeze_path = self.root.join(&self.config.dep.freeze_file);
        fs::write(&freeze_path, listing)?;
        ui::display_success(&format!("Wrote {}", freeze_path.display()));

        if self.config.dep.dev_packages.is_empty() {
            ui::display_status("No development packages configured");
        } else {
            let install = self
                .command(&pip)
                .arg("install")
                .args(self.config.dep.dev_packages.iter().cloned());
            self.step(&install)?;
        }

        Ok(())
    }

    /// Run the configured test command.
    pub fn test(&self) -> Result<()> {
        let argv: Vec<String> = self
            .config
            .test
            .command
            .iter()
            .map(|a| self.config.expand(a))
            .collect();
        let command = CommandSpec::from_argv(&argv, &self.root)?;
        self.step(&command)
    }

    /// Tag HEAD of `repo` with the descriptor's version.
    pub fn release<T: TagRepository + ?Sized>(&self, repo: &T) -> Result<String> {
        let tag = release::release(&self.root, &self.config.release, repo)?;
        ui::display_success(&format!("Created tag: {}", tag));
        Ok(tag)
    }

    fn command(&self, program: &str) -> CommandSpec {
        CommandSpec::new(program, &self.root)
    }

    fn step(&self, command: &CommandSpec) -> Result<()> {
        ui::display_status(&format!("Running: {}", command));
        let code = self.runner.run(command)?;
        check_status(command, code)
    }
}

fn check_status(command: &CommandSpec, code: i32) -> Result<()> {
    if code == 0 {
        Ok(())
    } else {
        tracing::error!(command = %command, code, "Command failed");
        Err(Error::CommandFailed {
            command: command.to_string(),
            code,
        })
    }
}
