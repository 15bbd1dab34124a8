//! Command-line surface of `minidb-task`
//!
//! Kept apart from `main.rs` so the exit-status rules can be exercised
//! without spawning the binary.

use std::path::PathBuf;

use crate::config;
use crate::task::{ProcessRunner, Target, TaskRunner};
use crate::ui;

/// Exit status when no target is given.
pub const USAGE_STATUS: i32 = 2;

#[derive(Debug, clap::Parser)]
#[command(
    name = "minidb-task",
    about = "Development tasks for the minidb project: dep, clean, test, release"
)]
pub struct Args {
    #[arg(short, long, help = "Custom configuration file path")]
    pub config: Option<String>,

    #[arg(
        short = 'C',
        long,
        help = "Project root (defaults to the current directory)"
    )]
    pub directory: Option<PathBuf>,

    #[arg(short, long, help = "Log debug output, including each spawned command")]
    pub verbose: bool,

    #[command(subcommand)]
    pub target: Option<Target>,
}

/// Run the parsed invocation and return the process exit status.
///
/// * no target: usage on stdout, status 2
/// * failed step: that step's status
/// * configuration or other errors: status 1
pub fn run(args: Args) -> i32 {
    let target = match args.target {
        Some(target) => target,
        None => {
            print!("{}", ui::usage::<Args>());
            return USAGE_STATUS;
        }
    };

    let root = match args.directory {
        Some(dir) => dir,
        None => PathBuf::from("."),
    };

    let config = match config::load_config(args.config.as_deref(), &root) {
        Ok(cfg) => cfg,
        Err(e) => {
            ui::display_error(&format!("Error loading config: {}", e));
            return 1;
        }
    };

    let tasks = TaskRunner::new(root, config, ProcessRunner);
    match tasks.run(target) {
        Ok(()) => 0,
        Err(e) => {
            ui::display_error(&format!("{} failed: {}", target.name(), e));
            e.exit_code()
        }
    }
}
