use crate::error::Result;
use crate::task::command::{CommandRunner, CommandSpec};
use std::collections::HashMap;
use std::sync::Mutex;

/// Command runner that records invocations instead of spawning processes.
///
/// Every command succeeds unless a status was registered for its program.
/// A registered side effect lets tests emulate what a tool leaves on disk.
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<CommandSpec>>,
    statuses: HashMap<String, i32>,
    outputs: HashMap<String, String>,
    effects: HashMap<String, Box<dyn Fn(&CommandSpec) + Send + Sync>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exit with `code` whenever `program` runs
    pub fn with_status(mut self, program: impl Into<String>, code: i32) -> Self {
        self.statuses.insert(program.into(), code);
        self
    }

    /// Captured stdout of `program`
    pub fn with_output(mut self, program: impl Into<String>, stdout: impl Into<String>) -> Self {
        self.outputs.insert(program.into(), stdout.into());
        self
    }

    /// Run `effect` whenever `program` runs
    pub fn with_effect<F>(mut self, program: impl Into<String>, effect: F) -> Self
    where
        F: Fn(&CommandSpec) + Send + Sync + 'static,
    {
        self.effects.insert(program.into(), Box::new(effect));
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().expect("call log poisoned").clone()
    }

    /// Recorded commands rendered as command lines
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.to_string()).collect()
    }

    fn record(&self, command: &CommandSpec) -> i32 {
        self.calls
            .lock()
            .expect("call log poisoned")
            .push(command.clone());
        if let Some(effect) = self.effects.get(&command.program) {
            effect(command);
        }
        self.statuses.get(&command.program).copied().unwrap_or(0)
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, command: &CommandSpec) -> Result<i32> {
        Ok(self.record(command))
    }

    fn capture(&self, command: &CommandSpec) -> Result<(i32, String)> {
        let code = self.record(command);
        let stdout = self.outputs.get(&command.program).cloned().unwrap_or_default();
        Ok((code, stdout))
    }
}
