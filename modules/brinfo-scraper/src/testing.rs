// Test doubles for the agent.
//
// ScriptedRunner (CommandRunner) replays a fixed list of results and records
// every command it was asked to run, with the tokio clock time of the call.
// Under a paused clock the gaps between calls are exactly the backoff delays.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::command::{CommandResult, CommandRunner, ScrapeCommand};

/// Replays scripted results in order. Once the script runs out the last
/// result repeats.
pub struct ScriptedRunner {
    script: Mutex<VecDeque<CommandResult>>,
    last: Mutex<CommandResult>,
    calls: Mutex<Vec<(ScrapeCommand, Instant)>>,
}

impl ScriptedRunner {
    pub fn new(results: impl IntoIterator<Item = CommandResult>) -> Self {
        Self {
            script: Mutex::new(results.into_iter().collect()),
            last: Mutex::new(exited(1, "ScriptedRunner: nothing scripted")),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call returns `result`.
    pub fn always(result: CommandResult) -> Self {
        Self::new([result])
    }

    /// Commands in call order.
    pub fn commands(&self) -> Vec<ScrapeCommand> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(cmd, _)| cmd.clone())
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Whole seconds elapsed between consecutive calls.
    pub fn gaps_secs(&self) -> Vec<u64> {
        let calls = self.calls.lock().unwrap();
        calls
            .windows(2)
            .map(|pair| (pair[1].1 - pair[0].1).as_secs())
            .collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &ScrapeCommand) -> CommandResult {
        self.calls
            .lock()
            .unwrap()
            .push((command.clone(), Instant::now()));

        let next = self.script.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(result) = next {
            *last = result;
        }
        last.clone()
    }
}

/// A successful run that printed `stdout`.
pub fn succeeded(stdout: &str) -> CommandResult {
    CommandResult {
        stdout: stdout.to_string(),
        stderr: String::new(),
        exit_status: Some(0),
    }
}

/// A run that exited with `code` and printed `stderr`.
pub fn exited(code: i32, stderr: &str) -> CommandResult {
    CommandResult {
        stdout: String::new(),
        stderr: stderr.to_string(),
        exit_status: Some(code),
    }
}

/// A run whose process could not be started.
pub fn not_spawned(error: &str) -> CommandResult {
    CommandResult::failed_to_run(error)
}
