// Process execution for brinfo-scrape.
//
// CommandRunner is the seam: ProcessRunner spawns a real child, tests use
// ScriptedRunner (see testing.rs). A runner never fails; every problem is
// folded into the CommandResult.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tracing::debug;

use crate::options::ScraperOptions;

/// Where brinfo-scrape lives unless `BRINFO_SCRAPE_BIN` says otherwise.
pub const DEFAULT_EXECUTABLE: &str = "./vendor/bin/brinfo-scrape";

/// A fully resolved command line.
#[derive(Clone, PartialEq, Eq)]
pub struct ScrapeCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl ScrapeCommand {
    /// `<program> <command> <...opts> <...args>`
    pub fn build(program: impl Into<PathBuf>, options: &ScraperOptions) -> Self {
        let mut args = Vec::with_capacity(1 + options.opts.len() + options.args.len());
        args.push(options.command.clone());
        args.extend(options.opts.iter().cloned());
        args.extend(options.args.iter().cloned());
        Self {
            program: program.into(),
            args,
        }
    }

    /// Full argv, program first.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

impl fmt::Debug for ScrapeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.argv())
    }
}

/// Captured outcome of one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the child could not be spawned or waited on, or was
    /// killed by a signal.
    pub exit_status: Option<i32>,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_status == Some(0)
    }

    /// A result for a child that never produced an exit status.
    pub fn failed_to_run(error: impl fmt::Display) -> Self {
        Self {
            stdout: String::new(),
            stderr: error.to_string(),
            exit_status: None,
        }
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the command to completion. Never returns an error.
    async fn run(&self, command: &ScrapeCommand) -> CommandResult;
}

/// Spawns the command as a child process with an empty stdin and both output
/// streams buffered in memory. No timeout: a hung child blocks the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &ScrapeCommand) -> CommandResult {
        let output = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        match output {
            Ok(output) => {
                debug!(
                    program = %command.program.display(),
                    status = ?output.status,
                    stdout_bytes = output.stdout.len(),
                    "Child exited"
                );
                CommandResult {
                    stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                    exit_status: output.status.code(),
                }
            }
            Err(e) => CommandResult::failed_to_run(e),
        }
    }
}
