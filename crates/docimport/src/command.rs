//! External import command
//!
//! The command receives no arguments about the batch; it is expected to scan
//! the staging directory on its own. Success is exit code 0.

use crate::error::{ImportError, Result};
use async_trait::async_trait;
use std::io::Write;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Success,
    Failed(Option<i32>),
}

impl CommandStatus {
    pub fn success(&self) -> bool {
        matches!(self, CommandStatus::Success)
    }
}

/// Runs the ingestion step over a staged directory.
#[async_trait]
pub trait ImportCommand: Send + Sync {
    async fn run(&self, target_dir: &Path) -> Result<CommandStatus>;

    /// Human-readable form used in logs and errors.
    fn describe(&self) -> String;
}

/// A program plus arguments, parsed from a whitespace-separated string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    program: String,
    args: Vec<String>,
}

impl ShellCommand {
    pub fn parse(command: &str) -> Result<Self> {
        let mut words = command.split_whitespace().map(str::to_string);
        let program = words
            .next()
            .ok_or_else(|| ImportError::config("import command must not be empty"))?;
        Ok(Self {
            program,
            args: words.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

fn forward(mut out: impl Write, bytes: &[u8]) -> std::io::Result<()> {
    out.write_all(bytes)?;
    out.flush()
}

#[async_trait]
impl ImportCommand for ShellCommand {
    async fn run(&self, target_dir: &Path) -> Result<CommandStatus> {
        info!(command = %self.describe(), dir = %target_dir.display(), "Running import");

        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .await
            .map_err(|source| ImportError::CommandSpawn {
                command: self.describe(),
                source,
            })?;

        // A closed stdout/stderr must not mask the command's exit status.
        if let Err(e) = forward(std::io::stdout(), &output.stdout) {
            warn!(error = %e, "Failed to forward import command stdout");
        }
        if let Err(e) = forward(std::io::stderr(), &output.stderr) {
            warn!(error = %e, "Failed to forward import command stderr");
        }

        debug!(status = ?output.status, "Import command exited");
        Ok(if output.status.success() {
            CommandStatus::Success
        } else {
            CommandStatus::Failed(output.status.code())
        })
    }

    fn describe(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
