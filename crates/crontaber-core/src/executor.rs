//! Shell command execution.
//!
//! The executor never returns an error: spawn failures and non-zero exits
//! are reported through [`ExecutionOutcome::failed`].

use std::path::PathBuf;
use std::process::{Output, Stdio};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

/// Captured result of one command run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
    /// Whether the command failed to spawn or exited unsuccessfully.
    pub failed: bool,
    /// Captured standard output.
    #[serde(default)]
    pub stdout: String,
    /// Captured standard error.
    #[serde(default)]
    pub stderr: String,
    /// Process exit code, absent when the process never ran or was signalled.
    #[serde(default)]
    pub exit_code: Option<i32>,
    /// Failure detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionOutcome {
    /// Outcome for a process that could not be started.
    pub fn spawn_failure(error: impl std::fmt::Display) -> Self {
        Self {
            failed: true,
            error: Some(format!("Failed to spawn command: {}", error)),
            ..Self::default()
        }
    }

    fn from_output(output: Output) -> Self {
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let exit_code = output.status.code();

        let error = if output.status.success() {
            None
        } else {
            Some(match exit_code {
                Some(code) => format!("Command failed with exit code {}", code),
                None => "Command terminated without an exit code".to_string(),
            })
        };

        Self {
            failed: !output.status.success(),
            stdout,
            stderr,
            exit_code,
            error,
        }
    }
}

/// Options for a single run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOptions {
    /// Working directory; inherits the current directory when absent.
    pub work_directory: Option<PathBuf>,
}

impl ExecOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the working directory.
    pub fn work_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_directory = Some(dir.into());
        self
    }
}

/// Runs a command line to completion.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `command` and capture its outcome.
    async fn execute(&self, command: &str, options: &ExecOptions) -> ExecutionOutcome;
}

/// Executes command lines through the system shell.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: String,
    flag: String,
}

impl ShellExecutor {
    /// Use the platform shell (`sh -c`, or `cmd /C` on Windows).
    pub fn new() -> Self {
        if cfg!(target_os = "windows") {
            Self::with_shell("cmd")
        } else {
            Self::with_shell("sh")
        }
    }

    /// Use a specific shell binary.
    pub fn with_shell(shell: impl Into<String>) -> Self {
        let shell = shell.into();
        let is_cmd = shell
            .rsplit(['/', '\\'])
            .next()
            .map(|name| name.eq_ignore_ascii_case("cmd") || name.eq_ignore_ascii_case("cmd.exe"))
            .unwrap_or(false);
        let flag = if is_cmd { "/C" } else { "-c" };
        Self {
            shell,
            flag: flag.to_string(),
        }
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn execute(&self, command: &str, options: &ExecOptions) -> ExecutionOutcome {
        let mut cmd = Command::new(&self.shell);
        cmd.arg(&self.flag)
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = &options.work_directory {
            cmd.current_dir(dir);
        }

        match cmd.output().await {
            Ok(output) => {
                let outcome = ExecutionOutcome::from_output(output);
                debug!(
                    "Command '{}' finished (failed: {}, exit code: {:?})",
                    command, outcome.failed, outcome.exit_code
                );
                outcome
            }
            Err(e) => {
                debug!("Command '{}' could not be spawned: {}", command, e);
                ExecutionOutcome::spawn_failure(e)
            }
        }
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
