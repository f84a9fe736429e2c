//! Shell Tool
//!
//! Runs commands through the platform shell (`sh -c`, `cmd /C` on Windows)
//! with stdin closed, so a command waiting for input fails instead of hanging
//! the prompt. Used both by the model and by `!` lines in the REPL.

use anyhow::Result;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use sdk::types::{ToolInput, ToolResult};

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Captured result of one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOutput {
    pub command: String,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout followed by stderr
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShellTool {
    work_dir: PathBuf,
    timeout: Duration,
}

impl ShellTool {
    pub fn new(work_dir: PathBuf) -> Self {
        Self {
            work_dir,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run one command, failing only when it cannot be started or times out
    pub async fn execute(
        &self,
        command: &str,
        work_dir: Option<PathBuf>,
        timeout: Option<Duration>,
    ) -> Result<ShellOutput> {
        let command = command.trim().to_string();
        if command.is_empty() {
            return Err(anyhow::anyhow!("Empty command"));
        }
        info!("Executing shell command: {}", command);

        let work_dir = work_dir.unwrap_or_else(|| self.work_dir.clone());
        let timeout = timeout.unwrap_or(self.timeout);

        let result = tokio::time::timeout(
            timeout,
            shell_command(&command)
                .current_dir(&work_dir)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await;

        match result {
            Ok(Ok(output)) => {
                debug!("Command exited with {:?}", output.status.code());
                Ok(ShellOutput {
                    command,
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                })
            }
            Ok(Err(e)) => {
                warn!("Command failed to start: {}", e);
                Err(anyhow::anyhow!("Failed to start command: {}", e))
            }
            Err(_) => {
                let err_msg = format!("Command timed out after {} seconds", timeout.as_secs());
                warn!("{}", err_msg);
                Err(anyhow::anyhow!(err_msg))
            }
        }
    }

    /// Tool entry point.
    ///
    /// `command` is a string or a list of strings run in order; the run stops
    /// at the first failure unless `ignore_errors` is set.
    pub async fn call(&self, input: &ToolInput) -> ToolResult {
        let commands: Vec<String> = match input.params.get("command") {
            Some(serde_json::Value::String(s)) => vec![s.clone()],
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
            _ => return ToolResult::error("Missing parameter: command"),
        };
        if commands.is_empty() {
            return ToolResult::error("No commands provided");
        }

        let work_dir = input.param_str_opt("work_dir").map(PathBuf::from);
        let timeout = input
            .param_i64_opt("timeout")
            .filter(|t| *t > 0)
            .map(|t| Duration::from_secs(t as u64));
        let ignore_errors = input.param_bool_opt("ignore_errors").unwrap_or(false);

        let mut blocks = Vec::with_capacity(commands.len());
        let mut failed = false;

        for command in &commands {
            match self.execute(command, work_dir.clone(), timeout).await {
                Ok(output) if output.success() => blocks.push(output.combined()),
                Ok(output) => {
                    failed = true;
                    blocks.push(format!(
                        "Command '{}' exited with status {}\n{}",
                        command,
                        output
                            .exit_code
                            .map(|c| c.to_string())
                            .unwrap_or_else(|| "unknown".to_string()),
                        output.combined()
                    ));
                }
                Err(e) => {
                    failed = true;
                    blocks.push(format!("Command '{}' failed: {}", command, e));
                }
            }
            if failed && !ignore_errors {
                break;
            }
        }

        if failed && !ignore_errors {
            ToolResult {
                status: sdk::types::ToolStatus::Error,
                ..ToolResult::success_lines(blocks)
            }
        } else {
            ToolResult::success_lines(blocks)
        }
    }
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.args(["/C", command]);
    cmd
}

#[cfg(not(windows))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", command]);
    cmd
}
