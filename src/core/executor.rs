//! Command execution for pipeline steps and lint checks.
//!
//! Commands are run through the platform shell so configured entries like
//! `poetry run pytest` work unmodified. Output is either captured (pipeline
//! steps, so the failing step's log can be replayed) or inherited (lint
//! checks, whose output goes straight to the terminal).

use crate::core::error::{Error, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Output from a command execution.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code of the command.
    pub exit_code: i32,
    /// Standard output (empty when output was inherited).
    pub stdout: String,
    /// Standard error (empty when output was inherited).
    pub stderr: String,
    /// Whether the command was killed due to timeout.
    pub timed_out: bool,
    /// Duration the command took to run.
    pub duration: Duration,
}

impl CommandOutput {
    /// Returns true if the command succeeded (exit code 0).
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// Returns combined stdout and stderr output.
    #[must_use]
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Options for command execution.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Working directory for the command.
    pub cwd: Option<std::path::PathBuf>,
    /// Timeout for the command. None means wait indefinitely.
    pub timeout: Option<Duration>,
    /// Environment variables to set.
    pub env: Vec<(String, String)>,
    /// Whether to capture output (vs streaming to the terminal).
    pub capture_output: bool,
}

impl ExecuteOptions {
    /// Options for a captured invocation (pipeline steps).
    #[must_use]
    pub fn captured() -> Self {
        Self {
            capture_output: true,
            ..Self::default()
        }
    }

    /// Sets the working directory.
    #[must_use]
    pub fn cwd(mut self, path: impl AsRef<Path>) -> Self {
        self.cwd = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout = duration;
        self
    }

    /// Sets an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Executor for running shell commands.
#[derive(Debug, Default)]
pub struct Executor;

impl Executor {
    /// Creates a new executor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Executes a shell command.
    pub async fn execute(&self, command: &str, options: ExecuteOptions) -> Result<CommandOutput> {
        let start = std::time::Instant::now();

        let (shell, shell_arg) = if cfg!(windows) {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        };

        let mut cmd = Command::new(shell);
        cmd.arg(shell_arg).arg(command);

        if let Some(ref cwd) = options.cwd {
            cmd.current_dir(cwd);
        }

        for (key, value) in &options.env {
            cmd.env(key, value);
        }

        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);
        if options.capture_output {
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::inherit());
            cmd.stderr(Stdio::inherit());
        }

        let child = cmd.spawn().map_err(|e| Error::io("spawn command", e))?;

        let waited = if let Some(limit) = options.timeout {
            match timeout(limit, wait_child(child, options.capture_output)).await {
                Ok(result) => result?,
                Err(_) => {
                    return Ok(CommandOutput {
                        exit_code: 124,
                        stdout: String::new(),
                        stderr: "Command timed out".to_string(),
                        timed_out: true,
                        duration: start.elapsed(),
                    });
                },
            }
        } else {
            wait_child(child, options.capture_output).await?
        };

        let (exit_code, stdout, stderr) = waited;

        Ok(CommandOutput {
            exit_code,
            stdout,
            stderr,
            timed_out: false,
            duration: start.elapsed(),
        })
    }

    /// Checks if a command exists in PATH.
    #[must_use]
    pub fn command_exists(command: &str) -> bool {
        which::which(command).is_ok()
    }
}

/// Waits for the child and extracts (code, stdout, stderr).
///
/// Consumes the child; on timeout the enclosing future is cancelled and the
/// process is reaped through `kill_on_drop`.
async fn wait_child(
    mut child: tokio::process::Child,
    capture: bool,
) -> Result<(i32, String, String)> {
    if capture {
        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::io("wait for command", e))?;

        Ok((
            status_code(&output.status),
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ))
    } else {
        let status = child
            .wait()
            .await
            .map_err(|e| Error::io("wait for command", e))?;
        Ok((status_code(&status), String::new(), String::new()))
    }
}

/// Maps an exit status to a code, following the shell convention of
/// 128+signal for signal deaths on Unix.
fn status_code(status: &std::process::ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    status.code().unwrap_or(1)
}
