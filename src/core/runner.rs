//! Lint gate execution.
//!
//! Runs the configured checks strictly in order with fail-fast semantics:
//! the first check that exits non-zero halts the gate and its exit code
//! becomes the gate's exit code. Check output goes straight to the
//! terminal, without aggregation or suppression.

use crate::config::{CheckConfig, Config};
use crate::core::error::{Error, Result};
use crate::core::executor::{ExecuteOptions, Executor};
use crate::core::git::Workspace;
use console::style;
use std::time::Duration;

/// Result of running a single check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Name of the check.
    pub name: String,
    /// Exit code the check's command returned.
    pub exit_code: i32,
    /// Duration the check took to run.
    pub duration: Duration,
}

impl CheckResult {
    /// Returns true if the check passed.
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.exit_code == 0
    }
}

/// Result of running the lint gate.
#[derive(Debug)]
pub struct GateResult {
    /// Individual check results, in execution order.
    pub checks: Vec<CheckResult>,
    /// Total duration.
    pub duration: Duration,
}

impl GateResult {
    /// Returns true if all executed checks passed.
    #[must_use]
    pub fn success(&self) -> bool {
        self.checks.iter().all(CheckResult::passed)
    }

    /// Returns the first failed check, if any.
    #[must_use]
    pub fn first_failure(&self) -> Option<&CheckResult> {
        self.checks.iter().find(|c| !c.passed())
    }

    /// Returns the number of passed checks.
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed()).count()
    }
}

/// Runner for the lint gate.
#[derive(Debug)]
pub struct Runner {
    config: Config,
    workspace: Option<Workspace>,
}

impl Runner {
    /// Creates a new runner with the given configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            workspace: Workspace::discover().ok(),
        }
    }

    /// Creates a new runner with a specific workspace.
    #[must_use]
    pub fn with_workspace(config: Config, workspace: Workspace) -> Self {
        Self {
            config,
            workspace: Some(workspace),
        }
    }

    /// Runs the configured checks in order.
    pub async fn run(&self) -> Result<GateResult> {
        let start = std::time::Instant::now();
        let mut results = Vec::with_capacity(self.config.lint.order.len());

        for name in &self.config.lint.order {
            let result = self.run_single(name).await?;
            let failed = !result.passed();
            results.push(result);

            if failed && self.config.lint.fail_fast {
                break;
            }
        }

        Ok(GateResult {
            checks: results,
            duration: start.elapsed(),
        })
    }

    /// Runs a single check by name.
    pub async fn run_single(&self, name: &str) -> Result<CheckResult> {
        let check = self
            .config
            .checks
            .get(name)
            .ok_or_else(|| Error::CheckNotFound {
                name: name.to_string(),
            })?;

        let command = command_line(check, &self.config.lint.targets);
        eprintln!("{} {name}: {command}", style("→").dim());

        let mut options = ExecuteOptions::default().timeout(timeout(&self.config.lint.timeout));

        if let Some(ref workspace) = self.workspace {
            options = options.cwd(workspace.root());
        }

        for (key, value) in &check.env {
            options = options.env(key.clone(), value.clone());
        }

        let executor = Executor::new();
        let output = executor.execute(&command, options).await?;

        if output.success() {
            eprintln!("{} {name}", style("✓").green());
        } else if output.timed_out {
            eprintln!("{} {name} (timed out)", style("✗").red());
        } else {
            eprintln!("{} {name}", style("✗").red());
        }

        Ok(CheckResult {
            name: name.to_string(),
            exit_code: output.exit_code,
            duration: output.duration,
        })
    }
}

/// Builds the full command line for a check.
fn command_line(check: &CheckConfig, targets: &[String]) -> String {
    if !check.append_targets || targets.is_empty() {
        return check.run.clone();
    }

    let mut command = check.run.clone();
    for target in targets {
        command.push(' ');
        command.push_str(target);
    }
    command
}

/// Parses an optional humantime duration string.
fn timeout(value: &Option<String>) -> Option<Duration> {
    value
        .as_deref()
        .and_then(|s| humantime::parse_duration(s).ok())
}
