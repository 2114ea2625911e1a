//! CI pipeline orchestration.
//!
//! Runs the workflow's steps strictly in order: workspace resolution,
//! interpreter and manager provisioning, cache restore, dependency install,
//! cache save, test command. The first failing step halts the pipeline and
//! its exit status becomes the pipeline's status. No retries.

pub mod cache;
pub mod provision;

use crate::config::{Config, ManagerConfig};
use crate::core::error::Result;
use crate::core::executor::{CommandOutput, ExecuteOptions, Executor};
use crate::core::git::Workspace;
use cache::{CacheKey, VenvCache};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Directory the managed virtual environment lives in, relative to the
/// workspace root.
pub const VENV_DIR: &str = ".venv";

/// Pipeline step identifiers, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    /// Resolve the repository the run operates on.
    Workspace,
    /// Locate the pinned interpreter.
    Interpreter,
    /// Ensure the dependency manager at its pinned version.
    Manager,
    /// Attempt to restore a saved dependency environment.
    RestoreCache,
    /// Install dependencies (skipped entirely on a cache hit).
    Install,
    /// Save the freshly installed environment.
    SaveCache,
    /// Run the project-defined test command.
    Test,
}

impl Step {
    /// Returns the step name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Workspace => "workspace",
            Self::Interpreter => "interpreter",
            Self::Manager => "manager",
            Self::RestoreCache => "restore-cache",
            Self::Install => "install",
            Self::SaveCache => "save-cache",
            Self::Test => "test",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Result of running a single pipeline step.
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    /// Which step this is.
    pub step: Step,
    /// Exit code of the step (0 for infrastructure steps that succeeded).
    pub exit_code: i32,
    /// Whether the step was skipped.
    pub skipped: bool,
    /// Reason for skipping (if skipped).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    /// Step duration in milliseconds.
    pub duration_ms: u64,
    /// Captured output, replayed as the diagnostic when the step fails.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub output: String,
}

impl StepResult {
    /// Returns true if the step passed (skipped steps count as passed).
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.exit_code == 0
    }

    fn ok(step: Step, detail: impl Into<String>, duration: Duration) -> Self {
        Self {
            step,
            exit_code: 0,
            skipped: false,
            skip_reason: None,
            duration_ms: duration.as_millis() as u64,
            output: detail.into(),
        }
    }

    fn skipped(step: Step, reason: impl Into<String>) -> Self {
        Self {
            step,
            exit_code: 0,
            skipped: true,
            skip_reason: Some(reason.into()),
            duration_ms: 0,
            output: String::new(),
        }
    }

    fn from_output(step: Step, output: &CommandOutput) -> Self {
        Self {
            step,
            exit_code: output.exit_code,
            skipped: false,
            skip_reason: None,
            duration_ms: output.duration.as_millis() as u64,
            output: output.combined_output(),
        }
    }
}

/// Result of a complete pipeline run.
#[derive(Debug, Serialize)]
pub struct PipelineResult {
    /// Results of the steps that executed, in order.
    pub steps: Vec<StepResult>,
    /// Whether a saved environment was restored.
    pub cache_hit: bool,
    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

impl PipelineResult {
    /// Returns true if every executed step passed.
    #[must_use]
    pub fn success(&self) -> bool {
        self.steps.iter().all(StepResult::passed)
    }

    /// Returns the failed step, if any.
    #[must_use]
    pub fn failed_step(&self) -> Option<&StepResult> {
        self.steps.iter().find(|s| !s.passed())
    }

    /// Returns the exit code for the run: 0, or the failing step's code
    /// propagated unchanged.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.failed_step().map_or(0, |s| s.exit_code)
    }
}

/// CI pipeline orchestrator.
#[derive(Debug)]
pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    /// Creates a pipeline with the given configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Runs the pipeline steps in order, stopping at the first failure.
    pub async fn run(&self) -> Result<PipelineResult> {
        let start = std::time::Instant::now();
        let executor = Executor::new();
        let mut steps = Vec::new();
        let mut cache_hit = false;

        // Workspace
        let step_start = std::time::Instant::now();
        let workspace = Workspace::discover()?;
        let branch = workspace.current_branch().unwrap_or_default();
        let commit = workspace.head_commit().unwrap_or_default();
        info!(root = %workspace.root().display(), branch = %branch, "Resolved workspace");
        steps.push(StepResult::ok(
            Step::Workspace,
            format!("{} @ {branch} {commit}", workspace.root().display()),
            step_start.elapsed(),
        ));

        // Interpreter
        let step_start = std::time::Instant::now();
        let interpreter =
            provision::locate_interpreter(&executor, &self.config.interpreter.version).await?;
        steps.push(StepResult::ok(
            Step::Interpreter,
            format!("{} {}", interpreter.command, interpreter.version),
            step_start.elapsed(),
        ));

        // Manager
        let step_start = std::time::Instant::now();
        let manager_version =
            provision::ensure_manager(&executor, &interpreter, &self.config.manager).await?;
        steps.push(StepResult::ok(
            Step::Manager,
            format!("{} {manager_version}", self.config.manager.name),
            step_start.elapsed(),
        ));

        let venv = venv_path(workspace.root());
        let manager_env = provision::venv_env(&self.config.manager);

        // Restore cache
        let key = if self.config.cache.enabled {
            let step_start = std::time::Instant::now();
            let lockfile = workspace.root().join(&self.config.cache.lockfile);
            if lockfile.is_file() {
                let store = VenvCache::open(self.config.cache.dir.as_deref())?;
                let key = CacheKey::for_lockfile(&interpreter.version, &lockfile)?;
                cache_hit = store.restore(&key, &venv)?;
                steps.push(StepResult::ok(
                    Step::RestoreCache,
                    format!("{} {key}", if cache_hit { "hit" } else { "miss" }),
                    step_start.elapsed(),
                ));
                Some(key)
            } else {
                debug!(lockfile = %lockfile.display(), "No lockfile, cache not keyed");
                steps.push(StepResult::skipped(
                    Step::RestoreCache,
                    format!("lockfile {} not found", self.config.cache.lockfile),
                ));
                None
            }
        } else {
            steps.push(StepResult::skipped(Step::RestoreCache, "cache disabled"));
            None
        };

        // Install
        if cache_hit {
            steps.push(StepResult::skipped(Step::Install, "cache hit"));
        } else {
            let command = install_command(&self.config.manager);
            let output = self
                .run_command_step(&executor, Step::Install, &command, &workspace, &manager_env, None)
                .await?;
            let failed = !output.passed();
            steps.push(output);
            if failed {
                return Ok(finish(steps, cache_hit, start.elapsed()));
            }
        }

        // Save cache
        match key {
            Some(ref key) if !cache_hit => {
                if venv.is_dir() {
                    let step_start = std::time::Instant::now();
                    let store = VenvCache::open(self.config.cache.dir.as_deref())?;
                    store.save(key, &venv)?;
                    steps.push(StepResult::ok(
                        Step::SaveCache,
                        format!("saved {key}"),
                        step_start.elapsed(),
                    ));
                } else {
                    steps.push(StepResult::skipped(
                        Step::SaveCache,
                        "no environment to save",
                    ));
                }
            },
            Some(_) => steps.push(StepResult::skipped(Step::SaveCache, "cache hit")),
            None => steps.push(StepResult::skipped(Step::SaveCache, "cache not keyed")),
        }

        // Test
        let timeout = self
            .config
            .test
            .timeout
            .as_deref()
            .and_then(|s| humantime::parse_duration(s).ok());
        let command = self.config.test.run.clone();
        let output = self
            .run_command_step(&executor, Step::Test, &command, &workspace, &manager_env, timeout)
            .await?;
        steps.push(output);

        Ok(finish(steps, cache_hit, start.elapsed()))
    }

    /// Runs one external command step with captured output and a spinner.
    async fn run_command_step(
        &self,
        executor: &Executor,
        step: Step,
        command: &str,
        workspace: &Workspace,
        env: &[(String, String)],
        timeout: Option<Duration>,
    ) -> Result<StepResult> {
        let mut options = ExecuteOptions::captured()
            .cwd(workspace.root())
            .timeout(timeout);
        for (key, value) in env {
            options = options.env(key.clone(), value.clone());
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .ok()
                .unwrap_or_else(ProgressStyle::default_spinner),
        );
        pb.set_message(format!("Running {step}: {command}"));
        pb.enable_steady_tick(Duration::from_millis(100));

        let output = executor.execute(command, options).await;

        pb.finish_and_clear();

        let output = output?;
        if output.success() {
            eprintln!("{} {step}", style("✓").green());
        } else if output.timed_out {
            eprintln!("{} {step} (timed out)", style("✗").red());
        } else {
            eprintln!("{} {step}", style("✗").red());
        }

        Ok(StepResult::from_output(step, &output))
    }
}

/// Builds the dependency-install command: dependencies only, never the
/// project's own root package.
fn install_command(manager: &ManagerConfig) -> String {
    match manager.name.as_str() {
        "poetry" => format!("{} install --no-root", manager.name),
        _ => format!("{} install", manager.name),
    }
}

fn finish(steps: Vec<StepResult>, cache_hit: bool, duration: Duration) -> PipelineResult {
    PipelineResult {
        steps,
        cache_hit,
        duration_ms: duration.as_millis() as u64,
    }
}

/// Returns the path of the managed virtual environment for a workspace root.
#[must_use]
pub fn venv_path(root: &std::path::Path) -> PathBuf {
    root.join(VENV_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_step(step: Step) -> StepResult {
        StepResult::ok(step, "", Duration::ZERO)
    }

    fn failed_step(step: Step, code: i32) -> StepResult {
        StepResult {
            step,
            exit_code: code,
            skipped: false,
            skip_reason: None,
            duration_ms: 0,
            output: String::new(),
        }
    }

    // =========================================================================
    // Step tests
    // =========================================================================

    #[test]
    fn test_step_names() {
        assert_eq!(Step::Workspace.name(), "workspace");
        assert_eq!(Step::RestoreCache.name(), "restore-cache");
        assert_eq!(Step::Test.name(), "test");
        assert_eq!(Step::Install.to_string(), "install");
    }

    // =========================================================================
    // StepResult tests
    // =========================================================================

    #[test]
    fn test_skipped_step_counts_as_passed() {
        let result = StepResult::skipped(Step::Install, "cache hit");
        assert!(result.passed());
        assert!(result.skipped);
        assert_eq!(result.skip_reason.as_deref(), Some("cache hit"));
    }

    #[test]
    fn test_step_result_from_output() {
        let output = CommandOutput {
            exit_code: 2,
            stdout: "collected 3 items".to_string(),
            stderr: "1 failed".to_string(),
            timed_out: false,
            duration: Duration::from_millis(1500),
        };
        let result = StepResult::from_output(Step::Test, &output);

        assert!(!result.passed());
        assert_eq!(result.exit_code, 2);
        assert_eq!(result.duration_ms, 1500);
        assert!(result.output.contains("1 failed"));
    }

    // =========================================================================
    // PipelineResult tests
    // =========================================================================

    #[test]
    fn test_pipeline_result_success() {
        let result = PipelineResult {
            steps: vec![ok_step(Step::Workspace), ok_step(Step::Test)],
            cache_hit: false,
            duration_ms: 10,
        };

        assert!(result.success());
        assert!(result.failed_step().is_none());
        assert_eq!(result.exit_code(), 0);
    }

    #[test]
    fn test_pipeline_result_propagates_failing_code() {
        let result = PipelineResult {
            steps: vec![
                ok_step(Step::Workspace),
                failed_step(Step::Install, 17),
            ],
            cache_hit: false,
            duration_ms: 10,
        };

        assert!(!result.success());
        assert_eq!(result.failed_step().map(|s| s.step), Some(Step::Install));
        assert_eq!(result.exit_code(), 17);
    }

    // =========================================================================
    // install_command tests
    // =========================================================================

    #[test]
    fn test_install_command_poetry_skips_root_package() {
        let manager = ManagerConfig::default();
        assert_eq!(install_command(&manager), "poetry install --no-root");
    }

    #[test]
    fn test_install_command_other_manager() {
        let manager = ManagerConfig {
            name: "pipenv".to_string(),
            ..ManagerConfig::default()
        };
        assert_eq!(install_command(&manager), "pipenv install");
    }

    // =========================================================================
    // Serialization tests
    // =========================================================================

    #[test]
    fn test_step_result_serializes_kebab_case() {
        let result = StepResult::skipped(Step::RestoreCache, "cache disabled");
        let json = serde_json::to_value(&result).expect("serialize");
        assert_eq!(json["step"], "restore-cache");
        assert_eq!(json["skipped"], true);
    }

    #[test]
    fn test_venv_path() {
        let path = venv_path(std::path::Path::new("/repo"));
        assert_eq!(path, PathBuf::from("/repo/.venv"));
    }
}
