//! CLI command implementations.

use crate::config::{Config, CONFIG_FILE_NAME};
use crate::core::error::{Error, Result};
use crate::core::git::Workspace;
use crate::core::runner::{GateResult, Runner};
use crate::core::trigger::{self, Decision, Event, Reason, Trigger};
use crate::pipeline::cache::VenvCache;
use crate::pipeline::Pipeline;
use console::style;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Run the CI pipeline.
pub fn ci(
    event_flag: Option<&str>,
    branch: Option<String>,
    base: Option<String>,
    force: bool,
    json: bool,
) -> Result<ExitCode> {
    let config = Config::load_or_default()?;

    let event = resolve_event(event_flag, branch, base);
    match event {
        Some(ref event) => eprintln!("{} Event: {event}", style("•").cyan()),
        None => eprintln!("{} Event: none detected", style("•").cyan()),
    }

    let decision = if force {
        Trigger::forced()
    } else {
        match event {
            Some(ref event) => Trigger::new(&config.workflow).evaluate(event),
            None => Decision {
                fired: false,
                reason: Reason::NoEvent,
            },
        }
    };

    if !decision.fired {
        eprintln!(
            "{} Workflow not triggered ({})",
            style("•").cyan(),
            decision.reason
        );
        return Ok(ExitCode::SUCCESS);
    }

    eprintln!(
        "{} Trigger: {} ({})",
        style("•").cyan(),
        style("fired").bold(),
        decision.reason
    );

    let pipeline = Pipeline::new(config);
    let result = runtime()?.block_on(pipeline.run())?;

    if json {
        let summary = serde_json::json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "event": event.as_ref().map(ToString::to_string),
            "success": result.success(),
            "cache_hit": result.cache_hit,
            "duration_ms": result.duration_ms,
            "steps": result.steps,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).map_err(|e| Error::Internal {
                message: format!("Failed to serialize summary: {e}"),
            })?
        );
    }

    eprintln!();
    if result.success() {
        eprintln!(
            "{} Pipeline passed ({} steps, cache {}) in {}ms",
            style("✓").green().bold(),
            result.steps.len(),
            if result.cache_hit { "hit" } else { "miss" },
            result.duration_ms
        );
        Ok(ExitCode::SUCCESS)
    } else {
        let code = result.exit_code();
        if let Some(step) = result.failed_step() {
            eprintln!(
                "{} Step '{}' failed (exit {})",
                style("✗").red().bold(),
                step.step,
                step.exit_code
            );
            for line in step.output.lines() {
                eprintln!("    {line}");
            }
        }
        Ok(exit_code(code))
    }
}

/// Run the lint gate.
pub fn lint(check: Option<&str>) -> Result<ExitCode> {
    let config = Config::load_or_default()?;
    let runner = Runner::new(config);
    let rt = runtime()?;

    let result = match check {
        Some(name) => {
            let check_result = rt.block_on(runner.run_single(name))?;
            let duration = check_result.duration;
            GateResult {
                checks: vec![check_result],
                duration,
            }
        },
        None => rt.block_on(runner.run())?,
    };

    eprintln!();
    if result.success() {
        eprintln!(
            "{} All checks passed ({} passed) in {:?}",
            style("✓").green().bold(),
            result.passed_count(),
            result.duration
        );
        Ok(ExitCode::SUCCESS)
    } else {
        // First failure is fatal; its exit code is the gate's exit code.
        let failure = result.first_failure().ok_or_else(|| Error::Internal {
            message: "Gate failed without a failing check".to_string(),
        })?;
        eprintln!(
            "{} Check '{}' failed (exit {})",
            style("✗").red().bold(),
            failure.name,
            failure.exit_code
        );
        Ok(exit_code(failure.exit_code))
    }
}

/// Show the detected event and trigger decision.
pub fn detect() -> Result<ExitCode> {
    let config = Config::load_or_default()?;
    let workspace = Workspace::discover().ok();
    let event = trigger::detect_event(workspace.as_ref());

    match event {
        Some(ref event) => {
            let decision = Trigger::new(&config.workflow).evaluate(event);
            eprintln!("Detected event: {}", style(event.to_string()).bold());
            eprintln!(
                "Decision: {} ({})",
                if decision.fired { "fired" } else { "skipped" },
                decision.reason
            );
        },
        None => {
            eprintln!("Detected event: {}", style("none").bold());
        },
    }

    // Show environment info
    eprintln!();
    eprintln!("Environment:");

    let env_vars = ["CI", "GITHUB_EVENT_NAME", "GITHUB_REF_NAME", "GITHUB_BASE_REF"];
    for var in env_vars {
        if let Ok(value) = std::env::var(var) {
            eprintln!("  {var}={value}");
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Inspect or clear the dependency environment cache.
pub fn cache(clear: bool) -> Result<ExitCode> {
    let config = Config::load_or_default()?;
    let store = VenvCache::open(config.cache.dir.as_deref())?;

    if clear {
        let removed = store.clear()?;
        eprintln!("{} Removed {removed} cache entries", style("✓").green());
        return Ok(ExitCode::SUCCESS);
    }

    eprintln!("Cache root: {}", store.root().display());
    let entries = store.entries()?;
    if entries.is_empty() {
        eprintln!("  (empty)");
    } else {
        for entry in entries {
            eprintln!("  {entry}");
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Initialize configuration.
pub fn init(force: bool) -> Result<ExitCode> {
    let config_path = PathBuf::from(CONFIG_FILE_NAME);

    // Check if config already exists
    if config_path.exists() && !force {
        eprintln!(
            "{} Configuration already exists: {}",
            style("!").yellow(),
            config_path.display()
        );
        eprintln!("  Use --force to overwrite.");
        return Ok(ExitCode::FAILURE);
    }

    let mut config = Config::default();

    if let Some(package) = detect_package_dir(Path::new(".")) {
        eprintln!(
            "{} Detected package directory: {package}",
            style("•").cyan()
        );
        let mut targets = vec![package];
        if Path::new("tests").is_dir() {
            targets.push("tests".to_string());
        }
        config.lint.targets = targets;
    }

    let toml = toml::to_string_pretty(&config).map_err(|e| Error::Internal {
        message: format!("Failed to serialize config: {e}"),
    })?;

    std::fs::write(&config_path, toml).map_err(|e| Error::io("write config", e))?;

    eprintln!("{} Created {}", style("✓").green(), config_path.display());

    eprintln!("\nNext steps:");
    eprintln!("  1. Review and customize {CONFIG_FILE_NAME}");
    eprintln!("  2. Run: glt lint");

    Ok(ExitCode::SUCCESS)
}

/// Validate configuration.
pub fn validate() -> Result<ExitCode> {
    match Config::load() {
        Ok(config) => match config.validate() {
            Ok(()) => {
                eprintln!("{} Configuration is valid", style("✓").green());
                Ok(ExitCode::SUCCESS)
            },
            Err(e) => {
                eprintln!("{} Configuration validation failed: {e}", style("✗").red());
                Ok(ExitCode::FAILURE)
            },
        },
        Err(Error::ConfigNotFound { path }) => {
            eprintln!(
                "{} Configuration not found: {}",
                style("!").yellow(),
                path.display()
            );
            eprintln!("  Run: glt init");
            Ok(ExitCode::FAILURE)
        },
        Err(e) => {
            eprintln!("{} Failed to load configuration: {e}", style("✗").red());
            Ok(ExitCode::FAILURE)
        },
    }
}

/// Show configuration.
pub fn config(raw: bool) -> Result<ExitCode> {
    match Config::find_config_file() {
        Ok(path) => {
            eprintln!("Configuration file: {}", path.display());

            if raw {
                let content =
                    std::fs::read_to_string(&path).map_err(|e| Error::io("read config", e))?;
                eprintln!();
                std::io::stdout()
                    .write_all(content.as_bytes())
                    .map_err(|e| Error::io("write output", e))?;
            }

            Ok(ExitCode::SUCCESS)
        },
        Err(Error::ConfigNotFound { .. }) => {
            eprintln!("{} No configuration file found", style("!").yellow());
            eprintln!("  Run: glt init");
            Ok(ExitCode::FAILURE)
        },
        Err(e) => Err(e),
    }
}

/// Generate shell completions.
pub fn completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    clap_complete::generate(
        shell,
        &mut super::Cli::command(),
        "glt",
        &mut std::io::stdout(),
    );
}

/// Builds the event to evaluate from flags, falling back to detection.
fn resolve_event(
    event_flag: Option<&str>,
    branch: Option<String>,
    base: Option<String>,
) -> Option<Event> {
    match event_flag {
        Some("push") => {
            let branch = branch
                .or_else(|| {
                    Workspace::discover()
                        .ok()
                        .and_then(|w| w.current_branch().ok())
                })
                .unwrap_or_else(|| "main".to_string());
            Some(Event::Push { branch })
        },
        Some("pull-request") => Some(Event::PullRequest {
            base: base.unwrap_or_else(|| "main".to_string()),
        }),
        _ => {
            let workspace = Workspace::discover().ok();
            trigger::detect_event(workspace.as_ref())
        },
    }
}

/// Finds the first directory that looks like a Python package.
fn detect_package_dir(root: &Path) -> Option<String> {
    let mut names: Vec<String> = std::fs::read_dir(root)
        .ok()?
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.path().join("__init__.py").is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| !name.starts_with('.') && name != "tests")
        .collect();

    names.sort();
    names.into_iter().next()
}

/// Builds the tokio runtime commands execute on.
fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| Error::Internal {
        message: format!("Failed to create runtime: {e}"),
    })
}

/// Clamps an exit code into the ExitCode range.
fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
