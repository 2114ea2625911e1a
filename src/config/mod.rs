//! Configuration handling for greenlight.
//!
//! This module provides configuration loading and validation,
//! supporting both `greenlight.toml` files and sensible defaults.

use crate::checks;
use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "greenlight.toml";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Workflow trigger settings.
    pub workflow: WorkflowConfig,
    /// Interpreter pin.
    pub interpreter: InterpreterConfig,
    /// Dependency manager settings.
    pub manager: ManagerConfig,
    /// Dependency environment cache settings.
    pub cache: CacheConfig,
    /// Lint gate settings.
    pub lint: LintConfig,
    /// Test command settings.
    pub test: TestConfig,
    /// Check definitions.
    pub checks: HashMap<String, CheckConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workflow: WorkflowConfig::default(),
            interpreter: InterpreterConfig::default(),
            manager: ManagerConfig::default(),
            cache: CacheConfig::default(),
            lint: LintConfig::default(),
            test: TestConfig::default(),
            checks: default_checks(),
        }
    }
}

impl Config {
    /// Loads configuration from the default location.
    pub fn load() -> Result<Self> {
        let path = Self::find_config_file()?;
        Self::load_from(&path)
    }

    /// Loads configuration or returns defaults if not found.
    pub fn load_or_default() -> Result<Self> {
        match Self::find_config_file() {
            Ok(path) => Self::load_from(&path),
            Err(Error::ConfigNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io("read config", e))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::config_parse_with_source("Failed to parse TOML", e))?;

        config.validate()?;

        Ok(config)
    }

    /// Finds the configuration file by searching up the directory tree.
    pub fn find_config_file() -> Result<PathBuf> {
        let cwd = std::env::current_dir().map_err(|e| Error::io("get current dir", e))?;
        Self::find_config_file_from(&cwd)
    }

    /// Finds the configuration file by searching up from a specific directory.
    pub fn find_config_file_from(start: &Path) -> Result<PathBuf> {
        let mut current = start;
        loop {
            let config_path = current.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return Ok(config_path);
            }

            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }

        Err(Error::ConfigNotFound {
            path: start.join(CONFIG_FILE_NAME),
        })
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if !version_pattern().is_match(&self.interpreter.version) {
            return Err(Error::ConfigInvalid {
                field: "interpreter.version".to_string(),
                message: format!(
                    "Expected MAJOR.MINOR or MAJOR.MINOR.PATCH, got: {}",
                    self.interpreter.version
                ),
            });
        }

        if self.manager.name.is_empty() {
            return Err(Error::ConfigInvalid {
                field: "manager.name".to_string(),
                message: "Dependency manager name must not be empty".to_string(),
            });
        }

        for (field, timeout) in [
            ("lint.timeout", &self.lint.timeout),
            ("test.timeout", &self.test.timeout),
        ] {
            if let Some(value) = timeout {
                if humantime::parse_duration(value).is_err() {
                    return Err(Error::ConfigInvalid {
                        field: field.to_string(),
                        message: format!("Invalid duration: {value}"),
                    });
                }
            }
        }

        for name in &self.lint.order {
            if !self.checks.contains_key(name) {
                return Err(Error::ConfigInvalid {
                    field: "lint.order".to_string(),
                    message: format!("References unknown check: {name}"),
                });
            }
        }

        Ok(())
    }

    /// Generates default configuration as a string.
    #[must_use]
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Workflow trigger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Branches whose pushes fire the pipeline.
    pub push_branches: Vec<String>,
    /// Whether pull requests (against any base) fire the pipeline.
    pub pull_request: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            push_branches: vec!["main".to_string()],
            pull_request: true,
        }
    }
}

/// Interpreter pin configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Pinned interpreter version, e.g. "3.10".
    pub version: String,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            version: "3.10".to_string(),
        }
    }
}

/// Dependency manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Manager command name.
    pub name: String,
    /// Pinned manager version.
    pub version: String,
    /// Install the manager automatically when absent or mismatched.
    pub auto_install: bool,
    /// Create the virtual environment inside the project directory.
    pub in_project_venv: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            name: "poetry".to_string(),
            version: "1.8.3".to_string(),
            auto_install: true,
            in_project_venv: true,
        }
    }
}

/// Dependency environment cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether the cache is consulted at all.
    pub enabled: bool,
    /// Lockfile whose contents key the cache.
    pub lockfile: String,
    /// Override for the cache store root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lockfile: "poetry.lock".to_string(),
            dir: None,
        }
    }
}

/// Lint gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LintConfig {
    /// Paths the checks run against.
    pub targets: Vec<String>,
    /// Checks to run, in order.
    pub order: Vec<String>,
    /// Whether to stop on first failure.
    pub fail_fast: bool,
    /// Optional per-check timeout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            targets: vec!["src".to_string(), "tests".to_string()],
            order: vec![
                checks::names::STYLE.to_string(),
                checks::names::FORMAT.to_string(),
                checks::names::TYPES.to_string(),
            ],
            fail_fast: true,
            timeout: None,
        }
    }
}

/// Test command configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfig {
    /// The project-defined test command.
    pub run: String,
    /// Optional timeout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            run: "poetry run pytest".to_string(),
            timeout: None,
        }
    }
}

/// Configuration for a single check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Command to run.
    pub run: String,
    /// Human-readable description.
    pub description: String,
    /// Whether `lint.targets` are appended to the command line.
    pub append_targets: bool,
    /// Environment variables to set.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            run: String::new(),
            description: String::new(),
            append_targets: true,
            env: HashMap::new(),
        }
    }
}

impl CheckConfig {
    /// Creates a check config from a simple command.
    #[must_use]
    pub fn from_command(cmd: String) -> Self {
        Self {
            run: cmd.clone(),
            description: cmd,
            append_targets: true,
            env: HashMap::new(),
        }
    }
}

/// Default checks for all configurations.
fn default_checks() -> HashMap<String, CheckConfig> {
    let mut map = HashMap::new();

    map.insert(
        checks::names::STYLE.to_string(),
        CheckConfig {
            run: "ruff check".to_string(),
            description: "Style check".to_string(),
            append_targets: true,
            env: HashMap::new(),
        },
    );

    map.insert(
        checks::names::FORMAT.to_string(),
        CheckConfig {
            run: "ruff format --check".to_string(),
            description: "Formatting check".to_string(),
            append_targets: true,
            env: HashMap::new(),
        },
    );

    map.insert(
        checks::names::TYPES.to_string(),
        CheckConfig {
            run: "mypy".to_string(),
            description: "Static type check".to_string(),
            append_targets: true,
            env: HashMap::new(),
        },
    );

    map
}

/// Pattern a pinned interpreter version must match.
fn version_pattern() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        regex::Regex::new(r"^\d+\.\d+(\.\d+)?$").expect("version pattern compiles")
    })
}
