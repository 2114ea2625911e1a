//! Interpreter and dependency manager provisioning.
//!
//! Locates an interpreter satisfying the pinned version and makes sure the
//! dependency manager is present at its pinned version, installing it
//! through the interpreter's pip when allowed.

use crate::config::ManagerConfig;
use crate::core::error::{Error, Result};
use crate::core::executor::{ExecuteOptions, Executor};
use std::sync::OnceLock;
use tracing::debug;

/// A resolved interpreter.
#[derive(Debug, Clone)]
pub struct Interpreter {
    /// Command the interpreter is invoked as, e.g. `python3.10`.
    pub command: String,
    /// Full reported version, e.g. `3.10.14`.
    pub version: String,
}

/// Locates an interpreter matching the pinned version.
///
/// Tries the version-suffixed command first, then the generic commands,
/// accepting whichever reports a version under the pin.
pub async fn locate_interpreter(executor: &Executor, pin: &str) -> Result<Interpreter> {
    let candidates = [
        format!("python{pin}"),
        "python3".to_string(),
        "python".to_string(),
    ];

    for candidate in candidates {
        if !Executor::command_exists(&candidate) {
            continue;
        }

        let output = executor
            .execute(&format!("{candidate} --version"), ExecuteOptions::captured())
            .await?;
        if !output.success() {
            continue;
        }

        if let Some(version) = extract_version(&output.combined_output()) {
            if satisfies_pin(&version, pin) {
                debug!(command = %candidate, version = %version, "Resolved interpreter");
                return Ok(Interpreter {
                    command: candidate,
                    version,
                });
            }
            debug!(command = %candidate, version = %version, pin = %pin, "Version does not satisfy pin");
        }
    }

    Err(Error::InterpreterNotFound {
        version: pin.to_string(),
    })
}

/// Ensures the dependency manager is available at its pinned version.
///
/// Returns the resolved version. When the manager is absent or at a
/// different version, it is installed with `<interpreter> -m pip install
/// <name>==<version>` if `auto_install` permits.
pub async fn ensure_manager(
    executor: &Executor,
    interpreter: &Interpreter,
    config: &ManagerConfig,
) -> Result<String> {
    if let Some(found) = manager_version(executor, &config.name).await? {
        if found == config.version {
            return Ok(found);
        }
        debug!(found = %found, pinned = %config.version, "Manager version mismatch");
    }

    if !config.auto_install {
        return Err(Error::ManagerInstall {
            name: config.name.clone(),
            message: format!(
                "version {} not available and auto_install is disabled",
                config.version
            ),
        });
    }

    let install = format!(
        "{} -m pip install {}=={}",
        interpreter.command, config.name, config.version
    );
    let output = executor
        .execute(&install, ExecuteOptions::captured())
        .await?;

    if !output.success() {
        let detail = output.stderr.trim();
        return Err(Error::ManagerInstall {
            name: config.name.clone(),
            message: if detail.is_empty() {
                format!("installer exited with code {}", output.exit_code)
            } else {
                detail.to_string()
            },
        });
    }

    manager_version(executor, &config.name)
        .await?
        .ok_or_else(|| Error::ManagerInstall {
            name: config.name.clone(),
            message: "not on PATH after installation".to_string(),
        })
}

/// Environment variables that point the manager's virtual environment into
/// the project directory.
#[must_use]
pub fn venv_env(config: &ManagerConfig) -> Vec<(String, String)> {
    if !config.in_project_venv {
        return Vec::new();
    }

    match config.name.as_str() {
        "poetry" => vec![(
            "POETRY_VIRTUALENVS_IN_PROJECT".to_string(),
            "true".to_string(),
        )],
        "pipenv" => vec![("PIPENV_VENV_IN_PROJECT".to_string(), "1".to_string())],
        _ => Vec::new(),
    }
}

/// Reads the version a manager command reports, if the command exists.
async fn manager_version(executor: &Executor, name: &str) -> Result<Option<String>> {
    if !Executor::command_exists(name) {
        return Ok(None);
    }

    let output = executor
        .execute(&format!("{name} --version"), ExecuteOptions::captured())
        .await?;
    if !output.success() {
        return Ok(None);
    }

    Ok(extract_version(&output.combined_output()))
}

/// Pulls the first dotted version number out of tool output.
fn extract_version(text: &str) -> Option<String> {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        regex::Regex::new(r"(\d+\.\d+(?:\.\d+)*)").expect("version pattern compiles")
    });

    pattern.find(text).map(|m| m.as_str().to_string())
}

/// Returns true if a full version satisfies a MAJOR.MINOR pin.
fn satisfies_pin(version: &str, pin: &str) -> bool {
    version == pin || version.starts_with(&format!("{pin}."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    // =========================================================================
    // extract_version tests
    // =========================================================================

    #[rstest]
    #[case("Python 3.10.14", Some("3.10.14"))]
    #[case("Poetry (version 1.8.3)", Some("1.8.3"))]
    #[case("3.10", Some("3.10"))]
    #[case("no digits here", None)]
    fn test_extract_version(#[case] text: &str, #[case] expected: Option<&str>) {
        assert_eq!(extract_version(text).as_deref(), expected);
    }

    // =========================================================================
    // satisfies_pin tests
    // =========================================================================

    #[test]
    fn test_satisfies_pin() {
        assert!(satisfies_pin("3.10.14", "3.10"));
        assert!(satisfies_pin("3.10", "3.10"));
        assert!(!satisfies_pin("3.1.4", "3.10"));
        assert!(!satisfies_pin("3.11.0", "3.10"));
    }

    // =========================================================================
    // venv_env tests
    // =========================================================================

    #[test]
    fn test_venv_env_poetry() {
        let config = ManagerConfig::default();
        let env = venv_env(&config);
        assert_eq!(
            env,
            vec![(
                "POETRY_VIRTUALENVS_IN_PROJECT".to_string(),
                "true".to_string()
            )]
        );
    }

    #[test]
    fn test_venv_env_disabled() {
        let config = ManagerConfig {
            in_project_venv: false,
            ..ManagerConfig::default()
        };
        assert!(venv_env(&config).is_empty());
    }

    #[test]
    fn test_venv_env_unknown_manager() {
        let config = ManagerConfig {
            name: "uv".to_string(),
            ..ManagerConfig::default()
        };
        assert!(venv_env(&config).is_empty());
    }

    // =========================================================================
    // Provisioning behavior tests
    // =========================================================================

    #[tokio::test]
    async fn test_locate_interpreter_unsatisfiable_pin() {
        let executor = Executor::new();
        let result = locate_interpreter(&executor, "99.99").await;
        assert!(matches!(
            result,
            Err(Error::InterpreterNotFound { version }) if version == "99.99"
        ));
    }

    #[tokio::test]
    async fn test_ensure_manager_missing_without_auto_install() {
        let executor = Executor::new();
        let interpreter = Interpreter {
            command: "python3".to_string(),
            version: "3.10.14".to_string(),
        };
        let config = ManagerConfig {
            name: "definitely_not_a_real_manager_12345".to_string(),
            auto_install: false,
            ..ManagerConfig::default()
        };

        let result = ensure_manager(&executor, &interpreter, &config).await;
        assert!(matches!(result, Err(Error::ManagerInstall { .. })));
    }
}
