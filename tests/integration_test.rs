//! Integration tests for the greenlight CLI.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Creates a test git repository.
fn create_test_repo() -> TempDir {
    let temp = TempDir::new().expect("create temp dir");

    std::process::Command::new("git")
        .args(["init", "-b", "main"])
        .current_dir(temp.path())
        .output()
        .expect("init repo");

    std::process::Command::new("git")
        .args(["config", "user.email", "test@test.com"])
        .current_dir(temp.path())
        .output()
        .expect("set email");

    std::process::Command::new("git")
        .args(["config", "user.name", "Test"])
        .current_dir(temp.path())
        .output()
        .expect("set name");

    temp
}

/// A `glt` command with CI host environment variables stripped, so tests
/// behave the same inside and outside CI.
fn glt(temp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("glt").expect("binary exists");
    cmd.current_dir(temp.path())
        .env_remove("CI")
        .env_remove("GITHUB_ACTIONS")
        .env_remove("GITHUB_EVENT_NAME")
        .env_remove("GITHUB_REF_NAME")
        .env_remove("GITHUB_BASE_REF");
    cmd
}

#[test]
fn test_help() {
    Command::cargo_bin("glt")
        .expect("binary exists")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Fail-fast CI workflow"));
}

#[test]
fn test_version() {
    Command::cargo_bin("glt")
        .expect("binary exists")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

// =============================================================================
// init
// =============================================================================

#[test]
fn test_init_creates_config() {
    let temp = create_test_repo();

    glt(&temp)
        .arg("init")
        .assert()
        .success()
        .stderr(predicate::str::contains("Created greenlight.toml"));

    assert!(temp.path().join("greenlight.toml").exists());
}

#[test]
fn test_init_detects_package_dir() {
    let temp = create_test_repo();
    std::fs::create_dir_all(temp.path().join("meadow")).expect("create package");
    std::fs::write(temp.path().join("meadow/__init__.py"), "").expect("write init");
    std::fs::create_dir_all(temp.path().join("tests")).expect("create tests");

    glt(&temp)
        .arg("init")
        .assert()
        .success()
        .stderr(predicate::str::contains("meadow"));

    let config =
        std::fs::read_to_string(temp.path().join("greenlight.toml")).expect("read config");
    assert!(config.contains("meadow"));
    assert!(config.contains("tests"));
}

#[test]
fn test_init_already_exists() {
    let temp = create_test_repo();
    std::fs::write(temp.path().join("greenlight.toml"), "").expect("create config");

    glt(&temp)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_init_force_overwrites() {
    let temp = create_test_repo();
    std::fs::write(temp.path().join("greenlight.toml"), "").expect("create config");

    glt(&temp).args(["init", "--force"]).assert().success();

    let config =
        std::fs::read_to_string(temp.path().join("greenlight.toml")).expect("read config");
    assert!(config.contains("[workflow]"));
}

// =============================================================================
// validate
// =============================================================================

#[test]
fn test_validate_without_config() {
    let temp = create_test_repo();

    glt(&temp)
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration not found"));
}

#[test]
fn test_validate_valid_config() {
    let temp = create_test_repo();
    glt(&temp).arg("init").assert().success();

    glt(&temp)
        .arg("validate")
        .assert()
        .success()
        .stderr(predicate::str::contains("Configuration is valid"));
}

#[test]
fn test_validate_invalid_config() {
    let temp = create_test_repo();
    std::fs::write(
        temp.path().join("greenlight.toml"),
        "[interpreter]\nversion = \"latest\"\n",
    )
    .expect("write config");

    glt(&temp).arg("validate").assert().failure();
}

// =============================================================================
// detect
// =============================================================================

#[test]
fn test_detect_local_branch_as_push() {
    let temp = create_test_repo();

    glt(&temp)
        .arg("detect")
        .assert()
        .success()
        .stderr(predicate::str::contains("push to main"));
}

#[test]
fn test_detect_pull_request_from_env() {
    let temp = create_test_repo();

    glt(&temp)
        .arg("detect")
        .env("GITHUB_EVENT_NAME", "pull_request")
        .env("GITHUB_BASE_REF", "develop")
        .assert()
        .success()
        .stderr(predicate::str::contains("pull request against develop"));
}

// =============================================================================
// lint gate
// =============================================================================

/// Writes a lint configuration whose checks are plain shell commands.
fn write_lint_config(temp: &TempDir, style_cmd: &str, format_cmd: &str, types_cmd: &str) {
    let config = format!(
        r#"
[lint]
targets = []
order = ["style", "format", "types"]

[checks.style]
run = '{style_cmd}'
append_targets = false

[checks.format]
run = '{format_cmd}'
append_targets = false

[checks.types]
run = '{types_cmd}'
append_targets = false
"#
    );
    std::fs::write(temp.path().join("greenlight.toml"), config).expect("write config");
}

#[test]
fn test_lint_all_passing() {
    let temp = create_test_repo();
    write_lint_config(&temp, "true", "true", "true");

    glt(&temp)
        .arg("lint")
        .assert()
        .success()
        .stderr(predicate::str::contains("All checks passed (3 passed)"));
}

#[test]
fn test_lint_fail_fast_skips_remaining_checks() {
    let temp = create_test_repo();
    write_lint_config(
        &temp,
        "exit 3",
        "touch format.ran",
        "touch types.ran",
    );

    glt(&temp)
        .arg("lint")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Check 'style' failed (exit 3)"));

    // Later checks never executed
    assert!(!temp.path().join("format.ran").exists());
    assert!(!temp.path().join("types.ran").exists());
}

#[test]
fn test_lint_propagates_exit_code_unchanged() {
    let temp = create_test_repo();
    write_lint_config(&temp, "true", "exit 42", "true");

    glt(&temp).arg("lint").assert().code(42);
}

#[test]
fn test_lint_surfaces_check_output() {
    let temp = create_test_repo();
    write_lint_config(&temp, "echo style-violation-found >&2; exit 1", "true", "true");

    glt(&temp)
        .arg("lint")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("style-violation-found"));
}

#[test]
fn test_lint_is_idempotent() {
    let temp = create_test_repo();
    write_lint_config(&temp, "true", "exit 5", "true");

    glt(&temp).arg("lint").assert().code(5);
    glt(&temp).arg("lint").assert().code(5);
}

#[test]
fn test_lint_single_check() {
    let temp = create_test_repo();
    write_lint_config(&temp, "exit 3", "true", "true");

    glt(&temp)
        .args(["lint", "--check", "format"])
        .assert()
        .success();
}

#[test]
fn test_lint_unknown_check() {
    let temp = create_test_repo();
    write_lint_config(&temp, "true", "true", "true");

    glt(&temp)
        .args(["lint", "--check", "spellcheck"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Check not found: spellcheck"));
}

#[test]
fn test_default_action_is_lint() {
    let temp = create_test_repo();
    write_lint_config(&temp, "true", "true", "true");

    glt(&temp)
        .assert()
        .success()
        .stderr(predicate::str::contains("All checks passed"));
}

// =============================================================================
// ci trigger gate
// =============================================================================

#[test]
fn test_ci_push_to_unwatched_branch_does_not_run() {
    let temp = create_test_repo();

    glt(&temp)
        .args(["ci", "--event", "push", "--branch", "feature/x"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Workflow not triggered"));
}

#[test]
fn test_ci_pull_request_fires_for_any_base() {
    let temp = create_test_repo();
    // An unsatisfiable interpreter pin proves the pipeline actually started
    std::fs::write(
        temp.path().join("greenlight.toml"),
        "[interpreter]\nversion = \"99.99\"\n",
    )
    .expect("write config");

    glt(&temp)
        .args(["ci", "--event", "pull-request", "--base", "anything"])
        .assert()
        .code(69)
        .stderr(predicate::str::contains("Interpreter version 99.99"));
}

#[test]
fn test_ci_push_to_main_fires() {
    let temp = create_test_repo();
    std::fs::write(
        temp.path().join("greenlight.toml"),
        "[interpreter]\nversion = \"99.99\"\n",
    )
    .expect("write config");

    glt(&temp)
        .args(["ci", "--event", "push", "--branch", "main"])
        .assert()
        .code(69)
        .stderr(predicate::str::contains("fired"));
}

#[test]
fn test_ci_force_bypasses_gate() {
    let temp = create_test_repo();
    std::fs::write(
        temp.path().join("greenlight.toml"),
        "[interpreter]\nversion = \"99.99\"\n",
    )
    .expect("write config");

    glt(&temp)
        .args(["ci", "--event", "push", "--branch", "feature/x", "--force"])
        .assert()
        .code(69)
        .stderr(predicate::str::contains("forced"));
}

// =============================================================================
// cache command
// =============================================================================

#[test]
fn test_cache_lists_and_clears_entries() {
    let temp = create_test_repo();
    let store = temp.path().join("store");
    let config = format!(
        "[cache]\ndir = \"{}\"\n",
        store.display().to_string().replace('\\', "/")
    );
    std::fs::write(temp.path().join("greenlight.toml"), config).expect("write config");

    // Empty store
    glt(&temp)
        .arg("cache")
        .assert()
        .success()
        .stderr(predicate::str::contains("(empty)"));

    // Fake saved environment
    std::fs::create_dir_all(store.join("venv-linux-3.10.14-a1b2c3d4e5f6"))
        .expect("create entry");

    glt(&temp)
        .arg("cache")
        .assert()
        .success()
        .stderr(predicate::str::contains("venv-linux-3.10.14-a1b2c3d4e5f6"));

    glt(&temp)
        .args(["cache", "--clear"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Removed 1 cache entries"));

    assert!(!store.join("venv-linux-3.10.14-a1b2c3d4e5f6").exists());
}
