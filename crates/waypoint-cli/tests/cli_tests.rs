use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Helper function to create a temporary directory for CLI tests
fn create_cli_test_environment() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Command with --no-color, isolated from any user configuration file
fn wp_cmd(env: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("wp").expect("Failed to find wp binary");
    cmd.env("XDG_CONFIG_HOME", env.path()).arg("--no-color");
    cmd
}

#[test]
fn test_cli_classify_element_not_found() {
    let env = create_cli_test_environment();

    wp_cmd(&env)
        .args(["classify", "Element not found: Level B"])
        .assert()
        .success()
        .stdout(predicate::str::contains("- Category: element_not_found"))
        .stdout(predicate::str::contains(
            "- Strategy: refresh_context_and_retry",
        ))
        .stdout(predicate::str::contains("- Retry delay: 500ms"));
}

#[test]
fn test_cli_classify_order_sensitive() {
    let env = create_cli_test_environment();

    wp_cmd(&env)
        .args(["classify", "invalid parameter: type not found"])
        .assert()
        .success()
        .stdout(predicate::str::contains("- Category: invalid_parameter"))
        .stdout(predicate::str::contains("- Strategy: retry_with_modification"));
}

#[test]
fn test_cli_classify_exhausted_budget() {
    let env = create_cli_test_environment();

    wp_cmd(&env)
        .args([
            "classify",
            "invalid parameter: type not found",
            "--retry-count",
            "2",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("- Strategy: escalate_to_user"))
        .stdout(predicate::str::contains("## Execution paused at step 1"))
        .stdout(predicate::str::contains("- Retries: 2"));
}

#[test]
fn test_cli_max_retries_override() {
    let env = create_cli_test_environment();

    wp_cmd(&env)
        .args([
            "--max-retries",
            "5",
            "classify",
            "Operation timed out",
            "--retry-count",
            "2",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("- Retry budget: 2/5"))
        .stdout(predicate::str::contains("Reduce scope"));
}

#[test]
fn test_cli_classify_unknown_escalates() {
    let env = create_cli_test_environment();

    wp_cmd(&env)
        .args(["classify", "disk on fire"])
        .assert()
        .success()
        .stdout(predicate::str::contains("- Category: unknown"))
        .stdout(predicate::str::contains("- Retry budget: not consulted"))
        .stdout(predicate::str::contains("- Strategy: escalate_to_user"));
}

#[test]
fn test_cli_reply_interpretation() {
    let env = create_cli_test_environment();

    wp_cmd(&env)
        .args(["reply", "please just skip it"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Skip the paused step"));

    wp_cmd(&env)
        .args(["reply", "use Level 2 instead"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Retry the paused step with guidance: use Level 2 instead",
        ));
}

#[test]
fn test_cli_config_defaults() {
    let env = create_cli_test_environment();

    wp_cmd(&env)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"max_retries\": 2"))
        .stdout(predicate::str::contains("\"verification_capability\": \"check_outcome\""));
}

#[test]
fn test_cli_config_file() {
    let env = create_cli_test_environment();
    let config_path = env.path().join("custom.json");
    fs::write(
        &config_path,
        r#"{ "max_retries": 4, "verification_strictness": "strict" }"#,
    )
    .unwrap();

    wp_cmd(&env)
        .args(["--config-file", config_path.to_str().unwrap(), "config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"max_retries\": 4"))
        .stdout(predicate::str::contains("\"verification_strictness\": \"strict\""));
}

#[test]
fn test_cli_xdg_config_file() {
    let env = create_cli_test_environment();
    let dir = env.path().join("waypoint");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("config.json"), r#"{ "max_retries": 7 }"#).unwrap();

    wp_cmd(&env)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"max_retries\": 7"));
}

#[test]
fn test_cli_malformed_config_file() {
    let env = create_cli_test_environment();
    let config_path = env.path().join("broken.json");
    fs::write(&config_path, "{ not json").unwrap();

    wp_cmd(&env)
        .args(["--config-file", config_path.to_str().unwrap(), "config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn test_cli_help_output() {
    let env = create_cli_test_environment();

    wp_cmd(&env)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("classify"))
        .stdout(predicate::str::contains("--max-retries"));
}

#[test]
fn test_cli_version_output() {
    let env = create_cli_test_environment();

    wp_cmd(&env)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("wp"));
}
