//! CLI integration tests
//!
//! Tests the command-line interface using assert_cmd

mod common;

use common::{fixture_path, Sandbox};
use predicates::prelude::*;

// ─────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_help_flag() {
    Sandbox::new()
        .cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Practice Partner"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("simulate"))
        .stdout(predicate::str::contains("persona"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_command() {
    Sandbox::new()
        .cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("practice-partner"))
        .stdout(predicate::str::contains("Build Information"))
        .stdout(predicate::str::contains("Git Hash"));
}

#[test]
fn test_short_version_flag() {
    Sandbox::new()
        .cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("practice-partner"));
}

// ─────────────────────────────────────────────────────────────────
// Persona Command Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_persona_list() {
    Sandbox::new()
        .cmd()
        .args(["persona", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hackathon_contact"))
        .stdout(predicate::str::contains("recruiter"))
        .stdout(predicate::str::contains("interviewer"))
        .stdout(predicate::str::contains("investor"))
        .stdout(predicate::str::contains("peer"))
        .stdout(predicate::str::contains("(default)"));
}

#[test]
fn test_persona_show_investor() {
    Sandbox::new()
        .cmd()
        .args(["persona", "show", "investor"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Startup Investor"))
        .stdout(predicate::str::contains("waits for user"))
        .stdout(predicate::str::contains("Do NOT initiate"))
        .stdout(predicate::str::contains("# Initial Behavior").not());
}

#[test]
fn test_persona_show_unknown_falls_back() {
    Sandbox::new()
        .cmd()
        .args(["persona", "show", "ceo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Unknown persona 'ceo'"))
        .stdout(predicate::str::contains("Key:         hackathon_contact"));
}

#[test]
fn test_persona_prompt_with_context() {
    Sandbox::new()
        .cmd()
        .args([
            "persona",
            "prompt",
            "recruiter",
            "--event-type",
            "networking",
            "--user-role",
            "student",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "# Additional Context\n- Event type: networking\n- The person you're talking to is a student",
        ));
}

#[test]
fn test_persona_prompt_without_context() {
    Sandbox::new()
        .cmd()
        .args(["persona", "prompt", "peer"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# Role"))
        .stdout(predicate::str::contains("Additional Context").not());
}

#[test]
fn test_persona_list_from_replacement_catalog() {
    let sandbox = Sandbox::new();
    let config = sandbox.write(
        "practice-partner.toml",
        &format!(
            "[persona]\ncatalog_path = \"{}\"\n",
            fixture_path("personas.toml").display()
        ),
    );

    sandbox
        .cmd()
        .args(["persona", "list", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("mentor"))
        .stdout(predicate::str::contains("Booth Visitor"))
        .stdout(predicate::str::contains("recruiter").not());
}

// ─────────────────────────────────────────────────────────────────
// Config Command Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_config_show_default() {
    Sandbox::new()
        .cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[agent]"))
        .stdout(predicate::str::contains("[room]"))
        .stdout(predicate::str::contains("[realtime]"))
        .stdout(predicate::str::contains("[logging]"));
}

#[test]
fn test_config_show_masks_credentials() {
    Sandbox::new()
        .cmd()
        .args(["config", "show"])
        .env("LIVEKIT_API_KEY", "lk-very-secret")
        .env("OPENAI_API_KEY", "sk-very-secret")
        .assert()
        .success()
        .stdout(predicate::str::contains("********"))
        .stdout(predicate::str::contains("very-secret").not());
}

#[test]
fn test_config_validate_default() {
    Sandbox::new()
        .cmd()
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("not set"));
}

#[test]
fn test_config_validate_nonexistent_file() {
    Sandbox::new()
        .cmd()
        .args(["config", "validate", "--config", "/nonexistent/path/config.toml"])
        .assert()
        .code(10)
        .stderr(predicate::str::contains("E100"));
}

#[test]
fn test_config_validate_invalid_fixture() {
    Sandbox::new()
        .cmd()
        .args(["config", "validate", "--config"])
        .arg(fixture_path("invalid_config.toml"))
        .assert()
        .code(10)
        .stderr(predicate::str::contains("E102"));
}

#[test]
fn test_config_init_writes_file() {
    let sandbox = Sandbox::new();
    let target = sandbox.path().join("conf").join("config.toml");

    sandbox
        .cmd()
        .args(["config", "init", "--path"])
        .arg(&target)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration written"));
    assert!(target.exists());

    // Refuses to overwrite without --force
    sandbox
        .cmd()
        .args(["config", "init", "--path"])
        .arg(&target)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    sandbox
        .cmd()
        .args(["config", "init", "--force", "--path"])
        .arg(&target)
        .assert()
        .success();

    // The generated file is itself valid
    sandbox
        .cmd()
        .args(["config", "validate", "--config"])
        .arg(&target)
        .assert()
        .success();
}

// ─────────────────────────────────────────────────────────────────
// Run / Simulate Command Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_run_help() {
    Sandbox::new()
        .cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--room"))
        .stdout(predicate::str::contains("--config"));
}

#[test]
fn test_run_without_credentials() {
    Sandbox::new()
        .cmd()
        .args(["run", "--room", "practice-1"])
        .assert()
        .code(10)
        .stderr(predicate::str::contains("E103"));
}

#[test]
fn test_simulate_default_persona() {
    Sandbox::new()
        .cmd()
        .arg("simulate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Persona:         hackathon_contact"))
        .stdout(predicate::str::contains("Final state:     closed"))
        .stdout(predicate::str::contains("Greeting error:  none"))
        .stdout(predicate::str::contains("track_subscribed (audio from practice-user)"))
        .stdout(predicate::str::contains("Ended because:   participant left"));
}

#[test]
fn test_simulate_not_json_metadata() {
    Sandbox::new()
        .cmd()
        .args(["simulate", "--metadata", "not-json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Persona:         hackathon_contact"))
        .stdout(predicate::str::contains("Additional Context").not());
}

#[test]
fn test_simulate_recruiter_metadata() {
    Sandbox::new()
        .cmd()
        .args([
            "simulate",
            "--metadata",
            r#"{"persona":"recruiter","eventType":"networking","userRole":"student"}"#,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Persona:         recruiter"))
        .stdout(predicate::str::contains("System prompt (Tech Recruiter)"))
        .stdout(predicate::str::contains("- Event type: networking"));
}

#[test]
fn test_simulate_greeting_failure_is_survivable() {
    Sandbox::new()
        .cmd()
        .args(["simulate", "--fail-greeting"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Greeting error:  Failed to issue greeting"))
        .stdout(predicate::str::contains("Final state:     closed"));
}

#[test]
fn test_simulate_start_failure_is_fatal() {
    Sandbox::new()
        .cmd()
        .args(["simulate", "--fail-start"])
        .assert()
        .code(50)
        .stderr(predicate::str::contains("E500"));
}
