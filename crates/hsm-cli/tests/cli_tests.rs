// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! End-to-end checks of the `hsm` binary that need neither tmux nor the
//! network. Every run gets its own data directory and no configuration files.

use assert_cmd::prelude::*;
use std::process::Command;
use tempfile::TempDir;

fn hsm(home: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("hsm"));
    cmd.env("HSM_DATA_DIR", home.path().join("data"))
        .env("HSM_USER_CONFIG", home.path().join("user.toml"))
        .env("HSM_SYSTEM_CONFIG", home.path().join("system.toml"))
        .env_remove("HSM_BASE_PORT")
        .env_remove("RUST_LOG");
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8_lossy(&output).into_owned()
}

fn stderr_of_failure(cmd: &mut Command) -> String {
    let output = cmd.assert().failure().code(1).get_output().stderr.clone();
    String::from_utf8_lossy(&output).into_owned()
}

#[test]
fn help_lists_the_commands() -> Result<(), Box<dyn std::error::Error>> {
    let home = TempDir::new()?;
    let rendered = stdout_of(hsm(&home).arg("--help"));
    for command in ["bootstrap", "status", "scale-up", "update-plugins", "tokens", "wipe"] {
        assert!(rendered.contains(command), "help is missing {command}");
    }
    Ok(())
}

#[test]
fn start_without_a_target_is_a_usage_error() -> Result<(), Box<dyn std::error::Error>> {
    let home = TempDir::new()?;
    hsm(&home).arg("start").assert().failure().code(2);
    Ok(())
}

#[test]
fn config_show_merges_environment_and_flags() -> Result<(), Box<dyn std::error::Error>> {
    let home = TempDir::new()?;
    let rendered = stdout_of(hsm(&home).args(["--base-port", "6000", "config", "show"]));
    let json: serde_json::Value = serde_json::from_str(&rendered)?;

    assert_eq!(json["base-port"], 6000);
    assert_eq!(
        json["data-dir"],
        home.path().join("data").display().to_string()
    );
    assert_eq!(json["downloader"]["patchline"], "production");
    Ok(())
}

#[test]
fn config_show_explain_names_each_layer() -> Result<(), Box<dyn std::error::Error>> {
    let home = TempDir::new()?;
    std::fs::write(home.path().join("user.toml"), "max-players = 40\n")?;

    let rendered = stdout_of(hsm(&home).args([
        "--set",
        "hostname-prefix=realm",
        "config",
        "show",
        "--explain",
    ]));

    assert!(rendered.contains("max-players = 40 (from user)"), "{rendered}");
    assert!(rendered.contains("hostname-prefix = \"realm\" (from flags)"), "{rendered}");
    assert!(rendered.contains("data-dir = "), "{rendered}");
    assert!(rendered.contains("(from env)"), "{rendered}");
    assert!(rendered.contains("base-port = 5520 (from default)"), "{rendered}");
    Ok(())
}

#[test]
fn invalid_configuration_is_reported() -> Result<(), Box<dyn std::error::Error>> {
    let home = TempDir::new()?;
    std::fs::write(home.path().join("user.toml"), "max-view-radius = 99\n")?;
    let stderr = stderr_of_failure(hsm(&home).args(["config", "show"]));
    assert!(stderr.contains("max-view-radius"), "{stderr}");
    Ok(())
}

#[test]
fn backup_policy_round_trips_through_the_shared_directory(
) -> Result<(), Box<dyn std::error::Error>> {
    let home = TempDir::new()?;

    let shown = stdout_of(hsm(&home).args(["backup", "show"]));
    assert!(shown.contains("Backups enabled every 60 minute(s)"));

    stdout_of(hsm(&home).args(["backup", "set", "--frequency", "30"]));
    let shown = stdout_of(hsm(&home).args(["backup", "show"]));
    assert!(shown.contains("every 30 minute(s)"));

    let stored: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(
        home.path().join("data/shared/backup.json"),
    )?)?;
    assert_eq!(stored, serde_json::json!({"enabled": true, "frequency": 30}));

    stdout_of(hsm(&home).args(["backup", "set", "--disable"]));
    let shown = stdout_of(hsm(&home).args(["backup", "show"]));
    assert!(shown.contains("Backups disabled"));
    Ok(())
}

#[test]
fn backup_frequency_out_of_range_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let home = TempDir::new()?;
    let stderr = stderr_of_failure(hsm(&home).args(["backup", "set", "--frequency", "0"]));
    assert!(stderr.contains("between 1 and 1440"), "{stderr}");
    assert!(!home.path().join("data/shared/backup.json").exists());
    Ok(())
}

#[test]
fn status_of_an_empty_fleet() -> Result<(), Box<dyn std::error::Error>> {
    let home = TempDir::new()?;
    let rendered = stdout_of(hsm(&home).arg("status"));
    assert!(rendered.contains("No servers provisioned"), "{rendered}");

    let json = stdout_of(hsm(&home).args(["status", "--json"]));
    assert_eq!(serde_json::from_str::<serde_json::Value>(&json)?, serde_json::json!([]));
    Ok(())
}

#[test]
fn tokens_set_show_and_clear() -> Result<(), Box<dyn std::error::Error>> {
    let home = TempDir::new()?;

    let shown = stdout_of(hsm(&home).args(["tokens", "show"]));
    assert!(shown.contains("Not authenticated"), "{shown}");

    stdout_of(hsm(&home).args([
        "tokens",
        "set",
        "--session-token",
        "session-abcdefghijkl",
        "--identity-token",
        "identity-abcdefghijkl",
        "--owner-uuid",
        "owner-1",
    ]));
    assert!(home.path().join("data/shared/.session-tokens.json").is_file());

    let shown = stdout_of(hsm(&home).args(["tokens", "show"]));
    assert!(shown.contains("Session tokens valid"), "{shown}");
    assert!(shown.contains("owner-1"));
    assert!(!shown.contains("session-abcdefghijkl"), "tokens must be redacted");

    let cleared = stdout_of(hsm(&home).args(["tokens", "clear"]));
    assert!(cleared.contains("Session tokens removed"));
    let cleared = stdout_of(hsm(&home).args(["tokens", "clear"]));
    assert!(cleared.contains("No session tokens stored"));
    Ok(())
}

#[test]
fn tokens_refresh_needs_a_session_endpoint() -> Result<(), Box<dyn std::error::Error>> {
    let home = TempDir::new()?;
    let stderr = stderr_of_failure(hsm(&home).args([
        "tokens",
        "refresh",
        "--access-token",
        "access",
        "--profile-uuid",
        "profile",
    ]));
    assert!(stderr.contains("not configured"), "{stderr}");
    Ok(())
}

#[test]
fn scale_down_refuses_without_servers() -> Result<(), Box<dyn std::error::Error>> {
    let home = TempDir::new()?;
    let stderr = stderr_of_failure(hsm(&home).args(["scale-down", "--count", "1"]));
    assert!(stderr.contains("cannot remove the last server instance"), "{stderr}");
    Ok(())
}

#[test]
fn logs_rejects_server_zero() -> Result<(), Box<dyn std::error::Error>> {
    let home = TempDir::new()?;
    let stderr = stderr_of_failure(hsm(&home).args(["logs", "0"]));
    assert!(stderr.contains("ordinals start at 1"), "{stderr}");
    Ok(())
}

#[test]
fn wipe_requires_confirmation() -> Result<(), Box<dyn std::error::Error>> {
    let home = TempDir::new()?;
    let data = home.path().join("data");
    std::fs::create_dir_all(data.join("server-1"))?;

    let stderr = stderr_of_failure(hsm(&home).arg("wipe"));
    assert!(stderr.contains("without --yes"), "{stderr}");
    assert!(data.join("server-1").is_dir());
    Ok(())
}
