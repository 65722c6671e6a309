//! Smoke tests -- verify the binary runs and key subcommands exist.

use assert_cmd::Command;

#[test]
fn test_cli_help() {
    Command::cargo_bin("speedfinder")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains(
            "Network speed, data usage and LAN discovery toolkit",
        ));
}

#[test]
fn test_cli_version() {
    Command::cargo_bin("speedfinder")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicates::str::contains("speedfinder"));
}

#[test]
fn test_speed_test_subcommand_exists() {
    Command::cargo_bin("speedfinder")
        .unwrap()
        .args(["speed-test", "--help"])
        .assert()
        .success();
}

#[test]
fn test_scan_subcommand_exists() {
    Command::cargo_bin("speedfinder")
        .unwrap()
        .args(["scan", "--help"])
        .assert()
        .success();
}

#[test]
fn test_usage_show_subcommand_exists() {
    Command::cargo_bin("speedfinder")
        .unwrap()
        .args(["usage", "show", "--help"])
        .assert()
        .success();
}

#[test]
fn test_usage_limit_rejects_negative() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("speedfinder.toml");
    std::fs::write(
        &config,
        format!("db_path = \"{}\"\n", dir.path().join("t.db").display()),
    )
    .unwrap();

    Command::cargo_bin("speedfinder")
        .unwrap()
        .args(["--config", config.to_str().unwrap(), "usage", "limit", "--mb", "-5"])
        .assert()
        .failure();
}

#[test]
fn test_usage_limit_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("speedfinder.toml");
    std::fs::write(
        &config,
        format!("db_path = \"{}\"\n", dir.path().join("t.db").display()),
    )
    .unwrap();

    Command::cargo_bin("speedfinder")
        .unwrap()
        .args(["--config", config.to_str().unwrap(), "usage", "limit", "--mb", "500"])
        .assert()
        .success()
        .stdout(predicates::str::contains("500 MB"));

    Command::cargo_bin("speedfinder")
        .unwrap()
        .args(["--config", config.to_str().unwrap(), "usage", "show"])
        .assert()
        .success()
        .stdout(predicates::str::contains("Daily mobile limit: 500 MB"));
}
