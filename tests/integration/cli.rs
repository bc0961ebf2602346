use crate::common::OfflineInstall;
use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_help_lists_subcommands() {
    Command::cargo_bin("updater")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("download"))
        .stdout(predicate::str::contains("post-update"))
        .stdout(predicate::str::contains("claim-install"));
}

#[test]
fn test_list_offline_is_empty() {
    let install = OfflineInstall::new();

    install
        .cmd()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Everything is up to date"));
}

#[test]
fn test_list_json() {
    let install = OfflineInstall::new();

    let output = install.cmd().args(["--json", "list"]).output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let outcome: serde_json::Value = serde_json::from_str(stdout.lines().next().unwrap()).unwrap();
    assert_eq!(outcome["items"], serde_json::json!([]));
    assert!(outcome.get("redirect").is_none());
}

#[test]
fn test_status_reports_cached_listing() {
    let install = OfflineInstall::new();

    install
        .cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No cached update list"));

    install.cmd().arg("list").assert().success();

    install
        .cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Update list cached at"));
}

#[test]
fn test_unknown_raw_action_lists() {
    let install = OfflineInstall::new();

    install
        .cmd()
        .args(["action", "--action", "explode", "--item", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Everything is up to date"));
}

#[test]
fn test_missing_root_fails() {
    let install = OfflineInstall::new();
    let missing = install.root().join("nowhere");

    install
        .cmd_at(&missing)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not a directory"));
}

#[test]
fn test_invalid_config_fails() {
    let install = OfflineInstall::with_config("enable_updates_beta = [");

    install
        .cmd()
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("updater config"));
}
