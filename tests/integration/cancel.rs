use crate::common::OfflineInstall;
use predicates::prelude::*;

#[test]
fn test_cancel_without_follow_leaves_step_pending() {
    let install = OfflineInstall::new();
    install.fixture.stage_core_release(1, "2024.1");

    install
        .cmd()
        .args(["--no-follow", "cancel", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted"))
        .stdout(predicate::str::contains("Reloading..."))
        .stdout(predicate::str::contains("Post-update pending"));

    assert!(!install.fixture.staging_path(1).exists());

    install
        .cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Post-update pending: migrations"));
}

#[test]
fn test_cancel_follows_into_post_update() {
    let install = OfflineInstall::new();
    install.fixture.stage_plugin_release(42, "Invoicing", "1.5");

    install
        .cmd()
        .args(["cancel", "42"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Update finished"));

    assert!(!install.fixture.staging_path(42).exists());
    assert!(install.root().join("Dinamic").is_dir());
    assert!(install.root().join("MyFiles/.updater/deploy.json").exists());

    install
        .cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Post-update pending").not());
}

#[test]
fn test_cancel_nothing_staged() {
    let install = OfflineInstall::new();

    install
        .cmd()
        .args(["--no-follow", "cancel", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted").not());
}

#[cfg(unix)]
#[test]
fn test_pending_post_update_picks_up_plugin_name() {
    let install = OfflineInstall::with_config(
        r#"
[hooks]
init_command = "echo {plugin} > init.log"
"#,
    );

    // A pending step scheduled with a plugin name, as left by a plugin update.
    let state_dir = install.root().join("MyFiles/.updater");
    std::fs::create_dir_all(&state_dir).unwrap();
    std::fs::write(
        state_dir.join("pending-post-update.json"),
        r#"{"init":"Invoicing","created_at":"2024-01-01T00:00:00Z","not_before":"2024-01-01T00:00:03Z"}"#,
    )
    .unwrap();

    install
        .cmd()
        .arg("post-update")
        .assert()
        .success()
        .stdout(predicate::str::contains("Update finished"));

    let log = std::fs::read_to_string(install.root().join("init.log")).unwrap();
    assert_eq!(log.trim(), "Invoicing");
    assert!(!state_dir.join("pending-post-update.json").exists());
}
