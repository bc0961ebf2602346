use crate::common::OfflineInstall;
use predicates::prelude::*;
use updater_cli::test_utils::corrupt_zip;

#[test]
fn test_corrupt_archive_is_refused() {
    let install = OfflineInstall::new();
    corrupt_zip(&install.fixture.staging_path(1));

    install
        .cmd()
        .args(["update", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ZIP ERROR"))
        .stderr(predicate::str::contains("did not complete"));

    assert!(install.fixture.staging_path(1).exists());
    assert!(install.root().join("Core/old.php").exists());
}

#[test]
fn test_update_without_download() {
    let install = OfflineInstall::new();

    install.cmd().args(["update", "1"]).assert().failure().stderr(predicate::str::contains("ZIP ERROR"));

    assert!(install.root().join("Core/old.php").exists());
}

#[test]
fn test_claim_install_when_unregistered() {
    let install = OfflineInstall::new();

    install
        .cmd()
        .arg("claim-install")
        .assert()
        .success()
        .stderr(predicate::str::contains("not registered"));
}

#[test]
fn test_register_offline() {
    let install = OfflineInstall::new();

    install
        .cmd()
        .arg("register")
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not be registered"));

    assert!(!install.root().join("MyFiles/telemetry.json").exists());
}

#[test]
fn test_download_unknown_item_warns() {
    let install = OfflineInstall::new();

    install
        .cmd()
        .args(["download", "99"])
        .assert()
        .success()
        .stderr(predicate::str::contains("No update item with id 99"));
}
