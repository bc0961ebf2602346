use crate::common::OfflineInstall;
use predicates::prelude::*;
use updater_cli::plugins::InstalledPlugin;

#[test]
fn test_core_update_json() {
    let install = OfflineInstall::new();
    install.fixture.stage_core_release(1, "2024.1");

    let output = install.cmd().args(["--json", "--no-follow", "update", "1"]).output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 1);

    let outcome: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(outcome["redirect"]["kind"], "post-update");
    assert_eq!(outcome["redirect"]["delay_secs"], 0);
    let states = outcome["install"]["states"].as_array().unwrap();
    assert_eq!(states.last().unwrap(), "deployed");
    assert_eq!(outcome["install"]["swap"]["replaced"], serde_json::json!(["Core", "node_modules", "vendor"]));

    let root = install.root();
    assert_eq!(std::fs::read_to_string(root.join("Core/VERSION")).unwrap(), "2024.1");
    assert_eq!(std::fs::read_to_string(root.join("index.php")).unwrap(), "live entry point");
    assert!(!root.join("facturascripts").exists());
    assert!(!install.fixture.staging_path(1).exists());
}

#[cfg(unix)]
#[test]
fn test_core_update_runs_migrations() {
    let install = OfflineInstall::with_config(
        r#"
[hooks]
migrate_command = "touch migrated"
"#,
    );
    install.fixture.stage_core_release(1, "2024.1");

    install
        .cmd()
        .args(["update", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reloading..."))
        .stdout(predicate::str::contains("Update finished"));

    assert!(install.root().join("migrated").exists());
    assert!(install.root().join("vendor/autoload.php").exists());
}

#[test]
fn test_plugin_update_replaces_folder() {
    let install = OfflineInstall::new();
    std::fs::create_dir_all(install.root().join("Plugins/Invoicing")).unwrap();
    std::fs::write(install.root().join("Plugins/Invoicing/Legacy.php"), "<?php").unwrap();
    install.fixture.register_plugins(&[InstalledPlugin {
        name: "Invoicing".to_string(),
        version: 1.2,
        enabled: true,
        folder: "Invoicing".to_string(),
    }]);
    install.fixture.stage_plugin_release(42, "Invoicing", "1.5");

    install.cmd().args(["update", "42"]).assert().success();

    let plugin_dir = install.root().join("Plugins/Invoicing");
    assert!(plugin_dir.join("Init.php").exists());
    assert!(!plugin_dir.join("Legacy.php").exists());
    assert!(install.root().join("Dinamic/Invoicing/Init.php").exists());

    let registry = std::fs::read_to_string(install.root().join("MyFiles/plugins.json")).unwrap();
    let registry: serde_json::Value = serde_json::from_str(&registry).unwrap();
    assert_eq!(registry["plugins"][0]["version"], 1.5);
    assert_eq!(registry["plugins"][0]["enabled"], true);
}
