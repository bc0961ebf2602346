//! Shared helpers for driving the `updater` binary.

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use updater_cli::test_utils::InstallFixture;

/// An installation plus a config file that points every remote endpoint at
/// a closed local port, so nothing leaves the machine.
pub struct OfflineInstall {
    pub fixture: InstallFixture,
    config_path: PathBuf,
}

impl OfflineInstall {
    pub fn new() -> Self {
        Self::with_config("")
    }

    /// Appends `extra` to the offline config.
    pub fn with_config(extra: &str) -> Self {
        let fixture = InstallFixture::new();
        let config_path = fixture.root().join("updater.toml");
        let config = format!(
            r#"feed_url = "http://127.0.0.1:9/DownloadBuild"
telemetry_url = "http://127.0.0.1:9/Telemetry"
core_version = 2023.9
redirect_delay_secs = 0
http_timeout_secs = 5
{extra}
"#
        );
        std::fs::write(&config_path, config).unwrap();

        Self {
            fixture,
            config_path,
        }
    }

    pub fn root(&self) -> &Path {
        self.fixture.root()
    }

    /// `updater --root <root> --config <config> --no-progress`.
    pub fn cmd(&self) -> Command {
        self.cmd_at(self.root())
    }

    /// Same as [`Self::cmd`] with a different installation root.
    pub fn cmd_at(&self, root: &Path) -> Command {
        let mut cmd = Command::cargo_bin("updater").unwrap();
        cmd.arg("--root")
            .arg(root)
            .arg("--config")
            .arg(&self.config_path)
            .arg("--no-progress")
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .env_remove("UPDATER_ROOT");
        cmd
    }
}
