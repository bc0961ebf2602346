//! Test utilities for the updater
//!
//! Helpers shared by unit tests and the integration suite: a throwaway
//! installation tree, release archive builders and a plugin manager that
//! records what the workflow asked of it.
//!
//! # Example
//!
//! ```rust,no_run
//! use updater_cli::test_utils::InstallFixture;
//!
//! let fixture = InstallFixture::new();
//! fixture.stage_core_release(1, "2024.1");
//! assert!(fixture.root().join("update-1.zip").exists());
//! ```

use crate::constants::{DATA_DIR, PLUGIN_REGISTRY_FILE, PLUGINS_DIR, staging_file_name};
use crate::plugins::{InstalledPlugin, PluginManager};
use anyhow::Result;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};
use tempfile::TempDir;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests, once per process.
///
/// Uses `level` when given, otherwise `RUST_LOG`. Without either, tests stay
/// silent.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// Builds an in-memory zip with one deflated entry per `(name, content)`.
pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    build_zip(entries, CompressionMethod::Deflated)
}

/// Writes a zip at `path`, replacing whatever was there.
pub fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    fs::write(path, zip_bytes(entries)).unwrap();
}

/// Writes a zip whose central directory is intact but whose single entry
/// fails its CRC check.
pub fn corrupt_zip(path: &Path) {
    let content = "payload that will not survive the trip";
    let mut bytes = build_zip(&[("bundle/data.txt", content)], CompressionMethod::Stored);

    let offset = bytes
        .windows(content.len())
        .position(|window| window == content.as_bytes())
        .unwrap();
    bytes[offset] ^= 0xff;

    fs::write(path, bytes).unwrap();
}

/// A core release archive whose `Core/VERSION` reads `version`.
pub fn core_release(bundle: &str, version: &str) -> Vec<u8> {
    let entries = [
        (format!("{bundle}/Core/VERSION"), version.to_string()),
        (format!("{bundle}/Core/Kernel.php"), "<?php // kernel".to_string()),
        (format!("{bundle}/node_modules/jquery/jquery.js"), "/* jquery */".to_string()),
        (format!("{bundle}/vendor/autoload.php"), "<?php // autoload".to_string()),
        (format!("{bundle}/index.php"), "bundled entry point".to_string()),
    ];
    let borrowed: Vec<(&str, &str)> =
        entries.iter().map(|(name, content)| (name.as_str(), content.as_str())).collect();
    zip_bytes(&borrowed)
}

/// A plugin release archive with a single `name/` folder and its manifest.
pub fn plugin_release(name: &str, version: &str) -> Vec<u8> {
    let manifest = format!("name = \"{name}\"\nversion = {version}\n");
    let manifest_path = format!("{name}/plugin.toml");
    let init_path = format!("{name}/Init.php");
    zip_bytes(&[(manifest_path.as_str(), manifest.as_str()), (init_path.as_str(), "<?php // init")])
}

fn build_zip(entries: &[(&str, &str)], method: CompressionMethod) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(method);

    for (name, content) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }

    writer.finish().unwrap().into_inner()
}

/// A minimal installation in a temporary directory.
///
/// Has the three managed core directories with an `old` file each, a live
/// `index.php`, `Plugins/` and `MyFiles/`. No `Core/VERSION`, so the running
/// version comes from configuration.
pub struct InstallFixture {
    temp: TempDir,
}

impl InstallFixture {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        for (dir, file) in [("Core", "old.php"), ("node_modules", "old.js"), ("vendor", "old.php")]
        {
            fs::create_dir_all(root.join(dir)).unwrap();
            fs::write(root.join(dir).join(file), "old").unwrap();
        }
        fs::create_dir_all(root.join(PLUGINS_DIR)).unwrap();
        fs::create_dir_all(root.join(DATA_DIR)).unwrap();
        fs::write(root.join("index.php"), "live entry point").unwrap();

        Self {
            temp,
        }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn staging_path(&self, id: u32) -> PathBuf {
        self.root().join(staging_file_name(id))
    }

    /// Stages a core release as `update-<id>.zip`.
    pub fn stage_core_release(&self, id: u32, version: &str) {
        fs::write(self.staging_path(id), core_release("facturascripts", version)).unwrap();
    }

    pub fn stage_plugin_release(&self, id: u32, name: &str, version: &str) {
        fs::write(self.staging_path(id), plugin_release(name, version)).unwrap();
    }

    /// Writes the plugin registry read by the local plugin manager.
    pub fn register_plugins(&self, plugins: &[InstalledPlugin]) {
        let registry = serde_json::json!({ "plugins": plugins });
        fs::write(
            self.root().join(DATA_DIR).join(PLUGIN_REGISTRY_FILE),
            serde_json::to_string_pretty(&registry).unwrap(),
        )
        .unwrap();
    }
}

impl Default for InstallFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// One request the workflow made of a [`RecordingPluginManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginCall {
    Install {
        file: String,
        inner: String,
        force: bool,
    },
    Init(String),
    Migrate,
    Deploy(bool, bool),
}

/// Plugin manager that records calls instead of touching the installation.
#[derive(Debug, Default)]
pub struct RecordingPluginManager {
    plugins: Vec<InstalledPlugin>,
    reject_installs: bool,
    calls: Mutex<Vec<PluginCall>>,
}

impl RecordingPluginManager {
    /// A manager that rejects every archive handed to it.
    pub fn rejecting() -> Self {
        Self {
            reject_installs: true,
            ..Self::default()
        }
    }

    pub fn with_plugin(mut self, name: &str, version: f64, enabled: bool) -> Self {
        self.plugins.push(InstalledPlugin {
            name: name.to_string(),
            version,
            enabled,
            folder: name.to_string(),
        });
        self
    }

    pub fn calls(&self) -> Vec<PluginCall> {
        self.calls.lock().unwrap().clone()
    }

    /// `(staged file name, inner name, force)` of every install request.
    pub fn installs(&self) -> Vec<(String, String, bool)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PluginCall::Install {
                    file,
                    inner,
                    force,
                } => Some((file, inner, force)),
                _ => None,
            })
            .collect()
    }

    /// `(clean, quick)` of every deploy.
    pub fn deploys(&self) -> Vec<(bool, bool)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PluginCall::Deploy(clean, quick) => Some((clean, quick)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: PluginCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl PluginManager for RecordingPluginManager {
    async fn installed_plugins(&self) -> Result<Vec<InstalledPlugin>> {
        Ok(self.plugins.clone())
    }

    async fn enabled_plugins(&self) -> Result<Vec<String>> {
        Ok(self.plugins.iter().filter(|p| p.enabled).map(|p| p.name.clone()).collect())
    }

    async fn install(&self, zip_path: &Path, inner_name: &str, force: bool) -> Result<bool> {
        self.record(PluginCall::Install {
            file: zip_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            inner: inner_name.to_string(),
            force,
        });
        Ok(!self.reject_installs)
    }

    async fn init_plugin(&self, name: &str) -> Result<()> {
        self.record(PluginCall::Init(name.to_string()));
        Ok(())
    }

    async fn run_migrations(&self) -> Result<()> {
        self.record(PluginCall::Migrate);
        Ok(())
    }

    async fn deploy(&self, clean: bool, quick: bool) -> Result<()> {
        self.record(PluginCall::Deploy(clean, quick));
        Ok(())
    }
}
