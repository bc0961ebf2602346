//! Updater configuration file.
//!
//! The updater reads a single TOML file describing where the installation
//! lives, where releases come from and how cautious the core directory swap
//! should be. Every field has a default, so an empty or missing file is a
//! valid configuration.
//!
//! # Configuration File Location
//!
//! - **Unix/macOS**: `~/.updater/config.toml`
//! - **Windows**: `%LOCALAPPDATA%\updater\config.toml`
//!
//! The location can be overridden using the `UPDATER_CONFIG_PATH` environment
//! variable or the `--config` CLI flag.
//!
//! # File Format
//!
//! ```toml
//! install_root = "~/www/erp"
//! feed_url = "https://facturascripts.com/DownloadBuild"
//! enable_updates_beta = false
//! rollback_on_failure = true
//!
//! [hooks]
//! migrate_command = "php index.php migrate"
//! init_command = "php index.php init-plugin {plugin}"
//! ```

use crate::constants::{
    DEFAULT_CORE_BUNDLE_FOLDER, DEFAULT_FEED_URL, DEFAULT_TELEMETRY_URL, REDIRECT_DELAY,
    default_lock_timeout,
};
use crate::utils::platform::resolve_path;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Environment variable that points at an alternative config file.
pub const CONFIG_PATH_ENV: &str = "UPDATER_CONFIG_PATH";

/// External commands the installation runs after an update.
///
/// Both commands run through the platform shell with the installation root as
/// working directory. `{plugin}` in `init_command` is replaced with the name of
/// the plugin being initialised.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HooksConfig {
    /// Runs pending schema and data migrations after a core update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrate_command: Option<String>,

    /// Runs a plugin's update-initialization hook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_command: Option<String>,
}

/// Settings of the update workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Installation root. Falls back to the current directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_root: Option<String>,

    /// Running core version when `Core/VERSION` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_version: Option<f64>,

    #[serde(default = "default_feed_url")]
    pub feed_url: String,

    #[serde(default = "default_telemetry_url")]
    pub telemetry_url: String,

    /// Offer beta builds when no stable build qualifies.
    #[serde(default)]
    pub enable_updates_beta: bool,

    /// Top-level folder of a core release archive.
    #[serde(default = "default_core_bundle_folder")]
    pub core_bundle_folder: String,

    #[serde(default = "default_redirect_delay_secs")]
    pub redirect_delay_secs: u64,

    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Maximum age of the cached update list.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,

    /// Move managed directories aside during a core update and restore them
    /// if a later directory fails to copy. When off, destinations are deleted
    /// before copying and a failure leaves the installation half-updated.
    #[serde(default = "default_rollback_on_failure")]
    pub rollback_on_failure: bool,

    #[serde(default, skip_serializing_if = "is_default_hooks")]
    pub hooks: HooksConfig,
}

fn default_feed_url() -> String {
    DEFAULT_FEED_URL.to_string()
}

fn default_telemetry_url() -> String {
    DEFAULT_TELEMETRY_URL.to_string()
}

fn default_core_bundle_folder() -> String {
    DEFAULT_CORE_BUNDLE_FOLDER.to_string()
}

const fn default_redirect_delay_secs() -> u64 {
    REDIRECT_DELAY.as_secs()
}

const fn default_http_timeout_secs() -> u64 {
    900
}

const fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_lock_timeout_secs() -> u64 {
    default_lock_timeout().as_secs()
}

const fn default_rollback_on_failure() -> bool {
    true
}

fn is_default_hooks(hooks: &HooksConfig) -> bool {
    *hooks == HooksConfig::default()
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            install_root: None,
            core_version: None,
            feed_url: default_feed_url(),
            telemetry_url: default_telemetry_url(),
            enable_updates_beta: false,
            core_bundle_folder: default_core_bundle_folder(),
            redirect_delay_secs: default_redirect_delay_secs(),
            http_timeout_secs: default_http_timeout_secs(),
            cache_ttl_secs: default_cache_ttl_secs(),
            lock_timeout_secs: default_lock_timeout_secs(),
            rollback_on_failure: default_rollback_on_failure(),
            hooks: HooksConfig::default(),
        }
    }
}

impl UpdaterConfig {
    /// Load the configuration from `UPDATER_CONFIG_PATH` or the default path.
    pub async fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path).await
        } else {
            Ok(Self::default())
        }
    }

    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(&path).await,
            None => Self::load().await,
        }
    }

    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read updater config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse updater config from {}", path.display()))
    }

    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize updater config")?;

        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write updater config to {}", path.display()))
    }

    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("updater")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".updater")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Resolve the installation root: CLI override, then config, then cwd.
    pub fn resolve_install_root(&self, override_root: Option<&Path>) -> Result<PathBuf> {
        if let Some(root) = override_root {
            return Ok(root.to_path_buf());
        }

        match &self.install_root {
            Some(root) => resolve_path(root),
            None => std::env::current_dir().context("Failed to determine current directory"),
        }
    }

    #[must_use]
    pub const fn redirect_delay(&self) -> Duration {
        Duration::from_secs(self.redirect_delay_secs)
    }

    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }
}
