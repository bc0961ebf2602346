//! Plugin management seen from the update workflow.
//!
//! The workflow only needs a narrow contract from whatever manages plugins:
//! which plugins are installed and enabled, installing a plugin archive,
//! running its init hook, running migrations and redeploying. [`PluginManager`]
//! captures that contract; [`LocalPluginManager`] implements it on top of the
//! installation's `Plugins/` folder and a JSON registry in `MyFiles/`.

pub mod hooks;
pub mod local;

pub use hooks::HookRunner;
pub use local::LocalPluginManager;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::Path;

/// A plugin present in the installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstalledPlugin {
    pub name: String,
    pub version: f64,
    #[serde(default)]
    pub enabled: bool,
    /// Folder name under `Plugins/`.
    pub folder: String,
}

/// `plugin.toml` shipped at the top of every plugin folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub name: String,
    pub version: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

pub trait PluginManager: Send + Sync {
    fn installed_plugins(&self) -> impl Future<Output = Result<Vec<InstalledPlugin>>> + Send;

    /// Names of the enabled plugins.
    fn enabled_plugins(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Installs the plugin archive at `zip_path`, staging it as `inner_name`.
    ///
    /// `Ok(false)` means the archive was rejected; the reason has been logged.
    fn install(
        &self,
        zip_path: &Path,
        inner_name: &str,
        force: bool,
    ) -> impl Future<Output = Result<bool>> + Send;

    fn init_plugin(&self, name: &str) -> impl Future<Output = Result<()>> + Send;

    fn run_migrations(&self) -> impl Future<Output = Result<()>> + Send;

    /// Regenerates derived files. `quick` skips the expensive parts.
    fn deploy(&self, clean: bool, quick: bool) -> impl Future<Output = Result<()>> + Send;
}
