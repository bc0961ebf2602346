//! Plugin manager backed by the installation folders.
//!
//! Plugins live in `<root>/Plugins/<folder>`; which plugins are installed,
//! their versions and whether they are enabled is recorded in
//! `<root>/MyFiles/plugins.json`. Deploying wipes the generated `Dinamic/`
//! folder and records what was deployed in `MyFiles/.updater/deploy.json`.

use crate::config::HooksConfig;
use crate::constants::{
    DATA_DIR, DYNAMIC_DIR, PLUGIN_MANIFEST_FILE, PLUGIN_REGISTRY_FILE, PLUGINS_DIR, STATE_DIR,
};
use crate::plugins::{HookRunner, InstalledPlugin, PluginManager, PluginManifest};
use crate::update::verification::ArchiveVerifier;
use crate::utils::fs::{
    copy_dir, ensure_dir, read_json_file, remove_dir_all, remove_file_if_exists, write_json_file,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};
use zip::ZipArchive;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginRegistry {
    #[serde(default)]
    pub plugins: Vec<InstalledPlugin>,
}

impl PluginRegistry {
    /// Inserts or replaces the plugin named `manifest.name`, keeping its enabled flag.
    pub fn upsert(&mut self, manifest: &PluginManifest, folder: &str) {
        if let Some(existing) = self.plugins.iter_mut().find(|p| p.name == manifest.name) {
            existing.version = manifest.version;
            existing.folder = folder.to_string();
            return;
        }
        self.plugins.push(InstalledPlugin {
            name: manifest.name.clone(),
            version: manifest.version,
            enabled: false,
            folder: folder.to_string(),
        });
    }
}

/// What the last deploy did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployRecord {
    pub deployed_at: DateTime<Utc>,
    pub clean: bool,
    pub quick: bool,
    pub enabled_plugins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LocalPluginManager {
    root: PathBuf,
    hooks: HookRunner,
}

impl LocalPluginManager {
    #[must_use]
    pub fn new(root: &Path, hooks: HooksConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            hooks: HookRunner::new(hooks, root),
        }
    }

    #[must_use]
    pub fn registry_path(&self) -> PathBuf {
        self.root.join(DATA_DIR).join(PLUGIN_REGISTRY_FILE)
    }

    #[must_use]
    pub fn deploy_record_path(&self) -> PathBuf {
        self.root.join(DATA_DIR).join(STATE_DIR).join("deploy.json")
    }

    /// Reads the registry. A missing file is an empty registry.
    pub fn load_registry(&self) -> Result<PluginRegistry> {
        let path = self.registry_path();
        if !path.exists() {
            return Ok(PluginRegistry::default());
        }
        read_json_file(&path)
    }

    pub fn save_registry(&self, registry: &PluginRegistry) -> Result<()> {
        write_json_file(&self.registry_path(), registry)
    }

    pub fn last_deploy(&self) -> Result<Option<DeployRecord>> {
        let path = self.deploy_record_path();
        if !path.exists() {
            return Ok(None);
        }
        read_json_file(&path).map(Some)
    }

    fn install_blocking(&self, zip_path: &Path, inner_name: &str, force: bool) -> Result<bool> {
        let data_dir = self.root.join(DATA_DIR);
        ensure_dir(&data_dir)?;
        let inner = data_dir.join(inner_name);

        std::fs::copy(zip_path, &inner).with_context(|| {
            format!("Failed to copy {} to {}", zip_path.display(), inner.display())
        })?;

        let result = self.install_from(&inner, force);
        remove_file_if_exists(&inner)?;
        result
    }

    fn install_from(&self, archive: &Path, force: bool) -> Result<bool> {
        if let Err(e) = ArchiveVerifier::open_and_validate(archive) {
            warn!("Rejected plugin archive: {}", e);
            return Ok(false);
        }

        let Some((folder, manifest)) = read_plugin_manifest(archive)? else {
            return Ok(false);
        };

        let plugins_dir = self.root.join(PLUGINS_DIR);
        let target = plugins_dir.join(&folder);
        if target.exists() {
            if !force {
                warn!("Plugin folder {} already exists", target.display());
                return Ok(false);
            }
            remove_dir_all(&target)?;
        }

        ArchiveVerifier::extract_all(archive, &plugins_dir)?;

        let mut registry = self.load_registry()?;
        registry.upsert(&manifest, &folder);
        self.save_registry(&registry)?;

        info!("Installed plugin {} {}", manifest.name, manifest.version);
        Ok(true)
    }
}

/// Finds the single top-level folder of a plugin archive and parses its manifest.
fn read_plugin_manifest(archive: &Path) -> Result<Option<(String, PluginManifest)>> {
    let file = File::open(archive)?;
    let mut zip = ZipArchive::new(file)?;

    let mut folders = BTreeSet::new();
    for index in 0..zip.len() {
        let entry = zip.by_index(index)?;
        let first = entry.enclosed_name().and_then(|path| match path.components().next() {
            Some(Component::Normal(first)) => Some(first.to_string_lossy().into_owned()),
            _ => None,
        });
        match first {
            Some(first) => {
                folders.insert(first);
            }
            None => {
                warn!("Plugin archive entry {} is not inside a plugin folder", entry.name());
                return Ok(None);
            }
        }
    }

    if folders.len() != 1 {
        warn!("Plugin archive must contain exactly one top-level folder, found {}", folders.len());
        return Ok(None);
    }
    let Some(folder) = folders.into_iter().next() else {
        return Ok(None);
    };

    let manifest_name = format!("{folder}/{PLUGIN_MANIFEST_FILE}");
    let mut content = String::new();
    match zip.by_name(&manifest_name) {
        Ok(mut entry) => {
            entry.read_to_string(&mut content)?;
        }
        Err(_) => {
            warn!("Plugin archive has no {}", manifest_name);
            return Ok(None);
        }
    }

    match toml::from_str::<PluginManifest>(&content) {
        Ok(manifest) => Ok(Some((folder, manifest))),
        Err(e) => {
            warn!("Invalid {}: {}", manifest_name, e);
            Ok(None)
        }
    }
}

impl PluginManager for LocalPluginManager {
    async fn installed_plugins(&self) -> Result<Vec<InstalledPlugin>> {
        Ok(self.load_registry()?.plugins)
    }

    async fn enabled_plugins(&self) -> Result<Vec<String>> {
        Ok(self
            .load_registry()?
            .plugins
            .into_iter()
            .filter(|p| p.enabled)
            .map(|p| p.name)
            .collect())
    }

    async fn install(&self, zip_path: &Path, inner_name: &str, force: bool) -> Result<bool> {
        let this = self.clone();
        let zip_path = zip_path.to_path_buf();
        let inner_name = inner_name.to_string();

        tokio::task::spawn_blocking(move || this.install_blocking(&zip_path, &inner_name, force))
            .await
            .context("Plugin install task panicked")?
    }

    async fn init_plugin(&self, name: &str) -> Result<()> {
        self.hooks.init_plugin(name).await?;
        Ok(())
    }

    async fn run_migrations(&self) -> Result<()> {
        self.hooks.migrate().await?;
        Ok(())
    }

    async fn deploy(&self, clean: bool, quick: bool) -> Result<()> {
        let dynamic = self.root.join(DYNAMIC_DIR);
        if clean {
            debug!("Cleaning {}", dynamic.display());
            remove_dir_all(&dynamic)?;
        }
        ensure_dir(&dynamic)?;

        let enabled_plugins = self.enabled_plugins().await?;
        if !quick {
            // Full deploys publish every enabled plugin into the generated tree.
            let registry = self.load_registry()?;
            for plugin in registry.plugins.iter().filter(|p| p.enabled) {
                let source = self.root.join(PLUGINS_DIR).join(&plugin.folder);
                if source.is_dir() {
                    copy_dir(&source, &dynamic.join(&plugin.folder))?;
                }
            }
        }

        let record = DeployRecord {
            deployed_at: Utc::now(),
            clean,
            quick,
            enabled_plugins,
        };
        write_json_file(&self.deploy_record_path(), &record)?;

        info!("Deployed ({})", if quick { "quick" } else { "full" });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::write_zip;
    use tempfile::TempDir;

    fn manager(root: &Path) -> LocalPluginManager {
        LocalPluginManager::new(root, HooksConfig::default())
    }

    fn registry_with(plugins: Vec<InstalledPlugin>) -> PluginRegistry {
        PluginRegistry {
            plugins,
        }
    }

    fn invoicing(version: f64, enabled: bool) -> InstalledPlugin {
        InstalledPlugin {
            name: "Invoicing".to_string(),
            version,
            enabled,
            folder: "Invoicing".to_string(),
        }
    }

    #[tokio::test]
    async fn test_missing_registry_is_empty() {
        let temp = TempDir::new().unwrap();
        let plugins = manager(temp.path());

        assert!(plugins.installed_plugins().await.unwrap().is_empty());
        assert!(plugins.enabled_plugins().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_enabled_plugins() {
        let temp = TempDir::new().unwrap();
        let plugins = manager(temp.path());
        let mut other = invoicing(1.0, false);
        other.name = "Crm".to_string();
        plugins.save_registry(&registry_with(vec![invoicing(1.2, true), other])).unwrap();

        assert_eq!(plugins.installed_plugins().await.unwrap().len(), 2);
        assert_eq!(plugins.enabled_plugins().await.unwrap(), vec!["Invoicing".to_string()]);
    }

    #[tokio::test]
    async fn test_install_replaces_folder_and_keeps_enabled_flag() {
        let temp = TempDir::new().unwrap();
        let plugins = manager(temp.path());
        plugins.save_registry(&registry_with(vec![invoicing(1.2, true)])).unwrap();
        std::fs::create_dir_all(temp.path().join("Plugins/Invoicing")).unwrap();
        std::fs::write(temp.path().join("Plugins/Invoicing/old.php"), "old").unwrap();

        let zip = temp.path().join("update-42.zip");
        write_zip(
            &zip,
            &[
                ("Invoicing/plugin.toml", "name = \"Invoicing\"\nversion = 1.5\n"),
                ("Invoicing/Init.php", "<?php"),
            ],
        );

        assert!(plugins.install(&zip, "plugin.zip", true).await.unwrap());

        assert!(temp.path().join("Plugins/Invoicing/Init.php").exists());
        assert!(!temp.path().join("Plugins/Invoicing/old.php").exists());
        assert!(!temp.path().join("MyFiles/plugin.zip").exists());
        assert!(zip.exists(), "the caller owns the staged file");

        let installed = plugins.installed_plugins().await.unwrap();
        assert_eq!(installed, vec![invoicing(1.5, true)]);
    }

    #[tokio::test]
    async fn test_install_without_force_keeps_existing_folder() {
        let temp = TempDir::new().unwrap();
        let plugins = manager(temp.path());
        std::fs::create_dir_all(temp.path().join("Plugins/Invoicing")).unwrap();

        let zip = temp.path().join("update-42.zip");
        write_zip(&zip, &[("Invoicing/plugin.toml", "name = \"Invoicing\"\nversion = 1.5\n")]);

        assert!(!plugins.install(&zip, "plugin.zip", false).await.unwrap());
    }

    #[tokio::test]
    async fn test_install_rejects_archive_without_manifest() {
        let temp = TempDir::new().unwrap();
        let plugins = manager(temp.path());

        let zip = temp.path().join("update-42.zip");
        write_zip(&zip, &[("Invoicing/Init.php", "<?php")]);
        assert!(!plugins.install(&zip, "plugin.zip", true).await.unwrap());

        write_zip(&zip, &[("A/plugin.toml", "name = \"A\"\nversion = 1.0\n"), ("B/x", "")]);
        assert!(!plugins.install(&zip, "plugin.zip", true).await.unwrap());

        assert!(!temp.path().join("Plugins").join("A").exists());
        assert!(plugins.installed_plugins().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_install_rejects_entries_outside_a_plugin_folder() {
        let temp = TempDir::new().unwrap();
        let plugins = manager(temp.path());
        std::fs::create_dir_all(temp.path().join("Plugins/Crm")).unwrap();
        std::fs::write(temp.path().join("Plugins/Crm/Init.php"), "<?php").unwrap();

        let zip = temp.path().join("update-42.zip");
        write_zip(
            &zip,
            &[("./plugin.toml", "name = \"Invoicing\"\nversion = 1.5\n"), ("./Init.php", "<?php")],
        );
        assert!(!plugins.install(&zip, "plugin.zip", true).await.unwrap());

        write_zip(&zip, &[("plugin.toml", "name = \"Invoicing\"\nversion = 1.5\n")]);
        assert!(!plugins.install(&zip, "plugin.zip", true).await.unwrap());

        assert!(temp.path().join("Plugins/Crm/Init.php").exists());
        assert!(plugins.installed_plugins().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_install_rejects_non_zip() {
        let temp = TempDir::new().unwrap();
        let plugins = manager(temp.path());

        let zip = temp.path().join("update-42.zip");
        std::fs::write(&zip, "not a zip").unwrap();

        assert!(!plugins.install(&zip, "plugin.zip", true).await.unwrap());
    }

    #[tokio::test]
    async fn test_deploy_clean_and_record() {
        let temp = TempDir::new().unwrap();
        let plugins = manager(temp.path());
        plugins.save_registry(&registry_with(vec![invoicing(1.2, true)])).unwrap();
        std::fs::create_dir_all(temp.path().join("Plugins/Invoicing")).unwrap();
        std::fs::write(temp.path().join("Plugins/Invoicing/Init.php"), "<?php").unwrap();
        std::fs::create_dir_all(temp.path().join("Dinamic/Stale")).unwrap();

        plugins.deploy(true, true).await.unwrap();
        assert!(!temp.path().join("Dinamic/Stale").exists());
        assert!(!temp.path().join("Dinamic/Invoicing").exists());
        let record = plugins.last_deploy().unwrap().unwrap();
        assert!(record.quick);
        assert!(record.clean);

        plugins.deploy(true, false).await.unwrap();
        assert!(temp.path().join("Dinamic/Invoicing/Init.php").exists());
        let record = plugins.last_deploy().unwrap().unwrap();
        assert!(!record.quick);
        assert_eq!(record.enabled_plugins, vec!["Invoicing".to_string()]);
    }
}
