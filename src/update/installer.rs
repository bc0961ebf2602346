//! Installing a staged release archive.
//!
//! An install walks `Staged → Opened → Validated → Extracted → Replaced →
//! Deployed`. Opening and validating never touch the installation, so a
//! corrupt archive leaves everything as it was, including the staged file.
//!
//! Core archives contain a single bundle folder holding `Core/`,
//! `node_modules/`, `vendor/` and `index.php`. The bundle is extracted into
//! the installation root, the staged archive is deleted, and each managed
//! directory is replaced by its bundled copy. The live `index.php` is never
//! overwritten: it is copied into the bundle instead, and the bundle is
//! deleted afterwards.
//!
//! Plugin archives are handed to the [`PluginManager`]; the staged file is
//! deleted after the handoff whatever its outcome.

use crate::constants::{ENTRY_POINT_FILE, MANAGED_CORE_DIRS, PLUGIN_INNER_ARCHIVE};
use crate::core::UpdaterError;
use crate::plugins::PluginManager;
use crate::update::backup::DirectoryBackup;
use crate::update::item::UpdateItem;
use crate::update::verification::{ArchiveVerifier, ValidatedArchive};
use crate::utils::fs::{copy_dir, remove_dir_all, remove_file_if_exists};
use crate::utils::progress::ProgressBar;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallState {
    Staged,
    Opened,
    Validated,
    Extracted,
    Replaced,
    Deployed,
    OpenFailed,
    ValidateFailed,
    ExtractFailed,
    CopyFailed,
}

impl InstallState {
    /// The failure exit an error ends an install in, if it is one.
    #[must_use]
    pub const fn failed_with(error: &UpdaterError) -> Option<Self> {
        match error {
            UpdaterError::ArchiveOpenFailed {
                ..
            } => Some(Self::OpenFailed),
            UpdaterError::ArchiveValidationFailed {
                ..
            } => Some(Self::ValidateFailed),
            UpdaterError::ExtractFailed {
                ..
            } => Some(Self::ExtractFailed),
            UpdaterError::CopyFailed {
                ..
            }
            | UpdaterError::PluginInstallFailed {
                ..
            } => Some(Self::CopyFailed),
            _ => None,
        }
    }
}

/// Managed directories a core swap replaced, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SwapReport {
    pub replaced: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub id: u32,
    pub states: Vec<InstallState>,
    pub checksum: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap: Option<SwapReport>,
}

impl InstallReport {
    #[must_use]
    pub fn state(&self) -> InstallState {
        self.states.last().copied().unwrap_or(InstallState::Staged)
    }
}

pub struct ArchiveInstaller<'a, P: PluginManager> {
    root: PathBuf,
    bundle_folder: String,
    rollback: bool,
    plugins: &'a P,
}

impl<'a, P: PluginManager> ArchiveInstaller<'a, P> {
    #[must_use]
    pub fn new(root: &Path, bundle_folder: &str, rollback: bool, plugins: &'a P) -> Self {
        Self {
            root: root.to_path_buf(),
            bundle_folder: bundle_folder.to_string(),
            rollback,
            plugins,
        }
    }

    /// Opens the staged archive of `item` and checks every entry.
    pub async fn validate(&self, item: &UpdateItem) -> Result<ValidatedArchive, UpdaterError> {
        let staged = item.staging_path(&self.root);
        run_blocking(move || ArchiveVerifier::open_and_validate(&staged)).await
    }

    /// Installs a validated archive and quick-deploys.
    pub async fn apply(
        &self,
        item: &UpdateItem,
        archive: ValidatedArchive,
    ) -> Result<InstallReport, UpdaterError> {
        let mut report = InstallReport {
            id: item.id,
            states: vec![InstallState::Staged, InstallState::Opened, InstallState::Validated],
            checksum: archive.checksum.clone(),
            swap: None,
        };

        if item.is_core() {
            let root = self.root.clone();
            let bundle = self.root.join(&self.bundle_folder);
            let rollback = self.rollback;
            let staged = archive.path;

            let spinner = ProgressBar::new_spinner();
            spinner.set_message(format!("Installing {}", item.description));
            let swap = run_blocking(move || {
                extract_core(&staged, &root)?;
                swap_core(&root, &bundle, rollback, copy_dir)
            })
            .await;
            spinner.finish_and_clear();

            report.states.push(InstallState::Extracted);
            report.swap = Some(swap?);
        } else {
            self.install_plugin(item, &archive.path).await?;
        }
        report.states.push(InstallState::Replaced);

        self.plugins.deploy(true, true).await.map_err(UpdaterError::from_anyhow)?;
        report.states.push(InstallState::Deployed);

        info!("Installed {} ({})", item.description, report.checksum);
        Ok(report)
    }

    async fn install_plugin(&self, item: &UpdateItem, staged: &Path) -> Result<(), UpdaterError> {
        let installed = self.plugins.install(staged, PLUGIN_INNER_ARCHIVE, true).await;

        if let Err(e) = remove_file_if_exists(staged) {
            warn!("Failed to remove {}: {:#}", staged.display(), e);
        }

        match installed {
            Ok(true) => Ok(()),
            Ok(false) => Err(UpdaterError::PluginInstallFailed {
                name: item.name.clone(),
            }),
            Err(e) => {
                error!("Plugin manager failed for {}: {:#}", item.name, e);
                Err(UpdaterError::PluginInstallFailed {
                    name: item.name.clone(),
                })
            }
        }
    }
}

async fn run_blocking<T, F>(work: F) -> Result<T, UpdaterError>
where
    F: FnOnce() -> Result<T, UpdaterError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| UpdaterError::Other {
        message: format!("install task panicked: {e}"),
    })?
}

/// Extracts the core archive into `root` and deletes it.
fn extract_core(staged: &Path, root: &Path) -> Result<(), UpdaterError> {
    ArchiveVerifier::extract_all(staged, root)?;

    remove_file_if_exists(staged).map_err(|e| UpdaterError::ExtractFailed {
        path: staged.display().to_string(),
        reason: format!("{e:#}"),
    })?;
    debug!("Removed {}", staged.display());
    Ok(())
}

/// Replaces every managed directory of `root` with its copy in `bundle`.
///
/// Nothing is touched unless the bundle has all managed directories. With
/// `rollback`, replaced directories are moved aside first and put back if a
/// later copy fails; without it they are deleted and a failed copy leaves
/// the directories before it replaced and the failed one partially copied.
fn swap_core<C>(
    root: &Path,
    bundle: &Path,
    rollback: bool,
    copy: C,
) -> Result<SwapReport, UpdaterError>
where
    C: Fn(&Path, &Path) -> anyhow::Result<()>,
{
    let missing = MANAGED_CORE_DIRS.iter().map(|dir| bundle.join(dir)).find(|p| !p.is_dir());
    if let Some(missing) = missing {
        if let Err(e) = remove_dir_all(bundle) {
            warn!("Failed to remove {}: {:#}", bundle.display(), e);
        }
        return Err(copy_failed(&missing, "not found in the release archive".to_string()));
    }

    let mut report = SwapReport::default();
    let mut backups: Vec<(DirectoryBackup, bool)> = Vec::new();

    for dir in MANAGED_CORE_DIRS {
        let source = bundle.join(dir);
        let destination = root.join(dir);

        let prepared = if rollback {
            let backup = DirectoryBackup::new(&destination);
            backup.move_aside().map(|existed| backups.push((backup, existed)))
        } else {
            remove_dir_all(&destination)
        };

        if let Err(e) = prepared.and_then(|()| copy(&source, &destination)) {
            let mut reason = format!("{e:#}");
            if rollback {
                let restored = restore_all(&backups);
                reason = format!("{reason} (restored: {})", restored.join(", "));
            }
            return Err(copy_failed(&destination, reason));
        }

        debug!("Replaced {}", destination.display());
        report.replaced.push(dir.to_string());
    }

    for (backup, _) in &backups {
        if let Err(e) = backup.cleanup() {
            warn!("Failed to remove {}: {:#}", backup.backup_path().display(), e);
        }
    }

    let live_entry = root.join(ENTRY_POINT_FILE);
    if live_entry.exists() {
        std::fs::copy(&live_entry, bundle.join(ENTRY_POINT_FILE))
            .map_err(|e| copy_failed(&bundle.join(ENTRY_POINT_FILE), e.to_string()))?;
    }

    remove_dir_all(bundle).map_err(|e| copy_failed(bundle, format!("{e:#}")))?;

    info!("Core directories replaced: {}", report.replaced.join(", "));
    Ok(report)
}

/// Puts every moved-aside directory back, newest first.
fn restore_all(backups: &[(DirectoryBackup, bool)]) -> Vec<String> {
    let mut restored = Vec::new();

    for (backup, existed) in backups.iter().rev() {
        let original = backup.original_path();
        let result = if *existed {
            backup.restore()
        } else {
            remove_dir_all(original)
        };

        match result {
            Ok(()) => restored.push(original.display().to_string()),
            Err(e) => error!("Failed to restore {}: {:#}", original.display(), e),
        }
    }

    restored
}

fn copy_failed(path: &Path, reason: String) -> UpdaterError {
    UpdaterError::CopyFailed {
        path: path.display().to_string(),
        reason,
    }
}
