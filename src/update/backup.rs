//! Move-aside backups of managed directories during a core swap.
//!
//! Instead of deleting a managed directory before copying its replacement,
//! the swap moves it next to itself as `<dir>.update-backup`. If a later
//! copy fails the backup is moved back; after a successful swap it is
//! removed.

use crate::constants::SWAP_BACKUP_SUFFIX;
use crate::utils::fs::{move_dir, remove_dir_all};
use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct DirectoryBackup {
    original_path: PathBuf,
    backup_path: PathBuf,
}

impl DirectoryBackup {
    #[must_use]
    pub fn new(directory: &Path) -> Self {
        let mut backup_path = directory.to_path_buf();
        backup_path.set_file_name(format!(
            "{}{SWAP_BACKUP_SUFFIX}",
            directory.file_name().unwrap_or_default().to_string_lossy()
        ));

        Self {
            original_path: directory.to_path_buf(),
            backup_path,
        }
    }

    /// Moves the directory aside. A missing directory leaves nothing to back up.
    pub fn move_aside(&self) -> Result<bool> {
        if !self.original_path.exists() {
            debug!("{} does not exist, nothing to back up", self.original_path.display());
            return Ok(false);
        }

        // A leftover from an interrupted swap is older than the live tree.
        remove_dir_all(&self.backup_path).context("Failed to remove old backup")?;

        move_dir(&self.original_path, &self.backup_path).with_context(|| {
            format!("Failed to move {} aside", self.original_path.display())
        })?;
        debug!("Moved {} aside", self.original_path.display());
        Ok(true)
    }

    /// Puts the backup back in place, discarding whatever is there now.
    pub fn restore(&self) -> Result<()> {
        if !self.backup_path.exists() {
            bail!("No backup found at {}", self.backup_path.display());
        }

        warn!("Restoring {} from backup", self.original_path.display());
        remove_dir_all(&self.original_path)?;
        move_dir(&self.backup_path, &self.original_path)
            .context("Failed to restore directory backup")?;

        info!("Restored {}", self.original_path.display());
        Ok(())
    }

    pub fn cleanup(&self) -> Result<()> {
        if self.backup_path.exists() {
            debug!("Cleaning up backup at {}", self.backup_path.display());
            remove_dir_all(&self.backup_path)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn backup_exists(&self) -> bool {
        self.backup_path.exists()
    }

    #[must_use]
    pub fn original_path(&self) -> &Path {
        &self.original_path
    }

    #[must_use]
    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_backup_path() {
        let backup = DirectoryBackup::new(Path::new("/srv/erp/vendor"));
        assert_eq!(backup.backup_path(), Path::new("/srv/erp/vendor.update-backup"));
    }

    #[test]
    fn test_move_aside_and_restore() {
        let temp = TempDir::new().unwrap();
        let core = temp.path().join("Core");
        fs::create_dir_all(&core).unwrap();
        fs::write(core.join("old.php"), "old").unwrap();

        let backup = DirectoryBackup::new(&core);
        assert!(backup.move_aside().unwrap());
        assert!(!core.exists());
        assert!(backup.backup_exists());

        fs::create_dir_all(&core).unwrap();
        fs::write(core.join("half.php"), "half").unwrap();

        backup.restore().unwrap();
        assert_eq!(fs::read_to_string(core.join("old.php")).unwrap(), "old");
        assert!(!core.join("half.php").exists());
        assert!(!backup.backup_exists());
    }

    #[test]
    fn test_missing_directory() {
        let temp = TempDir::new().unwrap();
        let backup = DirectoryBackup::new(&temp.path().join("node_modules"));

        assert!(!backup.move_aside().unwrap());
        assert!(backup.restore().is_err());
        backup.cleanup().unwrap();
    }

    #[test]
    fn test_cleanup() {
        let temp = TempDir::new().unwrap();
        let vendor = temp.path().join("vendor");
        fs::create_dir_all(&vendor).unwrap();

        let backup = DirectoryBackup::new(&vendor);
        backup.move_aside().unwrap();
        backup.cleanup().unwrap();

        assert!(!backup.backup_exists());
    }
}
