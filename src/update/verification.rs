//! Release archive verification and extraction.
//!
//! A staged archive must pass a full consistency check before anything on
//! disk is touched: the central directory must parse, every entry must be
//! readable to the end (which verifies its CRC32) and no entry may point
//! outside the extraction root.

use crate::core::UpdaterError;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::ZipArchive;

/// An archive that passed the consistency check. The zip handle is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedArchive {
    pub path: PathBuf,
    pub entries: usize,
    /// `sha256:<hex>` of the whole archive file.
    pub checksum: String,
}

pub struct ArchiveVerifier;

impl ArchiveVerifier {
    /// Opens `path` and reads every entry fully.
    ///
    /// Returns [`UpdaterError::ArchiveOpenFailed`] when the file is not a
    /// readable zip and [`UpdaterError::ArchiveValidationFailed`] when an
    /// entry is corrupt or has an unsafe name.
    pub fn open_and_validate(path: &Path) -> Result<ValidatedArchive, UpdaterError> {
        debug!("Validating archive {}", path.display());

        let file = File::open(path).map_err(|e| open_failed(path, e.to_string()))?;
        let mut archive = ZipArchive::new(file).map_err(|e| open_failed(path, e.to_string()))?;

        for index in 0..archive.len() {
            let mut entry =
                archive.by_index(index).map_err(|e| validation_failed(path, e.to_string()))?;

            if entry.enclosed_name().is_none() {
                return Err(validation_failed(path, format!("unsafe entry name '{}'", entry.name())));
            }

            // Reading to the end is what triggers the CRC comparison.
            io::copy(&mut entry, &mut io::sink())
                .map_err(|e| validation_failed(path, format!("{}: {e}", entry.name())))?;
        }

        let validated = ValidatedArchive {
            path: path.to_path_buf(),
            entries: archive.len(),
            checksum: Self::compute_sha256(path).map_err(|e| open_failed(path, e.to_string()))?,
        };

        info!("Archive {} is consistent ({} entries)", path.display(), validated.entries);
        Ok(validated)
    }

    /// Extracts every entry of `archive` below `destination`.
    pub fn extract_all(archive: &Path, destination: &Path) -> Result<(), UpdaterError> {
        debug!("Extracting {} to {}", archive.display(), destination.display());

        let file = File::open(archive).map_err(|e| extract_failed(archive, e.to_string()))?;
        let mut zip = ZipArchive::new(file).map_err(|e| extract_failed(archive, e.to_string()))?;

        for index in 0..zip.len() {
            let mut entry = zip.by_index(index).map_err(|e| extract_failed(archive, e.to_string()))?;
            let Some(relative) = entry.enclosed_name() else {
                return Err(extract_failed(archive, format!("unsafe entry name '{}'", entry.name())));
            };
            if relative.as_os_str().is_empty() {
                continue;
            }

            let target = destination.join(relative);
            if entry.is_dir() {
                fs::create_dir_all(&target).map_err(|e| extract_failed(&target, e.to_string()))?;
                continue;
            }

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| extract_failed(parent, e.to_string()))?;
            }
            let mut output =
                File::create(&target).map_err(|e| extract_failed(&target, e.to_string()))?;
            io::copy(&mut entry, &mut output).map_err(|e| extract_failed(&target, e.to_string()))?;

            #[cfg(unix)]
            if let Some(mode) = entry.unix_mode() {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&target, fs::Permissions::from_mode(mode))
                    .map_err(|e| extract_failed(&target, e.to_string()))?;
            }
        }

        Ok(())
    }

    /// Streams `path` through SHA-256 and returns `sha256:<hex>`.
    pub fn compute_sha256(path: &Path) -> io::Result<String> {
        let mut file = File::open(path)?;
        let mut hasher = Sha256::new();
        io::copy(&mut file, &mut hasher)?;
        Ok(format!("sha256:{:x}", hasher.finalize()))
    }
}

fn open_failed(path: &Path, reason: String) -> UpdaterError {
    UpdaterError::ArchiveOpenFailed {
        path: path.display().to_string(),
        reason,
    }
}

fn validation_failed(path: &Path, reason: String) -> UpdaterError {
    UpdaterError::ArchiveValidationFailed {
        path: path.display().to_string(),
        reason,
    }
}

fn extract_failed(path: &Path, reason: String) -> UpdaterError {
    UpdaterError::ExtractFailed {
        path: path.display().to_string(),
        reason,
    }
}
