//! Writability checks run before any update action.
//!
//! An update rewrites large parts of the installation, so every action is
//! refused while any folder near the top of the tree cannot be written.

use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Folders at this depth or shallower are probed with a real write.
const PROBE_DEPTH: usize = 1;

/// Folders deeper than this are not inspected.
const MAX_DEPTH: usize = 2;

/// Lists the folders under `root` (root included) that cannot be written.
///
/// Shallow folders are probed by creating a temporary file; deeper ones only
/// have their permission bits inspected.
#[must_use]
pub fn not_writable_folders(root: &Path) -> Vec<PathBuf> {
    let mut folders = Vec::new();

    for entry in WalkDir::new(root).max_depth(MAX_DEPTH).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                if let Some(path) = err.path() {
                    folders.push(path.to_path_buf());
                }
                continue;
            }
        };

        if !entry.file_type().is_dir() {
            continue;
        }

        if !is_writable(entry.path(), entry.depth() <= PROBE_DEPTH) {
            folders.push(entry.path().to_path_buf());
        }
    }

    folders
}

fn is_writable(dir: &Path, probe: bool) -> bool {
    match fs::metadata(dir) {
        Ok(metadata) if metadata.permissions().readonly() => return false,
        Ok(_) => {}
        Err(_) => return false,
    }

    if !probe {
        return true;
    }

    tempfile::Builder::new().prefix(".updater-probe").tempfile_in(dir).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_writable_tree() {
        let temp = tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("Core/Base")).unwrap();
        std::fs::create_dir_all(temp.path().join("vendor")).unwrap();

        assert!(not_writable_folders(temp.path()).is_empty());

        // Probe files are cleaned up
        let leftovers = std::fs::read_dir(temp.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(".updater-probe"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    #[cfg(unix)]
    fn test_readonly_folder_is_reported() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().unwrap();
        let core = temp.path().join("Core");
        std::fs::create_dir_all(&core).unwrap();
        std::fs::set_permissions(&core, std::fs::Permissions::from_mode(0o555)).unwrap();

        let folders = not_writable_folders(temp.path());

        std::fs::set_permissions(&core, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert_eq!(folders, vec![core]);
    }
}
