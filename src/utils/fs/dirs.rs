//! Directory operations for creating, copying, moving and removing trees.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    } else if !path.is_dir() {
        return Err(anyhow::anyhow!("Path exists but is not a directory: {}", path.display()));
    }
    Ok(())
}

pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    Ok(())
}

/// Recursively copies `src` into `dst`, creating `dst` as needed.
///
/// Regular files are copied with their permissions. Symlinks and other
/// special files are skipped.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    ensure_dir(dst)?;

    for entry in
        fs::read_dir(src).with_context(|| format!("Failed to read directory: {}", src.display()))?
    {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if file_type.is_dir() {
            copy_dir(&src_path, &dst_path)?;
        } else if file_type.is_file() {
            fs::copy(&src_path, &dst_path).with_context(|| {
                format!("Failed to copy file from {} to {}", src_path.display(), dst_path.display())
            })?;
        }
    }

    Ok(())
}

/// Removes a directory tree. A missing path is not an error.
pub fn remove_dir_all(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

/// Removes a file. A missing path is not an error.
///
/// Returns whether a file was actually removed.
pub fn remove_file_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to remove file: {}", path.display())),
    }
}

/// Moves a directory, falling back to copy-and-delete across filesystems.
pub fn move_dir(src: &Path, dst: &Path) -> Result<()> {
    if fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    copy_dir(src, dst)
        .with_context(|| format!("Failed to move {} to {}", src.display(), dst.display()))?;
    remove_dir_all(src)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_ensure_dir() {
        let temp = tempdir().unwrap();
        let test_dir = temp.path().join("test_dir");

        assert!(!test_dir.exists());
        ensure_dir(&test_dir).unwrap();
        assert!(test_dir.is_dir());
    }

    #[test]
    fn test_ensure_dir_on_file() {
        let temp = tempdir().unwrap();
        let file_path = temp.path().join("file.txt");
        std::fs::write(&file_path, "content").unwrap();

        assert!(ensure_dir(&file_path).is_err());
    }

    #[test]
    fn test_copy_dir() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");

        ensure_dir(&src.join("subdir")).unwrap();
        std::fs::write(src.join("file1.txt"), "content1").unwrap();
        std::fs::write(src.join("subdir/file2.txt"), "content2").unwrap();

        copy_dir(&src, &dst).unwrap();

        assert_eq!(std::fs::read_to_string(dst.join("file1.txt")).unwrap(), "content1");
        assert_eq!(std::fs::read_to_string(dst.join("subdir/file2.txt")).unwrap(), "content2");
    }

    #[test]
    fn test_copy_dir_missing_source() {
        let temp = tempdir().unwrap();
        let result = copy_dir(&temp.path().join("missing"), &temp.path().join("dst"));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Failed to read directory"));
    }

    #[test]
    fn test_remove_dir_all_nonexistent() {
        let temp = tempdir().unwrap();
        remove_dir_all(&temp.path().join("nonexistent")).unwrap();
    }

    #[test]
    fn test_remove_file_if_exists() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("update-3.zip");
        std::fs::write(&file, b"zip").unwrap();

        assert!(remove_file_if_exists(&file).unwrap());
        assert!(!file.exists());
        assert!(!remove_file_if_exists(&file).unwrap());
    }

    #[test]
    fn test_move_dir() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("Core");
        let dst = temp.path().join("Core.update-backup");
        ensure_dir(&src).unwrap();
        std::fs::write(src.join("a.php"), "<?php").unwrap();

        move_dir(&src, &dst).unwrap();

        assert!(!src.exists());
        assert_eq!(std::fs::read_to_string(dst.join("a.php")).unwrap(), "<?php");
    }
}
