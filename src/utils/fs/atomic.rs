//! Atomic file writes and JSON state files.
//!
//! Updater state (cache entries, pending markers, the plugin registry) is
//! written with a temp-and-rename strategy so an interrupted write never
//! leaves a half-written JSON document behind.

use crate::utils::fs::dirs::ensure_dir;
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let temp_path = path.with_extension("tmp");

    {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

        file.write_all(content)
            .with_context(|| format!("Failed to write to temp file: {}", temp_path.display()))?;

        file.sync_all().with_context(|| "Failed to sync file to disk")?;
    }

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;

    Ok(())
}

pub fn read_json_file<T>(path: &Path) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON from file: {}", path.display()))
}

pub fn write_json_file<T>(path: &Path, data: &T) -> Result<()>
where
    T: serde::Serialize,
{
    let json = serde_json::to_string_pretty(data)?;
    atomic_write(path, json.as_bytes())
        .with_context(|| format!("Failed to write JSON file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct State {
        name: String,
        version: f64,
    }

    #[test]
    fn test_atomic_write_creates_parents() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("a").join("b").join("state.json");

        atomic_write(&path, b"{}").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_json_round_trip() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("state.json");
        let state = State {
            name: "Invoicing".to_string(),
            version: 1.2,
        };

        write_json_file(&path, &state).unwrap();
        let loaded: State = read_json_file(&path).unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_read_json_invalid() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("state.json");
        std::fs::write(&path, "not json").unwrap();

        let result: Result<State> = read_json_file(&path);
        assert!(result.unwrap_err().to_string().contains("Failed to parse JSON"));
    }
}
