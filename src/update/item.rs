//! Release feed records and the update items built from them.

use crate::constants::{CORE_PROJECT_ID, staging_file_name};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One build of a project as published by the release feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Build {
    pub version: f64,
    #[serde(default)]
    pub stable: bool,
    #[serde(default)]
    pub beta: bool,
}

/// A project entry of the release feed. Builds are in ascending version order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRelease {
    pub project: u32,
    pub name: String,
    #[serde(default)]
    pub builds: Vec<Build>,
}

/// An applicable update for the core or one installed plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateItem {
    /// `CORE_PROJECT_ID` for the core, otherwise the plugin's project id.
    pub id: u32,
    pub name: String,
    pub description: String,
    /// Unsigned download URL; signed right before downloading.
    pub url: String,
    /// Staging file name, `update-<id>.zip`.
    pub filename: String,
    pub stable: bool,
    pub downloaded: bool,
    pub version: f64,
}

impl UpdateItem {
    /// Builds the item for `build` of `project`. `downloaded` reflects whether
    /// the staging file already exists under `root`.
    #[must_use]
    pub fn new(project: &ProjectRelease, build: &Build, feed_url: &str, root: &Path) -> Self {
        let filename = staging_file_name(project.project);
        let description = if project.project == CORE_PROJECT_ID {
            format!("Core update {}", build.version)
        } else {
            format!("Plugin {} update {}", project.name, build.version)
        };

        Self {
            id: project.project,
            name: project.name.clone(),
            description,
            url: format!("{}/{}/{}", feed_url.trim_end_matches('/'), project.project, build.version),
            downloaded: root.join(&filename).exists(),
            filename,
            stable: build.stable,
            version: build.version,
        }
    }

    /// Item for a target known only by id, e.g. when the feed is unreachable
    /// but an archive is already staged.
    #[must_use]
    pub fn for_staged(id: u32, root: &Path) -> Self {
        let filename = staging_file_name(id);
        let (name, description) = if id == CORE_PROJECT_ID {
            ("core".to_string(), "Core update".to_string())
        } else {
            (format!("project-{id}"), format!("Plugin project {id} update"))
        };

        Self {
            id,
            name,
            description,
            url: String::new(),
            downloaded: root.join(&filename).exists(),
            filename,
            stable: false,
            version: 0.0,
        }
    }

    #[must_use]
    pub const fn is_core(&self) -> bool {
        self.id == CORE_PROJECT_ID
    }

    #[must_use]
    pub fn staging_path(&self, root: &Path) -> PathBuf {
        root.join(&self.filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project(id: u32, name: &str) -> ProjectRelease {
        ProjectRelease {
            project: id,
            name: name.to_string(),
            builds: vec![],
        }
    }

    #[test]
    fn test_feed_defaults_flags() {
        let feed: Vec<ProjectRelease> =
            serde_json::from_str(r#"[{"project": 1, "name": "core", "builds": [{"version": 2024.1}]}]"#)
                .unwrap();
        assert_eq!(feed[0].builds[0].version, 2024.1);
        assert!(!feed[0].builds[0].stable);
        assert!(!feed[0].builds[0].beta);
    }

    #[test]
    fn test_core_item() {
        let temp = TempDir::new().unwrap();
        let build = Build {
            version: 2024.1,
            stable: true,
            beta: false,
        };

        let item = UpdateItem::new(&project(1, "core"), &build, "https://feed/DownloadBuild/", temp.path());

        assert!(item.is_core());
        assert_eq!(item.filename, "update-1.zip");
        assert_eq!(item.url, "https://feed/DownloadBuild/1/2024.1");
        assert_eq!(item.description, "Core update 2024.1");
        assert!(!item.downloaded);
    }

    #[test]
    fn test_plugin_item_detects_staged_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("update-42.zip"), b"PK").unwrap();
        let build = Build {
            version: 1.5,
            stable: true,
            beta: false,
        };

        let item = UpdateItem::new(&project(42, "Invoicing"), &build, "https://feed", temp.path());

        assert!(!item.is_core());
        assert!(item.downloaded);
        assert_eq!(item.description, "Plugin Invoicing update 1.5");
        assert_eq!(item.staging_path(temp.path()), temp.path().join("update-42.zip"));
    }
}
