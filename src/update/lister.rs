//! Release listing.
//!
//! The release feed is a JSON array of projects, each with its builds in
//! ascending version order. For the core and every installed plugin at most
//! one build is offered:
//!
//! - builds at or below the installed version are ignored
//! - the first stable build above it wins and ends the scan
//! - with beta opt-in, the first beta build is held and offered only when no
//!   stable build follows it
//!
//! Listing never fails: when the feed cannot be fetched or parsed the list is
//! simply empty.

use crate::constants::{CORE_PROJECT_ID, CORE_VERSION_FILE};
use crate::core::UpdaterError;
use crate::plugins::InstalledPlugin;
use crate::update::cache::UpdateCache;
use crate::update::item::{Build, ProjectRelease, UpdateItem};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Versions the update list is computed against.
#[derive(Debug, Clone, PartialEq)]
pub struct InstalledVersions {
    pub core: f64,
    pub plugins: Vec<InstalledPlugin>,
}

impl InstalledVersions {
    #[must_use]
    pub fn fingerprint(&self) -> String {
        UpdateCache::fingerprint(self.core, &self.plugins)
    }

    fn installed_version(&self, project: &ProjectRelease) -> Option<f64> {
        if project.project == CORE_PROJECT_ID {
            return Some(self.core);
        }
        self.plugins.iter().find(|p| p.name == project.name).map(|p| p.version)
    }
}

/// Reads `Core/VERSION`, falling back to `configured`, then to `0`.
#[must_use]
pub fn running_core_version(root: &Path, configured: Option<f64>) -> f64 {
    let path = root.join("Core").join(CORE_VERSION_FILE);
    match std::fs::read_to_string(&path) {
        Ok(content) => match content.trim().parse::<f64>() {
            Ok(version) => return version,
            Err(e) => warn!("Ignoring unparseable {}: {}", path.display(), e),
        },
        Err(_) => debug!("No {}, using configured core version", path.display()),
    }
    configured.unwrap_or(0.0)
}

/// Picks the build to offer over `installed`, if any.
#[must_use]
pub fn select_update(builds: &[Build], installed: f64, enable_beta: bool) -> Option<&Build> {
    let mut held_beta = None;

    for build in builds {
        if build.version <= installed {
            continue;
        }

        if build.stable {
            return Some(build);
        }

        if build.beta && enable_beta && held_beta.is_none() {
            held_beta = Some(build);
        }
    }

    held_beta
}

pub struct ReleaseLister {
    client: reqwest::Client,
    feed_url: String,
    root: PathBuf,
    enable_beta: bool,
}

impl ReleaseLister {
    #[must_use]
    pub fn new(client: reqwest::Client, feed_url: &str, root: &Path, enable_beta: bool) -> Self {
        Self {
            client,
            feed_url: feed_url.to_string(),
            root: root.to_path_buf(),
            enable_beta,
        }
    }

    /// Fetches and parses the release feed.
    pub async fn fetch_feed(&self) -> Result<Vec<ProjectRelease>, UpdaterError> {
        let unavailable = |reason: String| UpdaterError::FeedUnavailable {
            url: self.feed_url.clone(),
            reason,
        };

        debug!("Fetching release feed from {}", self.feed_url);
        let response =
            self.client.get(&self.feed_url).send().await.map_err(|e| unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(unavailable(format!("HTTP {}", response.status())));
        }

        let body = response.text().await.map_err(|e| unavailable(e.to_string()))?;
        if body.trim().is_empty() {
            return Err(unavailable("empty response".to_string()));
        }

        serde_json::from_str(&body).map_err(|e| unavailable(format!("invalid JSON: {e}")))
    }

    /// Builds one item per target that has an applicable build.
    #[must_use]
    pub fn build_items(
        &self,
        feed: &[ProjectRelease],
        installed: &InstalledVersions,
    ) -> Vec<UpdateItem> {
        let mut items = Vec::new();

        for project in feed {
            let Some(current) = installed.installed_version(project) else {
                continue;
            };

            if let Some(build) = select_update(&project.builds, current, self.enable_beta) {
                debug!("{} {} -> {}", project.name, current, build.version);
                items.push(UpdateItem::new(project, build, &self.feed_url, &self.root));
            }
        }

        items
    }

    /// Lists applicable updates and overwrites the cached list with the result.
    ///
    /// Nothing is cached when the feed cannot be read.
    pub async fn list_updates(
        &self,
        installed: &InstalledVersions,
        cache: &UpdateCache,
    ) -> Vec<UpdateItem> {
        let items = match self.fetch_feed().await {
            Ok(feed) => self.build_items(&feed, installed),
            Err(e) => {
                warn!("{}", e);
                return Vec::new();
            }
        };

        if let Err(e) = cache.set(&installed.fingerprint(), &items).await {
            warn!("Failed to cache update list: {:#}", e);
        }

        info!("{} update(s) available", items.len());
        items
    }
}
