//! Cached update list.
//!
//! The last computed update list is stored under the well-known key
//! `UPDATE_ITEMS` so `status` can show it without touching the network and
//! `update` can find the target's name without re-fetching the feed.
//!
//! Every entry records a fingerprint of what was installed when it was
//! computed (core version plus every plugin name and version). A read with a
//! different fingerprint is a miss, so a list computed before an update is
//! never served after it. Downloads and installs also clear the entry outright.

use crate::constants::UPDATE_ITEMS_CACHE_KEY;
use crate::plugins::InstalledPlugin;
use crate::update::item::UpdateItem;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedUpdates {
    pub key: String,
    pub fingerprint: String,
    pub stored_at: DateTime<Utc>,
    pub items: Vec<UpdateItem>,
}

impl CachedUpdates {
    #[must_use]
    pub fn is_valid(&self, ttl_seconds: u64) -> bool {
        let age = Utc::now() - self.stored_at;
        age.num_seconds() < ttl_seconds as i64
    }
}

pub struct UpdateCache {
    path: PathBuf,
    ttl_seconds: u64,
}

impl UpdateCache {
    #[must_use]
    pub fn new(state_dir: &Path, ttl_seconds: u64) -> Self {
        Self {
            path: state_dir.join("cache").join(format!("{UPDATE_ITEMS_CACHE_KEY}.json")),
            ttl_seconds,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fingerprint of the installed versions an update list was computed for.
    #[must_use]
    pub fn fingerprint(core_version: f64, plugins: &[InstalledPlugin]) -> String {
        let mut pairs: Vec<String> =
            plugins.iter().map(|p| format!("{}={}", p.name, p.version)).collect();
        pairs.sort();

        let mut hasher = Sha256::new();
        hasher.update(format!("core={core_version}").as_bytes());
        for pair in pairs {
            hasher.update(b"\n");
            hasher.update(pair.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Returns the cached items when present, fresh and computed for `fingerprint`.
    pub async fn get(&self, fingerprint: &str) -> Option<Vec<UpdateItem>> {
        let cached = self.peek().await?;

        if cached.fingerprint != fingerprint {
            debug!("Update cache fingerprint changed, ignoring cached list");
            return None;
        }

        if !cached.is_valid(self.ttl_seconds) {
            debug!("Update cache expired");
            return None;
        }

        Some(cached.items)
    }

    /// Returns whatever is cached, regardless of fingerprint or age.
    pub async fn peek(&self) -> Option<CachedUpdates> {
        let content = fs::read_to_string(&self.path).await.ok()?;
        match serde_json::from_str(&content) {
            Ok(cached) => Some(cached),
            Err(e) => {
                debug!("Ignoring unreadable update cache: {}", e);
                None
            }
        }
    }

    /// Overwrites the single cache entry. Last writer wins.
    pub async fn set(&self, fingerprint: &str, items: &[UpdateItem]) -> Result<()> {
        let cached = CachedUpdates {
            key: UPDATE_ITEMS_CACHE_KEY.to_string(),
            fingerprint: fingerprint.to_string(),
            stored_at: Utc::now(),
            items: items.to_vec(),
        };
        let content =
            serde_json::to_string_pretty(&cached).context("Failed to serialize update cache")?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.context("Failed to create cache directory")?;
        }

        fs::write(&self.path, content).await.context("Failed to write update cache")?;

        debug!("Cached {} update item(s)", items.len());
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).await.context("Failed to remove update cache")?;
            debug!("Cleared update cache");
        }
        Ok(())
    }
}
