//! The scheduled post-update step.
//!
//! After an install or a cancel the workflow schedules a post-update step to
//! run after a short delay. The schedule is persisted so the step survives
//! the process that scheduled it: a later `post-update` invocation picks up
//! the plugin name to initialise from here when none is given.

use crate::utils::fs::{read_json_file, remove_file_if_exists, write_json_file};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const PENDING_FILE: &str = "pending-post-update.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPostUpdate {
    /// Plugin to initialise; `None` runs migrations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<String>,
    pub created_at: DateTime<Utc>,
    pub not_before: DateTime<Utc>,
}

impl PendingPostUpdate {
    #[must_use]
    pub fn new(init: Option<String>, delay: Duration) -> Self {
        let created_at = Utc::now();
        let delay = chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        Self {
            init,
            created_at,
            not_before: created_at + delay,
        }
    }

    /// Time left before the step is due.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        (self.not_before - Utc::now()).to_std().unwrap_or(Duration::ZERO)
    }

    #[must_use]
    pub fn path(state_dir: &Path) -> PathBuf {
        state_dir.join(PENDING_FILE)
    }

    pub fn save(&self, state_dir: &Path) -> Result<()> {
        write_json_file(&Self::path(state_dir), self)?;
        debug!("Scheduled post-update (init: {:?})", self.init);
        Ok(())
    }

    pub fn load(state_dir: &Path) -> Result<Option<Self>> {
        let path = Self::path(state_dir);
        if !path.exists() {
            return Ok(None);
        }
        read_json_file(&path).map(Some)
    }

    /// Removes and returns the scheduled step.
    pub fn take(state_dir: &Path) -> Result<Option<Self>> {
        let pending = Self::load(state_dir)?;
        remove_file_if_exists(&Self::path(state_dir))?;
        Ok(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_load_take() {
        let temp = TempDir::new().unwrap();
        assert!(PendingPostUpdate::load(temp.path()).unwrap().is_none());

        let pending = PendingPostUpdate::new(Some("Invoicing".to_string()), Duration::from_secs(3));
        pending.save(temp.path()).unwrap();

        assert_eq!(PendingPostUpdate::load(temp.path()).unwrap(), Some(pending.clone()));
        assert_eq!(PendingPostUpdate::take(temp.path()).unwrap(), Some(pending));
        assert!(PendingPostUpdate::take(temp.path()).unwrap().is_none());
    }

    #[test]
    fn test_delay() {
        let pending = PendingPostUpdate::new(None, Duration::from_secs(3));
        assert_eq!((pending.not_before - pending.created_at).num_seconds(), 3);
        assert!(pending.remaining() <= Duration::from_secs(3));

        let due = PendingPostUpdate::new(None, Duration::ZERO);
        assert_eq!(due.remaining(), Duration::ZERO);
    }
}
