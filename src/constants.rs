//! Global constants used throughout the updater.
//!
//! This module contains the fixed names of the installation layout, the
//! release archive layout, timeouts and retry parameters. Defining them
//! centrally keeps the on-disk contract in one place.

use std::time::Duration;

/// Project id the release feed uses for the core application.
pub const CORE_PROJECT_ID: u32 = 1;

/// Default top-level folder inside a core release archive.
pub const DEFAULT_CORE_BUNDLE_FOLDER: &str = "facturascripts";

/// Default release feed endpoint. Download URLs are `<feed>/<project>/<version>`.
pub const DEFAULT_FEED_URL: &str = "https://facturascripts.com/DownloadBuild";

/// Default telemetry endpoint used for registration and URL signing.
pub const DEFAULT_TELEMETRY_URL: &str = "https://facturascripts.com/Telemetry";

/// Directories replaced wholesale by a core update, in replacement order.
pub const MANAGED_CORE_DIRS: [&str; 3] = ["Core", "node_modules", "vendor"];

/// Entry point of the installation. The live copy is never overwritten.
pub const ENTRY_POINT_FILE: &str = "index.php";

/// Conventional name the plugin manager gives a handed-off plugin archive.
pub const PLUGIN_INNER_ARCHIVE: &str = "plugin.zip";

/// Manifest every plugin archive carries inside its top-level folder.
pub const PLUGIN_MANIFEST_FILE: &str = "plugin.toml";

/// Installation subfolders.
pub const PLUGINS_DIR: &str = "Plugins";
pub const DATA_DIR: &str = "MyFiles";
pub const DYNAMIC_DIR: &str = "Dinamic";

/// Updater state lives under `<root>/MyFiles/.updater`.
pub const STATE_DIR: &str = ".updater";

/// Installed plugin registry under `MyFiles/`.
pub const PLUGIN_REGISTRY_FILE: &str = "plugins.json";

/// Installation registration state under `MyFiles/`.
pub const TELEMETRY_FILE: &str = "telemetry.json";

/// Running core version, shipped inside `Core/` by every core release.
pub const CORE_VERSION_FILE: &str = "VERSION";

/// Suffix of a managed directory moved aside during a core swap.
pub const SWAP_BACKUP_SUFFIX: &str = ".update-backup";

/// Well-known cache key for the listed update items.
pub const UPDATE_ITEMS_CACHE_KEY: &str = "UPDATE_ITEMS";

/// Delay before the scheduled post-update step runs.
pub const REDIRECT_DELAY: Duration = Duration::from_secs(3);

pub fn default_lock_timeout() -> Duration {
    Duration::from_secs(120)
}

pub const MAX_BACKOFF_DELAY_MS: u64 = 500;

pub const STARTING_BACKOFF_DELAY_MS: u64 = 10;

/// Staging archive name for a target id.
pub fn staging_file_name(id: u32) -> String {
    format!("update-{id}.zip")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_file_name() {
        assert_eq!(staging_file_name(1), "update-1.zip");
        assert_eq!(staging_file_name(4231), "update-4231.zip");
    }

    #[test]
    fn test_managed_dirs_order() {
        assert_eq!(MANAGED_CORE_DIRS[0], "Core");
        assert_eq!(MANAGED_CORE_DIRS.len(), 3);
    }
}
