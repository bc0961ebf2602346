//! The installation update workflow.
//!
//! Updates the core application and its plugins from a remote release feed.
//! The core swap moves the replaced directories aside and puts them back
//! when a later step fails.
//!
//! # Architecture Overview
//!
//! - **[`ReleaseLister`]**: fetches the release feed and picks at most one
//!   build per installed target
//! - **[`ArchiveFetcher`]**: downloads a signed URL to `update-<id>.zip`
//! - **[`ArchiveInstaller`]**: validates the staged archive, then swaps the
//!   core directories or hands a plugin archive to the plugin manager
//! - **[`run_post_update`]**: migrations or plugin init, then a full deploy
//! - **[`Updater`]**: runs one [`Action`] at a time under a per-target lock
//!
//! ## Update Process Flow
//!
//! ```text
//! 1. list        feed → one UpdateItem per target → cached as UPDATE_ITEMS
//! 2. download    unlink staged file → sign URL → stream to update-<id>.zip
//! 3. update      open + check every entry
//!                ├── core:   extract → delete zip → swap Core, node_modules, vendor
//!                │           → keep live index.php → delete bundle
//!                └── plugin: hand off to the plugin manager → delete zip
//!                quick deploy → clear cache → schedule post-update (3 s)
//! 4. post-update migrations or plugin init → full deploy → list again
//! ```

/// Move-aside backups used by the core directory swap.
pub mod backup;
/// The cached update list and its installation fingerprint.
pub mod cache;
pub mod fetcher;
pub mod installer;
/// Feed records and update items.
pub mod item;
pub mod lister;
/// Per-target exclusive file locks.
pub mod lock;
/// The persisted post-update step.
pub mod pending;
pub mod post_update;
/// Archive consistency checks and extraction.
pub mod verification;
pub mod workflow;


pub use cache::UpdateCache;
pub use fetcher::ArchiveFetcher;
pub use installer::{ArchiveInstaller, InstallReport, InstallState, SwapReport};
pub use item::{Build, ProjectRelease, UpdateItem};
pub use lister::{InstalledVersions, ReleaseLister, running_core_version, select_update};
pub use pending::PendingPostUpdate;
pub use post_update::run_post_update;
pub use verification::{ArchiveVerifier, ValidatedArchive};
pub use workflow::{Action, ActionOutcome, Redirect, Updater};
