//! Release updater for an ERP installation
//!
//! Keeps an installation's core application and its plugins up to date from
//! a remote release feed. The workflow lists applicable updates, downloads a
//! release archive to a staging file, validates it and either swaps the core
//! directories or hands the archive to the plugin manager, then runs a
//! post-update step (migrations or a plugin's init hook) and redeploys.
//!
//! # Core Modules
//!
//! - [`update`] - the update workflow: listing, fetching, installing, post-update
//! - [`plugins`] - the plugin manager contract and its local implementation
//! - [`telemetry`] - installation registration and download URL signing
//! - [`config`] - the updater config file
//! - [`core`] - error taxonomy and the operator message log
//! - [`cli`] - the `updater` command line
//! - [`utils`] - file system, platform and progress helpers
//!
//! # Installation Layout
//!
//! ```text
//! <root>/
//! ├── Core/            replaced by core updates (Core/VERSION is the running version)
//! ├── node_modules/    replaced by core updates
//! ├── vendor/          replaced by core updates
//! ├── index.php        never overwritten
//! ├── Plugins/         one folder per installed plugin
//! ├── Dinamic/         generated by deploys
//! ├── MyFiles/
//! │   ├── plugins.json     installed plugin registry
//! │   ├── telemetry.json   installation registration
//! │   └── .updater/        cache, locks and the pending post-update step
//! └── update-<id>.zip  staged release archives
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use updater_cli::config::UpdaterConfig;
//! use updater_cli::update::{Action, Updater};
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let updater = Updater::for_installation(Path::new("/srv/erp"), UpdaterConfig::default())?;
//! let outcome = updater.run(Action::List).await;
//! for item in &outcome.items {
//!     println!("{} {}", item.name, item.version);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod plugins;
pub mod telemetry;
pub mod update;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
