//! Configuration for the updater.
//!
//! See [`global`] for the file format and lookup rules.

mod global;

pub use global::{CONFIG_PATH_ENV, HooksConfig, UpdaterConfig};
