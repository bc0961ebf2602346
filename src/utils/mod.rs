//! Cross-platform utilities shared by the updater.

pub mod fs;
pub mod platform;
pub mod progress;

pub use fs::{copy_dir, ensure_dir, remove_dir_all};
pub use platform::{get_shell_command, is_windows, resolve_path};
pub use progress::ProgressBar;
