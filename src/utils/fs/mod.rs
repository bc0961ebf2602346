//! File system utilities used by the update workflow.
//!
//! - [`dirs`]: create, copy, move and remove directory trees
//! - [`atomic`]: temp-and-rename writes and JSON state files
//! - [`writable`]: the writable-folder precondition

pub mod atomic;
pub mod dirs;
pub mod writable;

pub use atomic::{atomic_write, read_json_file, write_json_file};
pub use dirs::{
    copy_dir, ensure_dir, ensure_parent_dir, move_dir, remove_dir_all, remove_file_if_exists,
};
pub use writable::not_writable_folders;
