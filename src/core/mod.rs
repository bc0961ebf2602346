//! Core types shared by every part of the updater.
//!
//! - [`error`]: the [`UpdaterError`] taxonomy and CLI error display
//! - [`messages`]: the leveled operator message log

pub mod error;
pub mod messages;

pub use error::{ErrorContext, Severity, UpdaterError, user_friendly_error};
pub use messages::{Message, MessageLevel, MessageLog};
