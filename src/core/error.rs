//! Error handling for the updater
//!
//! This module provides the error taxonomy of the update workflow and the
//! user-friendly error reporting used by the CLI. The error system is designed
//! around two core principles:
//! 1. **Strongly-typed errors** so the workflow can decide how loudly to log
//!    each failure and whether the action may be retried
//! 2. **User-friendly messages** with actionable suggestions for operators
//!
//! # Error Categories
//!
//! - **Soft**: [`UpdaterError::FeedUnavailable`] degrades to an empty update list
//! - **Precondition**: [`UpdaterError::FolderNotWritable`] blocks every action
//! - **Recoverable**: [`UpdaterError::DownloadFailed`] can simply be retried
//! - **Fatal for the attempt**: [`UpdaterError::ArchiveOpenFailed`],
//!   [`UpdaterError::ArchiveValidationFailed`], [`UpdaterError::ExtractFailed`],
//!   [`UpdaterError::CopyFailed`] and [`UpdaterError::PluginInstallFailed`]
//!
//! Internal plumbing uses `anyhow::Result` with context; the workflow maps the
//! failure of each step onto one of these variants before logging it.
//!
//! # Examples
//!
//! ```rust,no_run
//! use updater_cli::core::{UpdaterError, ErrorContext};
//!
//! let context = ErrorContext::new(UpdaterError::ConfigError {
//!     message: "install_root is not set".to_string(),
//! })
//! .with_suggestion("Pass --root or set install_root in config.toml");
//!
//! context.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// How loudly a failure is reported to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Expected degradation, nothing for the operator to do.
    Notice,
    /// Something is off but the workflow continues or may be retried.
    Warning,
    /// The action failed and may be retried.
    Error,
    /// The update attempt was aborted; the installation may need inspection.
    Critical,
}

/// Failures of the update workflow.
#[derive(Error, Debug)]
pub enum UpdaterError {
    /// The release feed could not be fetched or parsed.
    #[error("Release feed unavailable at {url}: {reason}")]
    FeedUnavailable {
        url: String,
        reason: String,
    },

    /// One or more installation folders cannot be written.
    #[error("Folders are not writable: {}", folders.join(", "))]
    FolderNotWritable {
        folders: Vec<String>,
    },

    #[error("Download failed for {url}: {reason}")]
    DownloadFailed {
        url: String,
        reason: String,
    },

    #[error("ZIP ERROR: cannot open {path}: {reason}")]
    ArchiveOpenFailed {
        path: String,
        reason: String,
    },

    #[error("ZIP ERROR: consistency check failed for {path}: {reason}")]
    ArchiveValidationFailed {
        path: String,
        reason: String,
    },

    #[error("ZIP EXTRACT ERROR: {path}: {reason}")]
    ExtractFailed {
        path: String,
        reason: String,
    },

    #[error("COPY ERROR: {path}: {reason}")]
    CopyFailed {
        path: String,
        reason: String,
    },

    #[error("Plugin manager could not install '{name}'")]
    PluginInstallFailed {
        name: String,
    },

    #[error("No update item with id {id}")]
    ItemNotFound {
        id: u32,
    },

    #[error("Timed out after {seconds}s waiting for the update lock on {target}")]
    LockTimeout {
        target: String,
        seconds: u64,
    },

    #[error("Configuration error: {message}")]
    ConfigError {
        message: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("{message}")]
    Other {
        message: String,
    },
}

impl UpdaterError {
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::FeedUnavailable {
                ..
            } => Severity::Notice,
            Self::FolderNotWritable {
                ..
            }
            | Self::ItemNotFound {
                ..
            }
            | Self::LockTimeout {
                ..
            } => Severity::Warning,
            Self::ArchiveOpenFailed {
                ..
            }
            | Self::ArchiveValidationFailed {
                ..
            }
            | Self::ExtractFailed {
                ..
            }
            | Self::CopyFailed {
                ..
            } => Severity::Critical,
            _ => Severity::Error,
        }
    }

    /// Converts an anyhow chain into `Other`, keeping an already typed error.
    #[must_use]
    pub fn from_anyhow(error: anyhow::Error) -> Self {
        match error.downcast::<Self>() {
            Ok(typed) => typed,
            Err(error) => Self::Other {
                message: format!("{error:#}"),
            },
        }
    }
}

impl Clone for UpdaterError {
    fn clone(&self) -> Self {
        match self {
            Self::FeedUnavailable {
                url,
                reason,
            } => Self::FeedUnavailable {
                url: url.clone(),
                reason: reason.clone(),
            },
            Self::FolderNotWritable {
                folders,
            } => Self::FolderNotWritable {
                folders: folders.clone(),
            },
            Self::DownloadFailed {
                url,
                reason,
            } => Self::DownloadFailed {
                url: url.clone(),
                reason: reason.clone(),
            },
            Self::ArchiveOpenFailed {
                path,
                reason,
            } => Self::ArchiveOpenFailed {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::ArchiveValidationFailed {
                path,
                reason,
            } => Self::ArchiveValidationFailed {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::ExtractFailed {
                path,
                reason,
            } => Self::ExtractFailed {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::CopyFailed {
                path,
                reason,
            } => Self::CopyFailed {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::PluginInstallFailed {
                name,
            } => Self::PluginInstallFailed {
                name: name.clone(),
            },
            Self::ItemNotFound {
                id,
            } => Self::ItemNotFound {
                id: *id,
            },
            Self::LockTimeout {
                target,
                seconds,
            } => Self::LockTimeout {
                target: target.clone(),
                seconds: *seconds,
            },
            Self::ConfigError {
                message,
            } => Self::ConfigError {
                message: message.clone(),
            },
            // For errors that don't implement Clone, convert to Other
            Self::IoError(e) => Self::Other {
                message: format!("IO error: {e}"),
            },
            Self::TomlError(e) => Self::Other {
                message: format!("TOML parsing error: {e}"),
            },
            Self::JsonError(e) => Self::Other {
                message: format!("JSON error: {e}"),
            },
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

/// Error wrapper that adds a suggestion and details for CLI display.
#[derive(Debug)]
pub struct ErrorContext {
    pub error: UpdaterError,
    pub suggestion: Option<String>,
    pub details: Option<String>,
}

impl ErrorContext {
    #[must_use]
    pub const fn new(error: UpdaterError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Converts any error into an [`ErrorContext`] with operator-facing hints.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(updater_error) = error.downcast_ref::<UpdaterError>() {
        return create_error_context(updater_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(UpdaterError::FolderNotWritable {
                    folders: vec!["unknown".to_string()],
                })
                .with_suggestion("Check ownership of the installation folder or run as the web server user")
                .with_details("The updater needs write access to the whole installation");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(UpdaterError::Other {
                    message: io_error.to_string(),
                })
                .with_suggestion("Check that the installation root exists and the path is correct");
            }
            _ => {}
        }
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(UpdaterError::ConfigError {
            message: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax of the updater config file");
    }

    // Generic error - include the full error chain for better diagnostics
    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(UpdaterError::Other {
        message,
    })
}

fn create_error_context(error: UpdaterError) -> ErrorContext {
    match &error {
        UpdaterError::FolderNotWritable { folders } => ErrorContext::new(error.clone())
            .with_suggestion(match cfg!(windows) {
                true => "Grant the updating account write access to the listed folders",
                false => "Fix ownership with 'chown -R' or permissions with 'chmod -R u+w' on the listed folders",
            })
            .with_details(format!("{} folder(s) cannot be written", folders.len())),

        UpdaterError::DownloadFailed { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Retry the download; a stale staging file is removed automatically")
            .with_details("The signed download URL may have expired or the network dropped"),

        UpdaterError::ArchiveOpenFailed { .. } | UpdaterError::ArchiveValidationFailed { .. } => {
            ErrorContext::new(error.clone())
                .with_suggestion("Cancel the staged update and download it again")
                .with_details("The staged archive is corrupt or incomplete; nothing was installed")
        }

        UpdaterError::CopyFailed { .. } | UpdaterError::ExtractFailed { .. } => {
            ErrorContext::new(error.clone())
                .with_suggestion("Inspect the installation folder before retrying; a fresh download is required")
                .with_details("The core update stopped part way through the directory swap")
        }

        UpdaterError::LockTimeout { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Another update is running for the same target; wait for it to finish"),

        UpdaterError::ConfigError { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Check the updater config file or pass --root"),

        _ => ErrorContext::new(error.clone()),
    }
}
