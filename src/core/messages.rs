//! Operator-facing message log.
//!
//! Every workflow action records what happened as leveled messages. They are
//! mirrored to `tracing` when recorded and rendered by the CLI after the
//! action finishes, so a failed action still leaves its reason on screen.

use crate::core::error::{Severity, UpdaterError};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Notice,
    Warning,
    Error,
    Critical,
}

impl From<Severity> for MessageLevel {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Notice => Self::Notice,
            Severity::Warning => Self::Warning,
            Severity::Error => Self::Error,
            Severity::Critical => Self::Critical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub level: MessageLevel,
    pub text: String,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.level {
            MessageLevel::Notice => "notice".green(),
            MessageLevel::Warning => "warning".yellow(),
            MessageLevel::Error => "error".red(),
            MessageLevel::Critical => "critical".red().bold(),
        };
        write!(f, "{label}: {}", self.text)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notice(&mut self, text: impl Into<String>) {
        let text = text.into();
        info!("{}", text);
        self.push(MessageLevel::Notice, text);
    }

    pub fn warning(&mut self, text: impl Into<String>) {
        let text = text.into();
        warn!("{}", text);
        self.push(MessageLevel::Warning, text);
    }

    pub fn error(&mut self, text: impl Into<String>) {
        let text = text.into();
        error!("{}", text);
        self.push(MessageLevel::Error, text);
    }

    pub fn critical(&mut self, text: impl Into<String>) {
        let text = text.into();
        error!(critical = true, "{}", text);
        self.push(MessageLevel::Critical, text);
    }

    /// Records an error at the level its severity calls for.
    pub fn report(&mut self, error: &UpdaterError) {
        match error.severity() {
            Severity::Notice => self.notice(error.to_string()),
            Severity::Warning => self.warning(error.to_string()),
            Severity::Error => self.error(error.to_string()),
            Severity::Critical => self.critical(error.to_string()),
        }
    }

    fn push(&mut self, level: MessageLevel, text: String) {
        self.messages.push(Message {
            level,
            text,
        });
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn has_level(&self, level: MessageLevel) -> bool {
        self.messages.iter().any(|m| m.level == level)
    }

    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.messages.iter().any(|m| m.text.contains(needle))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[must_use]
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}
