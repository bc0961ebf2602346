//! Terminal and JSON rendering of action outcomes.

use crate::core::{Message, MessageLevel};
use crate::update::cache::CachedUpdates;
use crate::update::{ActionOutcome, PendingPostUpdate, Redirect, UpdateItem};
use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;

/// How results reach the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputMode {
    pub json: bool,
    pub quiet: bool,
}

impl OutputMode {
    /// Prints `outcome` as one JSON line or as a table followed by messages.
    pub fn outcome(self, outcome: &ActionOutcome) -> Result<()> {
        if self.json {
            return print_json(outcome);
        }

        if !self.quiet {
            items_table(&outcome.items);
        }
        self.messages(&outcome.messages);

        if let Some(Redirect::External {
            url,
        }) = &outcome.redirect
        {
            println!("{} {}", "Open:".bold(), url);
        }
        Ok(())
    }

    pub fn status(
        self,
        cached: Option<&CachedUpdates>,
        pending: Option<&PendingPostUpdate>,
    ) -> Result<()> {
        if self.json {
            return print_json(&serde_json::json!({
                "cached": cached,
                "pending": pending,
            }));
        }

        match cached {
            Some(cached) => {
                println!(
                    "Update list cached at {}",
                    cached.stored_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
                items_table(&cached.items);
            }
            None => println!("{}", "No cached update list, run `updater list`".dimmed()),
        }

        if let Some(pending) = pending {
            let step = match &pending.init {
                Some(plugin) => format!("init of {plugin}"),
                None => "migrations".to_string(),
            };
            println!(
                "{} {} (due in {}s)",
                "Post-update pending:".yellow(),
                step,
                pending.remaining().as_secs()
            );
        }
        Ok(())
    }

    fn messages(self, messages: &[Message]) {
        for message in messages {
            if self.quiet && message.level == MessageLevel::Notice {
                continue;
            }
            match message.level {
                MessageLevel::Notice => println!("{message}"),
                _ => eprintln!("{message}"),
            }
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let line = serde_json::to_string(value).context("Failed to serialize output")?;
    println!("{line}");
    Ok(())
}

fn items_table(items: &[UpdateItem]) {
    if items.is_empty() {
        println!("{}", "Everything is up to date".green());
        return;
    }

    println!(
        "{:>6}  {:<24} {:<10} {:<11} {}",
        "ID".bold(),
        "NAME".bold(),
        "VERSION".bold(),
        "STATUS".bold(),
        "DESCRIPTION".bold()
    );
    for item in items {
        let status = if item.downloaded {
            "downloaded".cyan()
        } else if item.stable {
            "stable".green()
        } else {
            "beta".yellow()
        };
        println!(
            "{:>6}  {:<24} {:<10} {:<11} {}",
            item.id, item.name, item.version, status, item.description
        );
    }
}

/// Whether any message reports a failure.
#[must_use]
pub fn has_failures(messages: &[Message]) -> bool {
    messages.iter().any(|m| matches!(m.level, MessageLevel::Error | MessageLevel::Critical))
}
