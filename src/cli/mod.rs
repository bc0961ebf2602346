//! Command-line interface for the updater.
//!
//! Each subcommand maps to one workflow [`Action`]. The `action` subcommand
//! takes the raw `action`/`item`/`init` parameters instead, for callers that
//! forward requests verbatim.
//!
//! # Examples
//!
//! ```bash
//! updater --root /srv/erp list
//! updater download 1
//! updater update 1              # follows the post-update redirect
//! updater --no-follow update 42 # leaves the post-update step pending
//! updater post-update --init Invoicing
//! updater --json status
//! ```

mod render;

pub use render::OutputMode;

use crate::config::UpdaterConfig;
use crate::update::{Action, ActionOutcome, Redirect, Updater};
use crate::utils::progress::NO_PROGRESS_ENV;
use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Process-wide settings derived from the global flags.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Log filter. `None` leaves logging to `RUST_LOG`.
    pub log_level: Option<String>,

    /// Sets `UPDATER_NO_PROGRESS` so downloads and the core swap run without
    /// progress bars or spinners.
    pub no_progress: bool,
}

impl CliConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply this configuration to the process environment.
    ///
    /// Call once, before any work is spawned.
    pub fn apply_to_env(&self) {
        if self.no_progress {
            // SAFETY: called at startup before other threads read the environment.
            unsafe {
                std::env::set_var(NO_PROGRESS_ENV, "1");
            }
        }
    }
}

/// Installs the global tracing subscriber, writing to stderr.
///
/// Uses `level` when given, otherwise `RUST_LOG`. Without either nothing is
/// logged; operator messages are rendered separately.
pub fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None if std::env::var("RUST_LOG").is_ok() => EnvFilter::from_default_env(),
        None => return,
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "updater",
    about = "Lists, downloads and installs core and plugin updates of an ERP installation",
    version,
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Installation root. Defaults to `install_root` from the config file,
    /// then the current directory.
    #[arg(long, global = true, env = "UPDATER_ROOT")]
    root: Option<PathBuf>,

    /// Path to the updater config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print warnings and errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable progress bars and spinners.
    #[arg(long, global = true)]
    no_progress: bool,

    /// Do not run the post-update step after an update or cancel; leave it pending.
    #[arg(long, global = true)]
    no_follow: bool,

    /// Print each outcome as a JSON line.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Commands {
    /// List available core and plugin updates
    List,

    /// Download the archive of an update
    Download {
        /// Project id of the update (1 is the core)
        item: u32,
    },

    /// Install a downloaded update
    Update {
        item: u32,
    },

    /// Delete a downloaded archive without installing it
    Cancel {
        item: u32,
    },

    /// Run migrations or a plugin's init hook, then redeploy
    PostUpdate {
        /// Plugin to initialise instead of running migrations
        #[arg(long)]
        init: Option<String>,
    },

    /// Register this installation with the telemetry service
    Register,

    /// Print the URL where this installation can be claimed
    ClaimInstall,

    /// Run an action from raw request parameters
    Action {
        #[arg(long)]
        action: Option<String>,
        #[arg(long)]
        item: Option<u32>,
        #[arg(long)]
        init: Option<String>,
    },

    /// Show the cached update list and any pending post-update step
    Status,
}

impl Commands {
    /// The workflow action, or `None` for commands that only read state.
    fn action(&self) -> Option<Action> {
        let action = match self {
            Self::List => Action::List,
            Self::Download {
                item,
            } => Action::Download {
                item: *item,
            },
            Self::Update {
                item,
            } => Action::Update {
                item: *item,
            },
            Self::Cancel {
                item,
            } => Action::Cancel {
                item: *item,
            },
            Self::PostUpdate {
                init,
            } => Action::PostUpdate {
                init: init.clone(),
            },
            Self::Register => Action::Register,
            Self::ClaimInstall => Action::ClaimInstall,
            Self::Action {
                action,
                item,
                init,
            } => Action::parse(action.as_deref(), *item, init.as_deref()),
            Self::Status => return None,
        };
        Some(action)
    }
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        CliConfig {
            log_level: self.verbose.then(|| "debug".to_string()),
            no_progress: self.no_progress || self.quiet || self.json,
        }
    }

    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        config.apply_to_env();

        let settings = UpdaterConfig::load_with_optional(self.config.clone()).await?;
        let root = settings.resolve_install_root(self.root.as_deref())?;
        if !root.is_dir() {
            bail!("Installation root {} is not a directory", root.display());
        }
        debug!("Using installation at {}", root.display());

        let updater = Updater::for_installation(&root, settings)?;
        let output = OutputMode {
            json: self.json,
            quiet: self.quiet,
        };

        let Some(action) = self.command.action() else {
            let cached = updater.cached_updates().await;
            let pending = updater.pending_post_update()?;
            return output.status(cached.as_ref(), pending.as_ref());
        };

        let name = action.name();
        let outcome = updater.run(action).await;
        output.outcome(&outcome)?;
        let mut failed = render::has_failures(&outcome.messages);

        if let Some(next) = self.follow(&updater, &outcome, output).await? {
            output.outcome(&next)?;
            failed |= render::has_failures(&next.messages);
        }

        if failed {
            bail!("The {name} action did not complete");
        }
        Ok(())
    }

    /// Runs the scheduled post-update step once it is due, unless
    /// `--no-follow` was given.
    async fn follow<P: crate::plugins::PluginManager>(
        &self,
        updater: &Updater<P>,
        outcome: &ActionOutcome,
        output: OutputMode,
    ) -> Result<Option<ActionOutcome>> {
        let Some(Redirect::PostUpdate {
            init,
            delay_secs,
        }) = &outcome.redirect
        else {
            return Ok(None);
        };

        if self.no_follow {
            if !output.json {
                println!("Post-update pending, run `updater post-update` to finish");
            }
            return Ok(None);
        }

        let delay = updater
            .pending_post_update()?
            .map_or(Duration::from_secs(*delay_secs), |pending| pending.remaining());
        info!("Running post-update in {}s", delay.as_secs());
        tokio::time::sleep(delay).await;

        Ok(Some(
            updater
                .run(Action::PostUpdate {
                    init: init.clone(),
                })
                .await,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("updater").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_subcommands_map_to_actions() {
        assert_eq!(parse(&["list"]).command.action(), Some(Action::List));
        assert_eq!(parse(&["download", "1"]).command.action(), Some(Action::Download { item: 1 }));
        assert_eq!(parse(&["update", "42"]).command.action(), Some(Action::Update { item: 42 }));
        assert_eq!(parse(&["cancel", "42"]).command.action(), Some(Action::Cancel { item: 42 }));
        assert_eq!(
            parse(&["post-update", "--init", "Invoicing"]).command.action(),
            Some(Action::PostUpdate { init: Some("Invoicing".to_string()) })
        );
        assert_eq!(parse(&["claim-install"]).command.action(), Some(Action::ClaimInstall));
        assert_eq!(parse(&["status"]).command.action(), None);
    }

    #[test]
    fn test_raw_action_parameters() {
        let cli = parse(&["action", "--action", "update", "--item", "7"]);
        assert_eq!(cli.command.action(), Some(Action::Update { item: 7 }));

        let cli = parse(&["action", "--action", "update"]);
        assert_eq!(cli.command.action(), Some(Action::List));

        let cli = parse(&["action"]);
        assert_eq!(cli.command.action(), Some(Action::List));
    }

    #[test]
    fn test_item_must_be_numeric() {
        assert!(Cli::try_parse_from(["updater", "update", "core"]).is_err());
    }

    #[test]
    fn test_global_flags_anywhere() {
        let cli = parse(&["update", "1", "--no-follow", "--json", "--root", "/srv/erp"]);
        assert!(cli.no_follow);
        assert!(cli.json);
        assert_eq!(cli.root, Some(PathBuf::from("/srv/erp")));
    }

    #[test]
    fn test_build_config() {
        let config = parse(&["-v", "list"]).build_config();
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert!(!config.no_progress);

        let config = parse(&["--json", "list"]).build_config();
        assert_eq!(config.log_level, None);
        assert!(config.no_progress);

        let config = parse(&["-q", "list"]).build_config();
        assert!(config.no_progress);
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["updater", "-v", "-q", "list"]).is_err());
    }
}
