//! The update workflow controller.
//!
//! Every operator request is one [`Action`]. [`Updater::run`] checks that
//! the installation can be written, runs the action and returns what the
//! operator should see next: the update list, the messages the action
//! logged and, after installs and cancels, a redirect to the post-update
//! step. Action failures never escape as errors; they end up in the messages.

use crate::config::UpdaterConfig;
use crate::constants::{DATA_DIR, STATE_DIR, staging_file_name};
use crate::core::{Message, MessageLog, UpdaterError};
use crate::plugins::{LocalPluginManager, PluginManager};
use crate::telemetry::{TelemetryManager, Unsigned, UrlSigner};
use crate::update::cache::{CachedUpdates, UpdateCache};
use crate::update::fetcher::ArchiveFetcher;
use crate::update::installer::{ArchiveInstaller, InstallReport};
use crate::update::item::UpdateItem;
use crate::update::lister::{InstalledVersions, ReleaseLister, running_core_version};
use crate::update::lock::UpdateLock;
use crate::update::pending::PendingPostUpdate;
use crate::update::post_update::run_post_update;
use crate::utils::fs::{not_writable_folders, remove_file_if_exists};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Delete the staged archive of `item`.
    Cancel {
        item: u32,
    },
    ClaimInstall,
    Download {
        item: u32,
    },
    /// Migrations, or `init`'s init hook, then a full deploy.
    PostUpdate {
        init: Option<String>,
    },
    Register,
    Update {
        item: u32,
    },
    List,
}

impl Action {
    /// Builds an action from request-style parameters.
    ///
    /// Unknown actions, and item actions without an item, list updates.
    #[must_use]
    pub fn parse(action: Option<&str>, item: Option<u32>, init: Option<&str>) -> Self {
        match (action.unwrap_or_default(), item) {
            ("cancel", Some(item)) => Self::Cancel {
                item,
            },
            ("download", Some(item)) => Self::Download {
                item,
            },
            ("update", Some(item)) => Self::Update {
                item,
            },
            (name @ ("cancel" | "download" | "update"), None) => {
                warn!("Action '{}' needs an item, listing updates instead", name);
                Self::List
            }
            ("claim-install", _) => Self::ClaimInstall,
            ("post-update", _) => Self::PostUpdate {
                init: init.filter(|name| !name.is_empty()).map(String::from),
            },
            ("register", _) => Self::Register,
            ("", _) => Self::List,
            (other, _) => {
                debug!("Unknown action '{}', listing updates", other);
                Self::List
            }
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Cancel {
                ..
            } => "cancel",
            Self::ClaimInstall => "claim-install",
            Self::Download {
                ..
            } => "download",
            Self::PostUpdate {
                ..
            } => "post-update",
            Self::Register => "register",
            Self::Update {
                ..
            } => "update",
            Self::List => "list",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where the operator goes after an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Redirect {
    /// Back to the updater for the post-update step, after `delay_secs`.
    PostUpdate {
        init: Option<String>,
        delay_secs: u64,
    },
    /// An external page.
    External {
        url: String,
    },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ActionOutcome {
    pub items: Vec<UpdateItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<Redirect>,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install: Option<InstallReport>,
}

impl ActionOutcome {
    fn new(items: Vec<UpdateItem>, redirect: Option<Redirect>, log: MessageLog) -> Self {
        Self {
            items,
            redirect,
            messages: log.into_messages(),
            install: None,
        }
    }

    fn halted(log: MessageLog) -> Self {
        Self::new(Vec::new(), None, log)
    }
}

pub struct Updater<P: PluginManager> {
    root: PathBuf,
    config: UpdaterConfig,
    client: reqwest::Client,
    plugins: P,
}

impl Updater<LocalPluginManager> {
    /// Updater for the installation at `root` using its own `Plugins/` folder.
    pub fn for_installation(root: &Path, config: UpdaterConfig) -> Result<Self> {
        let plugins = LocalPluginManager::new(root, config.hooks.clone());
        Self::new(root, config, plugins)
    }
}

impl<P: PluginManager> Updater<P> {
    pub fn new(root: &Path, config: UpdaterConfig, plugins: P) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .user_agent(concat!("updater-cli/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            root: root.to_path_buf(),
            config,
            client,
            plugins,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    #[must_use]
    pub fn plugins(&self) -> &P {
        &self.plugins
    }

    #[must_use]
    pub fn state_dir(&self) -> PathBuf {
        self.root.join(DATA_DIR).join(STATE_DIR)
    }

    fn cache(&self) -> UpdateCache {
        UpdateCache::new(&self.state_dir(), self.config.cache_ttl_secs)
    }

    fn telemetry(&self) -> Result<TelemetryManager> {
        TelemetryManager::load(&self.root, &self.config.telemetry_url, self.client.clone())
    }

    fn installer(&self) -> ArchiveInstaller<'_, P> {
        ArchiveInstaller::new(
            &self.root,
            &self.config.core_bundle_folder,
            self.config.rollback_on_failure,
            &self.plugins,
        )
    }

    pub async fn installed_versions(&self) -> Result<InstalledVersions> {
        Ok(InstalledVersions {
            core: running_core_version(&self.root, self.config.core_version),
            plugins: self.plugins.installed_plugins().await?,
        })
    }

    /// Fetches the feed and lists applicable updates, refreshing the cache.
    pub async fn list_updates(&self) -> Vec<UpdateItem> {
        let installed = match self.installed_versions().await {
            Ok(installed) => installed,
            Err(e) => {
                warn!("Cannot read installed plugins: {:#}", e);
                InstalledVersions {
                    core: running_core_version(&self.root, self.config.core_version),
                    plugins: Vec::new(),
                }
            }
        };

        let lister = ReleaseLister::new(
            self.client.clone(),
            &self.config.feed_url,
            &self.root,
            self.config.enable_updates_beta,
        );
        lister.list_updates(&installed, &self.cache()).await
    }

    /// The listed update for `item`, from the cached list when it has one,
    /// else from a fresh listing.
    async fn find_update(&self, item: u32) -> Option<UpdateItem> {
        if let Ok(installed) = self.installed_versions().await {
            if let Some(items) = self.cache().get(&installed.fingerprint()).await {
                if let Some(found) = items.into_iter().find(|i| i.id == item) {
                    debug!("Using cached update list");
                    return Some(found);
                }
                debug!("Item {} not in the cached update list, listing again", item);
            }
        }
        self.list_updates().await.into_iter().find(|i| i.id == item)
    }

    /// Whatever the last listing cached, without touching the network.
    pub async fn cached_updates(&self) -> Option<CachedUpdates> {
        self.cache().peek().await
    }

    pub fn pending_post_update(&self) -> Result<Option<PendingPostUpdate>> {
        PendingPostUpdate::load(&self.state_dir())
    }

    pub async fn run(&self, action: Action) -> ActionOutcome {
        debug!("Running action {}", action);
        let mut log = MessageLog::new();

        let folders = not_writable_folders(&self.root);
        if !folders.is_empty() {
            log.warning("Some folders are not writable, fix their permissions to update");
            for folder in &folders {
                log.warning(folder.display().to_string());
            }
            return ActionOutcome::halted(log);
        }

        match action {
            Action::Cancel {
                item,
            } => self.cancel(item, log).await,
            Action::ClaimInstall => self.claim_install(log),
            Action::Download {
                item,
            } => self.download(item, log).await,
            Action::PostUpdate {
                init,
            } => self.post_update(init, log).await,
            Action::Register => self.register(log).await,
            Action::Update {
                item,
            } => self.update(item, log).await,
            Action::List => {
                let items = self.list_updates().await;
                ActionOutcome::new(items, None, log)
            }
        }
    }

    async fn lock(&self, item: u32) -> Result<UpdateLock, UpdaterError> {
        UpdateLock::acquire(&self.state_dir().join("locks"), item, self.config.lock_timeout()).await
    }

    fn schedule_post_update(&self, init: Option<String>, log: &mut MessageLog) -> Redirect {
        let pending = PendingPostUpdate::new(init.clone(), self.config.redirect_delay());
        if let Err(e) = pending.save(&self.state_dir()) {
            log.error(format!("Cannot persist the post-update step: {e:#}"));
        }

        log.notice("Reloading...");
        Redirect::PostUpdate {
            init,
            delay_secs: self.config.redirect_delay_secs,
        }
    }

    async fn cancel(&self, item: u32, mut log: MessageLog) -> ActionOutcome {
        let _lock = match self.lock(item).await {
            Ok(lock) => lock,
            Err(e) => {
                log.report(&e);
                return ActionOutcome::halted(log);
            }
        };

        let staged = self.root.join(staging_file_name(item));
        match remove_file_if_exists(&staged) {
            Ok(true) => log.notice(format!("Deleted {}", staged.display())),
            Ok(false) => debug!("Nothing staged at {}", staged.display()),
            Err(e) => log.error(format!("{e:#}")),
        }

        let redirect = self.schedule_post_update(None, &mut log);
        ActionOutcome::new(Vec::new(), Some(redirect), log)
    }

    fn claim_install(&self, mut log: MessageLog) -> ActionOutcome {
        let claim_url = match self.telemetry() {
            Ok(telemetry) => telemetry.claim_url(),
            Err(e) => {
                log.error(format!("Cannot read the installation registration: {e:#}"));
                return ActionOutcome::halted(log);
            }
        };

        match claim_url {
            Some(url) => ActionOutcome::new(Vec::new(), Some(Redirect::External { url }), log),
            None => {
                log.warning("This installation is not registered yet, run `register` first");
                ActionOutcome::halted(log)
            }
        }
    }

    async fn download(&self, item: u32, mut log: MessageLog) -> ActionOutcome {
        let _lock = match self.lock(item).await {
            Ok(lock) => lock,
            Err(e) => {
                log.report(&e);
                return ActionOutcome::halted(log);
            }
        };

        let mut items = self.list_updates().await;
        let Some(position) = items.iter().position(|i| i.id == item) else {
            log.report(&UpdaterError::ItemNotFound {
                id: item,
            });
            return ActionOutcome::new(items, None, log);
        };

        let telemetry = self.telemetry();
        let signer: &dyn UrlSigner = match &telemetry {
            Ok(telemetry) => telemetry,
            Err(e) => {
                warn!("Downloading with an unsigned URL: {:#}", e);
                &Unsigned
            }
        };

        let fetcher = ArchiveFetcher::new(self.client.clone(), &self.root);
        match fetcher.download(&items[position], signer).await {
            Ok(_) => {
                log.notice(format!("Download completed: {}", items[position].filename));
                items[position].downloaded = true;
                if let Err(e) = self.cache().clear().await {
                    warn!("{:#}", e);
                }
            }
            Err(e) => log.report(&e),
        }

        ActionOutcome::new(items, None, log)
    }

    async fn post_update(&self, init: Option<String>, mut log: MessageLog) -> ActionOutcome {
        let pending = match PendingPostUpdate::take(&self.state_dir()) {
            Ok(pending) => pending,
            Err(e) => {
                warn!("Ignoring unreadable post-update marker: {:#}", e);
                None
            }
        };
        let init = init.or_else(|| pending.and_then(|p| p.init));

        match run_post_update(&self.plugins, init.as_deref()).await {
            Ok(()) => log.notice("Update finished"),
            Err(e) => log.error(format!("{e:#}")),
        }

        let items = self.list_updates().await;
        ActionOutcome::new(items, None, log)
    }

    async fn register(&self, mut log: MessageLog) -> ActionOutcome {
        let registered = match self.telemetry() {
            Ok(mut telemetry) => telemetry.install().await,
            Err(e) => {
                warn!("{:#}", e);
                false
            }
        };

        if registered {
            log.notice("Installation registered");
        } else {
            log.error("Installation could not be registered");
        }

        let items = self.list_updates().await;
        ActionOutcome::new(items, None, log)
    }

    async fn update(&self, item: u32, mut log: MessageLog) -> ActionOutcome {
        let _lock = match self.lock(item).await {
            Ok(lock) => lock,
            Err(e) => {
                log.report(&e);
                return ActionOutcome::halted(log);
            }
        };

        let installer = self.installer();
        let staged = UpdateItem::for_staged(item, &self.root);
        let archive = match installer.validate(&staged).await {
            Ok(archive) => archive,
            Err(e) => {
                log.report(&e);
                return ActionOutcome::halted(log);
            }
        };

        let target = self.find_update(item).await.unwrap_or(staged);
        let init = self.plugin_to_init(&target).await;

        match installer.apply(&target, archive).await {
            Ok(report) => {
                if let Err(e) = self.cache().clear().await {
                    warn!("{:#}", e);
                }
                let redirect = self.schedule_post_update(init, &mut log);
                let mut outcome = ActionOutcome::new(Vec::new(), Some(redirect), log);
                outcome.install = Some(report);
                outcome
            }
            Err(e) => {
                log.report(&e);
                ActionOutcome::halted(log)
            }
        }
    }

    /// The plugin to initialise after updating `target`: its name when it is
    /// an enabled plugin, otherwise none.
    async fn plugin_to_init(&self, target: &UpdateItem) -> Option<String> {
        if target.is_core() {
            return None;
        }

        match self.plugins.enabled_plugins().await {
            Ok(enabled) if enabled.contains(&target.name) => Some(target.name.clone()),
            Ok(_) => None,
            Err(e) => {
                warn!("Cannot read enabled plugins: {:#}", e);
                None
            }
        }
    }
}
