//! The step that runs after an install settles.

use crate::plugins::PluginManager;
use anyhow::{Context, Result};
use tracing::info;

/// Runs migrations (no plugin) or `plugin`'s init hook, then a full clean deploy.
pub async fn run_post_update<P: PluginManager>(plugins: &P, plugin: Option<&str>) -> Result<()> {
    match plugin {
        Some(name) => {
            info!("Initialising plugin {}", name);
            plugins.init_plugin(name).await.with_context(|| format!("Init of {name} failed"))?;
        }
        None => {
            info!("Running migrations");
            plugins.run_migrations().await.context("Migrations failed")?;
        }
    }

    plugins.deploy(true, false).await.context("Deploy failed")
}
