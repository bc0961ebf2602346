//! External hook commands run after an update.

use crate::config::HooksConfig;
use crate::utils::platform::get_shell_command;
use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Placeholder replaced with the plugin name in `init_command`.
pub const PLUGIN_PLACEHOLDER: &str = "{plugin}";

/// Runs the configured migrate/init commands through the platform shell with
/// the installation root as working directory.
#[derive(Debug, Clone)]
pub struct HookRunner {
    hooks: HooksConfig,
    root: PathBuf,
}

impl HookRunner {
    #[must_use]
    pub fn new(hooks: HooksConfig, root: &Path) -> Self {
        Self {
            hooks,
            root: root.to_path_buf(),
        }
    }

    /// Runs pending migrations. Returns `false` when no command is configured.
    pub async fn migrate(&self) -> Result<bool> {
        let Some(command) = &self.hooks.migrate_command else {
            debug!("No migrate command configured, skipping migrations");
            return Ok(false);
        };
        self.run("migrate", command).await?;
        Ok(true)
    }

    /// Runs the init hook for `plugin`. Returns `false` when no command is configured.
    pub async fn init_plugin(&self, plugin: &str) -> Result<bool> {
        let Some(template) = &self.hooks.init_command else {
            debug!("No init command configured, skipping init of {}", plugin);
            return Ok(false);
        };
        let command = template.replace(PLUGIN_PLACEHOLDER, plugin);
        self.run("init", &command).await?;
        Ok(true)
    }

    async fn run(&self, label: &str, command: &str) -> Result<()> {
        let (shell, flag) = get_shell_command();
        debug!("Running {} hook: {} {} {}", label, shell, flag, command);

        let output = Command::new(shell)
            .arg(flag)
            .arg(command)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("Failed to spawn {label} hook: {command}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("{label} hook exited with {}: {}", output.status, stderr.trim());
        }

        info!("{} hook completed", label);
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn runner(root: &Path, migrate: Option<&str>, init: Option<&str>) -> HookRunner {
        HookRunner::new(
            HooksConfig {
                migrate_command: migrate.map(String::from),
                init_command: init.map(String::from),
            },
            root,
        )
    }

    #[tokio::test]
    async fn test_unconfigured_hooks_are_skipped() {
        let temp = TempDir::new().unwrap();
        let hooks = runner(temp.path(), None, None);

        assert!(!hooks.migrate().await.unwrap());
        assert!(!hooks.init_plugin("Invoicing").await.unwrap());
    }

    #[tokio::test]
    async fn test_init_substitutes_plugin_in_root() {
        let temp = TempDir::new().unwrap();
        let hooks = runner(temp.path(), None, Some("echo {plugin} > init.log"));

        assert!(hooks.init_plugin("Invoicing").await.unwrap());
        let log = std::fs::read_to_string(temp.path().join("init.log")).unwrap();
        assert_eq!(log.trim(), "Invoicing");
    }

    #[tokio::test]
    async fn test_failing_hook_is_an_error() {
        let temp = TempDir::new().unwrap();
        let hooks = runner(temp.path(), Some("echo broken >&2; exit 3"), None);

        let err = hooks.migrate().await.unwrap_err();
        assert!(err.to_string().contains("broken"));
    }
}
