//! Per-target update locks.
//!
//! Every mutating action takes an exclusive file lock on
//! `MyFiles/.updater/locks/update-<id>.lock` so two operators cannot download
//! or install the same staging file at once. The lock is released when the
//! guard is dropped. Lock files are left in place: unlinking a lock file
//! another process is waiting on would let a third process lock a fresh inode.
//!
//! File operations run in `spawn_blocking` so a contended lock never stalls
//! the runtime.

use crate::constants::{MAX_BACKOFF_DELAY_MS, STARTING_BACKOFF_DELAY_MS};
use crate::core::UpdaterError;
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;
use tracing::debug;

#[derive(Debug)]
pub struct UpdateLock {
    _file: Arc<File>,
    target: String,
    lock_path: PathBuf,
}

impl Drop for UpdateLock {
    fn drop(&mut self) {
        debug!(target_id = %self.target, "Update lock released");
    }
}

impl UpdateLock {
    #[must_use]
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Waits up to `timeout` for the lock on target `id`.
    pub async fn acquire(
        locks_dir: &Path,
        id: u32,
        timeout: Duration,
    ) -> Result<Self, UpdaterError> {
        let target = format!("update-{id}");
        debug!(target_id = %target, "Waiting for update lock");

        tokio::fs::create_dir_all(locks_dir).await?;
        let lock_path = locks_dir.join(format!("{target}.lock"));

        let open_path = lock_path.clone();
        let file = tokio::task::spawn_blocking(move || {
            OpenOptions::new().create(true).write(true).truncate(false).open(&open_path)
        })
        .await
        .map_err(|e| UpdaterError::Other {
            message: format!("lock task panicked: {e}"),
        })??;
        let file = Arc::new(file);

        let start = std::time::Instant::now();
        let backoff = ExponentialBackoff::from_millis(STARTING_BACKOFF_DELAY_MS)
            .max_delay(Duration::from_millis(MAX_BACKOFF_DELAY_MS));

        for delay in backoff {
            let candidate = Arc::clone(&file);
            let acquired = tokio::task::spawn_blocking(move || candidate.try_lock_exclusive())
                .await
                .map_err(|e| UpdaterError::Other {
                    message: format!("lock task panicked: {e}"),
                })?;

            if matches!(acquired, Ok(true)) {
                debug!(
                    target_id = %target,
                    wait_ms = start.elapsed().as_millis(),
                    "Update lock acquired"
                );
                return Ok(Self {
                    _file: file,
                    target,
                    lock_path,
                });
            }

            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(delay.min(remaining)).await;
        }

        Err(UpdaterError::LockTimeout {
            target,
            seconds: timeout.as_secs(),
        })
    }
}
