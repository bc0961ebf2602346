//! Archive download.

use crate::core::UpdaterError;
use crate::telemetry::UrlSigner;
use crate::update::item::UpdateItem;
use crate::utils::fs::remove_file_if_exists;
use crate::utils::progress::ProgressBar;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

pub struct ArchiveFetcher {
    client: reqwest::Client,
    root: PathBuf,
}

impl ArchiveFetcher {
    #[must_use]
    pub fn new(client: reqwest::Client, root: &Path) -> Self {
        Self {
            client,
            root: root.to_path_buf(),
        }
    }

    /// Downloads `item` to its staging file.
    ///
    /// Any file already staged under that name is removed first, so a
    /// partial file left by an earlier failure never survives a retry.
    pub async fn download(
        &self,
        item: &UpdateItem,
        signer: &dyn UrlSigner,
    ) -> Result<PathBuf, UpdaterError> {
        let target = item.staging_path(&self.root);
        let failed = |reason: String| UpdaterError::DownloadFailed {
            url: item.url.clone(),
            reason,
        };

        if remove_file_if_exists(&target).map_err(|e| failed(format!("{e:#}")))? {
            debug!("Removed stale {}", target.display());
        }

        let url = signer.sign_url(&item.url);
        info!("Downloading {} to {}", item.url, target.display());

        let mut response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| failed(e.to_string()))?;

        let progress = ProgressBar::new_download(response.content_length().unwrap_or(0));
        progress.set_message(item.filename.clone());

        let mut file = tokio::fs::File::create(&target).await.map_err(|e| failed(e.to_string()))?;
        while let Some(chunk) = response.chunk().await.map_err(|e| {
            progress.abandon();
            failed(e.to_string())
        })? {
            file.write_all(&chunk).await.map_err(|e| failed(e.to_string()))?;
            progress.inc(chunk.len() as u64);
        }
        file.flush().await.map_err(|e| failed(e.to_string()))?;
        progress.finish_and_clear();

        info!("Downloaded {}", item.filename);
        Ok(target)
    }
}
