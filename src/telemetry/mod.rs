//! Installation registration and download URL signing.
//!
//! A registered installation has an id and a signing key issued by the
//! telemetry service. Download URLs are signed with them so the release
//! server can tell which installation is downloading; an unregistered
//! installation downloads with unsigned URLs.

use crate::constants::{DATA_DIR, TELEMETRY_FILE};
use crate::utils::fs::{read_json_file, write_json_file};
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Signs download URLs right before they are fetched.
pub trait UrlSigner: Send + Sync {
    fn sign_url(&self, url: &str) -> String;
}

/// URLs are fetched as-is.
pub struct Unsigned;

impl UrlSigner for Unsigned {
    fn sign_url(&self, url: &str) -> String {
        url.to_string()
    }
}

/// Persisted registration, `MyFiles/telemetry.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_install: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct RegistrationResponse {
    idinstall: u64,
    signkey: String,
}

pub struct TelemetryManager {
    client: reqwest::Client,
    telemetry_url: String,
    state_path: PathBuf,
    state: TelemetryState,
}

impl TelemetryManager {
    /// Loads the registration state of the installation at `root`.
    pub fn load(root: &Path, telemetry_url: &str, client: reqwest::Client) -> Result<Self> {
        let state_path = root.join(DATA_DIR).join(TELEMETRY_FILE);
        let state = if state_path.exists() {
            read_json_file(&state_path)?
        } else {
            TelemetryState::default()
        };

        Ok(Self {
            client,
            telemetry_url: telemetry_url.trim_end_matches('/').to_string(),
            state_path,
            state,
        })
    }

    #[must_use]
    pub fn state(&self) -> &TelemetryState {
        &self.state
    }

    #[must_use]
    pub const fn is_registered(&self) -> bool {
        self.state.id_install.is_some() && self.state.sign_key.is_some()
    }

    /// Appends `idinstall`, `time` and `signkey` for the given unix time.
    #[must_use]
    pub fn sign_url_at(&self, url: &str, time: i64) -> String {
        let (Some(id), Some(key)) = (self.state.id_install, &self.state.sign_key) else {
            return url.to_string();
        };

        let separator = if url.contains('?') { '&' } else { '?' };
        format!("{url}{separator}idinstall={id}&time={time}&signkey={}", signature(id, key, time))
    }

    /// Where the operator claims this installation, when registered.
    #[must_use]
    pub fn claim_url(&self) -> Option<String> {
        let (Some(id), Some(key)) = (self.state.id_install, &self.state.sign_key) else {
            return None;
        };
        let time = Utc::now().timestamp();
        Some(format!(
            "{}/ClaimInstall?idinstall={id}&time={time}&signkey={}",
            self.telemetry_url,
            signature(id, key, time)
        ))
    }

    /// Registers the installation with the telemetry service.
    ///
    /// Returns `false` when the service could not be reached or answered with
    /// something unexpected; the previous state is kept in that case.
    pub async fn install(&mut self) -> bool {
        match self.try_install().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Installation registration failed: {:#}", e);
                false
            }
        }
    }

    async fn try_install(&mut self) -> Result<()> {
        debug!("Registering installation at {}", self.telemetry_url);

        let response = self
            .client
            .post(&self.telemetry_url)
            .json(&serde_json::json!({
                "action": "install",
                "idinstall": self.state.id_install,
            }))
            .send()
            .await
            .context("Failed to reach the telemetry service")?;

        if !response.status().is_success() {
            bail!("Telemetry service answered HTTP {}", response.status());
        }

        let registration: RegistrationResponse =
            response.json().await.context("Unexpected telemetry response")?;

        self.state = TelemetryState {
            id_install: Some(registration.idinstall),
            sign_key: Some(registration.signkey),
            last_update: Some(Utc::now()),
        };
        write_json_file(&self.state_path, &self.state)?;

        info!("Installation registered as {}", registration.idinstall);
        Ok(())
    }
}

impl UrlSigner for TelemetryManager {
    fn sign_url(&self, url: &str) -> String {
        self.sign_url_at(url, Utc::now().timestamp())
    }
}

fn signature(id: u64, key: &str, time: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{id}{key}{time}").as_bytes());
    hex::encode(hasher.finalize())
}
