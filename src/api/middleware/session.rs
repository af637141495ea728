use serde::{Deserialize, Serialize};
use std::time::Duration;
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, Session, SessionManagerLayer};

use crate::config::Config;
use crate::services::{
    api_client::QrApiClient, card_renderer::DateFormatter, downloads::DownloadManifest,
    token_store::StoreError,
};

/// Session keys used besides the login state
pub const SESSION_KEY_FLASH: &str = "flash";
pub const SESSION_KEY_DOWNLOADS: &str = "downloads";

/// Creates a session layer for Axum
pub fn create_session_layer(secure: bool) -> SessionManagerLayer<MemoryStore> {
    SessionManagerLayer::new(MemoryStore::default())
        .with_secure(secure)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::hours(24)))
}

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub api: QrApiClient,
    pub dates: DateFormatter,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let timeout = config.request_timeout_secs.map(Duration::from_secs);
        let api = QrApiClient::new(&config.api_base_url, timeout)?;
        let dates = DateFormatter::from_utc_offset_hours(config.display_utc_offset_hours)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "invalid display offset: {}",
                    config.display_utc_offset_hours
                )
            })?;

        Ok(Self { config, api, dates })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Info,
    Error,
}

/// One-shot message shown on the next rendered page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == FlashKind::Error
    }
}

pub async fn set_flash(session: &Session, flash: Flash) -> Result<(), StoreError> {
    session
        .insert(SESSION_KEY_FLASH, flash)
        .await
        .map_err(|e| StoreError(e.to_string()))
}

pub async fn take_flash(session: &Session) -> Result<Option<Flash>, StoreError> {
    session
        .remove::<Flash>(SESSION_KEY_FLASH)
        .await
        .map_err(|e| StoreError(e.to_string()))
}

/// Replaces the manifest with the one from the latest batch.
pub async fn save_manifest(
    session: &Session,
    manifest: &DownloadManifest,
) -> Result<(), StoreError> {
    session
        .insert(SESSION_KEY_DOWNLOADS, manifest)
        .await
        .map_err(|e| StoreError(e.to_string()))
}

pub async fn load_manifest(session: &Session) -> Result<DownloadManifest, StoreError> {
    Ok(session
        .get::<DownloadManifest>(SESSION_KEY_DOWNLOADS)
        .await
        .map_err(|e| StoreError(e.to_string()))?
        .unwrap_or_default())
}
