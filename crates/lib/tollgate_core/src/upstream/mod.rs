//! Upstream credential resolver.
//!
//! Each device may carry one set of upstream provider credentials, stored as
//! vault ciphertext. Plaintext only exists inside [`UpstreamCredentials`],
//! whose `Debug` output is redacted.

pub mod base_url;

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::store::{DeviceStore, StoreError};
use crate::vault::{Vault, VaultError};

pub use base_url::normalize_base_url;

/// Upstream resolver errors.
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("No upstream configured for device")]
    NotConfigured,

    #[error("Missing upstream base URL")]
    MissingBaseUrl,

    #[error("Invalid upstream base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Stored credentials unusable: {0}")]
    Vault(#[from] VaultError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// Decrypted upstream access for one device.
#[derive(Clone, PartialEq, Eq)]
pub struct UpstreamCredentials {
    /// Origin only: `scheme://host[:port]`.
    pub base_url: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for UpstreamCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamCredentials")
            .field("base_url", &self.base_url)
            .field("username", &"<redacted>")
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Resolves and stores per-device upstream credentials.
pub struct UpstreamResolver {
    store: Arc<dyn DeviceStore>,
    vault: Arc<Vault>,
    default_base_url: Option<String>,
}

impl UpstreamResolver {
    /// `default_base_url` is used for devices without a stored base URL.
    pub fn new(
        store: Arc<dyn DeviceStore>,
        vault: Arc<Vault>,
        default_base_url: Option<String>,
    ) -> Self {
        Self {
            store,
            vault,
            default_base_url: default_base_url.filter(|u| !u.trim().is_empty()),
        }
    }

    /// Decrypt the device's upstream credentials.
    pub async fn resolve(&self, device_id: Uuid) -> Result<UpstreamCredentials, ResolverError> {
        let row = self
            .store
            .get_upstream(device_id)
            .await?
            .ok_or(ResolverError::NotConfigured)?;

        let username = self.vault.decrypt(&row.enc_username)?;
        let password = self.vault.decrypt(&row.enc_password)?;

        let raw_base = row
            .upstream_base_url
            .filter(|u| !u.is_empty())
            .or_else(|| self.default_base_url.clone())
            .ok_or(ResolverError::MissingBaseUrl)?;
        let base_url = normalize_base_url(&raw_base)
            .ok_or_else(|| ResolverError::InvalidBaseUrl(raw_base.clone()))?;

        debug!(%device_id, %base_url, "resolved upstream credentials");
        Ok(UpstreamCredentials {
            base_url,
            username,
            password,
        })
    }

    /// Encrypt and store a device's upstream credentials.
    ///
    /// With no `base_url`, the device follows the configured default; storing
    /// fails with `MissingBaseUrl` when there is no default either.
    pub async fn store_credentials(
        &self,
        device_id: Uuid,
        base_url: Option<&str>,
        username: &str,
        password: &str,
    ) -> Result<(), ResolverError> {
        if username.is_empty() || password.is_empty() {
            return Err(ResolverError::ValidationError(
                "username + password required".into(),
            ));
        }

        let base_url = match base_url.map(str::trim).filter(|u| !u.is_empty()) {
            Some(raw) => Some(
                normalize_base_url(raw)
                    .ok_or_else(|| ResolverError::InvalidBaseUrl(raw.to_string()))?,
            ),
            None if self.default_base_url.is_some() => None,
            None => return Err(ResolverError::MissingBaseUrl),
        };

        let enc_username = self.vault.encrypt(username)?;
        let enc_password = self.vault.encrypt(password)?;
        self.store
            .upsert_upstream(device_id, base_url.as_deref(), &enc_username, &enc_password)
            .await?;

        info!(
            %device_id,
            base_url = base_url.as_deref().unwrap_or("<default>"),
            "stored upstream credentials"
        );
        Ok(())
    }
}
