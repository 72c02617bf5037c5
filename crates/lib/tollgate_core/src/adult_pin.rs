//! Per-device adult content PIN.
//!
//! The PIN is four ASCII digits, sealed with the vault and kept in
//! `device_access.adult_pin`.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::auth::secrets_match;
use crate::store::{DeviceStore, StoreError};
use crate::vault::{Vault, VaultError};

const PIN_LENGTH: usize = 4;

/// Adult PIN errors.
#[derive(Debug, Error)]
pub enum PinError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("PIN not set")]
    NotSet,

    #[error("Invalid PIN")]
    Mismatch,

    #[error("Stored PIN unusable: {0}")]
    Vault(#[from] VaultError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// Trim and check a PIN: exactly four ASCII digits.
pub fn normalize_pin(raw: &str) -> Result<&str, PinError> {
    let pin = raw.trim();
    if pin.len() == PIN_LENGTH && pin.bytes().all(|b| b.is_ascii_digit()) {
        Ok(pin)
    } else {
        Err(PinError::ValidationError("pin must be 4 digits".into()))
    }
}

pub struct AdultPinService {
    store: Arc<dyn DeviceStore>,
    vault: Arc<Vault>,
}

impl AdultPinService {
    pub fn new(store: Arc<dyn DeviceStore>, vault: Arc<Vault>) -> Self {
        Self { store, vault }
    }

    pub async fn set(&self, device_id: Uuid, pin: &str) -> Result<(), PinError> {
        let pin = normalize_pin(pin)?;
        let sealed = self.vault.encrypt(pin)?;
        self.store.set_adult_pin(device_id, Some(&sealed)).await?;
        info!(%device_id, "adult pin set");
        Ok(())
    }

    pub async fn verify(&self, device_id: Uuid, pin: &str) -> Result<(), PinError> {
        let pin = normalize_pin(pin)?;
        let sealed = self
            .store
            .get_access(device_id)
            .await?
            .and_then(|a| a.adult_pin)
            .ok_or(PinError::NotSet)?;
        let stored = self.vault.decrypt(&sealed)?;
        if secrets_match(pin, &stored) {
            Ok(())
        } else {
            Err(PinError::Mismatch)
        }
    }

    pub async fn clear(&self, device_id: Uuid) -> Result<(), PinError> {
        self.store.set_adult_pin(device_id, None).await?;
        info!(%device_id, "adult pin cleared");
        Ok(())
    }

    /// Whether a PIN is configured.
    pub async fn status(&self, device_id: Uuid) -> Result<bool, PinError> {
        Ok(self
            .store
            .get_access(device_id)
            .await?
            .is_some_and(|a| a.adult_pin.is_some()))
    }
}
