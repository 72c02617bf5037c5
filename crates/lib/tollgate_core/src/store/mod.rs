//! Device persistence.
//!
//! `DeviceStore` is the storage seam for the registry, resolver, and PIN
//! service. Uniqueness of `device_uuid` and `device_code` is enforced by the
//! store and reported as [`StoreError::Conflict`]; callers react to the
//! conflict instead of pre-checking existence.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::device::{
    Device, DeviceAccess, DeviceMetadata, DeviceStatus, DeviceUpstream, NewDevice,
};

pub use memory::MemoryDeviceStore;
pub use postgres::PgDeviceStore;

/// Unique keys on the `devices` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueKey {
    DeviceUuid,
    DeviceCode,
}

impl std::fmt::Display for UniqueKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UniqueKey::DeviceUuid => f.write_str("device_uuid"),
            UniqueKey::DeviceCode => f.write_str("device_code"),
        }
    }
}

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unique constraint violated on {0}")]
    Conflict(UniqueKey),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence operations over devices and their one-to-one rows.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Device>>;

    async fn find_by_uuid(&self, device_uuid: &str) -> StoreResult<Option<Device>>;

    async fn find_by_code(&self, device_code: &str) -> StoreResult<Option<Device>>;

    /// Insert a pending device together with its default access row, atomically.
    async fn insert_pending(&self, new: &NewDevice) -> StoreResult<Device>;

    /// Overwrite non-`None` metadata fields and bump `last_seen_at`.
    async fn refresh_metadata(&self, id: Uuid, metadata: &DeviceMetadata) -> StoreResult<()>;

    async fn touch_last_seen(&self, id: Uuid) -> StoreResult<()>;

    /// Rebind a device to a new client uuid.
    async fn rebind_uuid(&self, id: Uuid, device_uuid: &str) -> StoreResult<()>;

    async fn set_status(&self, id: Uuid, status: DeviceStatus) -> StoreResult<()>;

    /// Set status active and upsert the access envelope as one atomic write.
    async fn activate_device(
        &self,
        id: Uuid,
        expires_at: Option<DateTime<Utc>>,
        max_streams: i32,
    ) -> StoreResult<()>;

    /// Delete a device and its access/upstream rows. Returns whether it existed.
    async fn delete_device(&self, id: Uuid) -> StoreResult<bool>;

    async fn get_access(&self, device_id: Uuid) -> StoreResult<Option<DeviceAccess>>;

    async fn upsert_access(
        &self,
        device_id: Uuid,
        expires_at: Option<DateTime<Utc>>,
        max_streams: i32,
    ) -> StoreResult<()>;

    /// Store (or clear, with `None`) the sealed adult PIN.
    async fn set_adult_pin(&self, device_id: Uuid, sealed_pin: Option<&str>) -> StoreResult<()>;

    async fn get_upstream(&self, device_id: Uuid) -> StoreResult<Option<DeviceUpstream>>;

    async fn upsert_upstream(
        &self,
        device_id: Uuid,
        base_url: Option<&str>,
        enc_username: &str,
        enc_password: &str,
    ) -> StoreResult<()>;
}
