//! Device domain models.
//!
//! Row structs map 1:1 onto the `devices`, `device_access`, and
//! `device_upstream` tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default concurrent stream entitlement for a new device.
pub const DEFAULT_MAX_STREAMS: i32 = 1;

/// Stored lifecycle state. Expiry is evaluated lazily and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "device_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Pending,
    Active,
    Suspended,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Pending => "pending",
            DeviceStatus::Active => "active",
            DeviceStatus::Suspended => "suspended",
        }
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database row for `devices`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Device {
    pub id: Uuid,
    pub device_uuid: String,
    pub device_code: String,
    pub status: DeviceStatus,
    pub platform: Option<String>,
    pub model: Option<String>,
    pub app_version: Option<String>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database row for `device_access`.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct DeviceAccess {
    pub device_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_streams: i32,
    /// Vault ciphertext of the 4-digit adult PIN.
    pub adult_pin: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl DeviceAccess {
    /// Access envelope a device gets when none has been stored.
    pub fn default_for(device_id: Uuid) -> Self {
        Self {
            device_id,
            expires_at: None,
            max_streams: DEFAULT_MAX_STREAMS,
            adult_pin: None,
            updated_at: Utc::now(),
        }
    }
}

/// Database row for `device_upstream`. Credentials are vault ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct DeviceUpstream {
    pub device_id: Uuid,
    pub upstream_base_url: Option<String>,
    pub enc_username: String,
    pub enc_password: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Client-reported metadata. `None` fields leave stored values untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceMetadata {
    pub platform: Option<String>,
    pub model: Option<String>,
    pub app_version: Option<String>,
}

/// Insert payload for a new pending device.
#[derive(Debug, Clone)]
pub struct NewDevice {
    pub id: Uuid,
    pub device_uuid: String,
    pub device_code: String,
    pub metadata: DeviceMetadata,
}

/// Generate a new device id (UUIDv7, timestamp-sortable).
pub fn new_device_id() -> Uuid {
    Uuid::now_v7()
}
