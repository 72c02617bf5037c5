//! In-memory device store.
//!
//! Same uniqueness semantics as the Postgres store: every mutation that can
//! collide checks `device_uuid`/`device_code` under the write lock.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DeviceStore, StoreError, StoreResult, UniqueKey};
use crate::models::device::{
    Device, DeviceAccess, DeviceMetadata, DeviceStatus, DeviceUpstream, NewDevice,
};

#[derive(Debug, Default)]
struct Tables {
    devices: HashMap<Uuid, Device>,
    access: HashMap<Uuid, DeviceAccess>,
    upstream: HashMap<Uuid, DeviceUpstream>,
}

impl Tables {
    fn uuid_taken(&self, device_uuid: &str, except: Option<Uuid>) -> bool {
        self.devices
            .values()
            .any(|d| d.device_uuid == device_uuid && Some(d.id) != except)
    }

    fn code_taken(&self, device_code: &str) -> bool {
        self.devices.values().any(|d| d.device_code == device_code)
    }
}

/// Device store held entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryDeviceStore {
    tables: RwLock<Tables>,
}

impl MemoryDeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored devices.
    pub async fn device_count(&self) -> usize {
        self.tables.read().await.devices.len()
    }
}

#[async_trait]
impl DeviceStore for MemoryDeviceStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Device>> {
        Ok(self.tables.read().await.devices.get(&id).cloned())
    }

    async fn find_by_uuid(&self, device_uuid: &str) -> StoreResult<Option<Device>> {
        let tables = self.tables.read().await;
        Ok(tables
            .devices
            .values()
            .find(|d| d.device_uuid == device_uuid)
            .cloned())
    }

    async fn find_by_code(&self, device_code: &str) -> StoreResult<Option<Device>> {
        let tables = self.tables.read().await;
        Ok(tables
            .devices
            .values()
            .find(|d| d.device_code == device_code)
            .cloned())
    }

    async fn insert_pending(&self, new: &NewDevice) -> StoreResult<Device> {
        let mut tables = self.tables.write().await;
        if tables.uuid_taken(&new.device_uuid, None) {
            return Err(StoreError::Conflict(UniqueKey::DeviceUuid));
        }
        if tables.code_taken(&new.device_code) {
            return Err(StoreError::Conflict(UniqueKey::DeviceCode));
        }

        let now = Utc::now();
        let device = Device {
            id: new.id,
            device_uuid: new.device_uuid.clone(),
            device_code: new.device_code.clone(),
            status: DeviceStatus::Pending,
            platform: new.metadata.platform.clone(),
            model: new.metadata.model.clone(),
            app_version: new.metadata.app_version.clone(),
            last_seen_at: Some(now),
            created_at: now,
            updated_at: now,
        };
        tables.devices.insert(device.id, device.clone());
        tables
            .access
            .entry(device.id)
            .or_insert_with(|| DeviceAccess::default_for(device.id));
        Ok(device)
    }

    async fn refresh_metadata(&self, id: Uuid, metadata: &DeviceMetadata) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(device) = tables.devices.get_mut(&id) {
            let now = Utc::now();
            if let Some(platform) = &metadata.platform {
                device.platform = Some(platform.clone());
            }
            if let Some(model) = &metadata.model {
                device.model = Some(model.clone());
            }
            if let Some(app_version) = &metadata.app_version {
                device.app_version = Some(app_version.clone());
            }
            device.last_seen_at = Some(now);
            device.updated_at = now;
        }
        Ok(())
    }

    async fn touch_last_seen(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(device) = tables.devices.get_mut(&id) {
            let now = Utc::now();
            device.last_seen_at = Some(now);
            device.updated_at = now;
        }
        Ok(())
    }

    async fn rebind_uuid(&self, id: Uuid, device_uuid: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.uuid_taken(device_uuid, Some(id)) {
            return Err(StoreError::Conflict(UniqueKey::DeviceUuid));
        }
        if let Some(device) = tables.devices.get_mut(&id) {
            device.device_uuid = device_uuid.to_string();
            device.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_status(&self, id: Uuid, status: DeviceStatus) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(device) = tables.devices.get_mut(&id) {
            device.status = status;
            device.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn activate_device(
        &self,
        id: Uuid,
        expires_at: Option<DateTime<Utc>>,
        max_streams: i32,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let Some(device) = tables.devices.get_mut(&id) else {
            return Ok(());
        };
        device.status = DeviceStatus::Active;
        device.updated_at = now;

        let access = tables
            .access
            .entry(id)
            .or_insert_with(|| DeviceAccess::default_for(id));
        access.expires_at = expires_at;
        access.max_streams = max_streams;
        access.updated_at = now;
        Ok(())
    }

    async fn delete_device(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        tables.access.remove(&id);
        tables.upstream.remove(&id);
        Ok(tables.devices.remove(&id).is_some())
    }

    async fn get_access(&self, device_id: Uuid) -> StoreResult<Option<DeviceAccess>> {
        Ok(self.tables.read().await.access.get(&device_id).cloned())
    }

    async fn upsert_access(
        &self,
        device_id: Uuid,
        expires_at: Option<DateTime<Utc>>,
        max_streams: i32,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let access = tables
            .access
            .entry(device_id)
            .or_insert_with(|| DeviceAccess::default_for(device_id));
        access.expires_at = expires_at;
        access.max_streams = max_streams;
        access.updated_at = Utc::now();
        Ok(())
    }

    async fn set_adult_pin(&self, device_id: Uuid, sealed_pin: Option<&str>) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let access = tables
            .access
            .entry(device_id)
            .or_insert_with(|| DeviceAccess::default_for(device_id));
        access.adult_pin = sealed_pin.map(str::to_string);
        access.updated_at = Utc::now();
        Ok(())
    }

    async fn get_upstream(&self, device_id: Uuid) -> StoreResult<Option<DeviceUpstream>> {
        Ok(self.tables.read().await.upstream.get(&device_id).cloned())
    }

    async fn upsert_upstream(
        &self,
        device_id: Uuid,
        base_url: Option<&str>,
        enc_username: &str,
        enc_password: &str,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let created_at = tables
            .upstream
            .get(&device_id)
            .map(|u| u.created_at)
            .unwrap_or(now);
        tables.upstream.insert(
            device_id,
            DeviceUpstream {
                device_id,
                upstream_base_url: base_url.map(str::to_string),
                enc_username: enc_username.to_string(),
                enc_password: enc_password.to_string(),
                created_at,
                updated_at: now,
            },
        );
        Ok(())
    }
}
