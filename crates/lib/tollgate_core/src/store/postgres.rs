//! PostgreSQL-backed device store.
//!
//! Raw SQLx queries against the tables created by the embedded migrations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{DeviceStore, StoreError, StoreResult, UniqueKey};
use crate::models::device::{
    DEFAULT_MAX_STREAMS, Device, DeviceAccess, DeviceMetadata, DeviceStatus, DeviceUpstream,
    NewDevice,
};

const DEVICE_COLUMNS: &str = "id, device_uuid, device_code, status, platform, model, \
     app_version, last_seen_at, created_at, updated_at";

/// Device store over a Postgres connection pool.
#[derive(Debug, Clone)]
pub struct PgDeviceStore {
    pool: PgPool,
}

impl PgDeviceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Convert a unique violation on `devices` into a typed conflict.
fn map_unique_violation(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e
        && db.is_unique_violation()
    {
        match db.constraint() {
            Some("devices_device_uuid_key") => return StoreError::Conflict(UniqueKey::DeviceUuid),
            Some("devices_device_code_key") => return StoreError::Conflict(UniqueKey::DeviceCode),
            _ => {}
        }
    }
    StoreError::DbError(e)
}

#[async_trait]
impl DeviceStore for PgDeviceStore {
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Device>> {
        let row = sqlx::query_as::<_, Device>(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_by_uuid(&self, device_uuid: &str) -> StoreResult<Option<Device>> {
        let row = sqlx::query_as::<_, Device>(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices WHERE device_uuid = $1"
        ))
        .bind(device_uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_by_code(&self, device_code: &str) -> StoreResult<Option<Device>> {
        let row = sqlx::query_as::<_, Device>(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices WHERE device_code = $1"
        ))
        .bind(device_code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert_pending(&self, new: &NewDevice) -> StoreResult<Device> {
        let mut tx = self.pool.begin().await?;

        let device = sqlx::query_as::<_, Device>(&format!(
            "INSERT INTO devices \
               (id, device_uuid, device_code, status, platform, model, app_version, last_seen_at) \
             VALUES ($1, $2, $3, 'pending', $4, $5, $6, now()) \
             RETURNING {DEVICE_COLUMNS}"
        ))
        .bind(new.id)
        .bind(&new.device_uuid)
        .bind(&new.device_code)
        .bind(new.metadata.platform.as_deref())
        .bind(new.metadata.model.as_deref())
        .bind(new.metadata.app_version.as_deref())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        sqlx::query(
            "INSERT INTO device_access (device_id, max_streams) VALUES ($1, $2) \
             ON CONFLICT (device_id) DO UPDATE SET updated_at = now()",
        )
        .bind(device.id)
        .bind(DEFAULT_MAX_STREAMS)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(device)
    }

    async fn refresh_metadata(&self, id: Uuid, metadata: &DeviceMetadata) -> StoreResult<()> {
        sqlx::query(
            "UPDATE devices \
             SET last_seen_at = now(), updated_at = now(), \
                 platform = COALESCE($2, platform), \
                 model = COALESCE($3, model), \
                 app_version = COALESCE($4, app_version) \
             WHERE id = $1",
        )
        .bind(id)
        .bind(metadata.platform.as_deref())
        .bind(metadata.model.as_deref())
        .bind(metadata.app_version.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn touch_last_seen(&self, id: Uuid) -> StoreResult<()> {
        sqlx::query("UPDATE devices SET last_seen_at = now(), updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn rebind_uuid(&self, id: Uuid, device_uuid: &str) -> StoreResult<()> {
        sqlx::query("UPDATE devices SET device_uuid = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(device_uuid)
            .execute(&self.pool)
            .await
            .map_err(map_unique_violation)?;
        Ok(())
    }

    async fn set_status(&self, id: Uuid, status: DeviceStatus) -> StoreResult<()> {
        sqlx::query("UPDATE devices SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn activate_device(
        &self,
        id: Uuid,
        expires_at: Option<DateTime<Utc>>,
        max_streams: i32,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE devices SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(DeviceStatus::Active)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO device_access (device_id, expires_at, max_streams) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (device_id) DO UPDATE SET \
               expires_at = EXCLUDED.expires_at, \
               max_streams = EXCLUDED.max_streams, \
               updated_at = now()",
        )
        .bind(id)
        .bind(expires_at)
        .bind(max_streams)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_device(&self, id: Uuid) -> StoreResult<bool> {
        // access and upstream rows go with it (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM devices WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_access(&self, device_id: Uuid) -> StoreResult<Option<DeviceAccess>> {
        let row = sqlx::query_as::<_, DeviceAccess>(
            "SELECT device_id, expires_at, max_streams, adult_pin, updated_at \
             FROM device_access WHERE device_id = $1",
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn upsert_access(
        &self,
        device_id: Uuid,
        expires_at: Option<DateTime<Utc>>,
        max_streams: i32,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO device_access (device_id, expires_at, max_streams) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (device_id) DO UPDATE SET \
               expires_at = EXCLUDED.expires_at, \
               max_streams = EXCLUDED.max_streams, \
               updated_at = now()",
        )
        .bind(device_id)
        .bind(expires_at)
        .bind(max_streams)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_adult_pin(&self, device_id: Uuid, sealed_pin: Option<&str>) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO device_access (device_id, max_streams, adult_pin) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (device_id) DO UPDATE SET \
               adult_pin = EXCLUDED.adult_pin, \
               updated_at = now()",
        )
        .bind(device_id)
        .bind(DEFAULT_MAX_STREAMS)
        .bind(sealed_pin)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_upstream(&self, device_id: Uuid) -> StoreResult<Option<DeviceUpstream>> {
        let row = sqlx::query_as::<_, DeviceUpstream>(
            "SELECT device_id, upstream_base_url, enc_username, enc_password, \
                    created_at, updated_at \
             FROM device_upstream WHERE device_id = $1",
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn upsert_upstream(
        &self,
        device_id: Uuid,
        base_url: Option<&str>,
        enc_username: &str,
        enc_password: &str,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO device_upstream (device_id, upstream_base_url, enc_username, enc_password) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (device_id) DO UPDATE SET \
               upstream_base_url = EXCLUDED.upstream_base_url, \
               enc_username = EXCLUDED.enc_username, \
               enc_password = EXCLUDED.enc_password, \
               updated_at = now()",
        )
        .bind(device_id)
        .bind(base_url)
        .bind(enc_username)
        .bind(enc_password)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
