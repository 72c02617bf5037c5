//! Device registry.
//!
//! Owns device records and their lifecycle: registration with collision-safe
//! code issuance, device authentication (including uuid rebinding), and the
//! operator transitions pending → active → suspended.
//!
//! Code issuance is an optimistic insert with a bounded retry: the store's
//! unique index on `device_code` decides, never a pre-check.

pub mod lifecycle;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::AuthError;
use crate::device_code::{CodeGenerator, RandomCodeGenerator, normalize_code};
use crate::models::device::{
    DEFAULT_MAX_STREAMS, Device, DeviceAccess, DeviceMetadata, DeviceStatus, NewDevice,
    new_device_id,
};
use crate::store::{DeviceStore, StoreError, UniqueKey};

pub use lifecycle::{check_usable, is_usable};

/// Maximum number of code draws before giving up.
pub const MAX_CODE_ATTEMPTS: usize = 10;

const DEVICE_UUID_MIN_LEN: usize = 8;
const DEVICE_UUID_MAX_LEN: usize = 64;
const PLATFORM_MAX_LEN: usize = 32;
const MODEL_MAX_LEN: usize = 80;
const APP_VERSION_MAX_LEN: usize = 32;

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Device not found: {0}")]
    NotFound(String),

    #[error("Device code space exhausted after {0} attempts")]
    CodeSpaceExhausted(usize),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// Registration input as reported by the client.
#[derive(Debug, Clone, Default)]
pub struct RegisterDevice {
    pub device_uuid: String,
    pub platform: Option<String>,
    pub model: Option<String>,
    pub app_version: Option<String>,
}

/// Outcome of a registration: the device's code and current status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub device_code: String,
    pub status: DeviceStatus,
    /// False when an existing device was refreshed.
    pub created: bool,
}

/// A device that passed authentication or authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedDevice {
    pub device_id: Uuid,
    pub device_code: String,
    /// Live value from `device_access`.
    pub max_streams: i32,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Operator update to a device's access envelope. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct AccessUpdate {
    pub expires_at: Option<DateTime<Utc>>,
    pub max_streams: Option<i32>,
}

/// Device plus its access envelope.
#[derive(Debug, Clone)]
pub struct DeviceProfile {
    pub device: Device,
    pub access: DeviceAccess,
}

/// Trim and length-check the client-reported uuid.
fn normalize_uuid(raw: &str) -> Result<String, String> {
    let uuid = raw.trim();
    if uuid.is_empty() {
        return Err("device_uuid required".into());
    }
    let len = uuid.chars().count();
    if !(DEVICE_UUID_MIN_LEN..=DEVICE_UUID_MAX_LEN).contains(&len) {
        return Err(format!(
            "device_uuid must be {DEVICE_UUID_MIN_LEN}-{DEVICE_UUID_MAX_LEN} characters"
        ));
    }
    Ok(uuid.to_string())
}

fn normalize_field(raw: Option<&str>, max: usize) -> Option<String> {
    let value = raw?.trim();
    if value.is_empty() {
        return None;
    }
    Some(value.chars().take(max).collect())
}

fn validate_max_streams(max_streams: i32) -> Result<i32, RegistryError> {
    if max_streams < 1 {
        return Err(RegistryError::ValidationError(
            "max_streams must be a positive integer".into(),
        ));
    }
    Ok(max_streams)
}

/// Device registry over a [`DeviceStore`].
pub struct DeviceRegistry {
    store: Arc<dyn DeviceStore>,
    codes: Arc<dyn CodeGenerator>,
}

impl DeviceRegistry {
    /// Registry drawing random codes.
    pub fn new(store: Arc<dyn DeviceStore>) -> Self {
        Self::with_code_generator(store, Arc::new(RandomCodeGenerator))
    }

    pub fn with_code_generator(store: Arc<dyn DeviceStore>, codes: Arc<dyn CodeGenerator>) -> Self {
        Self { store, codes }
    }

    /// Register a device, or refresh it if its uuid is already known.
    pub async fn register(&self, input: &RegisterDevice) -> Result<Registration, RegistryError> {
        let device_uuid =
            normalize_uuid(&input.device_uuid).map_err(RegistryError::ValidationError)?;
        let metadata = DeviceMetadata {
            platform: normalize_field(input.platform.as_deref(), PLATFORM_MAX_LEN),
            model: normalize_field(input.model.as_deref(), MODEL_MAX_LEN),
            app_version: normalize_field(input.app_version.as_deref(), APP_VERSION_MAX_LEN),
        };

        if let Some(existing) = self.store.find_by_uuid(&device_uuid).await? {
            return self.refresh(existing, &metadata).await;
        }

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let new = NewDevice {
                id: new_device_id(),
                device_uuid: device_uuid.clone(),
                device_code: self.codes.next_code(),
                metadata: metadata.clone(),
            };
            match self.store.insert_pending(&new).await {
                Ok(device) => {
                    info!(
                        device_id = %device.id,
                        device_code = %device.device_code,
                        attempt,
                        "registered new pending device"
                    );
                    return Ok(Registration {
                        device_code: device.device_code,
                        status: device.status,
                        created: true,
                    });
                }
                Err(StoreError::Conflict(UniqueKey::DeviceCode)) => {
                    debug!(attempt, "device code collision, drawing again");
                }
                Err(StoreError::Conflict(UniqueKey::DeviceUuid)) => {
                    // A concurrent register for the same uuid won the insert.
                    let existing = self.store.find_by_uuid(&device_uuid).await?.ok_or_else(
                        || RegistryError::NotFound(format!("device_uuid {device_uuid}")),
                    )?;
                    return self.refresh(existing, &metadata).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(attempts = MAX_CODE_ATTEMPTS, "device code space exhausted");
        Err(RegistryError::CodeSpaceExhausted(MAX_CODE_ATTEMPTS))
    }

    async fn refresh(
        &self,
        existing: Device,
        metadata: &DeviceMetadata,
    ) -> Result<Registration, RegistryError> {
        self.store.refresh_metadata(existing.id, metadata).await?;
        debug!(device_id = %existing.id, "re-registration refreshed device metadata");
        Ok(Registration {
            device_code: existing.device_code,
            status: existing.status,
            created: false,
        })
    }

    /// Authenticate a device by its uuid and code.
    ///
    /// When the code's stored uuid differs from the presented one, the device is
    /// rebound to the presented uuid. A pending device already holding that uuid
    /// is discarded; an active or suspended one fails with `UuidInUse`.
    pub async fn authenticate(
        &self,
        device_uuid: &str,
        device_code: &str,
    ) -> Result<AuthenticatedDevice, AuthError> {
        let device_uuid = normalize_uuid(device_uuid).map_err(AuthError::ValidationError)?;
        let device_code = normalize_code(device_code);
        if device_code.is_empty() {
            return Err(AuthError::ValidationError("device_code required".into()));
        }

        let device = self
            .store
            .find_by_code(&device_code)
            .await?
            .ok_or(AuthError::NotRegistered)?;
        let access = self.store.get_access(device.id).await?;
        check_usable(device.status, access.as_ref(), Utc::now())?;

        if device.device_uuid != device_uuid {
            self.rebind(&device, &device_uuid).await?;
        }
        self.store.touch_last_seen(device.id).await?;

        let access = access.unwrap_or_else(|| DeviceAccess::default_for(device.id));
        Ok(AuthenticatedDevice {
            device_id: device.id,
            device_code: device.device_code,
            max_streams: access.max_streams,
            expires_at: access.expires_at,
        })
    }

    async fn rebind(&self, device: &Device, device_uuid: &str) -> Result<(), AuthError> {
        if let Some(holder) = self.store.find_by_uuid(device_uuid).await?
            && holder.id != device.id
        {
            if holder.status != DeviceStatus::Pending {
                return Err(AuthError::UuidInUse);
            }
            warn!(
                discarded_device_id = %holder.id,
                discarded_device_code = %holder.device_code,
                device_id = %device.id,
                "discarding orphaned pending device during uuid rebind"
            );
            self.store.delete_device(holder.id).await?;
        }

        match self.store.rebind_uuid(device.id, device_uuid).await {
            Ok(()) => {
                info!(
                    device_id = %device.id,
                    previous_uuid = %device.device_uuid,
                    "device rebound to new uuid"
                );
                Ok(())
            }
            Err(StoreError::Conflict(_)) => Err(AuthError::UuidInUse),
            Err(e) => Err(e.into()),
        }
    }

    /// Re-check a device at request time, returning the live entitlement.
    pub async fn authorize(&self, device_id: Uuid) -> Result<AuthenticatedDevice, AuthError> {
        let device = self
            .store
            .find_by_id(device_id)
            .await?
            .ok_or(AuthError::NotRegistered)?;
        let access = self.store.get_access(device.id).await?;
        check_usable(device.status, access.as_ref(), Utc::now())?;

        let access = access.unwrap_or_else(|| DeviceAccess::default_for(device.id));
        Ok(AuthenticatedDevice {
            device_id: device.id,
            device_code: device.device_code,
            max_streams: access.max_streams,
            expires_at: access.expires_at,
        })
    }

    /// Look up a device by its (human-typed) code.
    pub async fn find_by_code(&self, device_code: &str) -> Result<Device, RegistryError> {
        let code = normalize_code(device_code);
        if code.is_empty() {
            return Err(RegistryError::ValidationError("device code required".into()));
        }
        self.store
            .find_by_code(&code)
            .await?
            .ok_or_else(|| RegistryError::NotFound(code.clone()))
    }

    /// Device record plus access envelope.
    pub async fn profile(&self, device_id: Uuid) -> Result<DeviceProfile, RegistryError> {
        let device = self
            .store
            .find_by_id(device_id)
            .await?
            .ok_or_else(|| RegistryError::NotFound(device_id.to_string()))?;
        let access = self
            .store
            .get_access(device_id)
            .await?
            .unwrap_or_else(|| DeviceAccess::default_for(device_id));
        Ok(DeviceProfile { device, access })
    }

    /// Operator: approve a device and set its access envelope.
    ///
    /// `max_streams` defaults to 1; `expires_at` of `None` means open-ended.
    pub async fn activate(
        &self,
        device_code: &str,
        update: &AccessUpdate,
    ) -> Result<Device, RegistryError> {
        let device = self.find_by_code(device_code).await?;
        let max_streams = validate_max_streams(update.max_streams.unwrap_or(DEFAULT_MAX_STREAMS))?;

        self.store
            .activate_device(device.id, update.expires_at, max_streams)
            .await?;
        info!(
            device_id = %device.id,
            device_code = %device.device_code,
            from = %device.status,
            max_streams,
            "device activated"
        );
        Ok(Device {
            status: DeviceStatus::Active,
            ..device
        })
    }

    /// Operator: suspend a device. Outstanding session tokens stop working at
    /// their next authorization.
    pub async fn suspend(&self, device_code: &str) -> Result<Device, RegistryError> {
        let device = self.find_by_code(device_code).await?;
        self.store
            .set_status(device.id, DeviceStatus::Suspended)
            .await?;
        info!(
            device_id = %device.id,
            device_code = %device.device_code,
            from = %device.status,
            "device suspended"
        );
        Ok(Device {
            status: DeviceStatus::Suspended,
            ..device
        })
    }

    /// Operator: change the access envelope without touching status.
    pub async fn set_access(
        &self,
        device_code: &str,
        update: &AccessUpdate,
    ) -> Result<DeviceAccess, RegistryError> {
        if update.expires_at.is_none() && update.max_streams.is_none() {
            return Err(RegistryError::ValidationError("no fields to update".into()));
        }
        let device = self.find_by_code(device_code).await?;
        let current = self
            .store
            .get_access(device.id)
            .await?
            .unwrap_or_else(|| DeviceAccess::default_for(device.id));

        let expires_at = update.expires_at.or(current.expires_at);
        let max_streams = validate_max_streams(update.max_streams.unwrap_or(current.max_streams))?;
        self.store
            .upsert_access(device.id, expires_at, max_streams)
            .await?;
        info!(device_id = %device.id, max_streams, "device access updated");

        Ok(DeviceAccess {
            expires_at,
            max_streams,
            updated_at: Utc::now(),
            ..current
        })
    }

    /// Operator: delete a device and everything attached to it.
    pub async fn delete(&self, device_code: &str) -> Result<(), RegistryError> {
        let device = self.find_by_code(device_code).await?;
        if !self.store.delete_device(device.id).await? {
            return Err(RegistryError::NotFound(device.device_code));
        }
        info!(device_id = %device.id, device_code = %device.device_code, "device deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::Duration;

    use super::*;
    use crate::models::device::DeviceUpstream;
    use crate::store::{MemoryDeviceStore, StoreResult};

    /// Hands out a fixed sequence of codes, then repeats the last one.
    struct ScriptedCodes(Mutex<Vec<&'static str>>);

    impl ScriptedCodes {
        fn new(codes: &[&'static str]) -> Arc<Self> {
            let mut codes = codes.to_vec();
            codes.reverse();
            Arc::new(Self(Mutex::new(codes)))
        }
    }

    impl CodeGenerator for ScriptedCodes {
        fn next_code(&self) -> String {
            let mut codes = self.0.lock().unwrap();
            if codes.len() > 1 {
                codes.pop().unwrap().to_string()
            } else {
                codes[0].to_string()
            }
        }
    }

    /// Delegates to a memory store, with injectable faults.
    #[derive(Default)]
    struct InterceptingStore {
        inner: MemoryDeviceStore,
        /// Answer the next `find_by_uuid` with `None`, as if a concurrent
        /// register had not committed yet.
        miss_next_uuid_lookup: AtomicBool,
        fail_activation: AtomicBool,
    }

    #[async_trait]
    impl DeviceStore for InterceptingStore {
        async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Device>> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_uuid(&self, device_uuid: &str) -> StoreResult<Option<Device>> {
            if self.miss_next_uuid_lookup.swap(false, Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.find_by_uuid(device_uuid).await
        }

        async fn find_by_code(&self, device_code: &str) -> StoreResult<Option<Device>> {
            self.inner.find_by_code(device_code).await
        }

        async fn insert_pending(&self, new: &NewDevice) -> StoreResult<Device> {
            self.inner.insert_pending(new).await
        }

        async fn refresh_metadata(&self, id: Uuid, metadata: &DeviceMetadata) -> StoreResult<()> {
            self.inner.refresh_metadata(id, metadata).await
        }

        async fn touch_last_seen(&self, id: Uuid) -> StoreResult<()> {
            self.inner.touch_last_seen(id).await
        }

        async fn rebind_uuid(&self, id: Uuid, device_uuid: &str) -> StoreResult<()> {
            self.inner.rebind_uuid(id, device_uuid).await
        }

        async fn set_status(&self, id: Uuid, status: DeviceStatus) -> StoreResult<()> {
            self.inner.set_status(id, status).await
        }

        async fn activate_device(
            &self,
            id: Uuid,
            expires_at: Option<DateTime<Utc>>,
            max_streams: i32,
        ) -> StoreResult<()> {
            if self.fail_activation.load(Ordering::SeqCst) {
                return Err(StoreError::DbError(sqlx::Error::PoolTimedOut));
            }
            self.inner.activate_device(id, expires_at, max_streams).await
        }

        async fn delete_device(&self, id: Uuid) -> StoreResult<bool> {
            self.inner.delete_device(id).await
        }

        async fn get_access(&self, device_id: Uuid) -> StoreResult<Option<DeviceAccess>> {
            self.inner.get_access(device_id).await
        }

        async fn upsert_access(
            &self,
            device_id: Uuid,
            expires_at: Option<DateTime<Utc>>,
            max_streams: i32,
        ) -> StoreResult<()> {
            self.inner
                .upsert_access(device_id, expires_at, max_streams)
                .await
        }

        async fn set_adult_pin(
            &self,
            device_id: Uuid,
            sealed_pin: Option<&str>,
        ) -> StoreResult<()> {
            self.inner.set_adult_pin(device_id, sealed_pin).await
        }

        async fn get_upstream(&self, device_id: Uuid) -> StoreResult<Option<DeviceUpstream>> {
            self.inner.get_upstream(device_id).await
        }

        async fn upsert_upstream(
            &self,
            device_id: Uuid,
            base_url: Option<&str>,
            enc_username: &str,
            enc_password: &str,
        ) -> StoreResult<()> {
            self.inner
                .upsert_upstream(device_id, base_url, enc_username, enc_password)
                .await
        }
    }

    fn registry() -> (Arc<MemoryDeviceStore>, DeviceRegistry) {
        let store = Arc::new(MemoryDeviceStore::new());
        (store.clone(), DeviceRegistry::new(store))
    }

    fn register_input(uuid: &str) -> RegisterDevice {
        RegisterDevice {
            device_uuid: uuid.to_string(),
            platform: Some("android".into()),
            model: Some("Shield TV".into()),
            app_version: Some("1.0.0".into()),
        }
    }

    async fn active_device(registry: &DeviceRegistry, uuid: &str) -> String {
        let reg = registry.register(&register_input(uuid)).await.unwrap();
        registry
            .activate(&reg.device_code, &AccessUpdate::default())
            .await
            .unwrap();
        reg.device_code
    }

    #[tokio::test]
    async fn register_creates_pending_device() {
        let (store, registry) = registry();
        let reg = registry.register(&register_input("uuid-0001")).await.unwrap();
        assert_eq!(reg.status, DeviceStatus::Pending);
        assert_eq!(reg.device_code.len(), 6);
        assert!(reg.created);

        let device = store.find_by_code(&reg.device_code).await.unwrap().unwrap();
        let access = store.get_access(device.id).await.unwrap().unwrap();
        assert_eq!(access.max_streams, 1);
    }

    #[tokio::test]
    async fn re_registration_is_idempotent() {
        let (store, registry) = registry();
        let first = registry.register(&register_input("uuid-0001")).await.unwrap();

        let second = registry
            .register(&RegisterDevice {
                device_uuid: "  uuid-0001 ".into(),
                platform: None,
                model: Some("   ".into()),
                app_version: Some("2.0.0".into()),
            })
            .await
            .unwrap();

        assert_eq!(second.device_code, first.device_code);
        assert_eq!(second.status, first.status);
        assert!(!second.created);
        assert_eq!(store.device_count().await, 1);

        let device = store.find_by_uuid("uuid-0001").await.unwrap().unwrap();
        assert_eq!(device.platform.as_deref(), Some("android"));
        assert_eq!(device.model.as_deref(), Some("Shield TV"));
        assert_eq!(device.app_version.as_deref(), Some("2.0.0"));
    }

    #[tokio::test]
    async fn concurrent_register_of_same_uuid_takes_idempotent_path() {
        let store = Arc::new(InterceptingStore::default());
        let registry = DeviceRegistry::with_code_generator(
            store.clone(),
            ScriptedCodes::new(&["RACE01", "RACE02"]),
        );
        let first = registry.register(&register_input("uuid-race-1")).await.unwrap();
        assert_eq!(first.device_code, "RACE01");

        // The lookup misses, so the insert hits the uuid unique key instead.
        store.miss_next_uuid_lookup.store(true, Ordering::SeqCst);
        let second = registry.register(&register_input("uuid-race-1")).await.unwrap();

        assert_eq!(
            second,
            Registration {
                device_code: "RACE01".into(),
                status: DeviceStatus::Pending,
                created: false,
            }
        );
        assert_eq!(store.inner.device_count().await, 1);
    }

    #[tokio::test]
    async fn register_rejects_bad_uuid() {
        let (_, registry) = registry();
        for uuid in ["", "short", &"x".repeat(65)] {
            let err = registry.register(&register_input(uuid)).await.unwrap_err();
            assert!(matches!(err, RegistryError::ValidationError(_)));
        }
    }

    #[tokio::test]
    async fn metadata_is_truncated_to_column_width() {
        let (store, registry) = registry();
        let mut input = register_input("uuid-0001");
        input.model = Some("m".repeat(200));
        registry.register(&input).await.unwrap();
        let device = store.find_by_uuid("uuid-0001").await.unwrap().unwrap();
        assert_eq!(device.model.unwrap().len(), MODEL_MAX_LEN);
    }

    #[tokio::test]
    async fn code_collision_retries_with_new_code() {
        let store = Arc::new(MemoryDeviceStore::new());
        let registry = DeviceRegistry::with_code_generator(
            store.clone(),
            ScriptedCodes::new(&["AAAAAA", "AAAAAA", "AAAAAA", "BBBBBB"]),
        );

        let first = registry.register(&register_input("uuid-0001")).await.unwrap();
        let second = registry.register(&register_input("uuid-0002")).await.unwrap();
        assert_eq!(first.device_code, "AAAAAA");
        assert_eq!(second.device_code, "BBBBBB");
    }

    #[tokio::test]
    async fn exhausted_code_space_fails() {
        let store = Arc::new(MemoryDeviceStore::new());
        let registry =
            DeviceRegistry::with_code_generator(store.clone(), ScriptedCodes::new(&["AAAAAA"]));

        registry.register(&register_input("uuid-0001")).await.unwrap();
        let err = registry
            .register(&register_input("uuid-0002"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::CodeSpaceExhausted(MAX_CODE_ATTEMPTS)
        ));
        assert_eq!(store.device_count().await, 1);
    }

    #[tokio::test]
    async fn authenticate_requires_active_status() {
        let (_, registry) = registry();
        let reg = registry.register(&register_input("uuid-0001")).await.unwrap();

        let err = registry
            .authenticate("uuid-0001", &reg.device_code)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotActive));

        registry
            .activate(&reg.device_code, &AccessUpdate::default())
            .await
            .unwrap();
        let device = registry
            .authenticate("uuid-0001", &reg.device_code.to_lowercase())
            .await
            .unwrap();
        assert_eq!(device.max_streams, 1);

        registry.suspend(&reg.device_code).await.unwrap();
        let err = registry
            .authenticate("uuid-0001", &reg.device_code)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotActive));
    }

    #[tokio::test]
    async fn authenticate_unknown_code_is_not_registered() {
        let (_, registry) = registry();
        let err = registry
            .authenticate("uuid-0001", "ZZZZZZ")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotRegistered));
    }

    #[tokio::test]
    async fn authenticate_rejects_expired_access() {
        let (_, registry) = registry();
        let reg = registry.register(&register_input("uuid-0001")).await.unwrap();
        registry
            .activate(
                &reg.device_code,
                &AccessUpdate {
                    expires_at: Some(Utc::now() - Duration::hours(1)),
                    max_streams: Some(2),
                },
            )
            .await
            .unwrap();

        let err = registry
            .authenticate("uuid-0001", &reg.device_code)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Expired));
    }

    #[tokio::test]
    async fn same_uuid_authentication_is_unaffected() {
        let (store, registry) = registry();
        let code = active_device(&registry, "uuid-aaaa").await;
        // Re-registering the same uuid refreshes, it never creates a second row.
        registry.register(&register_input("uuid-aaaa")).await.unwrap();

        let device = registry.authenticate("uuid-aaaa", &code).await.unwrap();
        assert_eq!(device.device_code, code);
        assert_eq!(store.device_count().await, 1);
    }

    #[tokio::test]
    async fn rebind_discards_pending_holder_of_new_uuid() {
        let (store, registry) = registry();
        let code = active_device(&registry, "uuid-aaaa").await;
        let orphan = registry.register(&register_input("uuid-bbbb")).await.unwrap();
        assert_eq!(orphan.status, DeviceStatus::Pending);

        let device = registry.authenticate("uuid-bbbb", &code).await.unwrap();

        let rebound = store.find_by_id(device.device_id).await.unwrap().unwrap();
        assert_eq!(rebound.device_uuid, "uuid-bbbb");
        assert!(store.find_by_code(&orphan.device_code).await.unwrap().is_none());
        assert_eq!(store.device_count().await, 1);
    }

    #[tokio::test]
    async fn rebind_to_uuid_of_active_device_fails() {
        let (store, registry) = registry();
        let code_a = active_device(&registry, "uuid-aaaa").await;
        active_device(&registry, "uuid-cccc").await;
        // An unrelated pending device is left alone.
        registry.register(&register_input("uuid-pending")).await.unwrap();

        let err = registry
            .authenticate("uuid-cccc", &code_a)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UuidInUse));

        let a = store.find_by_code(&code_a).await.unwrap().unwrap();
        assert_eq!(a.device_uuid, "uuid-aaaa");
        assert_eq!(store.device_count().await, 3);
    }

    #[tokio::test]
    async fn rebind_to_uuid_of_suspended_device_fails() {
        let (_, registry) = registry();
        let code_a = active_device(&registry, "uuid-aaaa").await;
        let code_b = active_device(&registry, "uuid-bbbb").await;
        registry.suspend(&code_b).await.unwrap();

        let err = registry
            .authenticate("uuid-bbbb", &code_a)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UuidInUse));
    }

    #[tokio::test]
    async fn authorize_reads_live_access() {
        let (_, registry) = registry();
        let code = active_device(&registry, "uuid-aaaa").await;
        let device = registry.authenticate("uuid-aaaa", &code).await.unwrap();

        registry
            .set_access(
                &code,
                &AccessUpdate {
                    expires_at: None,
                    max_streams: Some(4),
                },
            )
            .await
            .unwrap();
        let live = registry.authorize(device.device_id).await.unwrap();
        assert_eq!(live.max_streams, 4);

        registry.suspend(&code).await.unwrap();
        assert!(matches!(
            registry.authorize(device.device_id).await,
            Err(AuthError::NotActive)
        ));
    }

    #[tokio::test]
    async fn set_access_keeps_unspecified_fields() {
        let (_, registry) = registry();
        let code = active_device(&registry, "uuid-aaaa").await;
        let expiry = Utc::now() + Duration::days(30);

        registry
            .set_access(
                &code,
                &AccessUpdate {
                    expires_at: Some(expiry),
                    max_streams: Some(3),
                },
            )
            .await
            .unwrap();
        let access = registry
            .set_access(
                &code,
                &AccessUpdate {
                    expires_at: None,
                    max_streams: Some(2),
                },
            )
            .await
            .unwrap();
        assert_eq!(access.expires_at, Some(expiry));
        assert_eq!(access.max_streams, 2);

        let err = registry
            .set_access(&code, &AccessUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::ValidationError(_)));
    }

    #[tokio::test]
    async fn activate_rejects_non_positive_streams() {
        let (_, registry) = registry();
        let reg = registry.register(&register_input("uuid-0001")).await.unwrap();
        let err = registry
            .activate(
                &reg.device_code,
                &AccessUpdate {
                    expires_at: None,
                    max_streams: Some(0),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::ValidationError(_)));
    }

    #[tokio::test]
    async fn failed_activation_leaves_device_untouched() {
        let store = Arc::new(InterceptingStore::default());
        let registry = DeviceRegistry::new(store.clone());
        let reg = registry.register(&register_input("uuid-0001")).await.unwrap();

        store.fail_activation.store(true, Ordering::SeqCst);
        let err = registry
            .activate(
                &reg.device_code,
                &AccessUpdate {
                    expires_at: None,
                    max_streams: Some(4),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::Store(_)));

        let device = store.find_by_code(&reg.device_code).await.unwrap().unwrap();
        assert_eq!(device.status, DeviceStatus::Pending);
        let access = store.get_access(device.id).await.unwrap().unwrap();
        assert_eq!(access.max_streams, 1);
    }

    #[tokio::test]
    async fn operator_actions_on_unknown_code_are_not_found() {
        let (_, registry) = registry();
        assert!(matches!(
            registry.suspend("ZZZZZZ").await,
            Err(RegistryError::NotFound(_))
        ));
        assert!(matches!(
            registry.delete("ZZZZZZ").await,
            Err(RegistryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_removes_device() {
        let (store, registry) = registry();
        let reg = registry.register(&register_input("uuid-0001")).await.unwrap();
        registry.delete(&reg.device_code).await.unwrap();
        assert_eq!(store.device_count().await, 0);
    }
}
