//! Operator commands that talk to the database.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::info;
use sqlx::postgres::PgPoolOptions;
use tollgate_core::registry::{AccessUpdate, DeviceRegistry};
use tollgate_core::store::PgDeviceStore;
use tollgate_core::upstream::UpstreamResolver;
use tollgate_core::vault::Vault;

use crate::cli::{ActivateCmd, DbArgs, SetUpstreamCmd, SuspendCmd};
use crate::{Error, Result};

/// Run a command future on a single-threaded runtime.
pub fn block_on<F: Future<Output = Result<()>>>(future: F) -> Result<()> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(future)
}

async fn connect(db: &DbArgs) -> Result<Arc<PgDeviceStore>> {
    let url = db
        .database_url
        .as_deref()
        .ok_or_else(|| Error::Custom("DATABASE_URL is not set".into()))?;
    let pool = PgPoolOptions::new().max_connections(1).connect(url).await?;
    tollgate_core::migrate::migrate(&pool).await?;
    Ok(Arc::new(PgDeviceStore::new(pool)))
}

/// Expiry `days` from now, rejecting values past chrono's range.
fn expiry_after_days(days: u32) -> Result<DateTime<Utc>> {
    Duration::try_days(i64::from(days))
        .and_then(|span| Utc::now().checked_add_signed(span))
        .ok_or_else(|| Error::Custom(format!("--days {days} is out of range")))
}

pub async fn activate(db: &DbArgs, cmd: ActivateCmd) -> Result<()> {
    let expires_at = match cmd.days {
        Some(days) => Some(expiry_after_days(days)?),
        None => cmd.expires_at,
    };
    let registry = DeviceRegistry::new(connect(db).await?);
    let device = registry
        .activate(
            &cmd.code,
            &AccessUpdate {
                expires_at,
                max_streams: cmd.max_streams,
            },
        )
        .await?;
    info!(
        "{} is {} (expires: {})",
        device.device_code,
        device.status,
        expires_at.map_or_else(|| "never".to_string(), |t| t.to_rfc3339())
    );
    Ok(())
}

pub async fn suspend(db: &DbArgs, cmd: SuspendCmd) -> Result<()> {
    let registry = DeviceRegistry::new(connect(db).await?);
    let device = registry.suspend(&cmd.code).await?;
    info!("{} is {}", device.device_code, device.status);
    Ok(())
}

pub async fn set_upstream(db: &DbArgs, cmd: SetUpstreamCmd) -> Result<()> {
    let enc_key = cmd
        .enc_key
        .as_deref()
        .ok_or_else(|| Error::Custom("ENC_KEY_BASE64 is not set".into()))?;
    let vault = Arc::new(Vault::from_base64_key(enc_key)?);

    let store = connect(db).await?;
    let registry = DeviceRegistry::new(store.clone());
    let device = registry.find_by_code(&cmd.code).await?;

    let resolver = UpstreamResolver::new(store, vault, cmd.default_base_url);
    resolver
        .store_credentials(
            device.id,
            cmd.base_url.as_deref(),
            &cmd.username,
            &cmd.password,
        )
        .await?;
    info!("stored upstream credentials for {}", device.device_code);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_days_from_now() {
        let expiry = expiry_after_days(30).unwrap();
        let days = (expiry - Utc::now()).num_days();
        assert!((29..=30).contains(&days));
    }

    #[test]
    fn huge_day_count_is_an_error() {
        assert!(matches!(
            expiry_after_days(4_000_000_000),
            Err(Error::Custom(_))
        ));
    }
}
