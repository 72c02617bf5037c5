//! Device lifecycle checks.
//!
//! Stored states are pending/active/suspended. Expiry is never stored: an
//! active device whose `expires_at` has passed is unusable from that moment,
//! checked here at every authenticate/authorize call.

use chrono::{DateTime, Utc};

use crate::auth::AuthError;
use crate::models::device::{DeviceAccess, DeviceStatus};

/// Check that a device may authenticate or be authorized right now.
pub fn check_usable(
    status: DeviceStatus,
    access: Option<&DeviceAccess>,
    now: DateTime<Utc>,
) -> Result<(), AuthError> {
    if status != DeviceStatus::Active {
        return Err(AuthError::NotActive);
    }
    if let Some(expires_at) = access.and_then(|a| a.expires_at)
        && expires_at < now
    {
        return Err(AuthError::Expired);
    }
    Ok(())
}

/// Whether a device is usable right now.
pub fn is_usable(
    status: DeviceStatus,
    access: Option<&DeviceAccess>,
    now: DateTime<Utc>,
) -> bool {
    check_usable(status, access, now).is_ok()
}
