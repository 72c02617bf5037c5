//! Device session tokens.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::AuthError;
use super::keys::{ScopedClaims, TokenKeys};
use crate::registry::{AuthenticatedDevice, DeviceRegistry};

/// Session token lifetime: 12 hours.
pub const SESSION_TOKEN_EXPIRY_SECS: i64 = 12 * 60 * 60;

/// Claims carried by a device session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub device_id: Uuid,
    pub device_code: String,
    /// Entitlement at mint time. Request-time checks use the live value.
    pub max_streams: i32,
    pub aud: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

impl ScopedClaims for SessionClaims {
    const AUDIENCE: &'static str = "device-session";
    const ISSUER: &'static str = "tollgate";
}

/// Result of a successful device login.
#[derive(Debug, Clone)]
pub struct SessionGrant {
    pub access_token: String,
    pub token_expires_at: DateTime<Utc>,
    pub max_streams: i32,
    /// Access expiry, `None` when open-ended.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Issues and checks session tokens on top of the device registry.
#[derive(Clone)]
pub struct SessionAuthenticator {
    registry: Arc<DeviceRegistry>,
    keys: Arc<TokenKeys>,
}

impl SessionAuthenticator {
    pub fn new(registry: Arc<DeviceRegistry>, keys: Arc<TokenKeys>) -> Self {
        Self { registry, keys }
    }

    /// Authenticate by uuid + code and mint a session token.
    pub async fn login(
        &self,
        device_uuid: &str,
        device_code: &str,
    ) -> Result<SessionGrant, AuthError> {
        let device = self.registry.authenticate(device_uuid, device_code).await?;
        let (access_token, token_expires_at) = self.mint(&device)?;
        debug!(device_id = %device.device_id, "issued session token");
        Ok(SessionGrant {
            access_token,
            token_expires_at,
            max_streams: device.max_streams,
            expires_at: device.expires_at,
        })
    }

    /// Sign a session token for an authenticated device.
    pub fn mint(&self, device: &AuthenticatedDevice) -> Result<(String, DateTime<Utc>), AuthError> {
        let now = Utc::now();
        let expires_at = now + Duration::seconds(SESSION_TOKEN_EXPIRY_SECS);
        let claims = SessionClaims {
            device_id: device.device_id,
            device_code: device.device_code.clone(),
            max_streams: device.max_streams,
            aud: SessionClaims::AUDIENCE.to_string(),
            iss: SessionClaims::ISSUER.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = self
            .keys
            .sign(&claims)
            .map_err(|e| AuthError::TokenError(format!("jwt encode: {e}")))?;
        Ok((token, expires_at))
    }

    /// Verify signature, audience, and expiry. Does not consult the registry.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, AuthError> {
        self.keys
            .verify::<SessionClaims>(token)
            .map_err(|_| AuthError::InvalidToken)
    }

    /// Verify a bearer token and re-check the device's current state.
    ///
    /// A device suspended or expired after minting is rejected here even
    /// though its token is still cryptographically valid.
    pub async fn authorize(&self, token: &str) -> Result<AuthenticatedDevice, AuthError> {
        let claims = self.verify(token)?;
        self.registry.authorize(claims.device_id).await
    }
}
