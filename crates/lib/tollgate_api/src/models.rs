//! Request and response bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tollgate_core::models::device::DeviceStatus;

/// Error body rendered by [`AppError`](crate::error::AppError).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Clients send identifiers and PINs either as JSON strings or numbers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TextOrNumber {
    Text(String),
    Number(u64),
}

impl TextOrNumber {
    pub fn into_string(self) -> String {
        match self {
            TextOrNumber::Text(s) => s,
            TextOrNumber::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

/// `device_id` is accepted as an older name for `device_uuid`.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub device_uuid: Option<String>,
    pub device_id: Option<String>,
    pub platform: Option<String>,
    pub model: Option<String>,
    pub app_version: Option<String>,
}

impl RegisterRequest {
    pub fn uuid(&self) -> Option<&str> {
        self.device_uuid.as_deref().or(self.device_id.as_deref())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub device_code: String,
    pub status: DeviceStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeviceAuthRequest {
    pub device_uuid: Option<String>,
    pub device_id: Option<String>,
    pub device_code: Option<String>,
}

impl DeviceAuthRequest {
    pub fn uuid(&self) -> Option<&str> {
        self.device_uuid.as_deref().or(self.device_id.as_deref())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeviceAuthResponse {
    pub access_token: String,
    pub token_expires_at: DateTime<Utc>,
    pub max_streams: i32,
    /// Access expiry; `null` when open-ended.
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeviceProfileResponse {
    pub device_code: String,
    pub status: DeviceStatus,
    pub platform: Option<String>,
    pub model: Option<String>,
    pub app_version: Option<String>,
    pub max_streams: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub adult_pin_enabled: bool,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PinRequest {
    pub pin: Option<TextOrNumber>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdultStatusResponse {
    pub enabled: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlaybackTokenRequest {
    #[serde(rename = "type")]
    pub stream_type: Option<String>,
    pub stream_id: Option<TextOrNumber>,
    pub episode_id: Option<TextOrNumber>,
    pub ttl_sec: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    pub token: Option<String>,
    pub format: Option<String>,
}

/// Operator access envelope update. Omitted fields keep their stored value
/// (or the default on activation).
#[derive(Debug, Default, Deserialize)]
pub struct AccessRequest {
    pub expires_at: Option<DateTime<Utc>>,
    pub max_streams: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminDeviceResponse {
    pub ok: bool,
    pub device_code: String,
    pub status: DeviceStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminAccessResponse {
    pub ok: bool,
    pub device_code: String,
    pub max_streams: i32,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpstreamRequest {
    pub upstream_base_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}
