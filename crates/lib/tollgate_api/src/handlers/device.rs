//! Device request handlers: registration, authentication, profile, adult PIN.

use axum::extract::State;
use axum::{Extension, Json};
use tollgate_core::registry::RegisterDevice;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::DeviceContext;
use crate::models::{
    AdultStatusResponse, DeviceAuthRequest, DeviceAuthResponse, DeviceProfileResponse,
    OkResponse, PinRequest, RegisterRequest, RegisterResponse,
};

/// `POST /v1/device/register`: register a device or refresh a known one.
pub async fn register_handler(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> AppResult<Json<RegisterResponse>> {
    let device_uuid = body
        .uuid()
        .ok_or_else(|| AppError::Validation("device_uuid or device_id required".into()))?
        .to_string();
    let registration = state
        .registry
        .register(&RegisterDevice {
            device_uuid,
            platform: body.platform,
            model: body.model,
            app_version: body.app_version,
        })
        .await?;
    Ok(Json(RegisterResponse {
        device_code: registration.device_code,
        status: registration.status,
    }))
}

/// `POST /v1/device/auth`: exchange uuid + code for a session token.
pub async fn auth_handler(
    State(state): State<AppState>,
    Json(body): Json<DeviceAuthRequest>,
) -> AppResult<Json<DeviceAuthResponse>> {
    let (Some(device_uuid), Some(device_code)) = (body.uuid(), body.device_code.as_deref()) else {
        return Err(AppError::Validation(
            "device_uuid + device_code required".into(),
        ));
    };
    let grant = state.sessions.login(device_uuid, device_code).await?;
    Ok(Json(DeviceAuthResponse {
        access_token: grant.access_token,
        token_expires_at: grant.token_expires_at,
        max_streams: grant.max_streams,
        expires_at: grant.expires_at,
    }))
}

/// `GET /v1/device/profile`: the authenticated device's record and access.
pub async fn profile_handler(
    State(state): State<AppState>,
    Extension(device): Extension<DeviceContext>,
) -> AppResult<Json<DeviceProfileResponse>> {
    let profile = state.registry.profile(device.0.device_id).await?;
    Ok(Json(DeviceProfileResponse {
        device_code: profile.device.device_code,
        status: profile.device.status,
        platform: profile.device.platform,
        model: profile.device.model,
        app_version: profile.device.app_version,
        max_streams: profile.access.max_streams,
        expires_at: profile.access.expires_at,
        adult_pin_enabled: profile.access.adult_pin.is_some(),
        last_seen_at: profile.device.last_seen_at,
        created_at: profile.device.created_at,
    }))
}

fn pin_from(body: PinRequest) -> String {
    body.pin.map(|p| p.into_string()).unwrap_or_default()
}

/// `POST /v1/device/adult/set`
pub async fn adult_set_handler(
    State(state): State<AppState>,
    Extension(device): Extension<DeviceContext>,
    Json(body): Json<PinRequest>,
) -> AppResult<Json<OkResponse>> {
    state
        .adult_pins
        .set(device.0.device_id, &pin_from(body))
        .await?;
    Ok(Json(OkResponse::ok()))
}

/// `POST /v1/device/adult/verify`
pub async fn adult_verify_handler(
    State(state): State<AppState>,
    Extension(device): Extension<DeviceContext>,
    Json(body): Json<PinRequest>,
) -> AppResult<Json<OkResponse>> {
    state
        .adult_pins
        .verify(device.0.device_id, &pin_from(body))
        .await?;
    Ok(Json(OkResponse::ok()))
}

/// `DELETE /v1/device/adult/reset`
pub async fn adult_reset_handler(
    State(state): State<AppState>,
    Extension(device): Extension<DeviceContext>,
) -> AppResult<Json<OkResponse>> {
    state.adult_pins.clear(device.0.device_id).await?;
    Ok(Json(OkResponse::ok()))
}

/// `GET /v1/device/adult/status`
pub async fn adult_status_handler(
    State(state): State<AppState>,
    Extension(device): Extension<DeviceContext>,
) -> AppResult<Json<AdultStatusResponse>> {
    let enabled = state.adult_pins.status(device.0.device_id).await?;
    Ok(Json(AdultStatusResponse { enabled }))
}
