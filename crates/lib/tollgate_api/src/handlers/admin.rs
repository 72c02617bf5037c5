//! Operator request handlers.

use axum::Json;
use axum::extract::{Path, State};
use tollgate_core::device_code::normalize_code;
use tollgate_core::registry::AccessUpdate;
use tollgate_core::upstream::ResolverError;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{
    AccessRequest, AdminAccessResponse, AdminDeviceResponse, OkResponse, UpstreamRequest,
};

impl From<AccessRequest> for AccessUpdate {
    fn from(body: AccessRequest) -> Self {
        AccessUpdate {
            expires_at: body.expires_at,
            max_streams: body.max_streams,
        }
    }
}

/// `POST /v1/admin/devices/{code}/activate`
pub async fn activate_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<AccessRequest>,
) -> AppResult<Json<AdminDeviceResponse>> {
    let device = state.registry.activate(&code, &body.into()).await?;
    Ok(Json(AdminDeviceResponse {
        ok: true,
        device_code: device.device_code,
        status: device.status,
    }))
}

/// `POST /v1/admin/devices/{code}/suspend`
pub async fn suspend_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<Json<AdminDeviceResponse>> {
    let device = state.registry.suspend(&code).await?;
    Ok(Json(AdminDeviceResponse {
        ok: true,
        device_code: device.device_code,
        status: device.status,
    }))
}

/// `PATCH /v1/admin/devices/{code}/access`
pub async fn set_access_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<AccessRequest>,
) -> AppResult<Json<AdminAccessResponse>> {
    let access = state.registry.set_access(&code, &body.into()).await?;
    Ok(Json(AdminAccessResponse {
        ok: true,
        device_code: normalize_code(&code),
        max_streams: access.max_streams,
        expires_at: access.expires_at,
    }))
}

/// `POST /v1/admin/devices/{code}/upstream`: store encrypted upstream credentials.
pub async fn set_upstream_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(body): Json<UpstreamRequest>,
) -> AppResult<Json<OkResponse>> {
    let (Some(username), Some(password)) = (body.username, body.password) else {
        return Err(AppError::Validation("username + password required".into()));
    };
    let device = state.registry.find_by_code(&code).await?;
    state
        .upstream
        .store_credentials(
            device.id,
            body.upstream_base_url.as_deref(),
            &username,
            &password,
        )
        .await
        .map_err(|e| match e {
            ResolverError::MissingBaseUrl => {
                AppError::Validation("missing upstream_base_url".into())
            }
            other => other.into(),
        })?;
    Ok(Json(OkResponse::ok()))
}

/// `DELETE /v1/admin/devices/{code}`: delete a device and its dependent rows.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<Json<OkResponse>> {
    state.registry.delete(&code).await?;
    Ok(Json(OkResponse::ok()))
}
