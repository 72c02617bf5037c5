//! Device authentication middleware: Bearer session token extraction and
//! request-time device checks.

use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tollgate_core::auth::AuthError;
use tollgate_core::registry::AuthenticatedDevice;
use tracing::debug;

use crate::AppState;
use crate::error::AppError;

/// Key used to store the authorized device in request extensions.
#[derive(Debug, Clone)]
pub struct DeviceContext(pub AuthenticatedDevice);

/// Axum middleware: extracts `Authorization: Bearer <token>`, verifies the
/// session token, re-checks the device, and injects [`DeviceContext`].
///
/// Every verification failure is the same 401; the reason is only logged.
pub async fn require_device(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Unauthorized("missing token".into()))?;

    let device = match state.sessions.authorize(&token).await {
        Ok(device) => device,
        Err(AuthError::Store(e)) => return Err(e.into()),
        Err(e) => {
            debug!(reason = %e, "rejected session token");
            return Err(AppError::Unauthorized("invalid token".into()));
        }
    };

    request.extensions_mut().insert(DeviceContext(device));

    Ok(next.run(request).await)
}
