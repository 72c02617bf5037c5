//! Operator authentication middleware.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tollgate_core::auth::secrets_match;
use tracing::warn;

use crate::AppState;
use crate::error::AppError;

/// Header carrying the operator key.
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Axum middleware: requires `x-admin-key` to equal the configured key.
pub async fn require_admin_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let presented = request
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if presented.is_empty() || !secrets_match(presented, &state.config.admin_api_key) {
        warn!(path = %request.uri().path(), "rejected operator request");
        return Err(AppError::Unauthorized("admin unauthorized".into()));
    }

    Ok(next.run(request).await)
}
