//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tollgate_core::adult_pin::PinError;
use tollgate_core::auth::AuthError;
use tollgate_core::playback::PlaybackError;
use tollgate_core::registry::RegistryError;
use tollgate_core::store::StoreError;
use tollgate_core::upstream::ResolverError;
use tracing::error;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            AppError::Conflict(m) => (StatusCode::CONFLICT, "conflict", m.as_str()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.as_str()),
            AppError::Internal(detail) => {
                error!(%detail, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::ValidationError(msg) => AppError::Validation(msg),
            AuthError::NotRegistered => AppError::Unauthorized("device not registered".into()),
            AuthError::NotActive => AppError::Forbidden("device not active".into()),
            AuthError::Expired => AppError::Forbidden("device expired".into()),
            AuthError::UuidInUse => AppError::Conflict("device already active".into()),
            AuthError::InvalidToken | AuthError::TokenError(_) => {
                AppError::Unauthorized("invalid token".into())
            }
            AuthError::Store(e) => AppError::from(e),
        }
    }
}

impl From<RegistryError> for AppError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::ValidationError(msg) => AppError::Validation(msg),
            RegistryError::NotFound(_) => AppError::NotFound("device not found".into()),
            RegistryError::CodeSpaceExhausted(_) => AppError::Internal(e.to_string()),
            RegistryError::Store(e) => AppError::from(e),
        }
    }
}

impl From<ResolverError> for AppError {
    fn from(e: ResolverError) -> Self {
        match e {
            ResolverError::NotConfigured => {
                AppError::NotFound("no upstream configured for device".into())
            }
            ResolverError::ValidationError(msg) => AppError::Validation(msg),
            ResolverError::InvalidBaseUrl(_) => {
                AppError::Validation("invalid upstream_base_url".into())
            }
            ResolverError::MissingBaseUrl | ResolverError::Vault(_) => {
                AppError::Internal(e.to_string())
            }
            ResolverError::Store(e) => AppError::from(e),
        }
    }
}

impl From<PlaybackError> for AppError {
    fn from(e: PlaybackError) -> Self {
        match e {
            PlaybackError::ValidationError(msg) => AppError::Validation(msg),
            PlaybackError::InvalidToken | PlaybackError::TokenExpired => {
                AppError::Unauthorized("invalid token".into())
            }
            PlaybackError::Signing(msg) => AppError::Internal(msg),
            PlaybackError::Resolver(e) => AppError::from(e),
        }
    }
}

impl From<PinError> for AppError {
    fn from(e: PinError) -> Self {
        match e {
            PinError::ValidationError(msg) => AppError::Validation(msg),
            PinError::NotSet => AppError::NotFound("pin not set".into()),
            PinError::Mismatch => AppError::Forbidden("invalid pin".into()),
            PinError::Vault(_) => AppError::Internal(e.to_string()),
            PinError::Store(e) => AppError::from(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_map_to_distinct_statuses() {
        let status = |e: AuthError| AppError::from(e).into_response().status();
        assert_eq!(status(AuthError::NotRegistered), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AuthError::NotActive), StatusCode::FORBIDDEN);
        assert_eq!(status(AuthError::Expired), StatusCode::FORBIDDEN);
        assert_eq!(status(AuthError::UuidInUse), StatusCode::CONFLICT);
        assert_eq!(
            status(AuthError::ValidationError("x".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn internal_details_stay_out_of_the_body() {
        let err = AppError::from(ResolverError::MissingBaseUrl);
        assert!(matches!(err, AppError::Internal(_)));
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
