//! # tollgate_api
//!
//! HTTP API library for Tollgate.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{delete, get, patch, post};
use sqlx::PgPool;
use tollgate_core::adult_pin::AdultPinService;
use tollgate_core::auth::keys::TokenKeys;
use tollgate_core::auth::session::SessionAuthenticator;
use tollgate_core::playback::PlaybackTokenService;
use tollgate_core::registry::DeviceRegistry;
use tollgate_core::store::DeviceStore;
use tollgate_core::upstream::UpstreamResolver;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::ApiConfig;
use crate::handlers::{admin, device, health, playback};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: Arc<ApiConfig>,
    pub registry: Arc<DeviceRegistry>,
    pub sessions: Arc<SessionAuthenticator>,
    pub upstream: Arc<UpstreamResolver>,
    pub playback: Arc<PlaybackTokenService>,
    pub adult_pins: Arc<AdultPinService>,
}

impl AppState {
    /// Wire every service over one store. Keys and the vault are built once
    /// here and shared.
    pub fn new(store: Arc<dyn DeviceStore>, config: ApiConfig) -> Self {
        let keys = Arc::new(TokenKeys::from_secret(config.jwt_secret.as_bytes()));
        let vault = Arc::new(config.vault.clone());

        let registry = Arc::new(DeviceRegistry::new(store.clone()));
        let sessions = Arc::new(SessionAuthenticator::new(registry.clone(), keys.clone()));
        let upstream = Arc::new(UpstreamResolver::new(
            store.clone(),
            vault.clone(),
            config.default_upstream_url.clone(),
        ));
        let playback = Arc::new(PlaybackTokenService::new(
            keys,
            upstream.clone(),
            config.playback_token_ttl_secs,
            config.playback_base_url.clone(),
        ));
        let adult_pins = Arc::new(AdultPinService::new(store, vault));

        Self {
            config: Arc::new(config),
            registry,
            sessions,
            upstream,
            playback,
            adult_pins,
        }
    }
}

/// Run embedded database migrations.
///
/// Delegates to `tollgate_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    tollgate_core::migrate::migrate(pool).await
}

/// CORS for browser clients: the configured origins, or any origin when none
/// are configured.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            allowed_origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        )
    };
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    // Public routes (no auth required)
    let public = Router::new()
        .route(routes::GET_HEALTH, get(health::health))
        .route(routes::POST_DEVICE_REGISTER, post(device::register_handler))
        .route(routes::POST_DEVICE_AUTH, post(device::auth_handler))
        .route(routes::GET_PLAYBACK_STREAM, get(playback::stream_handler));

    // Device routes (Bearer session token)
    let device_routes = Router::new()
        .route(routes::GET_DEVICE_PROFILE, get(device::profile_handler))
        .route(routes::POST_DEVICE_ADULT_SET, post(device::adult_set_handler))
        .route(
            routes::POST_DEVICE_ADULT_VERIFY,
            post(device::adult_verify_handler),
        )
        .route(
            routes::DELETE_DEVICE_ADULT_RESET,
            delete(device::adult_reset_handler),
        )
        .route(
            routes::GET_DEVICE_ADULT_STATUS,
            get(device::adult_status_handler),
        )
        .route(routes::POST_PLAYBACK_TOKEN, post(playback::token_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_device,
        ));

    // Operator routes (x-admin-key)
    let admin_routes = Router::new()
        .route(
            routes::POST_ADMIN_DEVICE_ACTIVATE,
            post(admin::activate_handler),
        )
        .route(routes::POST_ADMIN_DEVICE_SUSPEND, post(admin::suspend_handler))
        .route(
            routes::PATCH_ADMIN_DEVICE_ACCESS,
            patch(admin::set_access_handler),
        )
        .route(
            routes::POST_ADMIN_DEVICE_UPSTREAM,
            post(admin::set_upstream_handler),
        )
        .route(routes::DELETE_ADMIN_DEVICE, delete(admin::delete_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::admin::require_admin_key,
        ));

    Router::new()
        .merge(public)
        .merge(device_routes)
        .merge(admin_routes)
        .layer(cors)
        .with_state(state)
}
