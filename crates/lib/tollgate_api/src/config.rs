//! API server configuration.

use axum::http::HeaderValue;
use thiserror::Error;
use tollgate_core::auth::keys::resolve_signing_secret;
use tollgate_core::playback::DEFAULT_PLAYBACK_TTL_SECS;
use tollgate_core::upstream::normalize_base_url;
use tollgate_core::vault::Vault;

/// Configuration errors. The server refuses to start on any of these.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Configuration for the API server.
#[derive(Clone)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// HS256 secret shared by session and playback tokens.
    pub jwt_secret: String,
    /// Operator key expected in `x-admin-key`.
    pub admin_api_key: String,
    /// Vault keyed from `ENC_KEY_BASE64`.
    pub vault: Vault,
    /// Upstream base URL for devices without their own.
    pub default_upstream_url: Option<String>,
    /// Default playback token lifetime in seconds.
    pub playback_token_ttl_secs: i64,
    /// Public prefix for playback links; relative links when unset.
    pub playback_base_url: Option<String>,
    /// Browser origins allowed by CORS. Empty allows any origin.
    pub allowed_origins: Vec<String>,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("default_upstream_url", &self.default_upstream_url)
            .field("playback_token_ttl_secs", &self.playback_token_ttl_secs)
            .field("playback_base_url", &self.playback_base_url)
            .field("allowed_origins", &self.allowed_origins)
            .finish_non_exhaustive()
    }
}

impl ApiConfig {
    /// Reads configuration from environment variables.
    ///
    /// | Variable                     | Default                             |
    /// |------------------------------|-------------------------------------|
    /// | `BIND_ADDR`                  | `127.0.0.1:3100`                    |
    /// | `DATABASE_URL`               | `postgres://localhost:5432/tollgate`|
    /// | `JWT_SECRET` / `AUTH_SECRET` | generated & persisted to file       |
    /// | `ADMIN_API_KEY`              | required                            |
    /// | `ENC_KEY_BASE64`             | required, 32 bytes                  |
    /// | `XUI_BASE_URL`               | none                                |
    /// | `PLAYBACK_TOKEN_TTL`         | `3600`                              |
    /// | `PLAYBACK_BASE_URL`          | none                                |
    /// | `ALLOWED_ORIGINS`            | none (any origin), comma-separated  |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let admin_api_key = get("ADMIN_API_KEY").ok_or(ConfigError::Missing("ADMIN_API_KEY"))?;
        let enc_key = get("ENC_KEY_BASE64").ok_or(ConfigError::Missing("ENC_KEY_BASE64"))?;
        let vault = Vault::from_base64_key(enc_key.trim()).map_err(|e| ConfigError::Invalid {
            name: "ENC_KEY_BASE64",
            reason: e.to_string(),
        })?;

        let default_upstream_url = match get("XUI_BASE_URL") {
            Some(raw) => Some(normalize_base_url(&raw).ok_or_else(|| ConfigError::Invalid {
                name: "XUI_BASE_URL",
                reason: format!("not an http(s) origin: {raw}"),
            })?),
            None => None,
        };

        let playback_token_ttl_secs = match get("PLAYBACK_TOKEN_TTL") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "PLAYBACK_TOKEN_TTL",
                reason: format!("expected seconds, got {raw}"),
            })?,
            None => DEFAULT_PLAYBACK_TTL_SECS,
        };

        let allowed_origins =
            parse_origins(get("ALLOWED_ORIGINS").as_deref().unwrap_or_default())?;

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:3100".into()),
            pg_connection_url: get("DATABASE_URL")
                .unwrap_or_else(|| "postgres://localhost:5432/tollgate".into()),
            jwt_secret: resolve_signing_secret(&lookup),
            admin_api_key,
            vault,
            default_upstream_url,
            playback_token_ttl_secs,
            playback_base_url: get("PLAYBACK_BASE_URL"),
            allowed_origins,
        })
    }
}

/// Split a comma-separated origin list, dropping blanks.
///
/// Each entry must be usable as an `Access-Control-Allow-Origin` value; the
/// `*` wildcard is expressed by leaving the list empty instead.
fn parse_origins(raw: &str) -> Result<Vec<String>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(|origin| {
            if origin == "*" || HeaderValue::from_str(origin).is_err() {
                return Err(ConfigError::Invalid {
                    name: "ALLOWED_ORIGINS",
                    reason: format!("not a valid origin: {origin}"),
                });
            }
            Ok(origin.to_string())
        })
        .collect()
}
