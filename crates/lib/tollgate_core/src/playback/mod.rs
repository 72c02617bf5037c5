//! Playback tokens.
//!
//! A playback token is a short-lived, stream-scoped JWT. Redeeming it
//! resolves the device's upstream credentials and yields the upstream stream
//! URL; the credentials themselves never reach the client in a response body.

pub mod stream;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::keys::{ScopedClaims, TokenKeys};
use crate::upstream::{ResolverError, UpstreamResolver};

pub use stream::{StreamFormat, StreamType, build_playback_link, build_stream_url};

/// Redeem endpoint path embedded in playback links.
pub const STREAM_PATH: &str = "/v1/playback/stream";

/// Default playback token lifetime.
pub const DEFAULT_PLAYBACK_TTL_SECS: i64 = 3600;
const MIN_TTL_SECS: i64 = 60;
const MAX_TTL_SECS: i64 = 24 * 3600;

/// Playback errors.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid playback token")]
    InvalidToken,

    #[error("Playback token expired")]
    TokenExpired,

    #[error("Token error: {0}")]
    Signing(String),

    #[error(transparent)]
    Resolver(#[from] ResolverError),
}

/// Claims carried by a playback token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackClaims {
    pub device_id: Uuid,
    #[serde(rename = "type")]
    pub stream_type: StreamType,
    pub stream_id: Option<String>,
    pub episode_id: Option<String>,
    pub aud: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

impl ScopedClaims for PlaybackClaims {
    const AUDIENCE: &'static str = "playback";
    const ISSUER: &'static str = "tollgate-playback";
}

impl PlaybackClaims {
    /// Identifier placed in the upstream URL: the episode for series, the
    /// stream otherwise.
    pub fn target_id(&self) -> Option<&str> {
        match self.stream_type {
            StreamType::Series => self.episode_id.as_deref(),
            StreamType::Live | StreamType::Vod => self.stream_id.as_deref(),
        }
        .filter(|id| !id.is_empty())
    }
}

/// Mint request for one stream.
#[derive(Debug, Clone)]
pub struct PlaybackRequest {
    pub stream_type: StreamType,
    pub stream_id: Option<String>,
    pub episode_id: Option<String>,
    /// Requested lifetime; clamped to [60, 86400].
    pub ttl_secs: Option<i64>,
}

/// Redeem links for both formats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackUrls {
    pub hls: String,
    pub dash: String,
}

/// A freshly minted playback token.
#[derive(Debug, Clone, Serialize)]
pub struct MintedPlayback {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub urls: PlaybackUrls,
}

/// Clamp a requested lifetime into the allowed window.
pub fn clamp_ttl(ttl_secs: i64) -> i64 {
    ttl_secs.clamp(MIN_TTL_SECS, MAX_TTL_SECS)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Mints and redeems playback tokens.
pub struct PlaybackTokenService {
    keys: Arc<TokenKeys>,
    resolver: Arc<UpstreamResolver>,
    default_ttl_secs: i64,
    public_base_url: Option<String>,
}

impl PlaybackTokenService {
    pub fn new(
        keys: Arc<TokenKeys>,
        resolver: Arc<UpstreamResolver>,
        default_ttl_secs: i64,
        public_base_url: Option<String>,
    ) -> Self {
        Self {
            keys,
            resolver,
            default_ttl_secs: clamp_ttl(default_ttl_secs),
            public_base_url,
        }
    }

    /// Mint a token for one stream. The request is fully validated before
    /// anything is signed.
    pub fn mint(
        &self,
        device_id: Uuid,
        request: &PlaybackRequest,
    ) -> Result<MintedPlayback, PlaybackError> {
        let stream_id = non_empty(request.stream_id.as_deref());
        let episode_id = non_empty(request.episode_id.as_deref());
        match request.stream_type {
            StreamType::Series if episode_id.is_none() => {
                return Err(PlaybackError::ValidationError(
                    "episode_id required for series".into(),
                ));
            }
            StreamType::Live | StreamType::Vod if stream_id.is_none() => {
                return Err(PlaybackError::ValidationError(
                    "stream_id required".into(),
                ));
            }
            _ => {}
        }

        let ttl = clamp_ttl(request.ttl_secs.unwrap_or(self.default_ttl_secs));
        let now = Utc::now();
        let expires_at = now + Duration::seconds(ttl);
        let claims = PlaybackClaims {
            device_id,
            stream_type: request.stream_type,
            stream_id,
            episode_id,
            aud: PlaybackClaims::AUDIENCE.to_string(),
            iss: PlaybackClaims::ISSUER.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = self
            .keys
            .sign(&claims)
            .map_err(|e| PlaybackError::Signing(format!("jwt encode: {e}")))?;

        let base = self.public_base_url.as_deref();
        let urls = PlaybackUrls {
            hls: build_playback_link(base, STREAM_PATH, &token, StreamFormat::Hls),
            dash: build_playback_link(base, STREAM_PATH, &token, StreamFormat::Dash),
        };
        debug!(%device_id, stream_type = %request.stream_type, ttl, "minted playback token");
        Ok(MintedPlayback {
            token,
            expires_at,
            urls,
        })
    }

    /// Verify a playback token.
    pub fn verify(&self, token: &str) -> Result<PlaybackClaims, PlaybackError> {
        self.keys
            .verify::<PlaybackClaims>(token)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => PlaybackError::TokenExpired,
                _ => PlaybackError::InvalidToken,
            })
    }

    /// Redeem a token into the upstream stream URL.
    pub async fn redeem(
        &self,
        token: &str,
        format: Option<&str>,
    ) -> Result<String, PlaybackError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(PlaybackError::ValidationError("token required".into()));
        }
        let claims = self.verify(token)?;
        let format =
            StreamFormat::parse_optional(format).map_err(PlaybackError::ValidationError)?;
        let target = claims
            .target_id()
            .ok_or(PlaybackError::InvalidToken)?
            .to_string();

        let upstream = self.resolver.resolve(claims.device_id).await?;
        let url = build_stream_url(&upstream, claims.stream_type, &target, format)
            .map_err(ResolverError::InvalidBaseUrl)?;

        info!(
            device_id = %claims.device_id,
            stream_type = %claims.stream_type,
            format = format.as_str(),
            "redeemed playback token"
        );
        Ok(url)
    }
}
