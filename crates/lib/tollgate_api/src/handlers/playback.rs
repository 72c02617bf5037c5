//! Playback token handlers.

use axum::extract::{Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use tollgate_core::playback::{MintedPlayback, PlaybackRequest, StreamType};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::DeviceContext;
use crate::models::{PlaybackTokenRequest, StreamQuery};

/// `POST /v1/playback/token`: mint a stream-scoped token for this device.
pub async fn token_handler(
    State(state): State<AppState>,
    Extension(device): Extension<DeviceContext>,
    Json(body): Json<PlaybackTokenRequest>,
) -> AppResult<Json<MintedPlayback>> {
    let stream_type: StreamType = body
        .stream_type
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(AppError::Validation)?;
    let minted = state.playback.mint(
        device.0.device_id,
        &PlaybackRequest {
            stream_type,
            stream_id: body.stream_id.map(|id| id.into_string()),
            episode_id: body.episode_id.map(|id| id.into_string()),
            ttl_secs: body.ttl_sec,
        },
    )?;
    Ok(Json(minted))
}

/// `GET /v1/playback/stream?token=…&format=hls|dash`: redirect to upstream.
pub async fn stream_handler(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> AppResult<Response> {
    let token = query.token.unwrap_or_default();
    let location = state
        .playback
        .redeem(&token, query.format.as_deref())
        .await?;
    let location = HeaderValue::from_str(&location)
        .map_err(|e| AppError::Internal(format!("redirect location: {e}")))?;

    Ok((
        StatusCode::FOUND,
        [
            (header::LOCATION, location),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
        ],
    )
        .into_response())
}
