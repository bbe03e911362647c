use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::AppState;
use crate::auth::RequireSession;
use crate::imaging::{ImageError, ImageProcessor};

const CACHE_CONTROL: &str = "public, max-age=60";

#[derive(Debug, Deserialize)]
pub struct RelayParams {
    url: Option<String>,
}

/// GET /client/uncors - fetch a remote image server-side and recompress it.
pub async fn relay(
    State(state): State<AppState>,
    RequireSession(_session): RequireSession,
    Query(params): Query<RelayParams>,
) -> Response {
    let Some(url) = params.url.filter(|u| !u.is_empty()) else {
        return StatusCode::FORBIDDEN.into_response();
    };
    if !url.starts_with("http") {
        return (StatusCode::BAD_REQUEST, "Unsupported url").into_response();
    }

    let upstream = match state.http.get(&url).send().await {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            tracing::warn!(url = %url, status = %response.status(), "Relay upstream error");
            return (StatusCode::BAD_GATEWAY, "Upstream error").into_response();
        }
        Err(e) => {
            tracing::warn!(url = %url, "Relay fetch failed: {e}");
            return (StatusCode::BAD_GATEWAY, "Upstream error").into_response();
        }
    };
    let upstream_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let bytes = match upstream.bytes().await {
        Ok(bytes) => bytes.to_vec(),
        Err(e) => {
            tracing::warn!(url = %url, "Relay read failed: {e}");
            return (StatusCode::BAD_GATEWAY, "Upstream error").into_response();
        }
    };

    let mut processor = match ImageProcessor::new(
        state.config.work_dir.as_deref(),
        state.config.relay_quality,
        None,
    ) {
        Ok(processor) => processor,
        Err(e) => {
            tracing::error!("Failed to allocate image processor: {e}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Relay failed").into_response();
        }
    };
    let processed = processor.process(bytes.clone(), &url, false).await;
    if let Err(e) = processor.release() {
        tracing::warn!("Failed to release image processor: {e}");
    }

    match processed {
        Ok(image) => (
            [
                (header::CONTENT_TYPE, image.mime.to_string()),
                (header::CACHE_CONTROL, CACHE_CONTROL.to_string()),
            ],
            image.bytes,
        )
            .into_response(),
        Err(ImageError::UnknownFormat) => (
            [
                (header::CONTENT_TYPE, upstream_type),
                (header::CACHE_CONTROL, CACHE_CONTROL.to_string()),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(url = %url, "Relay transcode failed: {e}");
            (StatusCode::BAD_GATEWAY, "Relay failed").into_response()
        }
    }
}
