// src/server/handlers/download.rs
//! Private release asset proxy
//!
//! Private GitHub repositories reject unauthenticated asset downloads,
//! so their install links point here instead. The handler resolves the
//! asset by tag and file name from cached release metadata, fetches it
//! from the GitHub API with the configured token, and streams the body
//! through without buffering.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{error, info, warn};

use crate::error::Error;
use crate::server::SharedState;

/// Upstream response headers passed through to the client
const FORWARDED_HEADERS: [HeaderName; 7] = [
    header::CONTENT_TYPE,
    header::CONTENT_LENGTH,
    header::CONTENT_DISPOSITION,
    header::LAST_MODIFIED,
    header::ETAG,
    header::CACHE_CONTROL,
    header::ACCEPT_RANGES,
];

/// GET /download/:owner/:repo/:tag/:asset
pub async fn proxy_asset(
    State(state): State<SharedState>,
    Path((owner, repo, tag, asset)): Path<(String, String, String, String)>,
) -> Response {
    let name = format!("{}/{}", owner, repo);

    // Only private plugins download through the proxy; public assets
    // link straight to GitHub.
    let is_private = state
        .registry
        .plugin(&name)
        .is_some_and(|plugin| plugin.private);
    if !is_private {
        return (StatusCode::NOT_FOUND, "Plugin not found").into_response();
    }

    let Some(releases) = state.releases.get_releases(&name) else {
        return (StatusCode::NOT_FOUND, "No release metadata found for plugin").into_response();
    };

    let asset_url = releases
        .iter()
        .filter(|release| release.tag_name == tag)
        .flat_map(|release| release.assets.iter())
        .find(|candidate| candidate.name == asset)
        .map(|candidate| candidate.url.clone());

    let Some(asset_url) = asset_url else {
        return (StatusCode::NOT_FOUND, "Release asset not found").into_response();
    };

    let upstream = match state.github.stream_asset(&asset_url).await {
        Ok(response) => response,
        Err(Error::Config(reason)) => {
            error!("Cannot proxy {} for {}: {}", asset, name, reason);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server misconfigured, missing GitHub token",
            )
                .into_response();
        }
        Err(e) => {
            warn!("Upstream request for {} {} failed: {}", name, asset, e);
            return (
                StatusCode::BAD_GATEWAY,
                "Failed to download release asset from GitHub",
            )
                .into_response();
        }
    };

    let upstream_status = upstream.status();
    if !upstream_status.is_success() {
        warn!(
            "GitHub returned HTTP {} for asset {} of {}",
            upstream_status, asset, name
        );
        return (
            StatusCode::BAD_GATEWAY,
            "Failed to download release asset from GitHub",
        )
            .into_response();
    }

    // reqwest and axum sit on different http crate majors, so status and
    // header values cross over by value.
    let status =
        StatusCode::from_u16(upstream_status.as_u16()).unwrap_or(StatusCode::OK);

    let mut headers = HeaderMap::new();
    for header_name in FORWARDED_HEADERS {
        if let Some(value) = upstream.headers().get(header_name.as_str()) {
            if let Ok(value) = HeaderValue::from_bytes(value.as_bytes()) {
                headers.insert(header_name, value);
            }
        }
    }

    state.metrics.record_proxy_download();
    info!("Proxying release asset {} for {} {}", asset, name, tag);

    (status, headers, Body::from_stream(upstream.bytes_stream())).into_response()
}
