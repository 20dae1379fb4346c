// src/server/routes.rs
//! Axum router for the listing service
//!
//! Read routes carry a permissive CORS policy so browser-based plugin
//! installers can query the listing directly. Anything that does not
//! match a route bounces back to the listing with a 301.

use std::time::Duration;

use axum::http::{header, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::server::handlers::{changelog, download, listing, search, stats, webhook};
use crate::server::SharedState;

/// Create the application router
pub fn create_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(300));

    let assets = ServeDir::new(&state.assets_dir);

    Router::new()
        .route("/", get(listing::get_listing))
        .route("/plugins/:name", get(search::by_internal_name))
        .route("/authors/:author", get(search::by_author))
        .route("/changelog/:owner/:repo", get(changelog::full_changelog))
        .route(
            "/changelog/:owner/:repo/:tag",
            get(changelog::release_changelog),
        )
        .route(
            "/download/:owner/:repo/:tag/:asset",
            get(download::proxy_asset),
        )
        .route("/webhook/github-release", post(webhook::github_release))
        .route("/stats", get(stats::get_stats))
        .nest_service("/assets", assets)
        .fallback(redirect_to_listing)
        .layer(cors)
        .with_state(state)
}

/// Unknown routes bounce back to the listing
async fn redirect_to_listing() -> impl IntoResponse {
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, "/")])
}
