// src/server/handlers/changelog.rs
//! Release changelogs for internal plugins
//!
//! Serves the cached release notes as `{version, changelog, created_at}`
//! entries, either the full history or a single tag.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::server::SharedState;
use crate::state::PluginRelease;

#[derive(Debug, Serialize)]
pub struct ChangelogEntry {
    pub version: String,
    pub changelog: String,
    pub created_at: String,
}

impl From<&PluginRelease> for ChangelogEntry {
    fn from(release: &PluginRelease) -> Self {
        Self {
            version: release.tag_name.clone(),
            changelog: release.body.clone(),
            created_at: release.created_at.clone(),
        }
    }
}

/// GET /changelog/:owner/:repo
pub async fn full_changelog(
    State(state): State<SharedState>,
    Path((owner, repo)): Path<(String, String)>,
) -> Response {
    let Some(releases) = lookup_releases(&state, &owner, &repo) else {
        return not_found(&state, &owner, &repo);
    };

    let entries: Vec<ChangelogEntry> = releases.iter().map(ChangelogEntry::from).collect();
    Json(entries).into_response()
}

/// GET /changelog/:owner/:repo/:tag
pub async fn release_changelog(
    State(state): State<SharedState>,
    Path((owner, repo, tag)): Path<(String, String, String)>,
) -> Response {
    let Some(releases) = lookup_releases(&state, &owner, &repo) else {
        return not_found(&state, &owner, &repo);
    };

    match releases.iter().find(|release| release.tag_name == tag) {
        Some(release) => Json(ChangelogEntry::from(release)).into_response(),
        None => (StatusCode::NOT_FOUND, "Release version not found").into_response(),
    }
}

fn lookup_releases(state: &SharedState, owner: &str, repo: &str) -> Option<Vec<PluginRelease>> {
    let name = format!("{}/{}", owner, repo);
    state.registry.plugin(&name)?;
    state.releases.get_releases(&name)
}

fn not_found(state: &SharedState, owner: &str, repo: &str) -> Response {
    let name = format!("{}/{}", owner, repo);
    if state.registry.plugin(&name).is_none() {
        (StatusCode::NOT_FOUND, "Plugin not found").into_response()
    } else {
        (StatusCode::NOT_FOUND, "No release metadata found for plugin").into_response()
    }
}
