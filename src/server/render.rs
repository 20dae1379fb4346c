// src/server/render.rs
//! Listing render cache and HTML template rendering
//!
//! The JSON listing is the hot path: serialized bytes are cached against
//! the store's collection version, so an unchanged store never pays for
//! re-serialization. The HTML page is a token-replacement pass over a
//! template file shipped with the service.

use std::path::Path;
use std::sync::OnceLock;

use axum::body::Bytes;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::metrics::ServiceMetrics;
use crate::state::{Registry, RepositoryStore};

/// Version-keyed cache of the serialized JSON listing
#[derive(Default)]
pub struct RenderCache {
    cached: Mutex<Option<(u64, Bytes)>>,
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialized listing for the store's current collection version
    ///
    /// Returns the cached bytes when the version has not moved since the
    /// last render. The version bump lands after the mutation it covers,
    /// so a concurrent write can at worst cache fresher data under the
    /// older version; it never caches stale data under a newer one.
    pub fn listing_json(
        &self,
        store: &RepositoryStore,
        metrics: &ServiceMetrics,
    ) -> Result<Bytes> {
        let version = store.collection_version();

        if let Some((cached_version, bytes)) = &*self.cached.lock() {
            if *cached_version == version {
                metrics.record_listing_hit();
                return Ok(bytes.clone());
            }
        }

        metrics.record_listing_miss();
        let bytes = Bytes::from(serde_json::to_vec(&store.get_all())?);
        *self.cached.lock() = Some((version, bytes.clone()));
        Ok(bytes)
    }
}

/// Template content hash, computed from the first read and reused for
/// the life of the process
static TEMPLATE_HASH: OnceLock<String> = OnceLock::new();

/// Render the HTML listing page by replacing tokens in the template
///
/// `@file-hash` is replaced once; the state size tokens everywhere they
/// appear. The hash cache-busts static asset links when the page changes
/// between deploys.
pub async fn render_html(
    template_path: &Path,
    store: &RepositoryStore,
    registry: &Registry,
) -> Result<String> {
    let template = tokio::fs::read_to_string(template_path).await?;

    let hash = TEMPLATE_HASH.get_or_init(|| hex::encode(Sha256::digest(template.as_bytes())));

    let page = template
        .replacen("@file-hash", hash, 1)
        .replace("@state-url-size", &registry.origin_count().to_string())
        .replace("@state-repo-size", &store.len().to_string())
        .replace("@state-internal-size", &store.internal_count().to_string());

    Ok(page)
}
