//! Versioned artifact store: projects own versions, versions own at most one
//! artifact per kind, and artifact payloads are deduplicated by SHA-256.
//!
//! [`services::store::ArtifactStore`] is the entry point for the storage
//! layer; [`app`] wraps it in the HTTP API.

pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

use axum::{Router, extract::DefaultBodyLimit, http::HeaderValue};
use config::AppConfig;
use services::store::ArtifactStore;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

/// Build the full application router: API routes, body limit, CORS and
/// request tracing.
pub fn app(store: ArtifactStore, cfg: &AppConfig) -> Router {
    let origins: Vec<HeaderValue> = cfg
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!("ignoring invalid CORS origin {:?}: {}", origin, err);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any);

    routes::routes::routes(&cfg.api_prefix)
        .layer(DefaultBodyLimit::max(cfg.max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}
