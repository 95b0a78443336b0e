//! API Routes
//!
//! HTTP endpoints exposed by the service:
//! - `/api/search` - Hybrid search over papers and startups
//! - `/api/summarize` - Structured summaries for stored documents
//! - `/api/index` - Submit fetched documents for indexing
//! - `/api/health` - Health check

pub mod health;
pub mod index;
pub mod search;

use axum::http::HeaderValue;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::models::AppState;

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let cors = cors_layer(&state.config.server.cors_allowed_origins);

    Router::new()
        .merge(search::router(state.clone()))
        .merge(index::router(state.clone()))
        .merge(health::router(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Allow the configured origins; a `*` entry opens the API up entirely.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if allowed_origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    layer.allow_origin(origins)
}
