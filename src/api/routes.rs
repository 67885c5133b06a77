//! Router configuration
//!
//! All endpoints live under the `/api` prefix.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api::handlers;
use crate::config::CorsConfig;
use crate::AppState;

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.settings.server.body_limit_mb * 1024 * 1024;
    let cors = cors_layer(&state.settings.cors);

    Router::new()
        .route("/api", get(handlers::root))
        .route("/api/", get(handlers::root))
        .route("/api/age-verify", post(handlers::age_verify))
        .route("/api/upload-image", post(handlers::upload_image))
        .route("/api/create-mask", post(handlers::create_mask))
        .route("/api/remove-object", post(handlers::remove_object))
        .route("/api/add-object", post(handlers::add_object))
        .route("/api/text-guided-edit", post(handlers::text_guided_edit))
        .route("/api/edit-history", get(handlers::edit_history))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        warn!("CORS: allowing all origins");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        info!(origins = origins.len(), "CORS: restricting origins");
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
