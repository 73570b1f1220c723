//! API Routes
//!
//! Configures the Axum router the host process mounts.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, connectivity_handler, force_mode_handler, health_handler, lookup_handler,
    metrics_handler, mode_handler, popular_handler, probe_handler, put_handler, AppState,
};

/// Creates the router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin (the chat frontend is served separately)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router with all endpoints
    Router::new()
        .route(
            "/cache",
            get(lookup_handler).put(put_handler).delete(clear_handler),
        )
        .route("/cache/popular", get(popular_handler))
        .route("/metrics", get(metrics_handler))
        .route("/mode", get(mode_handler).put(force_mode_handler))
        .route("/probe", post(probe_handler))
        .route("/connectivity", get(connectivity_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
