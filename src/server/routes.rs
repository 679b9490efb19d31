//! Router configuration for the web server.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::service_status))
        // Read side
        .route("/api/leaderboard", get(handlers::leaderboard))
        .route("/api/stats", get(handlers::stats))
        .route("/api/articles/:content_id", get(handlers::article_detail))
        .route(
            "/api/articles/:content_id/history",
            get(handlers::article_history),
        )
        .route("/api/search", get(handlers::search))
        // Ingestion trigger
        .route("/api/refresh", post(handlers::refresh))
        // Session cookie management
        .route("/api/cookies", post(handlers::update_cookies))
        .route("/api/cookies/status", get(handlers::cookie_status))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
