pub mod aggregate;
pub mod browser;
pub mod config;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod search;
pub mod state;
pub mod traversal;

use axum::routing::{get, post};
use axum::Router;

use state::AppState;

/// Build the application router with the given state.
/// Extracted from `main()` so integration tests can construct the app
/// without binding to a network port.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(handlers::health))
        .route("/health/ready", get(handlers::readiness))
        // Single page
        .route("/scrape", get(handlers::scrape))
        // Multi-page runs
        .route("/crawl", post(handlers::crawl))
        .route("/map", post(handlers::map))
        .route("/search", post(handlers::search))
        // Job postings
        .route("/get-linkedin-url", get(handlers::linkedin_job))
        // Shared state
        .with_state(state)
}
