// ---------------------------------------------------------------------------
// handlers/system.rs — liveness and readiness probes
// ---------------------------------------------------------------------------

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::models::ReadinessResponse;
use crate::state::AppState;

/// GET /health — plain liveness probe.
pub async fn health() -> &'static str {
    "OK"
}

/// GET /health/ready — lightweight readiness probe; never launches the browser.
pub async fn readiness(State(state): State<AppState>) -> axum::response::Response {
    let ready = state.is_ready();
    let body = ReadinessResponse {
        ready,
        uptime_seconds: state.uptime_seconds(),
        browser_backend: state.browser.backend().to_string(),
        browser_initialized: state.browser.is_initialized(),
    };

    if ready {
        (StatusCode::OK, Json(body)).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
    }
}
