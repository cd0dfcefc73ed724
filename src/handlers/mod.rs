// ---------------------------------------------------------------------------
// handlers/mod.rs — error type, shared request helpers, re-exports
// ---------------------------------------------------------------------------

pub(crate) mod crawl;
pub(crate) mod linkedin;
pub(crate) mod scrape;
pub(crate) mod system;


pub use crawl::{crawl, map, search};
pub use linkedin::linkedin_job;
pub use scrape::scrape;
pub use system::{health, readiness};

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use crate::browser::BrowserError;
use crate::traversal::TraversalError;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Centralized API error type for all handlers.
/// Logs full details server-side, returns `{ "error": message }` to the client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Traversal(#[from] TraversalError),

    #[error(transparent)]
    Browser(#[from] BrowserError),
}

impl ApiError {
    /// Machine-readable error code string for each variant.
    fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) | ApiError::Traversal(_) => "BAD_REQUEST",
            ApiError::Browser(BrowserError::Timeout { .. }) => "NAVIGATION_TIMEOUT",
            ApiError::Browser(BrowserError::Cancelled) => "CANCELLED",
            ApiError::Browser(_) => "BROWSER_ERROR",
        }
    }

    /// Input problems are the caller's fault; everything past validation is a 500.
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Traversal(_) => StatusCode::BAD_REQUEST,
            ApiError::Browser(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::BadRequest(m) => m.clone(),
            other => other.to_string(),
        }
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let request_id = Uuid::new_v4();

        tracing::error!(
            request_id = %request_id,
            code = self.error_code(),
            "API error ({}): {}",
            status.as_u16(),
            self
        );

        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Required string parameter; blank counts as missing.
pub(crate) fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, ApiError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("{} is required", name)))
}

/// Repair a hand-typed URL: trim, encode whitespace, default to https.
pub(crate) fn fix_url(raw: &str) -> String {
    let encoded = raw.split_whitespace().collect::<Vec<_>>().join("%20");
    let lower = encoded.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        encoded
    } else {
        format!("https://{}", encoded)
    }
}
