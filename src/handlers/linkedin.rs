// ---------------------------------------------------------------------------
// handlers/linkedin.rs — job posting details
// ---------------------------------------------------------------------------

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;

use crate::browser::{capture, CaptureRequest, NavigateOptions};
use crate::extract::extract_job;
use crate::models::{JobQuery, JobResponse};
use crate::state::AppState;

use super::{fix_url, required, ApiError};

/// GET /get-linkedin-url — open a job posting and pull its structured fields.
pub async fn linkedin_job(
    State(state): State<AppState>,
    query: Result<Query<JobQuery>, QueryRejection>,
) -> Result<Json<JobResponse>, ApiError> {
    let Query(query) = query?;
    let url = fix_url(required(query.url.as_deref(), "URL")?);
    tracing::info!("Processing job posting URL: {}", url);

    let ctx = state.browser.context().await?;
    let request = CaptureRequest::new(&url, NavigateOptions::new(state.config.default_timeout));
    let snapshot = capture(ctx.as_ref(), &request, &state.run_token()).await?;
    state.browser.persist_cookies(ctx.as_ref()).await;

    let job = extract_job(&snapshot.html);
    if job.job_title.is_empty() {
        tracing::warn!(url = %snapshot.url, "job posting: no title found, page layout may have changed");
    }

    Ok(Json(JobResponse {
        success: true,
        url: snapshot.url,
        job,
    }))
}
