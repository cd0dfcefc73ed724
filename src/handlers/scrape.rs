// ---------------------------------------------------------------------------
// handlers/scrape.rs — single-page scrape
// ---------------------------------------------------------------------------

use std::time::Duration;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::browser::{capture, CaptureRequest, NavigateOptions, WaitUntil};
use crate::extract::{extract_markdown, extract_page};
use crate::models::{ScrapeData, ScrapeFormat, ScrapeQuery, ScrapeResponse};
use crate::state::AppState;

use super::{fix_url, required, ApiError};

/// Selector wait when the caller gives no timeout.
const DEFAULT_SELECTOR_WAIT: Duration = Duration::from_secs(10);

/// GET /scrape — open one page and return it as HTML + screenshot, readable
/// content or markdown.
pub async fn scrape(
    State(state): State<AppState>,
    query: Result<Query<ScrapeQuery>, QueryRejection>,
) -> Result<Json<ScrapeResponse>, ApiError> {
    let Query(query) = query?;
    let url = fix_url(required(query.url.as_deref(), "URL")?);
    let wait_until = match query.wait_for.as_deref() {
        Some(raw) => raw.parse::<WaitUntil>().map_err(ApiError::BadRequest)?,
        None => WaitUntil::default(),
    };
    let format = ScrapeFormat::parse(query.format.as_deref());
    let profile = query.profile.profile();

    let timeout = state.config.timeout(query.timeout);
    let selector_timeout = match query.timeout {
        Some(ms) if ms > 0 => timeout,
        _ => DEFAULT_SELECTOR_WAIT,
    };

    tracing::info!(url = %url, ?format, profile = profile.name, "scrape: navigating");

    let ctx = state.browser.context().await?;
    let mut request = CaptureRequest::new(
        &url,
        NavigateOptions {
            timeout,
            wait_until,
        },
    )
    .wait_for(query.selector.as_deref().filter(|s| !s.trim().is_empty()), selector_timeout);
    if format == ScrapeFormat::Html {
        request = request.with_screenshot();
    }

    let snapshot = capture(ctx.as_ref(), &request, &state.run_token()).await?;
    state.browser.persist_cookies(ctx.as_ref()).await;

    let data = match format {
        ScrapeFormat::Readable => ScrapeData::Readable(extract_page(&snapshot.html, &snapshot.url, profile)),
        ScrapeFormat::Markdown => ScrapeData::Markdown {
            url: snapshot.url.clone(),
            title: snapshot.title.clone(),
            markdown: extract_markdown(&snapshot.html, profile),
        },
        ScrapeFormat::Html => ScrapeData::Html {
            url: snapshot.url.clone(),
            title: snapshot.title.clone(),
            screenshot: snapshot.screenshot.as_deref().map(|jpeg| STANDARD.encode(jpeg)),
            html: snapshot.html,
        },
    };

    Ok(Json(ScrapeResponse {
        success: true,
        url: snapshot.url,
        data,
    }))
}
