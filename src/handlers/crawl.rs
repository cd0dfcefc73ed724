// ---------------------------------------------------------------------------
// handlers/crawl.rs — multi-page runs: crawl, map, search
// ---------------------------------------------------------------------------
//
// All three endpoints share one shape: validate input, build filters and a
// budget clamped by the server limits, run the traversal engine with a
// mode-specific visitor, persist cookies, shape the response.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use url::Url;

use crate::aggregate::{CrawlCollector, PageSettings, SearchCollector, SiteMapper};
use crate::models::{
    CrawlRequest, CrawlResponse, MapRequest, MapResponse, SearchRequest, SearchResponse,
};
use crate::search::SearchPattern;
use crate::state::AppState;
use crate::traversal::{parse_seed, Budget, FilterSet, Traversal, TraversalError};

use super::{required, ApiError};

/// Client-supplied run parameters common to every mode.
struct RunInput<'a> {
    start_url: Option<&'a str>,
    same_domain: bool,
    include_pattern: Option<&'a str>,
    exclude_pattern: Option<&'a str>,
    max_pages: usize,
    max_depth: u32,
    max_results: Option<usize>,
    /// Keep document and image links (map mode).
    binary_links: bool,
}

/// Validated seed, filters and budget for one run.
struct RunPlan {
    seed: Url,
    filters: FilterSet,
    budget: Budget,
    cancel: CancellationToken,
}

impl RunPlan {
    /// Every input error surfaces here, before the browser is touched.
    fn new(state: &AppState, input: RunInput<'_>) -> Result<Self, ApiError> {
        let seed = parse_seed(required(input.start_url, "start_url")?)?;
        let mut filters = FilterSet::new(&seed, input.same_domain, input.include_pattern, input.exclude_pattern)?;
        if input.binary_links {
            filters = filters.with_binary_links();
        }
        filters
            .admit(seed.as_str())
            .ok_or_else(|| TraversalError::SeedRejected(seed.to_string()))?;
        let budget = Budget::new(
            state.config.clamp_pages(input.max_pages),
            state.config.clamp_depth(input.max_depth),
        )
        .with_max_results(input.max_results.map(|n| state.config.clamp_pages(n)))
        .with_time_limit(state.config.crawl_time_limit);
        Ok(Self {
            seed,
            filters,
            budget,
            cancel: state.run_token(),
        })
    }

    fn traversal(&self) -> Traversal {
        Traversal::new(self.budget.clone(), self.filters.clone()).with_cancellation(self.cancel.clone())
    }

    fn span(&self, mode: &'static str) -> tracing::Span {
        tracing::info_span!("traverse", mode, seed = %self.seed)
    }
}

// ---------------------------------------------------------------------------
// Crawl
// ---------------------------------------------------------------------------

/// POST /crawl — breadth-first crawl returning extracted content per page.
pub async fn crawl(
    State(state): State<AppState>,
    payload: Result<Json<CrawlRequest>, JsonRejection>,
) -> Result<Json<CrawlResponse>, ApiError> {
    let Json(req) = payload?;
    let plan = RunPlan::new(
        &state,
        RunInput {
            start_url: req.start_url.as_deref(),
            same_domain: req.same_domain,
            include_pattern: req.include_pattern.as_deref(),
            exclude_pattern: req.exclude_pattern.as_deref(),
            max_pages: req.max_pages,
            max_depth: req.max_depth,
            max_results: None,
            binary_links: false,
        },
    )?;

    let timeout = state.config.timeout(Some(req.timeout));
    let selector = req.selector.filter(|s| !s.trim().is_empty());
    let settings = PageSettings::new(timeout).wait_for(selector, timeout / 2);
    let profile = req.profile.profile();

    let span = plan.span("crawl");
    async move {
        tracing::info!("Starting crawl from: {}", plan.seed);
        let ctx = state.browser.context().await?;
        let mut collector = CrawlCollector::new(ctx.clone(), settings, profile, plan.cancel.clone());
        let summary = plan.traversal().run(&plan.seed, &mut collector).await?;
        state.browser.persist_cookies(ctx.as_ref()).await;

        Ok::<_, ApiError>(Json(CrawlResponse {
            success: true,
            pages_crawled: collector.results.len(),
            total_discovered: summary.enqueued,
            results: collector.results,
            skipped: collector.skipped,
        }))
    }
    .instrument(span)
    .await
}

// ---------------------------------------------------------------------------
// Map
// ---------------------------------------------------------------------------

/// POST /map — site graph of reachable URLs; navigation only, no extraction.
pub async fn map(
    State(state): State<AppState>,
    payload: Result<Json<MapRequest>, JsonRejection>,
) -> Result<Json<MapResponse>, ApiError> {
    let Json(req) = payload?;
    let plan = RunPlan::new(
        &state,
        RunInput {
            start_url: req.start_url.as_deref(),
            same_domain: req.same_domain,
            include_pattern: req.include_pattern.as_deref(),
            exclude_pattern: req.exclude_pattern.as_deref(),
            max_pages: req.max_urls,
            max_depth: req.max_depth,
            max_results: None,
            // Documents and images are part of the map even though they are never crawled.
            binary_links: true,
        },
    )?;

    let settings = PageSettings::new(state.config.timeout(Some(req.timeout)));

    let span = plan.span("map");
    async move {
        tracing::info!("Starting site mapping from: {}", plan.seed);
        let ctx = state.browser.context().await?;
        let mut mapper = SiteMapper::new(ctx.clone(), settings, plan.budget.max_depth, plan.cancel.clone());
        plan.traversal().keep_revisits().run(&plan.seed, &mut mapper).await?;
        state.browser.persist_cookies(ctx.as_ref()).await;

        let site_map = mapper.into_site_map();
        Ok::<_, ApiError>(Json(MapResponse {
            success: true,
            urls_mapped: site_map.nodes.len(),
            site_map,
        }))
    }
    .instrument(span)
    .await
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// POST /search — crawl and report every page whose text matches the term.
pub async fn search(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Json(req) = payload?;
    let term = required(req.search_term.as_deref(), "search_term")?.to_string();
    let plan = RunPlan::new(
        &state,
        RunInput {
            start_url: req.start_url.as_deref(),
            same_domain: req.same_domain,
            include_pattern: req.include_pattern.as_deref(),
            exclude_pattern: req.exclude_pattern.as_deref(),
            max_pages: req.max_pages,
            max_depth: req.max_depth,
            max_results: req.max_results,
            binary_links: false,
        },
    )?;

    let pattern = SearchPattern::new(&term);
    let settings = PageSettings::new(state.config.timeout(Some(req.timeout)));
    let context_size = req.context_size;

    let span = plan.span("search");
    async move {
        tracing::info!("Searching for \"{}\" starting from: {}", term, plan.seed);
        let ctx = state.browser.context().await?;
        let mut collector = SearchCollector::new(ctx.clone(), settings, pattern, context_size, plan.cancel.clone());
        let summary = plan.traversal().run(&plan.seed, &mut collector).await?;
        state.browser.persist_cookies(ctx.as_ref()).await;

        Ok::<_, ApiError>(Json(SearchResponse {
            success: true,
            matches_found: collector.matches_found(),
            search_term: term,
            pages_searched: summary.visited,
            results: collector.results,
            skipped: collector.skipped,
        }))
    }
    .instrument(span)
    .await
}
