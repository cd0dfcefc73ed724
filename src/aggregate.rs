// ---------------------------------------------------------------------------
// aggregate.rs - per-mode visitors that turn visits into response payloads
// ---------------------------------------------------------------------------
//
// Each visitor opens one page per URL through the shared browser context,
// hands the snapshot to the extractors and keeps what its endpoint returns.
// Failures become `SkippedPage` entries; the run itself carries on.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::browser::{capture, BrowserContext, BrowserError, CaptureRequest, NavigateOptions, PageSnapshot};
use crate::extract::{discover_links, extract_page, readable_text, ExtractionProfile};
use crate::models::{CrawlResult, MapEdge, MapNode, SearchResult, SiteMap, SkippedPage};
use crate::search::SearchPattern;
use crate::traversal::{normalize_url, FrontierEntry, NodeId, VisitOutcome, Visitor};

/// How each page of a run is opened.
#[derive(Debug, Clone)]
pub struct PageSettings {
    pub navigation: NavigateOptions,
    pub selector: Option<String>,
    pub selector_timeout: Duration,
}

impl PageSettings {
    pub fn new(timeout: Duration) -> Self {
        Self {
            navigation: NavigateOptions::new(timeout),
            selector: None,
            selector_timeout: timeout,
        }
    }

    pub fn wait_for(mut self, selector: Option<String>, timeout: Duration) -> Self {
        self.selector = selector;
        self.selector_timeout = timeout;
        self
    }
}

/// Shared plumbing: one browser context, page settings, cancellation.
struct PageOpener {
    ctx: Arc<dyn BrowserContext>,
    settings: PageSettings,
    cancel: CancellationToken,
}

impl PageOpener {
    async fn open(&self, url: &str) -> Result<PageSnapshot, BrowserError> {
        let request = CaptureRequest::new(url, self.settings.navigation)
            .wait_for(self.settings.selector.as_deref(), self.settings.selector_timeout);
        capture(self.ctx.as_ref(), &request, &self.cancel).await
    }
}

/// Links are resolved against the final URL; a redirect can change the base.
fn links_of(snapshot: &PageSnapshot, requested: &str) -> Vec<String> {
    match Url::parse(&snapshot.url).or_else(|_| Url::parse(requested)) {
        Ok(base) => discover_links(&snapshot.html, &base),
        Err(_) => Vec::new(),
    }
}

/// Canonical form of the URL a page settled on.
fn final_key(snapshot: &PageSnapshot) -> String {
    Url::parse(&snapshot.url)
        .map(|u| normalize_url(&u))
        .unwrap_or_else(|_| snapshot.url.clone())
}

fn skipped(entry: &FrontierEntry, err: &BrowserError) -> SkippedPage {
    tracing::warn!(url = %entry.url, depth = entry.depth, "visit failed: {}", err);
    SkippedPage {
        url: entry.url.clone(),
        depth: entry.depth,
        error: err.to_string(),
    }
}

// ── Crawl ───────────────────────────────────────────────────────────────────

pub struct CrawlCollector {
    opener: PageOpener,
    profile: &'static ExtractionProfile,
    recorded: HashSet<String>,
    pub results: Vec<CrawlResult>,
    pub skipped: Vec<SkippedPage>,
}

impl CrawlCollector {
    pub fn new(
        ctx: Arc<dyn BrowserContext>,
        settings: PageSettings,
        profile: &'static ExtractionProfile,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            opener: PageOpener { ctx, settings, cancel },
            profile,
            recorded: HashSet::new(),
            results: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

#[async_trait]
impl Visitor for CrawlCollector {
    async fn visit(&mut self, entry: &FrontierEntry, _node: NodeId) -> VisitOutcome {
        let snapshot = match self.opener.open(&entry.url).await {
            Ok(s) => s,
            Err(e) => {
                self.skipped.push(skipped(entry, &e));
                return VisitOutcome::failed();
            }
        };
        let links = links_of(&snapshot, &entry.url);
        let key = final_key(&snapshot);
        if !self.recorded.insert(key.clone()) {
            tracing::debug!(url = %entry.url, target = %key, "crawl: redirect target already recorded");
            return VisitOutcome::success(links).with_final_url(key);
        }
        let content = extract_page(&snapshot.html, &snapshot.url, self.profile);
        self.results.push(CrawlResult {
            url: snapshot.url,
            title: snapshot.title,
            depth: entry.depth,
            content,
        });
        VisitOutcome::success(links).with_result(true).with_final_url(key)
    }
}

// ── Map ─────────────────────────────────────────────────────────────────────

pub struct SiteMapper {
    opener: PageOpener,
    max_depth: u32,
    map: SiteMap,
}

impl SiteMapper {
    pub fn new(ctx: Arc<dyn BrowserContext>, settings: PageSettings, max_depth: u32, cancel: CancellationToken) -> Self {
        Self {
            opener: PageOpener { ctx, settings, cancel },
            max_depth,
            map: SiteMap::default(),
        }
    }

    pub fn into_site_map(self) -> SiteMap {
        self.map
    }
}

#[async_trait]
impl Visitor for SiteMapper {
    async fn visit(&mut self, entry: &FrontierEntry, node: NodeId) -> VisitOutcome {
        self.map.nodes.push(MapNode {
            id: node,
            url: entry.url.clone(),
            depth: entry.depth,
        });
        if let Some(parent) = entry.parent {
            self.map.links.push(MapEdge {
                source: parent,
                target: node,
            });
        }
        // Leaves are recorded without opening them.
        if entry.depth >= self.max_depth {
            return VisitOutcome::success(Vec::new());
        }
        match self.opener.open(&entry.url).await {
            Ok(snapshot) => VisitOutcome::success(links_of(&snapshot, &entry.url)),
            Err(e) => {
                tracing::warn!(url = %entry.url, "map: visit failed: {}", e);
                VisitOutcome::failed()
            }
        }
    }

    fn revisit(&mut self, entry: &FrontierEntry, existing: NodeId) {
        if let Some(parent) = entry.parent {
            self.map.links.push(MapEdge {
                source: parent,
                target: existing,
            });
        }
    }
}

// ── Search ──────────────────────────────────────────────────────────────────

pub struct SearchCollector {
    opener: PageOpener,
    pattern: SearchPattern,
    context_size: usize,
    recorded: HashSet<String>,
    pub results: Vec<SearchResult>,
    pub skipped: Vec<SkippedPage>,
}

impl SearchCollector {
    pub fn new(
        ctx: Arc<dyn BrowserContext>,
        settings: PageSettings,
        pattern: SearchPattern,
        context_size: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            opener: PageOpener { ctx, settings, cancel },
            pattern,
            context_size,
            recorded: HashSet::new(),
            results: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn matches_found(&self) -> usize {
        self.results.iter().map(|r| r.matches.len()).sum()
    }
}

#[async_trait]
impl Visitor for SearchCollector {
    async fn visit(&mut self, entry: &FrontierEntry, _node: NodeId) -> VisitOutcome {
        let snapshot = match self.opener.open(&entry.url).await {
            Ok(s) => s,
            Err(e) => {
                self.skipped.push(skipped(entry, &e));
                return VisitOutcome::failed();
            }
        };
        let links = links_of(&snapshot, &entry.url);
        let key = final_key(&snapshot);
        if !self.recorded.insert(key.clone()) {
            tracing::debug!(url = %entry.url, target = %key, "search: redirect target already searched");
            return VisitOutcome::success(links).with_final_url(key);
        }
        let text = readable_text(&snapshot.html, ExtractionProfile::standard());
        let matches = self.pattern.find_all(&text, self.context_size);
        let hit = !matches.is_empty();
        if hit {
            tracing::debug!(url = %snapshot.url, count = matches.len(), "search: page matched");
            self.results.push(SearchResult {
                url: snapshot.url,
                title: snapshot.title,
                matches,
            });
        }
        VisitOutcome::success(links).with_result(hit).with_final_url(key)
    }
}
