use serde::{Deserialize, Serialize};

use crate::extract::{ExtractedPage, JobPosting, ProfileKind};
use crate::search::SearchMatch;
use crate::traversal::NodeId;

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_MS
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub uptime_seconds: u64,
    pub browser_backend: String,
    pub browser_initialized: bool,
}

// ---------------------------------------------------------------------------
// Scrape
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScrapeQuery {
    pub url: Option<String>,
    pub selector: Option<String>,
    pub wait_for: Option<String>,
    /// Milliseconds; navigation and selector wait each get the full value.
    pub timeout: Option<u64>,
    pub format: Option<String>,
    #[serde(default)]
    pub profile: ProfileKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeFormat {
    /// Full HTML plus a base64 JPEG screenshot.
    Html,
    Readable,
    Markdown,
}

impl ScrapeFormat {
    /// Unknown values fall back to the full-HTML format.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|f| f.trim().to_ascii_lowercase()).as_deref() {
            Some("readable") => Self::Readable,
            Some("markdown") => Self::Markdown,
            _ => Self::Html,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ScrapeData {
    Html {
        url: String,
        title: String,
        html: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        screenshot: Option<String>,
    },
    Readable(ExtractedPage),
    Markdown {
        url: String,
        title: String,
        markdown: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ScrapeResponse {
    pub success: bool,
    pub url: String,
    pub data: ScrapeData,
}

// ---------------------------------------------------------------------------
// Crawl
// ---------------------------------------------------------------------------

fn default_crawl_pages() -> usize {
    10
}

fn default_crawl_depth() -> u32 {
    2
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrawlRequest {
    #[serde(default, alias = "url")]
    pub start_url: Option<String>,
    #[serde(default = "default_crawl_pages")]
    pub max_pages: usize,
    #[serde(default = "default_true")]
    pub same_domain: bool,
    #[serde(default = "default_crawl_depth")]
    pub max_depth: u32,
    #[serde(default)]
    pub include_pattern: Option<String>,
    #[serde(default)]
    pub exclude_pattern: Option<String>,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub profile: ProfileKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrawlResult {
    pub url: String,
    pub title: String,
    pub depth: u32,
    pub content: ExtractedPage,
}

/// A frontier entry whose visit failed.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedPage {
    pub url: String,
    pub depth: u32,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrawlResponse {
    pub success: bool,
    pub pages_crawled: usize,
    pub total_discovered: usize,
    pub results: Vec<CrawlResult>,
    pub skipped: Vec<SkippedPage>,
}

// ---------------------------------------------------------------------------
// Map
// ---------------------------------------------------------------------------

fn default_map_urls() -> usize {
    100
}

fn default_map_depth() -> u32 {
    3
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapRequest {
    #[serde(default, alias = "url")]
    pub start_url: Option<String>,
    #[serde(default = "default_map_urls")]
    pub max_urls: usize,
    #[serde(default = "default_map_depth")]
    pub max_depth: u32,
    #[serde(default = "default_true")]
    pub same_domain: bool,
    #[serde(default)]
    pub include_pattern: Option<String>,
    #[serde(default)]
    pub exclude_pattern: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MapNode {
    pub id: NodeId,
    pub url: String,
    pub depth: u32,
}

/// Parent -> child link. Revisits add further edges to an existing node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MapEdge {
    pub source: NodeId,
    pub target: NodeId,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SiteMap {
    pub nodes: Vec<MapNode>,
    pub links: Vec<MapEdge>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MapResponse {
    pub success: bool,
    pub urls_mapped: usize,
    pub site_map: SiteMap,
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

fn default_search_pages() -> usize {
    20
}

fn default_search_depth() -> u32 {
    2
}

fn default_context_size() -> usize {
    100
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    #[serde(default, alias = "url")]
    pub start_url: Option<String>,
    #[serde(default, alias = "query")]
    pub search_term: Option<String>,
    #[serde(default = "default_search_pages")]
    pub max_pages: usize,
    #[serde(default = "default_search_depth")]
    pub max_depth: u32,
    #[serde(default = "default_true")]
    pub same_domain: bool,
    #[serde(default)]
    pub include_pattern: Option<String>,
    #[serde(default)]
    pub exclude_pattern: Option<String>,
    #[serde(default = "default_context_size")]
    pub context_size: usize,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Stop after this many pages with at least one match.
    #[serde(default)]
    pub max_results: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub matches: Vec<SearchMatch>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub search_term: String,
    pub pages_searched: usize,
    pub matches_found: usize,
    pub results: Vec<SearchResult>,
    pub skipped: Vec<SkippedPage>,
}

// ---------------------------------------------------------------------------
// Job posting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct JobQuery {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobResponse {
    pub success: bool,
    pub url: String,
    pub job: JobPosting,
}
