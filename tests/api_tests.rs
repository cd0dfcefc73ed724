// Scraper API integration tests
//
// Every test drives the real router against the in-memory browser backend,
// so no Chrome binary or network access is needed.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use ultimate_scraper::browser::cookies::CookieJar;
use ultimate_scraper::browser::memory::{MemoryLauncher, MemorySite};
use ultimate_scraper::config::Config;
use ultimate_scraper::state::AppState;

const HOME: &str = r#"<html><head><title>Acme</title>
    <meta name="description" content="Acme home"></head>
    <body>
      <header><a href="/login">Log in</a></header>
      <main>
        <h1>Acme Widgets</h1>
        <p>Hello and welcome to Acme.</p>
        <a href="/blog/post-1">First post</a>
        <a href="/about">About us</a>
        <a href="/slow">Slow page</a>
        <a href="https://elsewhere.test/">Partner</a>
      </main>
    </body></html>"#;

const ABOUT: &str = r#"<html><head><title>About</title></head>
    <body><main><h2>Requirements</h2><p>We say hello to everyone.</p>
    <a href="/">Home</a></main></body></html>"#;

const POST: &str = r#"<html><head><title>Post 1</title></head>
    <body><article><h1>First post</h1><p>Nothing to report.</p>
    <a href="/blog/post-2">Next</a></article></body></html>"#;

const JOB: &str = r#"<html><head><title>Job</title></head><body>
    <h1 class="top-card-layout__title">Rust Engineer</h1>
    <a class="topcard__org-name-link">Acme</a>
    <span class="topcard__flavor--bullet">Remote</span>
    <div class="description__text"><strong>Requirements</strong><p>Rust and tokio.</p></div>
    </body></html>"#;

fn site() -> MemorySite {
    MemorySite::new()
        .page("https://acme.test/", HOME)
        .page("https://acme.test/about", ABOUT)
        .page("https://acme.test/blog/post-1", POST)
        .page("https://acme.test/blog/post-2", POST)
        .timeout("https://acme.test/slow")
        .page("https://jobs.test/view/1", JOB)
}

fn config() -> Config {
    Config {
        default_timeout: Duration::from_secs(2),
        ..Config::default()
    }
}

fn test_state(launcher: Arc<MemoryLauncher>, jar: CookieJar) -> AppState {
    AppState::with_launcher(config(), launcher, jar)
}

fn app() -> (axum::Router, Arc<MemoryLauncher>) {
    let launcher = Arc::new(MemoryLauncher::new(site()));
    let state = test_state(launcher.clone(), CookieJar::disabled());
    (ultimate_scraper::create_router(state), launcher)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get(app: axum::Router, uri: &str) -> axum::response::Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn post(app: axum::Router, uri: &str, body: Value) -> axum::response::Response {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════
//  /scrape
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn scrape_requires_url() {
    let (app, launcher) = app();
    let response = get(app, "/scrape").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await, json!({ "error": "URL is required" }));
    assert_eq!(launcher.launch_count(), 0);
}

#[tokio::test]
async fn scrape_default_format_has_html_and_screenshot() {
    let (app, _) = app();
    let response = get(app, "/scrape?url=acme.test").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["url"], "https://acme.test/");
    assert_eq!(json["data"]["title"], "Acme");
    assert!(json["data"]["html"].as_str().unwrap().contains("Acme Widgets"));
    assert!(!json["data"]["screenshot"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn scrape_readable_format_returns_extracted_page() {
    let (app, _) = app();
    let response = get(app, "/scrape?url=https://acme.test/about&format=readable").await;
    assert_eq!(response.status(), StatusCode::OK);

    let data = body_json(response).await["data"].clone();
    assert_eq!(data["title"], "About");
    assert_eq!(data["headings"], json!([{ "level": 2, "text": "Requirements" }]));
    assert!(data["textContent"].as_str().unwrap().contains("We say hello to everyone."));
    assert_eq!(data["metaDescription"], "");
}

#[tokio::test]
async fn scrape_markdown_format_drops_boilerplate() {
    let (app, _) = app();
    let response = get(app, "/scrape?url=https://acme.test/&format=markdown").await;
    let data = body_json(response).await["data"].clone();

    let markdown = data["markdown"].as_str().unwrap();
    assert!(markdown.contains("# Acme Widgets"));
    assert!(markdown.contains("[First post](/blog/post-1)"));
    assert!(!markdown.contains("Log in"));
    assert!(data.get("html").is_none());
}

#[tokio::test]
async fn scrape_survives_deeply_nested_markup() {
    let deep = format!(
        "<html><head><title>Deep</title></head><body><main>{}<p>bottom line</p>{}</main></body></html>",
        "<div>".repeat(10_000),
        "</div>".repeat(10_000)
    );
    let launcher = Arc::new(MemoryLauncher::new(MemorySite::new().page("https://deep.test/", deep)));
    let app = ultimate_scraper::create_router(test_state(launcher, CookieJar::disabled()));

    let response = get(app.clone(), "/scrape?url=https://deep.test/&format=readable").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["textContent"], "bottom line");

    let response = get(app, "/scrape?url=https://deep.test/&format=markdown").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await["data"]["markdown"].as_str().unwrap().contains("bottom line"));
}

#[tokio::test]
async fn scrape_rejects_unknown_wait_for() {
    let (app, launcher) = app();
    let response = get(app, "/scrape?url=https://acme.test/&wait_for=forever").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(launcher.launch_count(), 0);
}

#[tokio::test]
async fn scrape_navigation_timeout_is_500() {
    let (app, _) = app();
    let response = get(app, "/scrape?url=https://acme.test/slow&timeout=100").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("timed out"));
}

#[tokio::test]
async fn browser_launch_failure_is_500_and_retried() {
    let launcher = Arc::new(MemoryLauncher::new(site()).failing_launches(1));
    let app = ultimate_scraper::create_router(test_state(launcher.clone(), CookieJar::disabled()));

    let first = get(app.clone(), "/scrape?url=https://acme.test/").await;
    assert_eq!(first.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let second = get(app, "/scrape?url=https://acme.test/").await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(launcher.launch_count(), 2);
}

// ═══════════════════════════════════════════════════════════════════════════
//  /crawl
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn crawl_requires_start_url() {
    let (app, _) = app();
    let response = post(app, "/crawl", json!({ "max_pages": 3 })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await, json!({ "error": "start_url is required" }));
}

#[tokio::test]
async fn crawl_rejects_invalid_pattern_before_launching() {
    let (app, launcher) = app();
    let response = post(
        app,
        "/crawl",
        json!({ "start_url": "https://acme.test/", "include_pattern": "(" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(launcher.launch_count(), 0);
}

#[tokio::test]
async fn crawl_seed_outside_its_own_filters_is_rejected_before_launching() {
    let launcher = Arc::new(MemoryLauncher::new(site()).failing_launches(1));
    let app = ultimate_scraper::create_router(test_state(launcher.clone(), CookieJar::disabled()));

    let response = post(
        app.clone(),
        "/crawl",
        json!({ "start_url": "https://acme.test/", "include_pattern": "/blog/" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].as_str().unwrap().contains("excluded"));

    let response = post(
        app,
        "/search",
        json!({ "start_url": "https://acme.test/about", "search_term": "x", "exclude_pattern": "about" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(launcher.launch_count(), 0);
}

#[tokio::test]
async fn crawl_rejects_malformed_json() {
    let (app, _) = app();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/crawl")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());
}

#[tokio::test]
async fn crawl_single_page_budget() {
    let (app, launcher) = app();
    let response = post(app, "/crawl", json!({ "start_url": "https://acme.test/", "max_pages": 1 })).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["pages_crawled"], 1);
    assert_eq!(json["total_discovered"], 1);
    assert_eq!(json["results"][0]["url"], "https://acme.test/");
    assert_eq!(json["results"][0]["depth"], 0);
    assert_eq!(launcher.navigations(), vec!["https://acme.test/"]);
}

#[tokio::test]
async fn crawl_skips_timeouts_and_keeps_going() {
    let (app, launcher) = app();
    let response = post(
        app,
        "/crawl",
        json!({ "start_url": "https://acme.test/", "max_depth": 1, "timeout": 100 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let urls: Vec<&str> = json["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["url"].as_str().unwrap())
        .collect();
    assert_eq!(
        urls,
        vec!["https://acme.test/", "https://acme.test/blog/post-1", "https://acme.test/about"]
    );
    // The header login link is discovered from the full page but does not resolve.
    let skipped: Vec<&str> = json["skipped"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["url"].as_str().unwrap())
        .collect();
    assert_eq!(skipped, vec!["https://acme.test/login", "https://acme.test/slow"]);
    assert_eq!(json["skipped"][1]["depth"], 1);
    // Off-domain partner link never reaches the browser.
    assert!(!launcher.navigations().iter().any(|u| u.contains("elsewhere.test")));
    assert_eq!(launcher.open_pages(), 0);
}

#[tokio::test]
async fn crawl_include_pattern_limits_children() {
    let (app, launcher) = app();
    let response = post(
        app,
        "/crawl",
        json!({ "start_url": "https://acme.test/", "include_pattern": "/blog/|acme\\.test/$" }),
    )
    .await;
    let json = body_json(response).await;

    assert_eq!(json["pages_crawled"], 3);
    let navigations = launcher.navigations();
    assert!(navigations.contains(&"https://acme.test/blog/post-2".to_string()));
    assert!(!navigations.contains(&"https://acme.test/about".to_string()));
    for result in json["results"].as_array().unwrap() {
        assert!(result["depth"].as_u64().unwrap() <= 2);
    }
}

#[tokio::test]
async fn crawl_lists_a_redirect_target_once() {
    let site = MemorySite::new()
        .page(
            "https://r.test/",
            r#"<html><head><title>Root</title></head><body><main><p>Start</p>
               <a href="/a">A</a><a href="/b">B</a><a href="/final">Final</a></main></body></html>"#,
        )
        .redirect("https://r.test/a", "https://r.test/final")
        .redirect("https://r.test/b", "https://r.test/final")
        .page(
            "https://r.test/final",
            r#"<html><head><title>Final</title></head><body><main><p>Landed</p></main></body></html>"#,
        );
    let launcher = Arc::new(MemoryLauncher::new(site));
    let app = ultimate_scraper::create_router(test_state(launcher.clone(), CookieJar::disabled()));

    let response = post(app, "/crawl", json!({ "start_url": "https://r.test/", "max_depth": 2 })).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let urls: Vec<&str> = json["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["url"].as_str().unwrap())
        .collect();
    assert_eq!(urls, vec!["https://r.test/", "https://r.test/final"]);
    assert_eq!(json["pages_crawled"], 2);
    // The direct link to /final was queued before /a landed there.
    assert!(!launcher.navigations().contains(&"https://r.test/final".to_string()));
}

// ═══════════════════════════════════════════════════════════════════════════
//  /map
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn map_builds_graph_with_back_edges() {
    let (app, _) = app();
    let response = post(
        app,
        "/map",
        json!({ "start_url": "https://acme.test/about", "max_depth": 1, "timeout": 100 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["urls_mapped"], 2);
    assert_eq!(
        json["site_map"]["nodes"],
        json!([
            { "id": 0, "url": "https://acme.test/about", "depth": 0 },
            { "id": 1, "url": "https://acme.test/", "depth": 1 }
        ])
    );
    assert_eq!(json["site_map"]["links"], json!([{ "source": 0, "target": 1 }]));
}

#[tokio::test]
async fn map_respects_max_urls() {
    let (app, launcher) = app();
    let response = post(
        app,
        "/map",
        json!({ "url": "https://acme.test/", "max_urls": 2, "timeout": 100 }),
    )
    .await;
    let json = body_json(response).await;
    assert_eq!(json["urls_mapped"], 2);
    assert!(launcher.navigations().len() <= 2);
}

// ═══════════════════════════════════════════════════════════════════════════
//  /search
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn search_requires_term() {
    let (app, _) = app();
    let response = post(app, "/search", json!({ "start_url": "https://acme.test/" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await, json!({ "error": "search_term is required" }));
}

#[tokio::test]
async fn search_reports_matching_pages_only() {
    let (app, _) = app();
    let response = post(
        app,
        "/search",
        json!({
            "start_url": "https://acme.test/",
            "search_term": "hello",
            "max_depth": 1,
            "context_size": 5,
            "timeout": 100
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["search_term"], "hello");
    // Home, login (unresolved), post-1, about, slow (timed out).
    assert_eq!(json["pages_searched"], 5);
    assert_eq!(json["matches_found"], 2);
    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["url"], "https://acme.test/");
    assert_eq!(results[0]["matches"][0]["term"], "Hello");
    assert_eq!(results[1]["url"], "https://acme.test/about");
}

#[tokio::test]
async fn search_stops_at_max_results() {
    let (app, _) = app();
    let response = post(
        app,
        "/search",
        json!({ "start_url": "https://acme.test/", "query": "hello", "max_results": 1 }),
    )
    .await;
    let json = body_json(response).await;
    assert_eq!(json["pages_searched"], 1);
    assert_eq!(json["results"].as_array().unwrap().len(), 1);
}

// ═══════════════════════════════════════════════════════════════════════════
//  /get-linkedin-url
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn job_posting_fields_are_extracted() {
    let (app, _) = app();
    let response = get(app, "/get-linkedin-url?url=https://jobs.test/view/1").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["url"], "https://jobs.test/view/1");
    assert_eq!(json["job"]["jobTitle"], "Rust Engineer");
    assert_eq!(json["job"]["companyName"], "Acme");
    assert_eq!(json["job"]["location"], "Remote");
    assert_eq!(json["job"]["requirements"], "Rust and tokio.");
}

#[tokio::test]
async fn job_posting_requires_url() {
    let (app, _) = app();
    let response = get(app, "/get-linkedin-url").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ═══════════════════════════════════════════════════════════════════════════
//  Cookies & routing
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn cookies_are_restored_and_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cookies.json");
    std::fs::write(&path, r#"[{"name":"sid","value":"abc","domain":"acme.test"}]"#).unwrap();

    let launcher = Arc::new(MemoryLauncher::new(site()));
    let app = ultimate_scraper::create_router(test_state(launcher.clone(), CookieJar::new(&path)));
    let response = get(app, "/scrape?url=https://acme.test/&format=markdown").await;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(launcher.cookies().len(), 1);
    let saved: Vec<Value> = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(saved[0]["name"], "sid");
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let (app, _) = app();
    let response = get(app, "/nonexistent/route").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
