// ---------------------------------------------------------------------------
// browser/ - page-session capability and the shared browser handle
// ---------------------------------------------------------------------------
//
// Everything above this module talks to a browser through `BrowserContext`
// and `PageSession`. Backends:
//   chrome - headless Chromium via `headless_chrome` (blocking driver)
//   http   - plain HTTP fetch, no JavaScript, no screenshots
//   memory - in-process fixture site used by the test-suite

pub mod breaker;
pub mod chrome;
pub mod cookies;
pub mod http;
#[cfg(any(test, feature = "test-helpers"))]
pub mod memory;
pub mod session;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::OnceCell;

use breaker::LaunchBreaker;
use cookies::CookieJar;

pub use session::{capture, CaptureRequest, PageSnapshot};

#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("browser unavailable: {0}")]
    Unavailable(String),

    #[error("navigation to '{url}' failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("navigation to '{url}' timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("selector '{0}' not found")]
    SelectorNotFound(String),

    #[error("page operation failed: {0}")]
    Page(String),

    #[error("{0} is not supported by this browser backend")]
    Unsupported(&'static str),

    #[error("operation cancelled")]
    Cancelled,

    #[error("cookie jar I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("cookie jar format: {0}")]
    Json(#[from] serde_json::Error),
}

// ── Navigation options ──────────────────────────────────────────────────────

/// Page lifecycle event a navigation waits for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    Load,
    #[default]
    DomContentLoaded,
    NetworkIdle,
}

impl FromStr for WaitUntil {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "load" => Ok(Self::Load),
            "domcontentloaded" | "" => Ok(Self::DomContentLoaded),
            "networkidle" | "networkidle0" | "networkidle2" => Ok(Self::NetworkIdle),
            other => Err(format!(
                "unsupported wait_for '{}' (expected load, domcontentloaded or networkidle)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NavigateOptions {
    pub timeout: Duration,
    pub wait_until: WaitUntil,
}

impl NavigateOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            wait_until: WaitUntil::default(),
        }
    }
}

// ── Capability traits ───────────────────────────────────────────────────────

/// One open page (tab). Created and closed per visited URL.
#[async_trait]
pub trait PageSession: Send + Sync {
    async fn navigate(&self, url: &str, options: NavigateOptions) -> Result<(), BrowserError>;
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError>;
    /// Current URL after redirects.
    async fn url(&self) -> Result<String, BrowserError>;
    async fn title(&self) -> Result<String, BrowserError>;
    /// Serialized DOM of the rendered page.
    async fn content(&self) -> Result<String, BrowserError>;
    async fn screenshot_jpeg(&self, quality: u32) -> Result<Vec<u8>, BrowserError>;
    async fn close(&self) -> Result<(), BrowserError>;
}

/// A launched browser with its cookie store.
#[async_trait]
pub trait BrowserContext: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn PageSession>, BrowserError>;
    /// Cookie objects in the backend's JSON shape.
    async fn cookies(&self) -> Result<Vec<Value>, BrowserError>;
    async fn add_cookies(&self, cookies: Vec<Value>) -> Result<(), BrowserError>;
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    fn name(&self) -> &'static str;
    async fn launch(&self) -> Result<Arc<dyn BrowserContext>, BrowserError>;
}

// ── Shared handle ───────────────────────────────────────────────────────────

/// Process-wide browser, launched lazily on first use.
///
/// Concurrent first callers all wait on the same launch. A failed launch
/// leaves the cell empty so a later request can retry; repeated failures trip
/// the breaker and fail fast until it recovers.
pub struct BrowserHandle {
    launcher: Arc<dyn BrowserLauncher>,
    context: OnceCell<Arc<dyn BrowserContext>>,
    cookie_jar: CookieJar,
    breaker: LaunchBreaker,
}

impl BrowserHandle {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, cookie_jar: CookieJar) -> Self {
        Self {
            launcher,
            context: OnceCell::new(),
            cookie_jar,
            breaker: LaunchBreaker::new(),
        }
    }

    pub fn backend(&self) -> &'static str {
        self.launcher.name()
    }

    pub fn is_initialized(&self) -> bool {
        self.context.initialized()
    }

    pub fn cookie_jar(&self) -> &CookieJar {
        &self.cookie_jar
    }

    pub async fn context(&self) -> Result<Arc<dyn BrowserContext>, BrowserError> {
        if let Some(ctx) = self.context.get() {
            return Ok(ctx.clone());
        }
        self.breaker.check()?;

        let ctx = self
            .context
            .get_or_try_init(|| async {
                tracing::info!("browser: launching {} backend", self.launcher.name());
                let ctx = match self.launcher.launch().await {
                    Ok(ctx) => ctx,
                    Err(e) => {
                        self.breaker.record_failure();
                        return Err(e);
                    }
                };
                self.breaker.record_success();
                self.restore_cookies(ctx.as_ref()).await;
                Ok(ctx)
            })
            .await?;
        Ok(ctx.clone())
    }

    async fn restore_cookies(&self, ctx: &dyn BrowserContext) {
        match self.cookie_jar.load().await {
            Ok(cookies) if cookies.is_empty() => {}
            Ok(cookies) => {
                let count = cookies.len();
                match ctx.add_cookies(cookies).await {
                    Ok(()) => tracing::info!("browser: restored {} cookies", count),
                    Err(BrowserError::Unsupported(_)) => {}
                    Err(e) => tracing::warn!("browser: failed to restore cookies: {}", e),
                }
            }
            Err(e) => tracing::warn!("browser: failed to read cookie jar: {}", e),
        }
    }

    /// Overwrite the cookie snapshot with the browser's current cookies.
    /// Failures are logged; they never fail the request that triggered them.
    pub async fn persist_cookies(&self, ctx: &dyn BrowserContext) {
        let cookies = match ctx.cookies().await {
            Ok(c) => c,
            Err(BrowserError::Unsupported(_)) => return,
            Err(e) => {
                tracing::warn!("browser: failed to read cookies: {}", e);
                return;
            }
        };
        if let Err(e) = self.cookie_jar.save(&cookies).await {
            tracing::warn!("browser: failed to save cookie jar: {}", e);
        }
    }
}

// ── Helpers for DOM-less backends ───────────────────────────────────────────

pub(crate) fn document_title(html: &str) -> String {
    let doc = Html::parse_document(html);
    Selector::parse("title")
        .ok()
        .and_then(|sel| doc.select(&sel).next().map(|el| el.text().collect::<String>()))
        .unwrap_or_default()
        .trim()
        .to_string()
}

pub(crate) fn has_match(html: &str, selector: &str) -> Result<bool, BrowserError> {
    let sel = Selector::parse(selector)
        .map_err(|e| BrowserError::Page(format!("invalid selector '{}': {}", selector, e)))?;
    Ok(Html::parse_document(html).select(&sel).next().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::memory::{MemoryLauncher, MemorySite};
    use std::time::Duration;

    #[test]
    fn wait_until_parses_playwright_names() {
        assert_eq!("load".parse::<WaitUntil>().unwrap(), WaitUntil::Load);
        assert_eq!(
            "domcontentloaded".parse::<WaitUntil>().unwrap(),
            WaitUntil::DomContentLoaded
        );
        assert_eq!("networkidle".parse::<WaitUntil>().unwrap(), WaitUntil::NetworkIdle);
        assert!("whenever".parse::<WaitUntil>().is_err());
    }

    #[tokio::test]
    async fn concurrent_first_use_launches_once() {
        let launcher = Arc::new(
            MemoryLauncher::new(MemorySite::new()).with_launch_delay(Duration::from_millis(50)),
        );
        let handle = Arc::new(BrowserHandle::new(launcher.clone(), CookieJar::disabled()));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move { handle.context().await.is_ok() }));
        }
        for task in tasks {
            assert!(task.await.unwrap());
        }
        assert_eq!(launcher.launch_count(), 1);
        assert!(handle.is_initialized());
    }

    #[tokio::test]
    async fn failed_launch_is_retried_by_the_next_caller() {
        let launcher = Arc::new(MemoryLauncher::new(MemorySite::new()).failing_launches(1));
        let handle = BrowserHandle::new(launcher.clone(), CookieJar::disabled());

        assert!(matches!(handle.context().await, Err(BrowserError::Launch(_))));
        assert!(!handle.is_initialized());
        assert!(handle.context().await.is_ok());
        assert_eq!(launcher.launch_count(), 2);
    }
}
