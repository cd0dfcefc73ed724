// Page session adapter: one page per URL, always closed afterwards.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{BrowserContext, BrowserError, NavigateOptions, PageSession};

/// Default JPEG quality for full-page screenshots.
const SCREENSHOT_QUALITY: u32 = 80;

#[derive(Debug, Clone)]
pub struct CaptureRequest<'a> {
    pub url: &'a str,
    pub navigation: NavigateOptions,
    /// Optional CSS selector to wait for; absence is logged, not fatal.
    pub selector: Option<&'a str>,
    pub selector_timeout: Duration,
    pub screenshot: bool,
}

impl<'a> CaptureRequest<'a> {
    pub fn new(url: &'a str, navigation: NavigateOptions) -> Self {
        Self {
            url,
            navigation,
            selector: None,
            selector_timeout: navigation.timeout,
            screenshot: false,
        }
    }

    pub fn wait_for(mut self, selector: Option<&'a str>, timeout: Duration) -> Self {
        self.selector = selector.map(str::trim).filter(|s| !s.is_empty());
        self.selector_timeout = timeout;
        self
    }

    pub fn with_screenshot(mut self) -> Self {
        self.screenshot = true;
        self
    }
}

/// What a visit hands to the extraction layer.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    /// Final URL after redirects.
    pub url: String,
    pub title: String,
    pub html: String,
    pub screenshot: Option<Vec<u8>>,
}

/// Open a page, navigate, optionally wait for a selector, and snapshot it.
/// The page is closed on every path, including errors and cancellation.
pub async fn capture(
    ctx: &dyn BrowserContext,
    request: &CaptureRequest<'_>,
    cancel: &CancellationToken,
) -> Result<PageSnapshot, BrowserError> {
    let page = ctx.new_page().await?;
    let result = capture_on(page.as_ref(), request, cancel).await;
    if let Err(e) = page.close().await {
        tracing::warn!("session: failed to close page for {}: {}", request.url, e);
    }
    result
}

async fn capture_on(
    page: &dyn PageSession,
    request: &CaptureRequest<'_>,
    cancel: &CancellationToken,
) -> Result<PageSnapshot, BrowserError> {
    let timeout = request.navigation.timeout;
    let navigation = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(BrowserError::Cancelled),
        res = tokio::time::timeout(timeout, page.navigate(request.url, request.navigation)) => res,
    };
    match navigation {
        Ok(res) => res?,
        Err(_) => {
            return Err(BrowserError::Timeout {
                url: request.url.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            });
        }
    }

    if let Some(selector) = request.selector {
        let waited = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(BrowserError::Cancelled),
            res = tokio::time::timeout(
                request.selector_timeout,
                page.wait_for_selector(selector, request.selector_timeout),
            ) => res,
        };
        match waited {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::info!("Selector \"{}\" not found on {}: {}", selector, request.url, e),
            Err(_) => tracing::info!(
                "Selector \"{}\" not found on {} within {}ms",
                selector,
                request.url,
                request.selector_timeout.as_millis()
            ),
        }
    }

    let url = page.url().await?;
    let title = page.title().await?;
    let html = page.content().await?;
    let screenshot = if request.screenshot {
        match page.screenshot_jpeg(SCREENSHOT_QUALITY).await {
            Ok(bytes) => Some(bytes),
            Err(BrowserError::Unsupported(what)) => {
                tracing::debug!("session: {} skipped for {}", what, request.url);
                None
            }
            Err(e) => return Err(e),
        }
    } else {
        None
    };

    Ok(PageSnapshot {
        url,
        title,
        html,
        screenshot,
    })
}
