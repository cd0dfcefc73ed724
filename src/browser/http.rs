// Plain HTTP backend.
//
// Fetches the raw document with reqwest and serves it as if it were the
// rendered DOM. No JavaScript runs, so selectors injected client-side never
// appear. Screenshots and cookie export are unsupported.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{
    document_title, has_match, BrowserContext, BrowserError, BrowserLauncher, NavigateOptions,
    PageSession,
};

const MAX_PAGE_SIZE: usize = 5 * 1024 * 1024;
const MAX_RETRY_ATTEMPTS: u32 = 3;

pub struct HttpLauncher {
    user_agent: String,
}

impl HttpLauncher {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }
}

#[async_trait]
impl BrowserLauncher for HttpLauncher {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn launch(&self) -> Result<Arc<dyn BrowserContext>, BrowserError> {
        let client = reqwest::Client::builder()
            .user_agent(&self.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| BrowserError::Launch(format!("HTTP client: {}", e)))?;
        Ok(Arc::new(HttpContext { client }))
    }
}

struct HttpContext {
    client: reqwest::Client,
}

#[async_trait]
impl BrowserContext for HttpContext {
    async fn new_page(&self) -> Result<Box<dyn PageSession>, BrowserError> {
        Ok(Box::new(HttpPage {
            client: self.client.clone(),
            loaded: Mutex::new(None),
        }))
    }

    async fn cookies(&self) -> Result<Vec<Value>, BrowserError> {
        Err(BrowserError::Unsupported("cookie export"))
    }

    async fn add_cookies(&self, _cookies: Vec<Value>) -> Result<(), BrowserError> {
        Err(BrowserError::Unsupported("cookie import"))
    }
}

#[derive(Clone)]
struct Loaded {
    url: String,
    body: String,
}

struct HttpPage {
    client: reqwest::Client,
    loaded: Mutex<Option<Loaded>>,
}

impl HttpPage {
    fn loaded(&self) -> Result<Loaded, BrowserError> {
        self.loaded
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
            .ok_or_else(|| BrowserError::Page("page has not been navigated".into()))
    }
}

/// GET with retry on 429/5xx and timeouts, exponential backoff between tries.
async fn fetch_with_retry(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<Loaded, BrowserError> {
    let fail = |reason: String| BrowserError::Navigation {
        url: url.to_string(),
        reason,
    };
    let mut last_err = String::new();

    for attempt in 0..MAX_RETRY_ATTEMPTS {
        if attempt > 0 {
            let delay = Duration::from_millis(250 * 2u64.pow(attempt));
            tokio::time::sleep(delay).await;
        }
        let req = client
            .get(url)
            .header("Accept", "text/html,application/xhtml+xml,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.9")
            .timeout(timeout);
        match req.send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = format!("HTTP {}", status.as_u16());
                    continue;
                }
                if !status.is_success() {
                    return Err(fail(format!("HTTP {}", status.as_u16())));
                }
                let ct = resp
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("");
                if !ct.is_empty() && !ct.contains("text/") && !ct.contains("html") && !ct.contains("xml") {
                    return Err(fail(format!("non-HTML content: {}", ct)));
                }
                if let Some(len) = resp.content_length()
                    && len as usize > MAX_PAGE_SIZE
                {
                    return Err(fail(format!("response too large: {} bytes", len)));
                }
                let final_url = resp.url().to_string();
                let bytes = resp
                    .bytes()
                    .await
                    .map_err(|e| fail(format!("read body: {}", e)))?;
                if bytes.len() > MAX_PAGE_SIZE {
                    return Err(fail(format!("response too large: {} bytes", bytes.len())));
                }
                return Ok(Loaded {
                    url: final_url,
                    body: String::from_utf8_lossy(&bytes).into_owned(),
                });
            }
            Err(e) => {
                last_err = e.to_string();
                if e.is_timeout() {
                    continue;
                }
                return Err(fail(last_err));
            }
        }
    }
    Err(fail(format!(
        "failed after {} attempts: {}",
        MAX_RETRY_ATTEMPTS, last_err
    )))
}

#[async_trait]
impl PageSession for HttpPage {
    async fn navigate(&self, url: &str, options: NavigateOptions) -> Result<(), BrowserError> {
        let loaded = fetch_with_retry(&self.client, url, options.timeout).await?;
        tracing::debug!("http backend: fetched {} ({} bytes)", loaded.url, loaded.body.len());
        *self.loaded.lock().unwrap_or_else(|p| p.into_inner()) = Some(loaded);
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> Result<(), BrowserError> {
        // The document is static; one check is all there is.
        if has_match(&self.loaded()?.body, selector)? {
            Ok(())
        } else {
            Err(BrowserError::SelectorNotFound(selector.to_string()))
        }
    }

    async fn url(&self) -> Result<String, BrowserError> {
        Ok(self.loaded()?.url)
    }

    async fn title(&self) -> Result<String, BrowserError> {
        Ok(document_title(&self.loaded()?.body))
    }

    async fn content(&self) -> Result<String, BrowserError> {
        Ok(self.loaded()?.body)
    }

    async fn screenshot_jpeg(&self, _quality: u32) -> Result<Vec<u8>, BrowserError> {
        Err(BrowserError::Unsupported("screenshot"))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        Ok(())
    }
}
