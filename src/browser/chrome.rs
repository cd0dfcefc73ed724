// Headless Chromium backend.
//
// `headless_chrome` drives the DevTools protocol synchronously, so every call
// into it runs on the blocking pool. A single `Browser` is shared by all
// requests; each visit opens its own tab.

use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use headless_chrome::protocol::cdp::Network::{Cookie, CookieParam};
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;

use super::{BrowserContext, BrowserError, BrowserLauncher, NavigateOptions, PageSession, WaitUntil};

const WINDOW_SIZE: (u32, u32) = (1920, 1080);
/// Extra settle time after load when the caller asked for network idle.
const NETWORK_IDLE_SETTLE: Duration = Duration::from_millis(500);
/// Keep the browser process alive between requests.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

const CHROME_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-dev-shm-usage",
    "--no-first-run",
    "--no-default-browser-check",
];

/// Run a blocking driver call off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T, BrowserError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, BrowserError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| BrowserError::Page(format!("browser worker panicked: {}", e)))?
}

fn page_err(op: &str, e: anyhow::Error) -> BrowserError {
    BrowserError::Page(format!("{}: {}", op, e))
}

pub struct ChromeLauncher {
    executable: Option<PathBuf>,
    headless: bool,
    user_agent: String,
}

impl ChromeLauncher {
    pub fn new(executable: Option<PathBuf>, headless: bool, user_agent: impl Into<String>) -> Self {
        Self {
            executable,
            headless,
            user_agent: user_agent.into(),
        }
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    fn name(&self) -> &'static str {
        "chrome"
    }

    async fn launch(&self) -> Result<Arc<dyn BrowserContext>, BrowserError> {
        let executable = self.executable.clone();
        let headless = self.headless;
        let (browser, version) = blocking(move || {
            let options = LaunchOptions::default_builder()
                .headless(headless)
                .sandbox(false)
                .window_size(Some(WINDOW_SIZE))
                .path(executable)
                .args(CHROME_ARGS.iter().map(OsStr::new).collect())
                .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
                .build()
                .map_err(|e| BrowserError::Launch(format!("launch options: {}", e)))?;
            let browser = Browser::new(options).map_err(|e| BrowserError::Launch(e.to_string()))?;
            let version = browser
                .get_version()
                .map(|v| v.product)
                .unwrap_or_else(|_| "unknown".into());
            Ok((browser, version))
        })
        .await?;
        tracing::info!("chrome: launched {} (headless={})", version, headless);

        Ok(Arc::new(ChromeContext {
            browser,
            user_agent: self.user_agent.clone(),
        }))
    }
}

struct ChromeContext {
    browser: Browser,
    user_agent: String,
}

impl ChromeContext {
    async fn scratch_tab(&self) -> Result<Arc<Tab>, BrowserError> {
        let browser = self.browser.clone();
        blocking(move || browser.new_tab().map_err(|e| page_err("open tab", e))).await
    }
}

async fn close_tab(tab: Arc<Tab>) {
    let res = blocking(move || tab.close(false).map(|_| ()).map_err(|e| page_err("close tab", e))).await;
    if let Err(e) = res {
        tracing::debug!("chrome: {}", e);
    }
}

/// Cookie objects arrive in the jar's JSON shape; fields the DevTools
/// protocol doesn't accept on input are dropped.
fn cookie_param(mut value: Value) -> Option<CookieParam> {
    if let Some(obj) = value.as_object_mut() {
        obj.remove("partitionKey");
        obj.remove("size");
        obj.remove("session");
        if obj.get("expires").and_then(Value::as_f64).is_some_and(|e| e < 0.0) {
            obj.remove("expires");
        }
    }
    serde_json::from_value(value)
        .map_err(|e| tracing::debug!("chrome: skipping malformed cookie: {}", e))
        .ok()
}

#[async_trait]
impl BrowserContext for ChromeContext {
    async fn new_page(&self) -> Result<Box<dyn PageSession>, BrowserError> {
        let browser = self.browser.clone();
        let user_agent = self.user_agent.clone();
        let tab = blocking(move || {
            let tab = browser.new_tab().map_err(|e| page_err("open tab", e))?;
            tab.set_user_agent(&user_agent, Some("en-US,en;q=0.9"), None)
                .map_err(|e| page_err("set user agent", e))?;
            Ok(tab)
        })
        .await?;
        Ok(Box::new(ChromePage { tab }))
    }

    async fn cookies(&self) -> Result<Vec<Value>, BrowserError> {
        let tab = self.scratch_tab().await?;
        let reader = tab.clone();
        let cookies = blocking(move || {
            reader.get_cookies().map_err(|e| page_err("read cookies", e))
        })
        .await;
        close_tab(tab).await;

        cookies?
            .iter()
            .map(|c: &Cookie| serde_json::to_value(c).map_err(BrowserError::from))
            .collect()
    }

    async fn add_cookies(&self, cookies: Vec<Value>) -> Result<(), BrowserError> {
        let params: Vec<CookieParam> = cookies.into_iter().filter_map(cookie_param).collect();
        if params.is_empty() {
            return Ok(());
        }
        let tab = self.scratch_tab().await?;
        let writer = tab.clone();
        let res = blocking(move || {
            writer.set_cookies(params).map_err(|e| page_err("write cookies", e))
        })
        .await;
        close_tab(tab).await;
        res
    }
}

struct ChromePage {
    tab: Arc<Tab>,
}

#[async_trait]
impl PageSession for ChromePage {
    async fn navigate(&self, url: &str, options: NavigateOptions) -> Result<(), BrowserError> {
        let tab = self.tab.clone();
        let target = url.to_string();
        blocking(move || {
            tab.set_default_timeout(options.timeout);
            tab.navigate_to(&target)
                .and_then(|t| t.wait_until_navigated())
                .map_err(|e| BrowserError::Navigation {
                    url: target.clone(),
                    reason: e.to_string(),
                })?;
            Ok(())
        })
        .await?;

        if options.wait_until == WaitUntil::NetworkIdle {
            tokio::time::sleep(NETWORK_IDLE_SETTLE).await;
        }
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        let tab = self.tab.clone();
        let selector = selector.to_string();
        blocking(move || {
            tab.wait_for_element_with_custom_timeout(&selector, timeout)
                .map(|_| ())
                .map_err(|_| BrowserError::SelectorNotFound(selector))
        })
        .await
    }

    async fn url(&self) -> Result<String, BrowserError> {
        Ok(self.tab.get_url())
    }

    async fn title(&self) -> Result<String, BrowserError> {
        let tab = self.tab.clone();
        blocking(move || tab.get_title().map_err(|e| page_err("read title", e))).await
    }

    async fn content(&self) -> Result<String, BrowserError> {
        let tab = self.tab.clone();
        blocking(move || tab.get_content().map_err(|e| page_err("read content", e))).await
    }

    async fn screenshot_jpeg(&self, quality: u32) -> Result<Vec<u8>, BrowserError> {
        let tab = self.tab.clone();
        blocking(move || {
            tab.capture_screenshot(CaptureScreenshotFormatOption::Jpeg, Some(quality), None, true)
                .map_err(|e| page_err("screenshot", e))
        })
        .await
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let tab = self.tab.clone();
        blocking(move || tab.close(false).map(|_| ()).map_err(|e| page_err("close tab", e))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn jar_cookie_converts_to_devtools_param() {
        let param = cookie_param(json!({
            "name": "li_at",
            "value": "abc",
            "domain": ".linkedin.com",
            "path": "/",
            "expires": -1.0,
            "httpOnly": true,
            "secure": true,
            "session": true,
            "size": 8
        }))
        .unwrap();
        assert_eq!(param.name, "li_at");
        assert_eq!(param.domain.as_deref(), Some(".linkedin.com"));
        assert!(param.expires.is_none());
    }

    #[test]
    fn malformed_cookie_is_skipped() {
        assert!(cookie_param(json!({"value": "no name"})).is_none());
    }
}
