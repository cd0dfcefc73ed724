// In-process fixture browser.
//
// Serves pages from a fixed URL -> HTML table and records what was asked of
// it (launches, navigations, open pages) so tests can assert on the browser
// traffic a request produced.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use super::{
    document_title, has_match, BrowserContext, BrowserError, BrowserLauncher, NavigateOptions,
    PageSession,
};

const FAKE_JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0xFF, 0xD9];

#[derive(Debug, Clone)]
enum Fixture {
    Html(String),
    /// Navigation never completes; the caller's timeout fires.
    Hang,
    Fail(String),
    /// Lands on another fixture URL, as a server-side redirect would.
    Redirect(String),
}

fn fixture_key(url: &str) -> String {
    Url::parse(url).map(|u| u.to_string()).unwrap_or_else(|_| url.to_string())
}

#[derive(Debug, Clone, Default)]
pub struct MemorySite {
    pages: HashMap<String, Fixture>,
}

impl MemorySite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: impl Into<String>) -> Self {
        self.pages.insert(fixture_key(url), Fixture::Html(html.into()));
        self
    }

    pub fn timeout(mut self, url: &str) -> Self {
        self.pages.insert(fixture_key(url), Fixture::Hang);
        self
    }

    pub fn redirect(mut self, from: &str, to: &str) -> Self {
        self.pages.insert(fixture_key(from), Fixture::Redirect(fixture_key(to)));
        self
    }

    pub fn failure(mut self, url: &str, reason: &str) -> Self {
        self.pages.insert(fixture_key(url), Fixture::Fail(reason.to_string()));
        self
    }
}

#[derive(Default)]
struct Recorder {
    launches: AtomicUsize,
    open_pages: AtomicUsize,
    navigations: Mutex<Vec<String>>,
    cookies: Mutex<Vec<Value>>,
}

pub struct MemoryLauncher {
    site: Arc<MemorySite>,
    recorder: Arc<Recorder>,
    launch_delay: Duration,
    failing_launches: AtomicUsize,
}

impl MemoryLauncher {
    pub fn new(site: MemorySite) -> Self {
        Self {
            site: Arc::new(site),
            recorder: Arc::new(Recorder::default()),
            launch_delay: Duration::ZERO,
            failing_launches: AtomicUsize::new(0),
        }
    }

    pub fn with_launch_delay(mut self, delay: Duration) -> Self {
        self.launch_delay = delay;
        self
    }

    /// The next `count` launches fail.
    pub fn failing_launches(self, count: usize) -> Self {
        self.failing_launches.store(count, Ordering::SeqCst);
        self
    }

    pub fn launch_count(&self) -> usize {
        self.recorder.launches.load(Ordering::SeqCst)
    }

    pub fn open_pages(&self) -> usize {
        self.recorder.open_pages.load(Ordering::SeqCst)
    }

    /// URLs navigated to, in order.
    pub fn navigations(&self) -> Vec<String> {
        self.recorder.navigations.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn cookies(&self) -> Vec<Value> {
        self.recorder.cookies.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl BrowserLauncher for MemoryLauncher {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn launch(&self) -> Result<Arc<dyn BrowserContext>, BrowserError> {
        self.recorder.launches.fetch_add(1, Ordering::SeqCst);
        if !self.launch_delay.is_zero() {
            tokio::time::sleep(self.launch_delay).await;
        }
        let failing = self
            .failing_launches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(BrowserError::Launch("memory browser configured to fail".into()));
        }
        Ok(Arc::new(MemoryContext {
            site: self.site.clone(),
            recorder: self.recorder.clone(),
        }))
    }
}

struct MemoryContext {
    site: Arc<MemorySite>,
    recorder: Arc<Recorder>,
}

#[async_trait]
impl BrowserContext for MemoryContext {
    async fn new_page(&self) -> Result<Box<dyn PageSession>, BrowserError> {
        self.recorder.open_pages.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryPage {
            site: self.site.clone(),
            recorder: self.recorder.clone(),
            loaded: Mutex::new(None),
        }))
    }

    async fn cookies(&self) -> Result<Vec<Value>, BrowserError> {
        Ok(self.recorder.cookies.lock().unwrap_or_else(|p| p.into_inner()).clone())
    }

    async fn add_cookies(&self, cookies: Vec<Value>) -> Result<(), BrowserError> {
        self.recorder
            .cookies
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .extend(cookies);
        Ok(())
    }
}

struct MemoryPage {
    site: Arc<MemorySite>,
    recorder: Arc<Recorder>,
    loaded: Mutex<Option<(String, String)>>,
}

impl MemoryPage {
    fn loaded(&self) -> Result<(String, String), BrowserError> {
        self.loaded
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
            .ok_or_else(|| BrowserError::Page("page has not been navigated".into()))
    }
}

#[async_trait]
impl PageSession for MemoryPage {
    async fn navigate(&self, url: &str, _options: NavigateOptions) -> Result<(), BrowserError> {
        self.recorder
            .navigations
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(url.to_string());

        let mut key = fixture_key(url);
        let mut hops = 0;
        while let Some(Fixture::Redirect(target)) = self.site.pages.get(&key) {
            hops += 1;
            if hops > 10 {
                return Err(BrowserError::Navigation {
                    url: url.to_string(),
                    reason: "net::ERR_TOO_MANY_REDIRECTS".into(),
                });
            }
            key = target.clone();
        }
        match self.site.pages.get(&key) {
            Some(Fixture::Html(html)) => {
                *self.loaded.lock().unwrap_or_else(|p| p.into_inner()) = Some((key, html.clone()));
                Ok(())
            }
            Some(Fixture::Hang) => {
                std::future::pending::<()>().await;
                Ok(())
            }
            Some(Fixture::Fail(reason)) => Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: reason.clone(),
            }),
            Some(Fixture::Redirect(_)) | None => Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_NAME_NOT_RESOLVED".into(),
            }),
        }
    }

    async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> Result<(), BrowserError> {
        let (_, html) = self.loaded()?;
        if has_match(&html, selector)? {
            Ok(())
        } else {
            Err(BrowserError::SelectorNotFound(selector.to_string()))
        }
    }

    async fn url(&self) -> Result<String, BrowserError> {
        Ok(self.loaded()?.0)
    }

    async fn title(&self) -> Result<String, BrowserError> {
        Ok(document_title(&self.loaded()?.1))
    }

    async fn content(&self) -> Result<String, BrowserError> {
        Ok(self.loaded()?.1)
    }

    async fn screenshot_jpeg(&self, _quality: u32) -> Result<Vec<u8>, BrowserError> {
        self.loaded()?;
        Ok(FAKE_JPEG.to_vec())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.recorder.open_pages.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}
