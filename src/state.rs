use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::browser::chrome::ChromeLauncher;
use crate::browser::cookies::CookieJar;
use crate::browser::http::HttpLauncher;
use crate::browser::{BrowserHandle, BrowserLauncher};
use crate::config::{BackendKind, Config};

// ── Shared state ────────────────────────────────────────────────────────────

/// Central application state. Clone-friendly (all inner fields are Arc/Copy).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Process-wide browser, launched on first use.
    pub browser: Arc<BrowserHandle>,
    pub start_time: Instant,
    /// `true` once startup (including optional browser warm-up) finished.
    pub ready: Arc<AtomicBool>,
    /// Cancelled on shutdown; every traversal runs under a child token.
    pub shutdown: CancellationToken,
}

// ── Shared: readiness helpers ───────────────────────────────────────────────
impl AppState {
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Relaxed);
        tracing::info!("Scraper marked as READY");
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl AppState {
    /// State backed by the launcher selected in `config`.
    pub fn new(config: Config) -> Self {
        let launcher: Arc<dyn BrowserLauncher> = match config.backend {
            BackendKind::Chrome => Arc::new(ChromeLauncher::new(
                config.chrome_executable.clone(),
                config.headless,
                config.user_agent.clone(),
            )),
            BackendKind::Http => Arc::new(HttpLauncher::new(config.user_agent.clone())),
        };
        let jar = CookieJar::new(config.cookies_path.clone());
        Self::with_launcher(config, launcher, jar)
    }

    /// State with an explicit browser launcher and cookie jar.
    pub fn with_launcher(config: Config, launcher: Arc<dyn BrowserLauncher>, cookie_jar: CookieJar) -> Self {
        tracing::info!(
            "AppState initialised (backend: {}, cookie jar: {})",
            launcher.name(),
            cookie_jar
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "disabled".into())
        );
        Self {
            config: Arc::new(config),
            browser: Arc::new(BrowserHandle::new(launcher, cookie_jar)),
            start_time: Instant::now(),
            ready: Arc::new(AtomicBool::new(false)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Token for one traversal run; cancelled with the server.
    pub fn run_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }
}
