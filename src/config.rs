// ---------------------------------------------------------------------------
// config.rs - environment-driven settings, read once at startup
// ---------------------------------------------------------------------------

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Chrome,
    Http,
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chrome" | "chromium" => Ok(Self::Chrome),
            "http" => Ok(Self::Http),
            other => anyhow::bail!("unknown browser backend '{}' (expected chrome or http)", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub cookies_path: PathBuf,
    pub backend: BackendKind,
    pub chrome_executable: Option<PathBuf>,
    pub headless: bool,
    /// Launch the browser at startup instead of on the first request.
    pub warmup: bool,
    pub default_timeout: Duration,
    /// Wall-clock cap for one crawl/map/search run.
    pub crawl_time_limit: Duration,
    /// Upper clamp for client-supplied max_pages / max_urls / max_results.
    pub max_pages_limit: usize,
    /// Upper clamp for client-supplied max_depth.
    pub max_depth_limit: u32,
    /// Empty means any origin.
    pub cors_allowed_origins: Vec<String>,
    pub request_body_limit: usize,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            cookies_path: PathBuf::from("browser_cookies.json"),
            backend: BackendKind::Chrome,
            chrome_executable: None,
            headless: true,
            warmup: false,
            default_timeout: Duration::from_millis(30_000),
            crawl_time_limit: Duration::from_secs(180),
            max_pages_limit: 500,
            max_depth_limit: 10,
            cors_allowed_origins: Vec::new(),
            request_body_limit: 1024 * 1024,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parsed<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var(name)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| anyhow::anyhow!("{}", e))
                .with_context(|| format!("invalid {}='{}'", name, raw))
        })
        .transpose()
}

fn flag(name: &str) -> anyhow::Result<Option<bool>> {
    var(name)
        .map(|raw| match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => anyhow::bail!("invalid {}='{}' (expected true/false)", name, raw),
        })
        .transpose()
}

impl Config {
    /// Read settings from the process environment. Call after `dotenvy`.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            port: parsed("PORT")?.unwrap_or(defaults.port),
            cookies_path: var("COOKIES_PATH").map(PathBuf::from).unwrap_or(defaults.cookies_path),
            backend: parsed("BROWSER_BACKEND")?.unwrap_or(defaults.backend),
            chrome_executable: var("CHROME_EXECUTABLE_PATH")
                .or_else(|| var("PLAYWRIGHT_CHROMIUM_EXECUTABLE_PATH"))
                .map(PathBuf::from),
            headless: flag("BROWSER_HEADLESS")?.unwrap_or(defaults.headless),
            warmup: flag("BROWSER_WARMUP")?.unwrap_or(defaults.warmup),
            default_timeout: parsed::<u64>("DEFAULT_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.default_timeout),
            crawl_time_limit: parsed::<u64>("CRAWL_TIME_LIMIT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.crawl_time_limit),
            max_pages_limit: parsed("MAX_PAGES_LIMIT")?.unwrap_or(defaults.max_pages_limit),
            max_depth_limit: parsed("MAX_DEPTH_LIMIT")?.unwrap_or(defaults.max_depth_limit),
            cors_allowed_origins: var("CORS_ALLOWED_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|o| !o.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            request_body_limit: parsed("REQUEST_BODY_LIMIT_BYTES")?.unwrap_or(defaults.request_body_limit),
            user_agent: var("USER_AGENT").unwrap_or(defaults.user_agent),
        })
    }

    /// Clamp a client timeout (ms) into 100ms..=5min; zero or absent means default.
    pub fn timeout(&self, requested_ms: Option<u64>) -> Duration {
        match requested_ms {
            Some(0) | None => self.default_timeout,
            Some(ms) => Duration::from_millis(ms.clamp(100, 300_000)),
        }
    }

    pub fn clamp_pages(&self, requested: usize) -> usize {
        requested.clamp(1, self.max_pages_limit.max(1))
    }

    pub fn clamp_depth(&self, requested: u32) -> u32 {
        requested.min(self.max_depth_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names() {
        assert_eq!("chrome".parse::<BackendKind>().unwrap(), BackendKind::Chrome);
        assert_eq!(" HTTP ".parse::<BackendKind>().unwrap(), BackendKind::Http);
        assert!("firefox".parse::<BackendKind>().is_err());
    }

    #[test]
    fn client_limits_are_clamped() {
        let config = Config::default();
        assert_eq!(config.clamp_pages(0), 1);
        assert_eq!(config.clamp_pages(10_000), 500);
        assert_eq!(config.clamp_depth(50), 10);
        assert_eq!(config.timeout(None), Duration::from_secs(30));
        assert_eq!(config.timeout(Some(10)), Duration::from_millis(100));
        assert_eq!(config.timeout(Some(45_000)), Duration::from_secs(45));
    }
}
