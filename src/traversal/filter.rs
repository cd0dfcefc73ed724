// ---------------------------------------------------------------------------
// traversal/filter.rs - URL canonicalization and frontier admission
// ---------------------------------------------------------------------------

use regex::Regex;
use url::Url;

use super::TraversalError;

/// Query parameters that only carry attribution and never change page content.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source", "utm_medium", "utm_campaign", "utm_term", "utm_content",
    "fbclid", "gclid", "mc_cid", "mc_eid", "_ga",
];

const SKIP_EXTENSIONS: &[&str] = &[
    ".pdf", ".zip", ".tar", ".gz", ".rar", ".7z",
    ".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".ico", ".bmp",
    ".css", ".js", ".woff", ".woff2", ".ttf", ".eot",
    ".mp3", ".mp4", ".avi", ".mov", ".wmv", ".flv",
    ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx",
    ".exe", ".dmg", ".apk", ".deb", ".rpm",
];

/// Canonical string form used as the visited-set key.
///
/// Drops the fragment and tracking parameters; the remaining query keeps
/// its original order.
pub fn normalize_url(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    if normalized.query().is_some() {
        let kept: Vec<(String, String)> = normalized
            .query_pairs()
            .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.as_ref()))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if kept.is_empty() {
            normalized.set_query(None);
        } else {
            normalized.query_pairs_mut().clear().extend_pairs(kept);
        }
    }
    normalized.to_string()
}

fn is_binary_resource(url: &Url) -> bool {
    let path = url.path().to_lowercase();
    SKIP_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Parse the traversal seed. Unlike discovered links, a bad seed is an error.
pub fn parse_seed(raw: &str) -> Result<Url, TraversalError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(TraversalError::InvalidSeed {
            url: raw.to_string(),
            reason: "empty URL".to_string(),
        });
    }
    let parsed = Url::parse(trimmed).map_err(|e| TraversalError::InvalidSeed {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(TraversalError::InvalidSeed {
                url: raw.to_string(),
                reason: format!("unsupported scheme '{}', only http/https", other),
            });
        }
    }
    if parsed.host_str().is_none() {
        return Err(TraversalError::InvalidSeed {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(parsed)
}

fn compile_pattern(pattern: Option<&str>) -> Result<Option<Regex>, TraversalError> {
    match pattern.map(str::trim).filter(|p| !p.is_empty()) {
        None => Ok(None),
        Some(p) => Regex::new(p)
            .map(Some)
            .map_err(|source| TraversalError::InvalidPattern {
                pattern: p.to_string(),
                source,
            }),
    }
}

/// Admission predicate for discovered links.
///
/// Built once per run; regexes are compiled up front so an invalid pattern
/// fails the request before any page is opened.
#[derive(Debug, Clone)]
pub struct FilterSet {
    same_domain_only: bool,
    root_domain: String,
    include: Option<Regex>,
    exclude: Option<Regex>,
    skip_binary: bool,
}

impl FilterSet {
    pub fn new(
        seed: &Url,
        same_domain_only: bool,
        include_pattern: Option<&str>,
        exclude_pattern: Option<&str>,
    ) -> Result<Self, TraversalError> {
        Ok(Self {
            same_domain_only,
            root_domain: seed.host_str().unwrap_or_default().to_string(),
            include: compile_pattern(include_pattern)?,
            exclude: compile_pattern(exclude_pattern)?,
            skip_binary: true,
        })
    }

    /// Keep links to binary resources (PDFs, images, archives) in the frontier.
    pub fn with_binary_links(mut self) -> Self {
        self.skip_binary = false;
        self
    }

    pub fn root_domain(&self) -> &str {
        &self.root_domain
    }

    /// Returns the canonical URL when the link is admitted, `None` otherwise.
    pub fn admit(&self, link: &str) -> Option<String> {
        let link = link.trim();
        if link.is_empty() || link.starts_with('#') {
            return None;
        }
        let parsed = match Url::parse(link) {
            Ok(u) => u,
            Err(e) => {
                tracing::debug!("filter: skipping unparsable link '{}': {}", link, e);
                return None;
            }
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            return None;
        }
        if self.skip_binary && is_binary_resource(&parsed) {
            return None;
        }
        if self.same_domain_only && parsed.host_str() != Some(self.root_domain.as_str()) {
            return None;
        }

        let canonical = normalize_url(&parsed);
        if let Some(re) = &self.include
            && !re.is_match(&canonical)
        {
            return None;
        }
        if let Some(re) = &self.exclude
            && re.is_match(&canonical)
        {
            return None;
        }
        Some(canonical)
    }

    pub fn admits(&self, link: &str) -> bool {
        self.admit(link).is_some()
    }
}
