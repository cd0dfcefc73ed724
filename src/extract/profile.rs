// Declarative extraction profiles.
//
// A profile says what to purge, where the main content lives and how the
// resulting text is cleaned. The two built-in profiles are compiled once and
// shared for the life of the process.

use std::sync::OnceLock;

use regex::Regex;
use scraper::Selector;
use serde::Deserialize;

/// Minimum text length (chars) for a job-posting main root candidate.
const JOB_MIN_TEXT_CHARS: usize = 80;

const STANDARD_REMOVE: &[&str] = &[
    "script", "style", "noscript", "iframe", "svg", "path", "footer", "nav", "header",
    "[role=\"banner\"]", "[role=\"navigation\"]", "[role=\"complementary\"]",
];

const STANDARD_MAIN: &[&str] = &["main", "article", "#content", ".content"];

const JOB_REMOVE: &[&str] = &[
    "header", "footer", "nav", "aside", "script", "style", "noscript", "iframe", "svg",
    "[role=\"navigation\"]", "[role=\"banner\"]", "[role=\"contentinfo\"]",
    ".ad", ".ads", ".advertisement", ".promo", ".sidebar", ".footer", ".header",
    ".navbar", ".navigation", ".cookie", ".cookies", ".newsletter", ".subscribe",
    ".modal", ".popup", ".related-jobs", ".comments", ".recommendations",
    ".suggested-jobs", ".breadcrumb", ".breadcrumbs", ".share", ".social",
    ".apply-button", ".job-apply", ".job-actions", ".job-footer", ".job-header",
    ".site-footer", ".site-header", ".global-nav", ".global-footer",
    "[aria-hidden=\"true\"]", "[style*=\"display:none\"]", "[style*=\"display: none\"]",
    // LinkedIn chrome around the posting
    ".jobs-apply-button", ".jobs-similar-jobs", ".jobs-poster__container",
    ".jobs-details__similar-jobs", ".jobs-details__footer", ".jobs-search-box",
];

const JOB_MAIN: &[&str] = &[
    "main", ".job-description", "#job-description", ".description", "#description",
    ".job-desc", "#job-desc", ".job-details", "#job-details", ".job-view", "#job-view",
    ".job-content", "#job-content", "[class*=\"description\"]", "[id*=\"description\"]",
    "[class*=\"job\"]", "[id*=\"job\"]", "[class*=\"content\"]", "[id*=\"content\"]",
    "[class*=\"main\"]", "[id*=\"main\"]",
];

/// Boilerplate blocks cut from job-posting output after cleanup.
const JOB_STRIP: &[&str] = &[
    r"(?s)Sign in.*?New to LinkedIn\? \[?Join now\]?.*?\n\n",
    r"(?s)Similar jobs.*?Show more Show less.*?\n\n",
    r"(?s)Welcome back.*?By clicking Continue to join or sign in.*?\n\n",
    r"(?s)People also viewed.*?Explore collaborative articles.*?\n\n",
];

/// Which built-in profile a request asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    #[default]
    Standard,
    JobPosting,
}

impl ProfileKind {
    pub fn profile(self) -> &'static ExtractionProfile {
        match self {
            Self::Standard => ExtractionProfile::standard(),
            Self::JobPosting => ExtractionProfile::job_posting(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whitespace {
    /// Every whitespace run becomes one space.
    Collapse,
    /// Spaces and tabs collapse, lines are trimmed, blank runs capped at one.
    PreserveLines,
}

#[derive(Debug)]
pub struct ExtractionProfile {
    pub name: &'static str,
    pub(crate) remove: Selector,
    pub(crate) main: Vec<Selector>,
    /// A main root candidate must have strictly more text than this.
    pub(crate) min_text_chars: Option<usize>,
    pub(crate) whitespace: Whitespace,
    pub(crate) strip: Vec<Regex>,
}

fn selector_group(parts: &[&str]) -> Selector {
    Selector::parse(&parts.join(", ")).expect("static removal selectors are valid")
}

fn selectors(parts: &[&str]) -> Vec<Selector> {
    parts
        .iter()
        .map(|s| Selector::parse(s).expect("static main selector is valid"))
        .collect()
}

impl ExtractionProfile {
    pub fn standard() -> &'static Self {
        static PROFILE: OnceLock<ExtractionProfile> = OnceLock::new();
        PROFILE.get_or_init(|| Self {
            name: "standard",
            remove: selector_group(STANDARD_REMOVE),
            main: selectors(STANDARD_MAIN),
            min_text_chars: None,
            whitespace: Whitespace::Collapse,
            strip: Vec::new(),
        })
    }

    pub fn job_posting() -> &'static Self {
        static PROFILE: OnceLock<ExtractionProfile> = OnceLock::new();
        PROFILE.get_or_init(|| Self {
            name: "job_posting",
            remove: selector_group(JOB_REMOVE),
            main: selectors(JOB_MAIN),
            min_text_chars: Some(JOB_MIN_TEXT_CHARS),
            whitespace: Whitespace::PreserveLines,
            strip: JOB_STRIP
                .iter()
                .map(|p| Regex::new(p).expect("static strip pattern is valid"))
                .collect(),
        })
    }

    /// Whether a candidate root with `chars` characters of text qualifies.
    pub(crate) fn accepts(&self, chars: usize) -> bool {
        self.min_text_chars.is_none_or(|min| chars > min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_profiles_compile() {
        assert_eq!(ExtractionProfile::standard().main.len(), STANDARD_MAIN.len());
        assert_eq!(ExtractionProfile::job_posting().strip.len(), JOB_STRIP.len());
    }

    #[test]
    fn threshold_is_strict() {
        let job = ExtractionProfile::job_posting();
        assert!(!job.accepts(80));
        assert!(job.accepts(81));
        assert!(ExtractionProfile::standard().accepts(0));
    }

    #[test]
    fn profile_names_deserialize() {
        let kind: ProfileKind = serde_json::from_str("\"job_posting\"").unwrap();
        assert_eq!(kind, ProfileKind::JobPosting);
        assert_eq!(kind.profile().name, "job_posting");
    }
}
