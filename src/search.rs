// Term matching over a page's readable text.

use regex::{Regex, RegexBuilder};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchMatch {
    /// The matched text as it appears on the page.
    pub term: String,
    pub context: String,
    /// Character offset of the match in the page text.
    pub position: usize,
}

/// A compiled, case-insensitive search term.
///
/// The term is tried as a regular expression first; anything that doesn't
/// compile is matched literally.
#[derive(Debug, Clone)]
pub struct SearchPattern {
    regex: Regex,
    literal: bool,
}

impl SearchPattern {
    pub fn new(term: &str) -> Self {
        let build = |pattern: &str| RegexBuilder::new(pattern).case_insensitive(true).build();
        match build(term) {
            Ok(regex) => Self {
                regex,
                literal: false,
            },
            Err(e) => {
                tracing::debug!("search: '{}' is not a valid pattern ({}), matching literally", term, e);
                Self {
                    regex: build(&regex::escape(term)).expect("escaped pattern always compiles"),
                    literal: true,
                }
            }
        }
    }

    pub fn is_literal(&self) -> bool {
        self.literal
    }

    /// All non-overlapping matches, left to right, with `context_size`
    /// characters of context on each side.
    pub fn find_all(&self, text: &str, context_size: usize) -> Vec<SearchMatch> {
        // Byte offset of every char boundary, including the end of the text.
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(b, _)| b)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_at = |byte: usize| boundaries.partition_point(|&b| b < byte);
        let char_count = boundaries.len() - 1;

        self.regex
            .find_iter(text)
            .filter(|m| !m.is_empty())
            .map(|m| {
                let start = char_at(m.start());
                let end = char_at(m.end());
                let from = boundaries[start.saturating_sub(context_size)];
                let to = boundaries[(end + context_size).min(char_count)];
                SearchMatch {
                    term: m.as_str().to_string(),
                    context: text[from..to].to_string(),
                    position: start,
                }
            })
            .collect()
    }
}

pub fn search(text: &str, term: &str, context_size: usize) -> Vec<SearchMatch> {
    SearchPattern::new(term).find_all(text, context_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_is_clipped_at_the_start() {
        let matches = search("say hello world", "hello", 5);
        assert_eq!(
            matches,
            vec![SearchMatch {
                term: "hello".into(),
                context: "say hello worl".into(),
                position: 4,
            }]
        );
    }

    #[test]
    fn matching_ignores_case_and_keeps_page_casing() {
        let matches = search("Rust and RUST and rust", "rust", 0);
        let found: Vec<_> = matches.iter().map(|m| (m.term.as_str(), m.position)).collect();
        assert_eq!(found, vec![("Rust", 0), ("RUST", 9), ("rust", 18)]);
    }

    #[test]
    fn positions_count_characters_not_bytes() {
        let matches = search("zażółć gęślą jaźń", "gęślą", 2);
        assert_eq!(matches[0].position, 7);
        assert_eq!(matches[0].context, "ć gęślą j");
    }

    #[test]
    fn invalid_regex_falls_back_to_literal() {
        let pattern = SearchPattern::new("c++ (");
        assert!(pattern.is_literal());
        let matches = pattern.find_all("I write C++ (and Rust)", 3);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].term, "C++ (");
    }

    #[test]
    fn regex_terms_are_supported() {
        let matches = search("order 123 and order 456", r"order \d+", 0);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[1].term, "order 456");
    }

    #[test]
    fn empty_matches_are_skipped() {
        assert!(search("abc", "x*", 3).is_empty());
    }
}
