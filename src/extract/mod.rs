// ---------------------------------------------------------------------------
// extract/ - host-side content extraction over a parsed DOM
// ---------------------------------------------------------------------------
//
// Everything here is synchronous and works on a `scraper::Html` tree built
// from the page's serialized DOM, so none of it needs a live browser. Callers
// in async code pass `&str` in and get owned values back; the parsed tree
// never crosses an await point.

pub mod job;
pub mod markdown;
pub mod profile;

use std::sync::OnceLock;

use ego_tree::iter::Edge;
use ego_tree::NodeId;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use url::Url;

pub use job::{extract_job, JobPosting};
pub use profile::{ExtractionProfile, ProfileKind, Whitespace};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub text: String,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Image {
    pub alt: String,
    pub src: String,
}

/// Structured view of one page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedPage {
    pub url: String,
    pub title: String,
    pub meta_description: String,
    pub meta_keywords: String,
    pub text_content: String,
    pub headings: Vec<Heading>,
    pub links: Vec<Link>,
    pub images: Vec<Image>,
}

struct Selectors {
    body: Selector,
    title: Selector,
    description: Selector,
    keywords: Selector,
    headings: Selector,
    anchors: Selector,
    images: Selector,
}

fn selectors() -> &'static Selectors {
    static SELECTORS: OnceLock<Selectors> = OnceLock::new();
    SELECTORS.get_or_init(|| {
        let parse = |s: &str| Selector::parse(s).expect("static selector is valid");
        Selectors {
            body: parse("body"),
            title: parse("title"),
            description: parse("meta[name=\"description\"]"),
            keywords: parse("meta[name=\"keywords\"]"),
            headings: parse("h1, h2, h3, h4, h5, h6"),
            anchors: parse("a[href]"),
            images: parse("img[src]"),
        }
    })
}

// ── DOM preparation ─────────────────────────────────────────────────────────

/// Parse `html` and detach every node the profile removes.
fn purged(html: &str, profile: &ExtractionProfile) -> Html {
    let mut doc = Html::parse_document(html);
    let ids: Vec<NodeId> = doc.select(&profile.remove).map(|el| el.id()).collect();
    for id in ids {
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.detach();
        }
    }
    doc
}

/// First main-content candidate the profile accepts, falling back to body.
fn main_root<'a>(doc: &'a Html, profile: &ExtractionProfile) -> Option<ElementRef<'a>> {
    profile
        .main
        .iter()
        .filter_map(|sel| doc.select(sel).next())
        .chain(doc.select(&selectors().body).next())
        .find(|el| profile.accepts(el.text().collect::<String>().trim().chars().count()))
}

// ── Text ────────────────────────────────────────────────────────────────────

fn is_block(tag: &str) -> bool {
    matches!(
        tag,
        "div" | "section" | "article" | "main" | "aside" | "header" | "footer" | "nav"
            | "ul" | "ol" | "li" | "dl" | "dt" | "dd" | "table" | "thead" | "tbody"
            | "tr" | "blockquote" | "pre" | "form" | "fieldset" | "figure"
            | "figcaption" | "address" | "details" | "summary" | "hr"
    )
}

fn is_paragraph(tag: &str) -> bool {
    matches!(tag, "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

fn newline(out: &mut String, count: usize) {
    let trailing = out.len() - out.trim_end_matches('\n').len();
    if !out.is_empty() && trailing < count {
        out.push_str(&"\n".repeat(count - trailing));
    }
}

fn push_words(out: &mut String, text: &str) {
    for (i, word) in text.split_whitespace().enumerate() {
        let spaced = i > 0 || text.starts_with(char::is_whitespace);
        if spaced && !out.is_empty() && !out.ends_with([' ', '\n']) {
            out.push(' ');
        }
        out.push_str(word);
    }
    if text.ends_with(char::is_whitespace) && !out.is_empty() && !out.ends_with([' ', '\n']) {
        out.push(' ');
    }
}

fn breaks_for(tag: &str) -> usize {
    if is_paragraph(tag) {
        2
    } else if is_block(tag) {
        1
    } else {
        0
    }
}

/// Depth-first walk over open/close edges; nesting depth never touches the
/// call stack.
fn walk_text(element: ElementRef, out: &mut String) {
    let root = element.id();
    // Open edge of a script-like element whose subtree is being skipped.
    let mut skipping: Option<NodeId> = None;
    for edge in element.traverse() {
        match edge {
            Edge::Open(node) if node.id() == root => {}
            Edge::Close(node) if node.id() == root => {}
            Edge::Open(node) => {
                if skipping.is_some() {
                    continue;
                }
                match node.value() {
                    Node::Text(text) => push_words(out, text),
                    Node::Element(el) => {
                        let tag = el.name();
                        if matches!(tag, "script" | "style" | "noscript" | "template") {
                            skipping = Some(node.id());
                        } else if tag == "br" {
                            out.push('\n');
                        } else {
                            newline(out, breaks_for(tag));
                        }
                    }
                    _ => {}
                }
            }
            Edge::Close(node) => {
                if let Some(id) = skipping {
                    if id == node.id() {
                        skipping = None;
                    }
                    continue;
                }
                if let Node::Element(el) = node.value() {
                    let tag = el.name();
                    if tag == "br" {
                        continue;
                    }
                    newline(out, breaks_for(tag));
                    if matches!(tag, "td" | "th") && !out.ends_with([' ', '\n']) {
                        out.push(' ');
                    }
                }
            }
        }
    }
}

/// Rendered-text approximation of an element: block boundaries become line
/// breaks, whitespace inside a line collapses.
pub(crate) fn inner_text(element: ElementRef) -> String {
    let mut out = String::new();
    walk_text(element, &mut out);
    out
}

/// One space between every word.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trim each line, collapse spaces/tabs, keep at most one empty line in a row.
pub(crate) fn clean_lines(text: &str) -> String {
    let mut out = String::new();
    let mut blank = 0;
    for line in text.lines() {
        let line = line.split([' ', '\t']).filter(|w| !w.is_empty()).collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            blank += 1;
            if blank == 1 && !out.is_empty() {
                out.push('\n');
            }
        } else {
            blank = 0;
            out.push_str(&line);
            out.push('\n');
        }
    }
    out.trim().to_string()
}

fn finish(text: &str, profile: &ExtractionProfile) -> String {
    match profile.whitespace {
        Whitespace::Collapse => collapse_whitespace(text),
        Whitespace::PreserveLines => {
            // Strip patterns anchor on the blank line that ends a block.
            let mut cleaned = format!("{}\n\n", clean_lines(text));
            for pattern in &profile.strip {
                cleaned = pattern.replace_all(&cleaned, "").into_owned();
            }
            cleaned.trim().to_string()
        }
    }
}

// ── Public entry points ─────────────────────────────────────────────────────

/// Readable text of the page's main content; the canonical text for search.
pub fn readable_text(html: &str, profile: &ExtractionProfile) -> String {
    let doc = purged(html, profile);
    main_root(&doc, profile)
        .map(|root| finish(&inner_text(root), profile))
        .unwrap_or_default()
}

/// Markdown rendering of the page's main content.
pub fn extract_markdown(html: &str, profile: &ExtractionProfile) -> String {
    let doc = purged(html, profile);
    let Some(root) = main_root(&doc, profile) else {
        return String::new();
    };
    let md = markdown::to_markdown(root);
    match profile.whitespace {
        Whitespace::Collapse => md,
        Whitespace::PreserveLines => finish(&md, profile),
    }
}

fn resolve(base: Option<&Url>, raw: &str) -> String {
    base.and_then(|b| b.join(raw).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| raw.to_string())
}

/// Full structured extraction. Headings, links and images are collected from
/// the whole purged document; text comes from the main root only.
pub fn extract_page(html: &str, page_url: &str, profile: &ExtractionProfile) -> ExtractedPage {
    let doc = purged(html, profile);
    let sel = selectors();
    let base = Url::parse(page_url).ok();

    let title = doc
        .select(&sel.title)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .unwrap_or_default();
    let meta = |s: &Selector| {
        doc.select(s)
            .next()
            .and_then(|el| el.value().attr("content"))
            .unwrap_or("")
            .to_string()
    };

    let text_content = main_root(&doc, profile)
        .map(|root| finish(&inner_text(root), profile))
        .unwrap_or_default();

    let headings = doc
        .select(&sel.headings)
        .filter_map(|h| {
            let level = h.value().name()[1..].parse::<u8>().ok()?;
            let text = collapse_whitespace(&inner_text(h));
            (!text.is_empty()).then_some(Heading { level, text })
        })
        .collect();

    let links = doc
        .select(&sel.anchors)
        .filter_map(|a| {
            let raw = a.value().attr("href")?.trim();
            let text = collapse_whitespace(&inner_text(a));
            let href = resolve(base.as_ref(), raw);
            (!text.is_empty() && !href.starts_with("javascript:")).then_some(Link { text, href })
        })
        .collect();

    let images = doc
        .select(&sel.images)
        .filter_map(|img| {
            let raw = img.value().attr("src")?.trim();
            if raw.is_empty() {
                return None;
            }
            Some(Image {
                alt: img.value().attr("alt").unwrap_or("").to_string(),
                src: resolve(base.as_ref(), raw),
            })
        })
        .collect();

    ExtractedPage {
        url: page_url.to_string(),
        title,
        meta_description: meta(&sel.description),
        meta_keywords: meta(&sel.keywords),
        text_content,
        headings,
        links,
        images,
    }
}

/// Every `a[href]` in the unpurged document as an absolute http(s) URL, in
/// document order. Navigation and footer links count here.
pub fn discover_links(html: &str, base: &Url) -> Vec<String> {
    let doc = Html::parse_document(html);
    doc.select(&selectors().anchors)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(|u| u.to_string())
        .collect()
}
