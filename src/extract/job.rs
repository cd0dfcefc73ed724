// Job-posting field extraction.
//
// Markup on job boards changes often, so every field is a chain of
// selectors tried in order; the first non-empty hit wins. Section bodies
// (about / responsibilities / requirements) come from headings inside the
// description, then from keyword regexes over the plain description.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use super::{clean_lines, collapse_whitespace, inner_text};

const TITLE: &[&str] = &[".top-card-layout__title", "h1.job-title", "h1"];
const COMPANY: &[&str] = &[
    ".topcard__org-name-link",
    ".top-card-layout__card-link",
    ".company-name",
];
const LOCATION: &[&str] = &[
    ".topcard__flavor--bullet",
    ".top-card-layout__bullet",
    ".job-location",
];
const DESCRIPTION: &[&str] = &[".description__text", ".show-more-less-html__markup"];
const POSTED: &[&str] = &[".posted-time-ago__text", ".job-posted-date"];
const APPLICANTS: &[&str] = &[".num-applicants__caption", ".applicant-count"];

const SECTION_HEADINGS: &str = ".show-more-less-html__markup h2, .show-more-less-html__markup h3, \
     .show-more-less-html__markup strong, .description__text h2, .description__text h3, \
     .description__text strong";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPosting {
    pub job_title: String,
    pub company_name: String,
    pub location: String,
    pub job_type: String,
    pub salary: String,
    pub about_job: String,
    pub responsibilities: String,
    pub requirements: String,
    pub posted_date: String,
    pub applicants: String,
    pub seniority: String,
    pub industry: String,
    pub full_description: String,
}

fn parse(selector: &str) -> Selector {
    Selector::parse(selector).expect("static job selector is valid")
}

fn element_text(el: ElementRef) -> String {
    clean_lines(&inner_text(el))
}

fn first_text(doc: &Html, chain: &[&str]) -> String {
    chain
        .iter()
        .filter_map(|s| doc.select(&parse(s)).next())
        .map(element_text)
        .find(|t| !t.is_empty())
        .unwrap_or_default()
}

/// Value of the job-criteria row whose label contains `label`.
fn criterion(doc: &Html, label: &str) -> String {
    let item = parse(".description__job-criteria-item");
    let subheader = parse(".description__job-criteria-subheader");
    let value = parse(".description__job-criteria-text");
    doc.select(&item)
        .find(|row| {
            row.select(&subheader)
                .next()
                .is_some_and(|h| inner_text(h).contains(label))
        })
        .and_then(|row| row.select(&value).next())
        .map(element_text)
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    About,
    Responsibilities,
    Requirements,
}

fn classify(heading: &str) -> Option<Section> {
    let h = heading.to_lowercase();
    if h.contains("responsib") || h.contains("what you'll do") {
        Some(Section::Responsibilities)
    } else if ["qualif", "requir", "skill", "what you need"].iter().any(|k| h.contains(k)) {
        Some(Section::Requirements)
    } else if ["about", "overview", "summary"].iter().any(|k| h.contains(k)) {
        Some(Section::About)
    } else {
        None
    }
}

fn is_section_boundary(el: ElementRef) -> bool {
    matches!(el.value().name(), "h2" | "h3" | "strong")
}

/// Text of the element siblings after `heading`, up to the next heading.
fn section_body(heading: ElementRef) -> String {
    let mut parts = Vec::new();
    for sibling in heading.next_siblings().filter_map(ElementRef::wrap) {
        if is_section_boundary(sibling) {
            break;
        }
        parts.push(collapse_whitespace(&inner_text(sibling)));
    }
    parts.join(" ").trim().to_string()
}

struct SectionPatterns {
    responsibilities: Regex,
    requirements: Regex,
    about: Regex,
}

fn section_patterns() -> &'static SectionPatterns {
    static PATTERNS: OnceLock<SectionPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |p: &str| Regex::new(p).expect("static section pattern is valid");
        SectionPatterns {
            responsibilities: re(
                r"(?is)responsibilities:?(.*?)(?:requirements|qualifications|skills required|what you need|about us|$)",
            ),
            requirements: re(
                r"(?is)(?:requirements|qualifications|skills required|what you need):?(.*?)(?:about us|benefits|$)",
            ),
            about: re(
                r"(?is)(?:about the job|job summary|overview|about the role):?(.*?)(?:responsibilities|what you'll do|$)",
            ),
        }
    })
}

fn capture(re: &Regex, text: &str) -> String {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Pull the structured fields of a job posting out of its page markup.
pub fn extract_job(html: &str) -> JobPosting {
    let doc = Html::parse_document(html);

    let salary = doc
        .select(&parse(".compensation__salary"))
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let full_description = first_text(&doc, DESCRIPTION);

    let mut about_job = String::new();
    let mut responsibilities = String::new();
    let mut requirements = String::new();
    for heading in doc.select(&parse(SECTION_HEADINGS)) {
        let Some(section) = classify(&inner_text(heading)) else {
            continue;
        };
        let body = section_body(heading);
        match section {
            Section::Responsibilities => responsibilities = body,
            Section::Requirements => requirements = body,
            Section::About => about_job = body,
        }
    }

    if responsibilities.is_empty() && requirements.is_empty() {
        let patterns = section_patterns();
        responsibilities = capture(&patterns.responsibilities, &full_description);
        requirements = capture(&patterns.requirements, &full_description);
        let about = capture(&patterns.about, &full_description);
        if !about.is_empty() {
            about_job = about;
        }
    }

    JobPosting {
        job_title: first_text(&doc, TITLE),
        company_name: first_text(&doc, COMPANY),
        location: first_text(&doc, LOCATION),
        job_type: criterion(&doc, "Employment type"),
        salary,
        about_job,
        responsibilities,
        requirements,
        posted_date: first_text(&doc, POSTED),
        applicants: first_text(&doc, APPLICANTS),
        seniority: criterion(&doc, "Seniority level"),
        industry: criterion(&doc, "Industry"),
        full_description,
    }
}
