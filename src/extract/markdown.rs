// HTML -> markdown for the main content root.

use scraper::node::Node;
use scraper::{ElementRef, Selector};

/// Elements nested deeper than this render as flat text.
const MAX_NESTING: usize = 64;

/// Render an element's children as markdown.
pub fn to_markdown(root: ElementRef) -> String {
    let mut out = String::new();
    collect_children(root, &mut out, 0);
    tidy(&out)
}

fn collect_children(element: ElementRef, out: &mut String, depth: usize) {
    if depth >= MAX_NESTING {
        push_text(out, &super::inner_text(element));
        return;
    }
    for child in element.children() {
        match child.value() {
            Node::Text(text) => push_text(out, text),
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_element(child_el, out, depth + 1);
                }
            }
            _ => {}
        }
    }
}

/// Append text with whitespace runs collapsed to one space.
fn push_text(out: &mut String, text: &str) {
    let needs_sep = |out: &String| !out.is_empty() && !out.ends_with([' ', '\n']);
    let mut words = text.split_whitespace();
    match words.next() {
        None => {
            if !text.is_empty() && needs_sep(out) {
                out.push(' ');
            }
        }
        Some(first) => {
            if text.starts_with(char::is_whitespace) && needs_sep(out) {
                out.push(' ');
            }
            out.push_str(first);
            for word in words {
                out.push(' ');
                out.push_str(word);
            }
            if text.ends_with(char::is_whitespace) {
                out.push(' ');
            }
        }
    }
}

fn inline_text(element: ElementRef) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn block_break(out: &mut String) {
    if !out.is_empty() && !out.ends_with("\n\n") {
        out.push_str(if out.ends_with('\n') { "\n" } else { "\n\n" });
    }
}

fn collect_element(element: ElementRef, out: &mut String, depth: usize) {
    let tag = element.value().name();
    match tag {
        "script" | "style" | "noscript" | "template" | "head" => {}
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level: usize = tag[1..].parse().unwrap_or(1);
            let text = inline_text(element);
            if !text.is_empty() {
                block_break(out);
                out.push_str(&format!("{} {}\n\n", "#".repeat(level), text));
            }
        }
        "pre" => {
            let text: String = element.text().collect();
            if !text.trim().is_empty() {
                let lang = element
                    .select(&code_selector())
                    .next()
                    .and_then(|code| code.value().attr("class"))
                    .or_else(|| element.value().attr("class"))
                    .and_then(|c| {
                        c.split_whitespace()
                            .find_map(|cls| cls.strip_prefix("language-").or_else(|| cls.strip_prefix("lang-")))
                    })
                    .unwrap_or("");
                block_break(out);
                out.push_str(&format!("```{}\n{}\n```\n\n", lang, text.trim_matches('\n')));
            }
        }
        "code" => {
            let text: String = element.text().collect();
            if !text.is_empty() {
                out.push_str(&format!("`{}`", text));
            }
        }
        "strong" | "b" => wrap_inline(element, out, "**", depth),
        "em" | "i" => wrap_inline(element, out, "_", depth),
        "a" => {
            let href = element.value().attr("href").unwrap_or("").trim();
            let mut inner = String::new();
            collect_children(element, &mut inner, depth);
            let text = inner.trim();
            if text.is_empty() {
                return;
            }
            if href.is_empty() || href.starts_with("javascript:") {
                out.push_str(text);
            } else {
                out.push_str(&format!("[{}]({})", text, href));
            }
        }
        "img" => {
            let src = element.value().attr("src").unwrap_or("").trim();
            if !src.is_empty() {
                let alt = element.value().attr("alt").unwrap_or("").trim();
                out.push_str(&format!("![{}]({})", alt, src));
            }
        }
        "br" => out.push_str("  \n"),
        "hr" => {
            block_break(out);
            out.push_str("---\n\n");
        }
        "ul" | "ol" => {
            block_break(out);
            list(element, out, tag == "ol", depth);
            out.push('\n');
        }
        "table" => {
            block_break(out);
            table(element, out);
        }
        "dl" => {
            block_break(out);
            definition_list(element, out);
        }
        "blockquote" => {
            let mut inner = String::new();
            collect_children(element, &mut inner, depth);
            let inner = tidy(&inner);
            if !inner.is_empty() {
                block_break(out);
                for line in inner.lines() {
                    out.push_str("> ");
                    out.push_str(line);
                    out.push('\n');
                }
                out.push('\n');
            }
        }
        "p" | "div" | "section" | "article" | "main" | "aside" | "figure" | "figcaption" | "details"
        | "summary" | "form" | "fieldset" | "address" => {
            block_break(out);
            collect_children(element, out, depth);
            block_break(out);
        }
        _ => collect_children(element, out, depth),
    }
}

fn code_selector() -> Selector {
    Selector::parse("code").expect("code selector is valid")
}

fn wrap_inline(element: ElementRef, out: &mut String, marker: &str, depth: usize) {
    let mut inner = String::new();
    collect_children(element, &mut inner, depth);
    let text = inner.trim();
    if !text.is_empty() {
        out.push_str(&format!("{marker}{text}{marker}"));
        if inner.ends_with(' ') {
            out.push(' ');
        }
    }
}

fn list(element: ElementRef, out: &mut String, ordered: bool, depth: usize) {
    let mut index = 1;
    for child in element.children().filter_map(ElementRef::wrap) {
        if child.value().name() != "li" {
            continue;
        }
        let mut inner = String::new();
        collect_children(child, &mut inner, depth + 1);
        let inner = tidy(&inner);
        let marker = if ordered { format!("{}. ", index) } else { "- ".to_string() };
        let indent = " ".repeat(marker.len());
        for (i, line) in inner.lines().enumerate() {
            if i == 0 {
                out.push_str(&marker);
            } else if !line.is_empty() {
                out.push_str(&indent);
            }
            out.push_str(line);
            out.push('\n');
        }
        if inner.is_empty() {
            out.push_str(marker.trim_end());
            out.push('\n');
        }
        index += 1;
    }
}

fn table(table: ElementRef, out: &mut String) {
    let row_sel = Selector::parse("tr").expect("tr selector is valid");
    let cell_sel = Selector::parse("th, td").expect("cell selector is valid");

    let rows: Vec<Vec<String>> = table
        .select(&row_sel)
        .map(|row| {
            row.select(&cell_sel)
                .map(|cell| inline_text(cell).replace('|', "\\|"))
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect();
    if rows.is_empty() {
        return;
    }

    let max_cols = rows.iter().map(Vec::len).max().unwrap_or(0);
    for (i, row) in rows.iter().enumerate() {
        out.push('|');
        for j in 0..max_cols {
            let cell = row.get(j).map(String::as_str).unwrap_or("");
            out.push_str(&format!(" {} |", cell));
        }
        out.push('\n');
        if i == 0 {
            out.push('|');
            out.push_str(&" --- |".repeat(max_cols));
            out.push('\n');
        }
    }
    out.push('\n');
}

fn definition_list(dl: ElementRef, out: &mut String) {
    for child in dl.children().filter_map(ElementRef::wrap) {
        let text = inline_text(child);
        if text.is_empty() {
            continue;
        }
        match child.value().name() {
            "dt" => out.push_str(&format!("**{}**\n", text)),
            "dd" => out.push_str(&format!(": {}\n", text)),
            _ => {}
        }
    }
    out.push('\n');
}

/// Trim line ends and cap blank runs at one empty line.
fn tidy(raw: &str) -> String {
    let mut output = String::new();
    let mut blank = 0;
    for line in raw.lines().map(str::trim_end) {
        if line.trim().is_empty() {
            blank += 1;
            if blank == 1 {
                output.push('\n');
            }
        } else {
            blank = 0;
            output.push_str(line);
            output.push('\n');
        }
    }
    output.trim().to_string()
}
