//! Markup stripping for fetched license pages
//!
//! License pages wrap the text in site navigation, so the matcher is fed
//! candidate regions in order of how likely they are to hold only the
//! license: paragraphs inside a `content` element, `<main>`, every
//! paragraph of the page, then the whole body.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

static HTML_SNIFF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^\s*(?:<\?xml[^>]*>\s*)?(?:<!doctype\s+html|<html\b|<head\b|<body\b)").expect("valid regex"));

static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("link[rel][href]").expect("valid selector"));
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").expect("valid selector"));

/// Region selectors, most specific first; the body comes last
static REGIONS: Lazy<Vec<Selector>> = Lazy::new(|| {
    ["body .content p", "body main", "body p"]
        .iter()
        .map(|s| Selector::parse(s).expect("valid selector"))
        .collect()
});

const SKIPPED: &[&str] = &["script", "style", "noscript", "template", "head"];

const BLOCKS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "pre", "main", "section",
    "article", "header", "footer", "nav", "tr", "table", "blockquote",
];

/// Does this body look like an HTML document?
pub fn looks_like_html(body: &str) -> bool {
    HTML_SNIFF.is_match(body)
}

/// `href` of the first `<link rel="canonical">` in the document
pub fn canonical_link(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document.select(&LINK).find_map(|link| {
        let element = link.value();
        let canonical = element
            .attr("rel")?
            .split_whitespace()
            .any(|rel| rel.eq_ignore_ascii_case("canonical"));
        let href = element.attr("href")?.trim();
        (canonical && !href.is_empty()).then(|| href.to_string())
    })
}

/// Candidate text regions, most specific first. The last region is always
/// the full body text.
pub fn text_regions(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);

    let mut regions: Vec<String> = Vec::new();
    for selector in REGIONS.iter() {
        let text = document
            .select(selector)
            .map(element_text)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        if !text.is_empty() && !regions.contains(&text) {
            regions.push(text);
        }
    }

    // Body last, even if an earlier region had the same text.
    let body = document.select(&BODY).next().map(element_text).unwrap_or_default();
    regions.retain(|r| r != &body);
    if !body.is_empty() {
        regions.push(body);
    }
    regions
}

/// Visible text of `element` with whitespace normalized; block elements
/// break lines and paragraph breaks survive as blank lines
fn element_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(element, &mut raw);

    let mut out = String::with_capacity(raw.len());
    let mut blank = false;
    for line in raw.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            blank = !out.is_empty();
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank { "\n\n" } else { "\n" });
        }
        out.push_str(&line);
        blank = false;
    }
    out
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            continue;
        }
        let Some(child) = ElementRef::wrap(child) else {
            continue;
        };
        let name = child.value().name();
        if SKIPPED.contains(&name) {
            continue;
        }
        let block = BLOCKS.contains(&name);
        if block {
            out.push('\n');
        }
        collect_text(child, out);
        if block {
            out.push('\n');
        }
    }
}
