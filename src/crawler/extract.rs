//! HTML content extraction
//!
//! This module parses a fetched page and pulls out everything the writers
//! need:
//! - Title, meta description and headings
//! - Images with their alt text
//! - Links to follow and links that leave the site
//! - The visible text used for keyword statistics

use crate::url::SiteScope;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use thiserror::Error;
use url::Url;

/// Elements whose text is never part of the visible page text
const HIDDEN_ELEMENTS: &[&str] = &[
    "script", "style", "svg", "footer", "nav", "meta", "noscript", "template",
];

/// Per-page extraction failure; the page is retried or reprocessed later
#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    #[error("empty response body")]
    EmptyBody,

    #[error("response body is not HTML")]
    NotHtml,
}

/// An image reference found on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub src: String,
    pub alt: String,
}

/// Everything extracted from one HTML page
#[derive(Debug, Clone, Default)]
pub struct ExtractedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Content of `<meta name="description">`
    pub description: String,

    /// Headings in document order, Markdown-prefixed (`## Section`)
    pub headings: Vec<String>,

    pub images: Vec<ImageRef>,

    /// All followable links on the page (absolute http/https URLs)
    pub links: Vec<Url>,

    /// Links leaving the site, sorted and deduplicated
    pub external_links: Vec<String>,

    /// Readable text with hidden elements removed
    pub visible_text: String,
}

/// Parses HTML content and extracts page content and metadata
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs and fragment-only links
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `page_url` - The URL the content was served from, for resolving relative links
/// * `site` - The crawled site, used to tell external links apart
///
/// # Returns
///
/// * `Ok(ExtractedPage)` - Successfully parsed page
/// * `Err(ExtractionError)` - The body is empty or not HTML
pub fn extract_page(
    html: &str,
    page_url: &Url,
    site: &SiteScope,
) -> Result<ExtractedPage, ExtractionError> {
    if html.trim().is_empty() {
        return Err(ExtractionError::EmptyBody);
    }
    if !html.contains('<') {
        return Err(ExtractionError::NotHtml);
    }

    let document = Html::parse_document(html);

    let links = extract_links(&document, page_url);
    let external_links: BTreeSet<String> = links
        .iter()
        .filter(|link| !site.contains(link))
        .map(|link| link.to_string())
        .collect();

    Ok(ExtractedPage {
        title: extract_title(&document),
        description: extract_description(&document),
        headings: extract_headings(&document),
        images: extract_images(&document),
        links,
        external_links: external_links.into_iter().collect(),
        visible_text: extract_visible_text(&document),
    })
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Collapses runs of whitespace into single spaces
fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn extract_title(document: &Html) -> Option<String> {
    let title_selector = selector("title")?;

    document
        .select(&title_selector)
        .next()
        .map(|element| squash_whitespace(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

fn extract_description(document: &Html) -> String {
    selector(r#"meta[name="description"]"#)
        .and_then(|sel| {
            document
                .select(&sel)
                .next()
                .and_then(|meta| meta.value().attr("content"))
                .map(|content| content.trim().to_string())
        })
        .unwrap_or_default()
}

fn extract_headings(document: &Html) -> Vec<String> {
    let Some(heading_selector) = selector("h1, h2, h3, h4, h5, h6") else {
        return Vec::new();
    };

    document
        .select(&heading_selector)
        .filter_map(|heading| {
            let level: usize = heading.value().name()[1..].parse().ok()?;
            let text = squash_whitespace(&heading.text().collect::<String>());
            Some(format!("{} {}", "#".repeat(level), text))
        })
        .collect()
}

fn extract_images(document: &Html) -> Vec<ImageRef> {
    let Some(img_selector) = selector("img") else {
        return Vec::new();
    };

    document
        .select(&img_selector)
        .map(|img| ImageRef {
            src: img.value().attr("src").unwrap_or("").to_string(),
            alt: img.value().attr("alt").unwrap_or("").trim().to_string(),
        })
        .collect()
}

/// Extracts all valid links from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<Url> {
    let mut links = Vec::new();

    if let Some(a_selector) = selector("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }

            if let Some(url) = element.value().attr("href").and_then(|h| resolve_link(h, base_url)) {
                links.push(url);
            }
        }
    }

    if let Some(canonical_selector) = selector("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(url) = element.value().attr("href").and_then(|h| resolve_link(h, base_url)) {
                links.push(url);
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    match absolute_url.scheme() {
        "http" | "https" => Some(absolute_url),
        _ => None,
    }
}

fn extract_visible_text(document: &Html) -> String {
    let mut out = String::new();
    collect_visible_text(document.root_element(), &mut out);
    out
}

fn collect_visible_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            if !HIDDEN_ELEMENTS.contains(&child_element.value().name()) {
                collect_visible_text(child_element, out);
            }
        } else if let Some(text) = child.value().as_text() {
            let text = text.trim();
            if !text.is_empty() {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(text);
            }
        }
    }
}
