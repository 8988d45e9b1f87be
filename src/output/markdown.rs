//! Markdown rendering for page artifacts and project reports

use super::PageData;
use crate::crawler::ExtractedPage;
use std::collections::BTreeMap;
use std::fmt::Write;
use url::Url;

/// Number of keywords listed in a page artifact
const TOP_WORDS_IN_PAGE: usize = 50;

/// Characters of visible text kept in a page artifact
const CLEANED_TEXT_LIMIT: usize = 3000;

/// Characters of raw HTML kept in a page artifact
const RAW_HTML_LIMIT: usize = 5000;

/// Renders the Markdown artifact for one page
///
/// # Arguments
///
/// * `url` - The canonical URL of the page
/// * `html` - The raw response body
/// * `page` - Content extracted from the body
/// * `frequency` - Keyword counts for the page
/// * `total_words` - Number of tokens analyzed
///
/// # Returns
///
/// The artifact text, ending in a newline
pub fn render_page(
    url: &Url,
    html: &str,
    page: &ExtractedPage,
    frequency: &BTreeMap<String, usize>,
    total_words: usize,
) -> String {
    let mut md = String::new();
    let title = page.title.as_deref().unwrap_or("(no title)");

    let _ = writeln!(md, "# `{}`\n", url);
    let _ = writeln!(md, "**Title**: {}\n", title);
    let _ = writeln!(md, "**Meta Description**: {}\n", page.description);

    md.push_str("## Headings\n");
    if page.headings.is_empty() {
        md.push_str("_No headings found._");
    } else {
        md.push_str(&bullet_list(&page.headings));
    }
    md.push_str("\n\n");

    md.push_str("## Word Frequency (Top 50)\n");
    for (word, count) in super::top_words(frequency, TOP_WORDS_IN_PAGE) {
        let _ = writeln!(md, "- **{}**: {}", word, count);
    }
    md.push('\n');

    md.push_str("## External Links\n");
    if page.external_links.is_empty() {
        md.push_str("_No external links found._");
    } else {
        md.push_str(&bullet_list(&page.external_links));
    }
    md.push_str("\n\n");

    md.push_str("## Images with ALT\n");
    if page.images.is_empty() {
        md.push_str("_No images found._\n");
    } else {
        let lines: Vec<String> = page
            .images
            .iter()
            .map(|img| {
                let alt = if img.alt.trim().is_empty() {
                    "_(no ALT)_"
                } else {
                    img.alt.trim()
                };
                format!("- `src`: {}\n  - alt: {}", img.src, alt)
            })
            .collect();
        md.push_str(&lines.join("\n"));
    }
    md.push('\n');

    md.push_str("## Cleaned Text\n");
    let _ = writeln!(
        md,
        "```\n{}...\n```\n",
        truncate_chars(&page.visible_text, CLEANED_TEXT_LIMIT)
    );

    md.push_str("## Raw HTML\n```html\n");
    md.push_str(truncate_chars(html, RAW_HTML_LIMIT));
    md.push_str("\n... (truncated)\n```\n\n");

    md.push_str("---\n");
    let _ = writeln!(md, "_Total words analyzed: {}_", total_words);

    md
}

/// Renders `index.md`, one link per page sorted by artifact path
pub fn render_index(pages: &[PageData]) -> String {
    let mut entries: Vec<&PageData> = pages.iter().collect();
    entries.sort_by(|a, b| a.md_filename.cmp(&b.md_filename));

    let mut md = String::from("# Analyzed Pages Index\n\n");
    for page in entries {
        let _ = writeln!(md, "- [{}]({})", link_text(page), page.md_filename);
    }
    md
}

/// Renders `external_urls.md` from a sorted list of external URLs
pub fn render_external_urls(urls: &[String]) -> String {
    let mut md = String::from("# External URLs\n\n");
    if urls.is_empty() {
        md.push_str("_No external links found._\n");
    }
    for url in urls {
        let _ = writeln!(md, "- {}", url);
    }
    md
}

/// Recovers the title line from an existing page artifact
pub(crate) fn parse_title(markdown: &str) -> Option<String> {
    markdown
        .lines()
        .find_map(|line| line.strip_prefix("**Title**: "))
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
}

fn link_text(page: &PageData) -> String {
    if page.title.trim().is_empty() || page.title == "(no title)" {
        page.slug.replace('-', " ")
    } else {
        page.title.replace(['[', ']'], "")
    }
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
