//! Sitemap seeding
//!
//! Reads `<loc>` entries from the site's `/sitemap.xml` so that pages not
//! reachable by links are still crawled.

use super::fetcher::PageFetcher;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Extracts `<loc>` values from sitemap XML
pub fn parse_sitemap(xml: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse("loc") else {
        return Vec::new();
    };

    Html::parse_document(xml)
        .select(&selector)
        .map(|loc| loc.text().collect::<String>().trim().to_string())
        .filter(|loc| !loc.is_empty())
        .collect()
}

/// Fetches `/sitemap.xml` for the base URL's origin
///
/// Failures are logged and yield an empty list; a missing sitemap is normal.
pub async fn fetch_sitemap_urls(
    fetcher: &dyn PageFetcher,
    base_url: &Url,
    timeout: Duration,
) -> Vec<String> {
    let sitemap_url = match base_url.join("/sitemap.xml") {
        Ok(url) => url,
        Err(e) => {
            warn!("Cannot build sitemap URL from {}: {}", base_url, e);
            return Vec::new();
        }
    };

    match fetcher.fetch(&sitemap_url, timeout).await {
        Ok(page) => {
            let urls = parse_sitemap(&page.body);
            debug!("Sitemap {} lists {} URLs", sitemap_url, urls.len());
            urls
        }
        Err(e) => {
            debug!("No sitemap at {}: {}", sitemap_url, e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sitemap() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://example.com/</loc></url>
  <url><loc>
    https://example.com/about
  </loc><lastmod>2024-01-01</lastmod></url>
  <url><loc></loc></url>
</urlset>"#;

        assert_eq!(
            parse_sitemap(xml),
            vec!["https://example.com/", "https://example.com/about"]
        );
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_sitemap("not xml at all").is_empty());
    }
}
