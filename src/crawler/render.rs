//! Headless browser fetcher
//!
//! Pages that need JavaScript are loaded in Chromium through the DevTools
//! protocol and the final DOM is returned as the page body.

use super::fetcher::{classify_status, FetchError, FetchedPage, PageFetcher};
use crate::config::RendererConfig;
use crate::CrawlError;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use reqwest::StatusCode;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};
use url::Url;

/// Fetches pages by rendering them in a headless browser
pub struct BrowserRenderer {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
}

impl BrowserRenderer {
    /// Launches the browser
    ///
    /// # Returns
    ///
    /// * `Ok(BrowserRenderer)` - The browser is running
    /// * `Err(CrawlError::RenderingUnavailable)` - No usable browser could be started
    pub async fn launch(config: &RendererConfig) -> Result<Self, CrawlError> {
        let mut builder = BrowserConfig::builder().request_timeout(Duration::from_secs(30));

        if let Some(path) = &config.chrome_executable {
            if !path.exists() {
                return Err(CrawlError::RenderingUnavailable(format!(
                    "chrome executable not found at {}",
                    path.display()
                )));
            }
            builder = builder.chrome_executable(path);
        }

        if !config.headless {
            builder = builder.with_head();
        }

        let browser_config = builder
            .build()
            .map_err(|e| CrawlError::RenderingUnavailable(e.to_string()))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| CrawlError::RenderingUnavailable(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    trace!("Browser handler event error: {}", e);
                }
            }
            debug!("Browser handler task completed");
        });

        info!("Browser renderer launched");

        Ok(Self {
            browser: Mutex::new(browser),
            handler,
        })
    }

    /// Closes the browser
    pub async fn shutdown(&self) {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            debug!("Error closing browser: {}", e);
        }
    }

    /// Renders one page in a fresh tab
    ///
    /// Only navigation and DOM capture are bounded by `timeout`. The tab is
    /// closed on every path, including expiry.
    async fn render(&self, url: &Url, timeout: Duration) -> Result<FetchedPage, FetchError> {
        let page = {
            let browser = self.browser.lock().await;
            tokio::time::timeout(timeout, browser.new_page("about:blank"))
                .await
                .map_err(|_| FetchError::Transient("opening a tab timed out".to_string()))?
                .map_err(|e| FetchError::Transient(format!("failed to open page: {}", e)))?
        };

        let result = match tokio::time::timeout(timeout, load(&page, url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Transient("render timed out".to_string())),
        };

        if let Err(e) = page.close().await {
            trace!("Error closing page {}: {}", url, e);
        }

        result
    }
}

/// Navigates `page` to `url` and captures the rendered DOM
async fn load(page: &Page, url: &Url) -> Result<FetchedPage, FetchError> {
    page.goto(url.as_str())
        .await
        .map_err(|e| FetchError::Transient(format!("navigation failed: {}", e)))?;

    let request = page
        .wait_for_navigation_response()
        .await
        .map_err(|e| FetchError::Transient(format!("navigation failed: {}", e)))?;

    let status = match request.as_deref() {
        Some(request) => match (&request.response, &request.failure_text) {
            (Some(response), _) => check_document_status(response.status)?,
            (None, Some(failure)) => {
                return Err(FetchError::Transient(format!("navigation failed: {}", failure)))
            }
            (None, None) => 200,
        },
        None => 200,
    };

    let body = page
        .content()
        .await
        .map_err(|e| FetchError::Transient(format!("failed to read DOM: {}", e)))?;

    let final_url = page
        .url()
        .await
        .ok()
        .flatten()
        .and_then(|u| Url::parse(&u).ok())
        .unwrap_or_else(|| url.clone());

    Ok(FetchedPage {
        final_url,
        status,
        body,
    })
}

/// Applies the HTTP status table to a main-document status reported by the browser
fn check_document_status(status: i64) -> Result<u16, FetchError> {
    let code = u16::try_from(status)
        .ok()
        .and_then(|code| StatusCode::from_u16(code).ok())
        .ok_or_else(|| FetchError::Transient(format!("invalid status {}", status)))?;

    match classify_status(code) {
        Some(e) => Err(e),
        None => Ok(code.as_u16()),
    }
}

#[async_trait]
impl PageFetcher for BrowserRenderer {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedPage, FetchError> {
        self.render(url, timeout).await
    }
}

impl Drop for BrowserRenderer {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_missing_executable_is_unavailable() {
        let config = RendererConfig {
            chrome_executable: Some(PathBuf::from("/nonexistent/chrome-binary")),
            headless: true,
        };

        let result = BrowserRenderer::launch(&config).await;
        assert!(matches!(result, Err(CrawlError::RenderingUnavailable(_))));
    }

    #[test]
    fn test_document_status_success() {
        assert_eq!(check_document_status(200).unwrap(), 200);
        assert_eq!(check_document_status(203).unwrap(), 203);
    }

    #[test]
    fn test_document_status_client_errors_are_permanent() {
        for status in [404, 410, 403] {
            match check_document_status(status) {
                Err(FetchError::Permanent { status: Some(code), .. }) => {
                    assert_eq!(i64::from(code), status)
                }
                other => panic!("expected permanent error for {}, got {:?}", status, other),
            }
        }
    }

    #[test]
    fn test_document_status_retryable() {
        for status in [500, 503, 408, 429] {
            assert!(matches!(
                check_document_status(status),
                Err(FetchError::Transient(_))
            ));
        }
    }

    #[test]
    fn test_document_status_out_of_range() {
        assert!(matches!(check_document_status(-1), Err(FetchError::Transient(_))));
        assert!(matches!(check_document_status(70000), Err(FetchError::Transient(_))));
    }
}
