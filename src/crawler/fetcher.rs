//! HTTP fetcher implementation
//!
//! This module handles plain HTTP page fetches, including:
//! - Building HTTP clients with proper user agent strings
//! - Redirect handling (followed up to 10 hops)
//! - Error classification into transient and permanent failures

use crate::config::UserAgentConfig;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Maximum redirect hops before a fetch is treated as a redirect loop
const MAX_REDIRECTS: usize = 10;

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: Url,

    /// HTTP status code
    pub status: u16,

    /// Page body content
    pub body: String,
}

/// Fetch failures, classified by whether a retry can help
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Timeout, connection failure, 5xx, 408 or 429
    #[error("transient fetch failure: {0}")]
    Transient(String),

    /// Other 4xx responses and redirect loops
    #[error("permanent fetch failure: {reason}")]
    Permanent { status: Option<u16>, reason: String },

    /// The browser renderer is not usable
    #[error("browser rendering unavailable: {0}")]
    RenderingUnavailable(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Something that can turn a URL into an HTML body
///
/// Implemented by the plain HTTP client and by the browser renderer so the
/// crawl driver can switch between them per page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedPage, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Plain HTTP page fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    /// Fetches a URL with a per-request timeout
    ///
    /// # Error Classification
    ///
    /// | Condition | Result |
    /// |-----------|--------|
    /// | HTTP 2xx | Ok |
    /// | HTTP 408, 429, 5xx | Transient |
    /// | Other HTTP 4xx | Permanent |
    /// | Timeout / connection error | Transient |
    /// | Redirect chain > 10 or loop | Permanent |
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if let Some(err) = classify_status(status) {
            return Err(err);
        }

        let final_url = response.url().clone();
        let body = response.text().await.map_err(classify_request_error)?;

        Ok(FetchedPage {
            final_url,
            status: status.as_u16(),
            body,
        })
    }
}

/// Maps a non-success status to a fetch error
pub(super) fn classify_status(status: StatusCode) -> Option<FetchError> {
    if status.is_success() {
        return None;
    }

    let code = status.as_u16();
    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        return Some(FetchError::Transient(format!("HTTP {}", code)));
    }

    Some(FetchError::Permanent {
        status: Some(code),
        reason: format!("HTTP {}", code),
    })
}

fn classify_request_error(e: reqwest::Error) -> FetchError {
    if e.is_redirect() {
        FetchError::Permanent {
            status: None,
            reason: format!("redirect loop or more than {} redirects", MAX_REDIRECTS),
        }
    } else if e.is_timeout() {
        FetchError::Transient("request timed out".to_string())
    } else if e.is_connect() {
        FetchError::Transient(format!("connection failed: {}", e))
    } else {
        FetchError::Transient(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestCrawler".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: Some("https://example.com/about".to_string()),
        }
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&create_test_config()).is_ok());
    }

    #[test]
    fn test_success_is_not_an_error() {
        assert!(classify_status(StatusCode::OK).is_none());
        assert!(classify_status(StatusCode::NO_CONTENT).is_none());
    }

    #[test]
    fn test_retryable_statuses_are_transient() {
        for status in [
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::GATEWAY_TIMEOUT,
            StatusCode::REQUEST_TIMEOUT,
            StatusCode::TOO_MANY_REQUESTS,
        ] {
            let err = classify_status(status).unwrap();
            assert!(err.is_transient(), "{} should be transient", status);
        }
    }

    #[test]
    fn test_client_errors_are_permanent() {
        for status in [
            StatusCode::NOT_FOUND,
            StatusCode::GONE,
            StatusCode::FORBIDDEN,
        ] {
            let err = classify_status(status).unwrap();
            assert!(
                matches!(err, FetchError::Permanent { status: Some(code), .. } if code == status.as_u16())
            );
        }
    }
}
