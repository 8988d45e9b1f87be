//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP and browser-rendered fetching behind one trait
//! - HTML extraction and link discovery
//! - The FIFO frontier, retry policy and strategy selection
//! - Overall crawl coordination

mod coordinator;
mod extract;
mod fetcher;
mod frontier;
mod render;
mod retry;
mod sitemap;
mod strategy;

pub use coordinator::{CrawlDriver, RunPhase, RunSummary, StopHandle};
pub use extract::{extract_page, ExtractedPage, ExtractionError, ImageRef};
pub use fetcher::{build_http_client, FetchError, FetchedPage, HttpFetcher, PageFetcher};
pub use frontier::Frontier;
pub use render::BrowserRenderer;
pub use retry::RetryPolicy;
pub use sitemap::{fetch_sitemap_urls, parse_sitemap};
pub use strategy::{FetchStrategy, StrategySelector};

use crate::config::Config;
use crate::CrawlError;

/// Runs a complete crawl with the default HTTP client
///
/// # Arguments
///
/// * `config` - A validated configuration
///
/// # Returns
///
/// * `Ok(RunSummary)` - The run terminated
/// * `Err(CrawlError)` - A fatal error ended the run
pub async fn crawl(config: Config) -> Result<RunSummary, CrawlError> {
    CrawlDriver::new(config)?.run().await
}
