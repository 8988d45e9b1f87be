use crate::config::Config;
use crate::output::PageData;
use crate::ConfigError;
use serde::{Deserialize, Serialize};

/// Version written into `project_<slug>.json`
pub const PROJECT_FORMAT_VERSION: &str = "1.0";

/// The engine that characterises a run; serialised as `"Http"` / `"Playwright"`
pub type CrawlerEngine = crate::crawler::FetchStrategy;

/// Site-level metadata persisted to `project_<slug>.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    pub version: String,
    pub crawled_by: String,
    pub project_slug: String,
    pub domain: String,
    pub base_url: String,
    pub language: String,
    /// Set by the first aggregation and never changed afterwards
    pub created_at: String,
    pub last_updated_at: String,
    pub crawler_engine: CrawlerEngine,
    pub max_pages: usize,
    pub max_workers: usize,
    /// Effective delay between requests to the site, in seconds
    pub crawl_delay: f64,
    pub pages_count: usize,
    pub pages_data: Vec<PageData>,
}

/// Run parameters recorded alongside the aggregated pages
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectContext {
    pub project_slug: String,
    pub domain: String,
    pub base_url: String,
    pub language: String,
    pub crawled_by: String,
    /// Engine used by the run; `None` derives it from the stored pages
    pub crawler_engine: Option<CrawlerEngine>,
    pub max_pages: usize,
    pub max_workers: usize,
    pub crawl_delay: f64,
}

impl ProjectContext {
    /// Builds the context for a configuration
    ///
    /// The crawl delay is the configured override, or the baseline when no
    /// override is set.
    pub fn from_config(
        config: &Config,
        crawler_engine: Option<CrawlerEngine>,
    ) -> Result<Self, ConfigError> {
        let crawl_delay = config
            .crawler
            .delay_override()
            .unwrap_or_else(|| config.crawler.baseline_delay())
            .as_secs_f64();

        Ok(Self {
            project_slug: config.project_slug()?,
            domain: config.domain()?,
            base_url: config.base_url()?.to_string(),
            language: config.site.language.clone(),
            crawled_by: config.user_agent.header_value(),
            crawler_engine,
            max_pages: config.crawler.max_pages,
            max_workers: config.crawler.max_workers,
            crawl_delay,
        })
    }

    /// Replaces the recorded crawl delay with the effective one
    pub fn with_crawl_delay(mut self, seconds: f64) -> Self {
        self.crawl_delay = seconds;
        self
    }
}
