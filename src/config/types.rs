use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Languages with a known stopword list or accepted as project metadata
pub const SUPPORTED_LANGUAGES: &[&str] = &[
    "en", "pt-br", "es", "fr", "it", "de", "zh-cn", "ja", "ru", "ar",
];

/// Main configuration structure for Tribeca Insights
///
/// Every section and key is optional; missing values take their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    pub renderer: RendererConfig,
}

/// The site being crawled
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SiteConfig {
    /// Starting URL; its domain bounds the crawl
    pub base_url: String,

    /// Project slug; derived from the domain when absent
    pub slug: Option<String>,

    /// Content language, used to pick stopwords
    pub language: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            slug: None,
            language: "en".to_string(),
        }
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum number of pages dispatched in one run
    pub max_pages: usize,

    /// Maximum number of concurrent fetch jobs
    pub max_workers: usize,

    /// Baseline delay between requests to one origin (milliseconds)
    pub min_crawl_delay_ms: u64,

    /// Explicit crawl delay in seconds; overrides robots.txt when set
    pub crawl_delay_secs: Option<f64>,

    /// Timeout for a single fetch (seconds)
    pub request_timeout_secs: u64,

    /// Queue depth above which pages are browser-rendered
    pub render_threshold: usize,

    /// Always use the browser renderer
    pub force_render: bool,

    /// Attempts per URL before it is left for reprocessing
    pub max_attempts: u32,

    /// Base backoff between attempts (milliseconds), doubled per attempt
    pub retry_backoff_ms: u64,

    /// Seed the ledger from /sitemap.xml
    pub use_sitemap: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_pages: 10,
            max_workers: 5,
            min_crawl_delay_ms: 1000,
            crawl_delay_secs: None,
            request_timeout_secs: 10,
            render_threshold: 3,
            force_render: false,
            max_attempts: 3,
            retry_backoff_ms: 1000,
            use_sitemap: true,
        }
    }
}

impl CrawlerConfig {
    pub fn baseline_delay(&self) -> Duration {
        Duration::from_millis(self.min_crawl_delay_ms)
    }

    /// The explicit delay override, if a valid one is configured
    pub fn delay_override(&self) -> Option<Duration> {
        self.crawl_delay_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the crawler; also the robots.txt product token
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: Option<String>,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "tribeca-insights".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: None,
        }
    }
}

impl UserAgentConfig {
    /// Formats the User-Agent header: `Name/Version` or `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        match &self.contact_url {
            Some(contact) => format!(
                "{}/{} (+{})",
                self.crawler_name, self.crawler_version, contact
            ),
            None => format!("{}/{}", self.crawler_name, self.crawler_version),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory holding one sub-directory per project
    pub projects_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            projects_dir: PathBuf::from("projects"),
        }
    }
}

/// Headless browser configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RendererConfig {
    /// Chrome/Chromium binary; auto-detected when absent
    pub chrome_executable: Option<PathBuf>,

    pub headless: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            chrome_executable: None,
            headless: true,
        }
    }
}
