//! Configuration module for Tribeca Insights
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files. Every key has a default, so a run can be configured entirely from
//! the command line.
//!
//! # Example
//!
//! ```no_run
//! use tribeca_insights::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("tribeca.toml")).unwrap();
//! println!("Crawler will visit at most {} pages", config.crawler.max_pages);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, OutputConfig, RendererConfig, SiteConfig, UserAgentConfig,
    SUPPORTED_LANGUAGES,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;

use crate::url::{domain_slug, extract_domain};
use std::path::PathBuf;
use url::Url;

impl Config {
    /// Parsed base URL
    pub fn base_url(&self) -> Result<Url, crate::ConfigError> {
        Url::parse(&self.site.base_url).map_err(|e| {
            crate::ConfigError::InvalidUrl(format!(
                "Invalid base-url '{}': {}",
                self.site.base_url, e
            ))
        })
    }

    /// Site domain without `www.`
    pub fn domain(&self) -> Result<String, crate::ConfigError> {
        let url = self.base_url()?;
        extract_domain(&url).ok_or_else(|| {
            crate::ConfigError::InvalidUrl(format!("base-url '{}' has no host", url))
        })
    }

    /// Project slug: configured, or derived from the domain
    pub fn project_slug(&self) -> Result<String, crate::ConfigError> {
        match &self.site.slug {
            Some(slug) => Ok(slug.clone()),
            None => Ok(domain_slug(&self.domain()?)),
        }
    }

    /// Directory holding this project's files
    pub fn project_dir(&self) -> Result<PathBuf, crate::ConfigError> {
        Ok(self.output.projects_dir.join(self.project_slug()?))
    }
}
