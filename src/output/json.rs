use crate::crawler::FetchStrategy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An image reference as stored in page records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageData {
    pub src: String,
    pub alt: String,
}

/// Metadata for one crawled page, persisted to `pages_json/<slug>.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageData {
    pub url: String,
    pub slug: String,
    pub title: String,
    pub meta_description: String,
    pub headings: Vec<String>,
    pub word_count: usize,
    pub word_frequency: BTreeMap<String, usize>,
    pub images: Vec<ImageData>,
    pub external_links: Vec<String>,
    /// SHA-256 of the visible text
    pub page_hash: String,
    /// Markdown artifact path relative to the project directory
    pub md_filename: String,
    pub fetch_strategy_used: FetchStrategy,
    pub crawled_at: DateTime<Utc>,
}

/// One entry of `index.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub slug: String,
    pub title: String,
    pub md_filename: String,
}

impl From<&PageData> for IndexEntry {
    fn from(page: &PageData) -> Self {
        Self {
            slug: page.slug.clone(),
            title: page.title.clone(),
            md_filename: page.md_filename.clone(),
        }
    }
}
