//! Output module for page artifacts and project reports
//!
//! This module handles:
//! - Writing one Markdown artifact and one JSON record per crawled page
//! - Keyword tokenization and frequency exports
//! - Index and external-link reports
//! - Ledger statistics for the `--stats` mode

pub mod keywords;
mod json;
mod markdown;
pub mod stats;

pub use json::{ImageData, IndexEntry, PageData};
pub use keywords::{tokenize, top_words, word_frequency};
pub use markdown::{render_external_urls, render_index, render_page};
pub(crate) use markdown::parse_title;
pub use stats::{load_statistics, print_statistics, LedgerStatistics};

use crate::crawler::{ExtractedPage, FetchStrategy};
use crate::url::page_slug;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Artifact directory for pages fetched over plain HTTP
pub const HTTP_ARTIFACT_DIR: &str = "pages_md";

/// Artifact directory for browser-rendered pages
pub const RENDERED_ARTIFACT_DIR: &str = "pages_md_rendered";

/// Directory holding per-page JSON records
pub const PAGES_JSON_DIR: &str = "pages_json";

/// Errors that can occur while writing output files
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type alias for output operations
pub type OutputResult<T> = std::result::Result<T, OutputError>;

/// Writes `contents` to `path` through a temporary file in the same directory
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> OutputResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| OutputError::Io(e.error))?;
    Ok(())
}

/// Hex-encoded SHA-256 of a page's visible text
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Writes per-page artifacts into a project directory
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    project_dir: PathBuf,
    language: String,
}

impl ArtifactWriter {
    pub fn new(project_dir: &Path, language: &str) -> Self {
        Self {
            project_dir: project_dir.to_path_buf(),
            language: language.to_string(),
        }
    }

    /// Writes the JSON record and the Markdown artifact for one page
    ///
    /// The JSON record is written first, so a Markdown artifact on disk
    /// always has its record next to it.
    ///
    /// # Returns
    ///
    /// The Markdown artifact path relative to the project directory
    pub fn write_artifact(
        &self,
        url: &Url,
        html: &str,
        page: &ExtractedPage,
        strategy: FetchStrategy,
    ) -> OutputResult<String> {
        let slug = page_slug(url);
        let artifact_path = format!("{}/{}.md", strategy.artifact_dir(), slug);

        let tokens = tokenize(&page.visible_text, &self.language);
        let frequency = word_frequency(&tokens);

        let data = PageData {
            url: url.to_string(),
            slug: slug.clone(),
            title: page.title.clone().unwrap_or_else(|| "(no title)".to_string()),
            meta_description: page.description.clone(),
            headings: page.headings.clone(),
            word_count: tokens.len(),
            word_frequency: frequency.clone(),
            images: page
                .images
                .iter()
                .map(|img| ImageData {
                    src: img.src.clone(),
                    alt: img.alt.clone(),
                })
                .collect(),
            external_links: page.external_links.clone(),
            page_hash: content_hash(&page.visible_text),
            md_filename: artifact_path.clone(),
            fetch_strategy_used: strategy,
            crawled_at: Utc::now(),
        };

        let json_path = self
            .project_dir
            .join(PAGES_JSON_DIR)
            .join(format!("{}.json", slug));
        write_atomic(&json_path, &serde_json::to_vec_pretty(&data)?)?;

        let markdown = render_page(url, html, page, &frequency, tokens.len());
        write_atomic(&self.project_dir.join(&artifact_path), markdown.as_bytes())?;

        debug!("Wrote {} for {}", artifact_path, url);
        Ok(artifact_path)
    }
}
