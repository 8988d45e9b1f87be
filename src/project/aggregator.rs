use super::types::{CrawlerEngine, ProjectContext, ProjectState, PROJECT_FORMAT_VERSION};
use crate::output::keywords::{write_keyword_csv, write_keyword_json};
use crate::output::{
    parse_title, render_external_urls, render_index, write_atomic, IndexEntry, OutputResult,
    PageData, PAGES_JSON_DIR, RENDERED_ARTIFACT_DIR,
};
use crate::ledger::{Ledger, VisitRecord};
use crate::state::VisitStatus;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Returns the project metadata file name for a slug
pub fn project_file_name(slug: &str) -> String {
    format!("project_{}.json", slug)
}

/// Rebuilds the project summary files from persisted state
///
/// Reads the ledger and the per-page records and overwrites:
/// - `project_<slug>.json`
/// - `index.json` and `index.md`
/// - `external_urls.json` and `external_urls.md`
/// - `keyword_frequency_<slug>.csv` and `.json`
///
/// `created_at` is carried over from an existing project file. Running it
/// again without a crawl in between only moves `last_updated_at`.
///
/// # Arguments
///
/// * `ledger` - The reconciled ledger
/// * `project_dir` - Directory holding the project's files
/// * `context` - Run parameters to record
///
/// # Returns
///
/// The project state that was written
pub fn aggregate(
    ledger: &Ledger,
    project_dir: &Path,
    context: &ProjectContext,
) -> OutputResult<ProjectState> {
    fs::create_dir_all(project_dir)?;

    let pages_data: Vec<PageData> = ledger
        .iter()
        .filter(|record| record.status == VisitStatus::Visited)
        .filter_map(|record| load_page_data(project_dir, record))
        .collect();

    let crawler_engine = context
        .crawler_engine
        .unwrap_or_else(|| engine_from_pages(&pages_data));

    let project_path = project_dir.join(project_file_name(&context.project_slug));
    let now = Utc::now().to_rfc3339();
    let created_at = existing_created_at(&project_path).unwrap_or_else(|| now.clone());

    let state = ProjectState {
        version: PROJECT_FORMAT_VERSION.to_string(),
        crawled_by: context.crawled_by.clone(),
        project_slug: context.project_slug.clone(),
        domain: context.domain.clone(),
        base_url: context.base_url.clone(),
        language: context.language.clone(),
        created_at,
        last_updated_at: now,
        crawler_engine,
        max_pages: context.max_pages,
        max_workers: context.max_workers,
        crawl_delay: context.crawl_delay,
        pages_count: pages_data.len(),
        pages_data,
    };

    write_atomic(&project_path, &serde_json::to_vec_pretty(&state)?)?;

    let index: Vec<IndexEntry> = state.pages_data.iter().map(IndexEntry::from).collect();
    write_atomic(
        &project_dir.join("index.json"),
        &serde_json::to_vec_pretty(&index)?,
    )?;
    write_atomic(
        &project_dir.join("index.md"),
        render_index(&state.pages_data).as_bytes(),
    )?;

    let external: Vec<String> = state
        .pages_data
        .iter()
        .flat_map(|page| page.external_links.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    write_atomic(
        &project_dir.join("external_urls.json"),
        &serde_json::to_vec_pretty(&external)?,
    )?;
    write_atomic(
        &project_dir.join("external_urls.md"),
        render_external_urls(&external).as_bytes(),
    )?;

    let mut frequency: BTreeMap<String, usize> = BTreeMap::new();
    for page in &state.pages_data {
        for (word, count) in &page.word_frequency {
            *frequency.entry(word.clone()).or_insert(0) += count;
        }
    }
    let keyword_stem = format!("keyword_frequency_{}", context.project_slug);
    write_keyword_csv(
        &project_dir.join(format!("{}.csv", keyword_stem)),
        &frequency,
    )?;
    write_keyword_json(
        &project_dir.join(format!("{}.json", keyword_stem)),
        &frequency,
    )?;

    info!(
        "Aggregated {} pages into {}",
        state.pages_count,
        project_path.display()
    );

    Ok(state)
}

/// Loads the stored record for a visited page
///
/// Falls back to a minimal record built from the Markdown artifact when the
/// JSON record is missing or unreadable.
fn load_page_data(project_dir: &Path, record: &VisitRecord) -> Option<PageData> {
    let artifact_path = record.artifact_path.as_deref()?;
    // The JSON record shares the Markdown artifact's file stem
    let slug = match Path::new(artifact_path).file_stem().and_then(|stem| stem.to_str()) {
        Some(stem) => stem.to_string(),
        None => {
            warn!("Artifact path {} for {} has no file name", artifact_path, record.url);
            return None;
        }
    };

    let json_path = project_dir
        .join(PAGES_JSON_DIR)
        .join(format!("{}.json", slug));
    match fs::read(&json_path).map(|bytes| serde_json::from_slice::<PageData>(&bytes)) {
        Ok(Ok(mut data)) => {
            data.md_filename = artifact_path.to_string();
            return Some(data);
        }
        Ok(Err(e)) => warn!("Unreadable page record {}: {}", json_path.display(), e),
        Err(e) => debug!("No page record at {}: {}", json_path.display(), e),
    }

    let markdown = match fs::read_to_string(project_dir.join(artifact_path)) {
        Ok(markdown) => markdown,
        Err(e) => {
            warn!("Artifact {} for {} unreadable: {}", artifact_path, record.url, e);
            return None;
        }
    };

    let fetch_strategy_used = if artifact_path.starts_with(RENDERED_ARTIFACT_DIR) {
        CrawlerEngine::BrowserRendered
    } else {
        CrawlerEngine::Http
    };

    Some(PageData {
        url: record.url.clone(),
        slug,
        title: parse_title(&markdown).unwrap_or_else(|| "(no title)".to_string()),
        meta_description: String::new(),
        headings: Vec::new(),
        word_count: 0,
        word_frequency: BTreeMap::new(),
        images: Vec::new(),
        external_links: Vec::new(),
        page_hash: String::new(),
        md_filename: artifact_path.to_string(),
        fetch_strategy_used,
        crawled_at: visited_date(record),
    })
}

/// Midnight UTC of the record's visit date, or the Unix epoch
fn visited_date(record: &VisitRecord) -> DateTime<Utc> {
    record
        .visited_at
        .as_deref()
        .and_then(|date| NaiveDate::parse_from_str(date, "%Y-%m-%d").ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn engine_from_pages(pages: &[PageData]) -> CrawlerEngine {
    if pages
        .iter()
        .any(|page| page.fetch_strategy_used == CrawlerEngine::BrowserRendered)
    {
        CrawlerEngine::BrowserRendered
    } else {
        CrawlerEngine::Http
    }
}

fn existing_created_at(project_path: &Path) -> Option<String> {
    let bytes = fs::read(project_path).ok()?;
    let value: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    value
        .get("created_at")?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
