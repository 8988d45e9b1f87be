//! Visit ledger module
//!
//! The ledger is a flat CSV file with one row per discovered URL. It is the
//! source of truth for crawl progress across runs:
//! - Loading tolerates corrupt rows and preserves unknown columns
//! - Reconciliation checks that every visited URL still has its artifact
//! - Flushing is atomic (temp file + rename)

mod csv_store;
mod reconcile;
mod record;

pub use reconcile::ReconcileReport;
pub use record::VisitRecord;

use crate::state::VisitStatus;
use std::collections::HashMap;
use thiserror::Error;

/// Ledger-specific errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The ledger file exists but cannot be read as a ledger at all
    #[error("Ledger unreadable at {path}: {reason}")]
    Unreadable { path: String, reason: String },

    /// A single row could not be decoded; the row is skipped
    #[error("Corrupt ledger row {row}: {reason}")]
    CorruptRow { row: u64, reason: String },

    #[error("Failed to write ledger: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for ledger operations
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Returns the ledger file name for a project slug
pub fn ledger_file_name(slug: &str) -> String {
    format!("visited_urls_{}.csv", slug)
}

/// In-memory view of the visit ledger
///
/// Records keep their discovery order; lookups go through a URL index.
#[derive(Debug, Default, Clone)]
pub struct Ledger {
    records: Vec<VisitRecord>,
    index: HashMap<String, usize>,
    /// Column names beyond the known four, in file order
    extra_columns: Vec<String>,
    /// Rows dropped as corrupt during load
    corrupt_rows: usize,
}

impl Ledger {
    /// Creates an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of rows skipped as corrupt when the ledger was loaded
    pub fn corrupt_rows(&self) -> usize {
        self.corrupt_rows
    }

    /// Pass-through column names, in file order
    pub fn extra_columns(&self) -> &[String] {
        &self.extra_columns
    }

    pub fn get(&self, url: &str) -> Option<&VisitRecord> {
        self.index.get(url).map(|&i| &self.records[i])
    }

    pub fn contains(&self, url: &str) -> bool {
        self.index.contains_key(url)
    }

    /// Iterates records in discovery order
    pub fn iter(&self) -> impl Iterator<Item = &VisitRecord> {
        self.records.iter()
    }

    /// Records that belong in the frontier, in discovery order
    pub fn pending(&self) -> impl Iterator<Item = &VisitRecord> {
        self.records.iter().filter(|r| r.status.is_pending())
    }

    /// Counts records with the given status
    pub fn count(&self, status: VisitStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    /// Inserts or replaces a record keyed by URL
    ///
    /// Last write wins. An existing key keeps its position; pass-through
    /// columns missing from the new record are carried over from the old one.
    pub fn upsert(&mut self, mut record: VisitRecord) {
        match self.index.get(&record.url) {
            Some(&i) => {
                let existing = &mut self.records[i];
                for (column, value) in std::mem::take(&mut existing.extra) {
                    record.extra.entry(column).or_insert(value);
                }
                *existing = record;
            }
            None => {
                for column in record.extra.keys() {
                    if !self.extra_columns.contains(column) {
                        self.extra_columns.push(column.clone());
                    }
                }
                self.index.insert(record.url.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    /// Records a newly discovered URL as Unvisited
    ///
    /// # Returns
    ///
    /// * `true` - If the URL was not known before
    /// * `false` - If a record already exists (its status is left alone)
    pub fn discover(&mut self, url: &str) -> bool {
        if self.contains(url) {
            return false;
        }
        self.upsert(VisitRecord::new(url));
        true
    }

    /// Marks a URL as visited with the given artifact path
    pub fn mark_visited(&mut self, url: &str, artifact_path: &str, visited_at: &str) {
        let mut record = self.get(url).cloned().unwrap_or_else(|| VisitRecord::new(url));
        record.status = VisitStatus::Visited;
        record.artifact_path = Some(artifact_path.to_string());
        record.visited_at = Some(visited_at.to_string());
        self.upsert(record);
    }

    /// Moves a URL to a non-visited status, clearing its artifact path
    pub fn mark(&mut self, url: &str, status: VisitStatus) {
        let mut record = self.get(url).cloned().unwrap_or_else(|| VisitRecord::new(url));
        record.status = status;
        match status {
            VisitStatus::Visited => {}
            VisitStatus::Unvisited | VisitStatus::NeedsReprocessing | VisitStatus::Skipped => {
                record.artifact_path = None;
            }
        }
        self.upsert(record);
    }

    /// Turns every Skipped record back into Unvisited
    ///
    /// # Returns
    ///
    /// The number of records reset
    pub fn reset_skipped(&mut self) -> usize {
        let mut reset = 0;
        for record in &mut self.records {
            if record.status == VisitStatus::Skipped {
                record.status = VisitStatus::Unvisited;
                reset += 1;
            }
        }
        reset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_keeps_position() {
        let mut ledger = Ledger::new();
        ledger.discover("https://example.com/a");
        ledger.discover("https://example.com/b");

        ledger.mark_visited("https://example.com/a", "pages_md/a.md", "2024-01-01");

        let urls: Vec<&str> = ledger.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["https://example.com/a", "https://example.com/b"]);
        assert_eq!(
            ledger.get("https://example.com/a").unwrap().status,
            VisitStatus::Visited
        );
    }

    #[test]
    fn test_discover_does_not_overwrite() {
        let mut ledger = Ledger::new();
        ledger.mark_visited("https://example.com/", "pages_md/home.md", "2024-01-01");

        assert!(!ledger.discover("https://example.com/"));
        assert_eq!(ledger.count(VisitStatus::Visited), 1);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_mark_clears_artifact() {
        let mut ledger = Ledger::new();
        ledger.mark_visited("https://example.com/", "pages_md/home.md", "2024-01-01");
        ledger.mark("https://example.com/", VisitStatus::NeedsReprocessing);

        let record = ledger.get("https://example.com/").unwrap();
        assert_eq!(record.status, VisitStatus::NeedsReprocessing);
        assert!(record.artifact_path.is_none());
    }

    #[test]
    fn test_upsert_keeps_extra_columns() {
        let mut ledger = Ledger::new();
        let mut record = VisitRecord::new("https://example.com/");
        record.extra.insert("Notes".to_string(), "keep me".to_string());
        ledger.upsert(record);

        ledger.mark("https://example.com/", VisitStatus::Skipped);

        let record = ledger.get("https://example.com/").unwrap();
        assert_eq!(record.extra.get("Notes").map(String::as_str), Some("keep me"));
        assert_eq!(ledger.extra_columns(), &["Notes".to_string()]);
    }

    #[test]
    fn test_reset_skipped() {
        let mut ledger = Ledger::new();
        ledger.discover("https://example.com/a");
        ledger.mark("https://example.com/a", VisitStatus::Skipped);
        ledger.discover("https://example.com/b");

        assert_eq!(ledger.reset_skipped(), 1);
        assert_eq!(ledger.count(VisitStatus::Skipped), 0);
        assert_eq!(ledger.pending().count(), 2);
    }
}
