//! CSV persistence for the visit ledger

use super::{Ledger, LedgerError, LedgerResult, VisitRecord};
use crate::state::VisitStatus;
use crate::url::normalize_url;
use std::fs;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

const HEADER: [&str; 4] = ["url", "status", "artifact_path", "visited_at"];

/// Positions of the known columns in a ledger header
#[derive(Debug, Default)]
struct ColumnLayout {
    url: usize,
    status: Option<usize>,
    artifact_path: Option<usize>,
    visited_at: Option<usize>,
    extra: Vec<(usize, String)>,
}

impl ColumnLayout {
    /// Maps header names to columns
    ///
    /// Matching is case-insensitive and accepts the legacy names `URL`,
    /// `Status`, `MD File` and `Data`. Returns None without a url column.
    fn from_headers(headers: &csv::StringRecord) -> Option<Self> {
        let mut url = None;
        let mut layout = Self::default();

        for (idx, name) in headers.iter().enumerate() {
            let key = name.trim().to_ascii_lowercase();
            let slot = match key.as_str() {
                "url" => &mut url,
                "status" => &mut layout.status,
                "artifact_path" | "md file" | "md_file" => &mut layout.artifact_path,
                "visited_at" | "data" => &mut layout.visited_at,
                _ => {
                    layout.extra.push((idx, name.to_string()));
                    continue;
                }
            };

            if slot.is_none() {
                *slot = Some(idx);
            } else {
                layout.extra.push((idx, name.to_string()));
            }
        }

        layout.url = url?;
        Some(layout)
    }

    fn decode(&self, row: &csv::StringRecord, line: u64) -> LedgerResult<VisitRecord> {
        let corrupt = |reason: String| LedgerError::CorruptRow { row: line, reason };

        let raw_url = row.get(self.url).unwrap_or("").trim();
        if raw_url.is_empty() {
            return Err(corrupt("missing url".to_string()));
        }
        let url = normalize_url(raw_url).map_err(|e| corrupt(e.to_string()))?;

        let status = match self.status {
            Some(idx) => {
                let cell = row.get(idx).unwrap_or("");
                VisitStatus::parse(cell)
                    .ok_or_else(|| corrupt(format!("unparsable status '{}'", cell)))?
            }
            None => VisitStatus::Unvisited,
        };

        let non_empty = |idx: Option<usize>| {
            idx.and_then(|i| row.get(i))
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        let mut record = VisitRecord::new(url.as_str());
        record.status = status;
        record.artifact_path = non_empty(self.artifact_path);
        record.visited_at = non_empty(self.visited_at);
        for (idx, name) in &self.extra {
            record
                .extra
                .insert(name.clone(), row.get(*idx).unwrap_or("").to_string());
        }

        Ok(record)
    }
}

impl Ledger {
    /// Loads a ledger from a CSV file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the ledger file
    ///
    /// # Returns
    ///
    /// * `Ok(Ledger)` - The loaded ledger; empty if the file does not exist
    /// * `Err(LedgerError::Unreadable)` - The file cannot be read or has no url column
    ///
    /// Rows that cannot be decoded are logged, counted and skipped.
    pub fn load(path: &Path) -> LedgerResult<Self> {
        if !path.exists() {
            debug!("No ledger at {}, starting empty", path.display());
            return Ok(Self::new());
        }

        let unreadable = |reason: String| LedgerError::Unreadable {
            path: path.display().to_string(),
            reason,
        };

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|e| unreadable(e.to_string()))?;

        let headers = reader
            .headers()
            .map_err(|e| unreadable(e.to_string()))?
            .clone();

        if headers.is_empty() {
            return Ok(Self::new());
        }

        let layout = ColumnLayout::from_headers(&headers)
            .ok_or_else(|| unreadable("header has no url column".to_string()))?;

        let mut ledger = Self::new();
        ledger.extra_columns = layout.extra.iter().map(|(_, name)| name.clone()).collect();

        for (i, result) in reader.records().enumerate() {
            // Line 1 is the header
            let line = i as u64 + 2;

            let row = match result {
                Ok(row) => row,
                Err(e) if e.is_io_error() => return Err(unreadable(e.to_string())),
                Err(e) => {
                    warn!("Skipping corrupt ledger row {}: {}", line, e);
                    ledger.corrupt_rows += 1;
                    continue;
                }
            };

            match layout.decode(&row, line) {
                Ok(record) => ledger.upsert(record),
                Err(e) => {
                    warn!("Skipping {}", e);
                    ledger.corrupt_rows += 1;
                }
            }
        }

        debug!(
            "Loaded ledger with {} records ({} corrupt rows skipped)",
            ledger.len(),
            ledger.corrupt_rows
        );

        Ok(ledger)
    }

    /// Atomically writes the ledger to a CSV file
    ///
    /// The rows go to a temporary file in the same directory which is then
    /// renamed over the target, so a crash never leaves a partial ledger.
    pub fn flush(&self, path: &Path) -> LedgerResult<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let write_err = |e: csv::Error| LedgerError::Write(e.to_string());

        let mut writer = csv::Writer::from_writer(NamedTempFile::new_in(dir)?);

        let mut header: Vec<&str> = HEADER.to_vec();
        header.extend(self.extra_columns.iter().map(String::as_str));
        writer.write_record(&header).map_err(write_err)?;

        for record in &self.records {
            let status = record.status.code().to_string();
            let mut row: Vec<&str> = vec![
                record.url.as_str(),
                status.as_str(),
                record.artifact_path.as_deref().unwrap_or(""),
                record.visited_at.as_deref().unwrap_or(""),
            ];
            for column in &self.extra_columns {
                row.push(record.extra.get(column).map(String::as_str).unwrap_or(""));
            }
            writer.write_record(&row).map_err(write_err)?;
        }

        let tmp = writer
            .into_inner()
            .map_err(|e| LedgerError::Write(e.to_string()))?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| LedgerError::Io(e.error))?;

        Ok(())
    }
}
