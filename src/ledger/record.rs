use crate::state::VisitStatus;
use std::collections::BTreeMap;

/// One ledger row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitRecord {
    /// Canonical absolute URL, the ledger key
    pub url: String,

    pub status: VisitStatus,

    /// Artifact path relative to the project directory; set only when Visited
    pub artifact_path: Option<String>,

    /// Date of the last successful visit (`YYYY-MM-DD`)
    pub visited_at: Option<String>,

    /// Columns this crate does not interpret, preserved verbatim
    pub extra: BTreeMap<String, String>,
}

impl VisitRecord {
    /// Creates an Unvisited record for a URL
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            status: VisitStatus::Unvisited,
            artifact_path: None,
            visited_at: None,
            extra: BTreeMap::new(),
        }
    }
}
