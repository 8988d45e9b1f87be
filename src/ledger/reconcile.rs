//! Reconciliation of ledger statuses against artifacts on disk

use super::Ledger;
use crate::output::{HTTP_ARTIFACT_DIR, RENDERED_ARTIFACT_DIR};
use crate::state::VisitStatus;
use crate::url::{page_slug, readable_slug};
use std::path::Path;
use tracing::{debug, info};
use url::Url;

/// Outcome of a reconciliation pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Visited records whose artifact was found
    pub verified: usize,

    /// Visited records with no artifact path that were matched to a file by slug
    pub recovered: usize,

    /// Visited records demoted to NeedsReprocessing
    pub demoted: usize,
}

impl Ledger {
    /// Verifies every Visited record against the artifacts in `project_dir`
    ///
    /// A record whose artifact is missing is demoted to NeedsReprocessing
    /// and its artifact path cleared. A record with no artifact path is
    /// matched by slug against `pages_md/` and `pages_md_rendered/`. Bare
    /// file names from older ledgers are resolved against `pages_md/`.
    ///
    /// Records in any other status have their artifact path cleared.
    pub fn reconcile(&mut self, project_dir: &Path) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for record in &mut self.records {
            match record.status {
                VisitStatus::Visited => {}
                VisitStatus::Unvisited | VisitStatus::NeedsReprocessing | VisitStatus::Skipped => {
                    record.artifact_path = None;
                    continue;
                }
            }

            let found = match record.artifact_path.as_deref() {
                Some(path) => resolve_artifact(project_dir, path),
                None => find_by_slug(project_dir, &record.url).map(|path| {
                    report.recovered += 1;
                    path
                }),
            };

            match found {
                Some(path) => {
                    record.artifact_path = Some(path);
                    report.verified += 1;
                }
                None => {
                    debug!("Artifact missing for {}, marking for reprocessing", record.url);
                    record.status = VisitStatus::NeedsReprocessing;
                    record.artifact_path = None;
                    report.demoted += 1;
                }
            }
        }

        if report.demoted > 0 || report.recovered > 0 {
            info!(
                "Reconciled ledger: {} verified, {} recovered by slug, {} marked for reprocessing",
                report.verified, report.recovered, report.demoted
            );
        }

        report
    }
}

/// Resolves a stored artifact path to a project-relative path that exists
fn resolve_artifact(project_dir: &Path, stored: &str) -> Option<String> {
    let stored = stored.trim();

    if stored.contains('/') {
        return project_dir.join(stored).is_file().then(|| stored.to_string());
    }

    // Bare file names come from ledgers that kept artifacts under pages_md/
    [HTTP_ARTIFACT_DIR, RENDERED_ARTIFACT_DIR]
        .iter()
        .map(|dir| format!("{}/{}", dir, stored))
        .find(|candidate| project_dir.join(candidate).is_file())
}

/// Looks for a page's artifact under its current name, then under the
/// readable name older runs used
fn find_by_slug(project_dir: &Path, url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let mut slugs = vec![page_slug(&url)];
    let readable = readable_slug(&url);
    if readable != slugs[0] {
        slugs.push(readable);
    }

    slugs
        .iter()
        .find_map(|slug| resolve_artifact(project_dir, &format!("{}.md", slug)))
}
