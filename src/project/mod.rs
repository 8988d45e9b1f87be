//! Project aggregation
//!
//! A project is everything known about one crawled site. Its summary files
//! are rebuilt from the ledger and the per-page records after every run, so
//! they never hold information the ledger does not.

mod aggregator;
mod types;

pub use aggregator::{aggregate, project_file_name};
pub use types::{CrawlerEngine, ProjectContext, ProjectState, PROJECT_FORMAT_VERSION};
