//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `VisitStatus`: The persisted status of a URL in the visit ledger
//! - `OriginState`: Per-origin politeness state (robots directives, pacing)

mod origin_state;
mod visit_status;

pub use origin_state::OriginState;
pub use visit_status::VisitStatus;
