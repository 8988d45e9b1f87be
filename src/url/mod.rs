//! URL handling module
//!
//! This module provides URL canonicalisation, site membership checks and
//! slug derivation for domains and pages.

mod domain;
mod normalize;
mod slug;

pub use domain::{extract_domain, origin_of, SiteScope};
pub use normalize::normalize_url;
pub use slug::{domain_slug, page_slug, readable_slug, slugify};
