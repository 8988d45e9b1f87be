//! Robots.txt handling and politeness
//!
//! This module fetches and parses robots.txt once per origin and paces
//! requests so that the crawler honours each origin's crawl delay.

mod gate;
mod parser;

pub use gate::{PolitenessDirectives, PolitenessGate};
pub use parser::ParsedRobots;
