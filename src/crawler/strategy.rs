//! Fetch strategy selection
//!
//! Choosing a browser over plain HTTP is a heuristic: a deep queue is taken
//! as a sign of a large, likely script-heavy site. Once the browser is
//! chosen it stays chosen for the rest of the run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// How a page is fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FetchStrategy {
    /// Plain HTTP GET
    Http,

    /// Loaded and rendered in a headless browser
    #[serde(rename = "Playwright", alias = "BrowserRendered")]
    BrowserRendered,
}

impl FetchStrategy {
    /// Directory (relative to the project) that holds this strategy's artifacts
    pub fn artifact_dir(&self) -> &'static str {
        match self {
            Self::Http => crate::output::HTTP_ARTIFACT_DIR,
            Self::BrowserRendered => crate::output::RENDERED_ARTIFACT_DIR,
        }
    }
}

impl fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::BrowserRendered => write!(f, "browser"),
        }
    }
}

/// Picks a fetch strategy from the current queue depth
#[derive(Debug)]
pub struct StrategySelector {
    threshold: usize,
    force_render: bool,
    latched: AtomicBool,
}

impl StrategySelector {
    /// Creates a selector
    ///
    /// # Arguments
    ///
    /// * `threshold` - Queue depths strictly above this select the browser
    /// * `force_render` - Always select the browser
    pub fn new(threshold: usize, force_render: bool) -> Self {
        Self {
            threshold,
            force_render,
            latched: AtomicBool::new(false),
        }
    }

    /// Returns true if the given depth would select the browser
    ///
    /// Does not latch; used to decide whether to launch the browser up front.
    pub fn would_render(&self, queue_depth: usize) -> bool {
        self.force_render || self.is_latched() || queue_depth > self.threshold
    }

    /// Selects the strategy for the next page
    ///
    /// # Arguments
    ///
    /// * `queue_depth` - Number of URLs waiting, including the one being selected
    /// * `override_flag` - Per-call request for the browser
    pub fn select(&self, queue_depth: usize, override_flag: bool) -> FetchStrategy {
        if override_flag || self.would_render(queue_depth) {
            self.latched.store(true, Ordering::SeqCst);
            FetchStrategy::BrowserRendered
        } else {
            FetchStrategy::Http
        }
    }

    pub fn is_latched(&self) -> bool {
        self.latched.load(Ordering::SeqCst)
    }

    /// The engine that characterises the run so far
    pub fn engine(&self) -> FetchStrategy {
        if self.is_latched() {
            FetchStrategy::BrowserRendered
        } else {
            FetchStrategy::Http
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_at_threshold_uses_http() {
        let selector = StrategySelector::new(3, false);
        assert_eq!(selector.select(3, false), FetchStrategy::Http);
        assert_eq!(selector.engine(), FetchStrategy::Http);
    }

    #[test]
    fn test_depth_above_threshold_uses_browser() {
        let selector = StrategySelector::new(3, false);
        assert_eq!(selector.select(4, false), FetchStrategy::BrowserRendered);
    }

    #[test]
    fn test_override_forces_browser() {
        let selector = StrategySelector::new(3, false);
        assert_eq!(selector.select(1, true), FetchStrategy::BrowserRendered);
    }

    #[test]
    fn test_force_render_config() {
        let selector = StrategySelector::new(3, true);
        assert!(selector.would_render(0));
        assert_eq!(selector.select(0, false), FetchStrategy::BrowserRendered);
    }

    #[test]
    fn test_browser_choice_latches_for_the_run() {
        let selector = StrategySelector::new(3, false);
        assert_eq!(selector.select(10, false), FetchStrategy::BrowserRendered);
        assert_eq!(selector.select(1, false), FetchStrategy::BrowserRendered);
        assert_eq!(selector.engine(), FetchStrategy::BrowserRendered);
    }

    #[test]
    fn test_serialized_names() {
        assert_eq!(
            serde_json::to_string(&FetchStrategy::BrowserRendered).unwrap(),
            "\"Playwright\""
        );
        assert_eq!(serde_json::to_string(&FetchStrategy::Http).unwrap(), "\"Http\"");
        let parsed: FetchStrategy = serde_json::from_str("\"BrowserRendered\"").unwrap();
        assert_eq!(parsed, FetchStrategy::BrowserRendered);
    }
}
