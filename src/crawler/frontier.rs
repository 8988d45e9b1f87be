//! URL frontier
//!
//! A FIFO queue of URLs waiting to be fetched in this run. Order is
//! discovery order, which gives a breadth-first crawl from the base URL.

use crate::ledger::Ledger;
use std::collections::{HashSet, VecDeque};

/// Pending URLs for the current run
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<String>,
    /// Every URL ever queued this run, so a URL is fetched at most once
    seen: HashSet<String>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the frontier with the ledger's pending records, in ledger order
    pub fn from_ledger(ledger: &Ledger) -> Self {
        let mut frontier = Self::new();
        for record in ledger.pending() {
            frontier.push(&record.url);
        }
        frontier
    }

    /// Queues a URL
    ///
    /// # Returns
    ///
    /// * `true` - If the URL was queued
    /// * `false` - If it was already queued earlier in this run
    pub fn push(&mut self, url: &str) -> bool {
        if !self.seen.insert(url.to_string()) {
            return false;
        }
        self.queue.push_back(url.to_string());
        true
    }

    /// Takes the next URL in discovery order
    pub fn pop(&mut self) -> Option<String> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::VisitStatus;

    #[test]
    fn test_fifo_order() {
        let mut frontier = Frontier::new();
        frontier.push("https://example.com/a");
        frontier.push("https://example.com/b");

        assert_eq!(frontier.pop().as_deref(), Some("https://example.com/a"));
        assert_eq!(frontier.pop().as_deref(), Some("https://example.com/b"));
        assert!(frontier.pop().is_none());
    }

    #[test]
    fn test_push_deduplicates_even_after_pop() {
        let mut frontier = Frontier::new();
        assert!(frontier.push("https://example.com/a"));
        frontier.pop();
        assert!(!frontier.push("https://example.com/a"));
        assert!(frontier.is_empty());
    }

    #[test]
    fn test_from_ledger_takes_pending_in_order() {
        let mut ledger = Ledger::new();
        ledger.discover("https://example.com/1");
        ledger.mark_visited("https://example.com/2", "pages_md/2.md", "2024-01-01");
        ledger.discover("https://example.com/3");
        ledger.mark("https://example.com/3", VisitStatus::NeedsReprocessing);
        ledger.discover("https://example.com/4");
        ledger.mark("https://example.com/4", VisitStatus::Skipped);

        let mut frontier = Frontier::from_ledger(&ledger);
        assert_eq!(frontier.len(), 2);
        assert_eq!(frontier.pop().as_deref(), Some("https://example.com/1"));
        assert_eq!(frontier.pop().as_deref(), Some("https://example.com/3"));
    }
}
