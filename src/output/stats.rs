//! Ledger statistics for the `--stats` mode

use crate::ledger::Ledger;
use crate::state::VisitStatus;
use std::collections::BTreeMap;

/// Summary counts over a visit ledger
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerStatistics {
    pub total_urls: usize,
    pub by_status: BTreeMap<VisitStatus, usize>,
    /// Rows dropped as unreadable when the ledger was loaded
    pub corrupt_rows: usize,
    /// Visited records with an artifact path recorded
    pub artifacts: usize,
}

impl LedgerStatistics {
    pub fn count(&self, status: VisitStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    /// Share of the ledger that has been visited, as a percentage
    pub fn completion_rate(&self) -> f64 {
        if self.total_urls == 0 {
            return 0.0;
        }
        (self.count(VisitStatus::Visited) as f64 / self.total_urls as f64) * 100.0
    }
}

/// Collects statistics from a loaded ledger
pub fn load_statistics(ledger: &Ledger) -> LedgerStatistics {
    let by_status = VisitStatus::all()
        .iter()
        .map(|&status| (status, ledger.count(status)))
        .collect();

    LedgerStatistics {
        total_urls: ledger.len(),
        by_status,
        corrupt_rows: ledger.corrupt_rows(),
        artifacts: ledger
            .iter()
            .filter(|r| r.status == VisitStatus::Visited && r.artifact_path.is_some())
            .count(),
    }
}

/// Prints ledger statistics to stdout
pub fn print_statistics(stats: &LedgerStatistics) {
    println!("=== Ledger Statistics ===\n");

    println!("Overview:");
    println!("  Total URLs: {}", stats.total_urls);
    println!("  Artifacts on record: {}", stats.artifacts);
    if stats.corrupt_rows > 0 {
        println!("  Corrupt rows skipped: {}", stats.corrupt_rows);
    }
    println!();

    println!("URLs by Status:");
    let mut counts: Vec<_> = stats.by_status.iter().collect();
    counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

    for (status, count) in counts {
        let percentage = if stats.total_urls > 0 {
            (*count as f64 / stats.total_urls as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!();

    println!(
        "Completion: {:.1}% ({} / {} URLs visited)",
        stats.completion_rate(),
        stats.count(VisitStatus::Visited),
        stats.total_urls
    );
}
