/// Visit status definitions for the persisted ledger
///
/// The numeric codes are the on-disk representation and must stay stable
/// across releases.
use std::fmt;

/// Represents the persisted status of a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VisitStatus {
    /// Discovered but never successfully processed
    Unvisited,

    /// Fetched, extracted and written to an artifact
    Visited,

    /// Previously visited (or attempted) and must be processed again
    NeedsReprocessing,

    /// Failed permanently; excluded until explicitly reset
    Skipped,
}

impl VisitStatus {
    /// Returns the numeric code stored in the ledger
    pub fn code(&self) -> u8 {
        match self {
            Self::Unvisited => 0,
            Self::Visited => 1,
            Self::NeedsReprocessing => 2,
            Self::Skipped => 3,
        }
    }

    /// Parses a status from its numeric code
    ///
    /// Returns None if the code doesn't match any known status.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Unvisited),
            1 => Some(Self::Visited),
            2 => Some(Self::NeedsReprocessing),
            3 => Some(Self::Skipped),
            _ => None,
        }
    }

    /// Parses a status from a ledger cell
    ///
    /// Accepts the numeric code as well as the snake_case name. Integral
    /// floats such as `1.0` are read as their code.
    pub fn parse(cell: &str) -> Option<Self> {
        let cell = cell.trim();
        if let Ok(code) = cell.parse::<u8>() {
            return Self::from_code(code);
        }
        if let Ok(value) = cell.parse::<f64>() {
            let integral = value.is_finite() && value.fract() == 0.0;
            if integral && (0.0..=f64::from(u8::MAX)).contains(&value) {
                return Self::from_code(value as u8);
            }
            return None;
        }

        match cell.to_ascii_lowercase().as_str() {
            "unvisited" => Some(Self::Unvisited),
            "visited" => Some(Self::Visited),
            "needs_reprocessing" => Some(Self::NeedsReprocessing),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }

    /// Returns true if a URL with this status belongs in the frontier
    pub fn is_pending(&self) -> bool {
        match self {
            Self::Unvisited | Self::NeedsReprocessing => true,
            Self::Visited | Self::Skipped => false,
        }
    }

    /// Returns the snake_case name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unvisited => "unvisited",
            Self::Visited => "visited",
            Self::NeedsReprocessing => "needs_reprocessing",
            Self::Skipped => "skipped",
        }
    }

    /// Returns all possible statuses
    pub fn all() -> [Self; 4] {
        [
            Self::Unvisited,
            Self::Visited,
            Self::NeedsReprocessing,
            Self::Skipped,
        ]
    }
}

impl fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
