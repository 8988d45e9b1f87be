use crate::robots::PolitenessDirectives;
use tokio::sync::{Mutex, OnceCell};
use tokio::time::Instant;

/// Tracks politeness state for one origin (scheme + host + port)
///
/// Directives are resolved once per process and never invalidated mid-run.
/// The last-request timestamp sits behind an async mutex so that pacing for
/// one origin is serialised while other origins proceed independently.
#[derive(Debug, Default)]
pub struct OriginState {
    /// Robots rules and minimum delay, fetched lazily
    pub directives: OnceCell<PolitenessDirectives>,

    /// Time the last request slot was granted
    pub last_request: Mutex<Option<Instant>>,
}

impl OriginState {
    /// Creates a new OriginState with no directives and no request history
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an OriginState whose directives are already known
    pub fn with_directives(directives: PolitenessDirectives) -> Self {
        Self {
            directives: OnceCell::new_with(Some(directives)),
            last_request: Mutex::new(None),
        }
    }
}
