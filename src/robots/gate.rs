//! Politeness gate
//!
//! Answers two questions before every fetch: may this URL be fetched at all
//! (robots.txt), and when (crawl delay). Robots directives are fetched once
//! per origin and cached for the lifetime of the gate.

use super::ParsedRobots;
use crate::crawler::{FetchError, PageFetcher};
use crate::state::OriginState;
use crate::url::origin_of;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

/// Robots rules and declared delay for one origin
#[derive(Debug, Clone, Default)]
pub struct PolitenessDirectives {
    pub rules: ParsedRobots,

    /// `Crawl-delay` declared for this crawler, if any
    pub declared_delay: Option<Duration>,
}

impl PolitenessDirectives {
    /// Directives that permit everything and declare no delay
    pub fn permit_all() -> Self {
        Self::default()
    }

    /// Builds directives from robots.txt content for a product token
    pub fn from_robots(content: &str, agent: &str) -> Self {
        let rules = ParsedRobots::from_content(content);
        let declared_delay = rules
            .crawl_delay(agent)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok());
        Self {
            rules,
            declared_delay,
        }
    }
}

/// Shared politeness state for a crawl
///
/// Shared between workers as `Arc<PolitenessGate>`.
pub struct PolitenessGate {
    fetcher: Arc<dyn PageFetcher>,
    /// robots.txt product token
    agent: String,
    baseline_delay: Duration,
    delay_override: Option<Duration>,
    timeout: Duration,
    origins: Mutex<HashMap<String, Arc<OriginState>>>,
}

impl PolitenessGate {
    /// Creates a gate
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Used to download robots.txt
    /// * `agent` - The crawler's robots.txt product token
    /// * `baseline_delay` - Delay used when robots.txt declares none
    /// * `delay_override` - Explicit delay that takes precedence over robots.txt
    /// * `timeout` - Timeout for the robots.txt request
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        agent: &str,
        baseline_delay: Duration,
        delay_override: Option<Duration>,
        timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            agent: agent.to_string(),
            baseline_delay,
            delay_override,
            timeout,
            origins: Mutex::new(HashMap::new()),
        }
    }

    /// Installs known directives for an origin, skipping the robots.txt fetch
    pub fn with_directives(self, origin: &str, directives: PolitenessDirectives) -> Self {
        if let Ok(mut origins) = self.origins.lock() {
            origins.insert(
                origin.to_string(),
                Arc::new(OriginState::with_directives(directives)),
            );
        }
        self
    }

    fn origin_state(&self, origin: &str) -> Arc<OriginState> {
        let mut origins = match self.origins.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        origins
            .entry(origin.to_string())
            .or_insert_with(|| Arc::new(OriginState::new()))
            .clone()
    }

    /// Returns true unless robots.txt for the URL's origin disallows it
    ///
    /// The first call for an origin downloads its robots.txt. A 4xx response
    /// means there are no rules. Network failures and 5xx responses are
    /// logged and also treated as no rules.
    pub async fn permits(&self, url: &Url) -> bool {
        let state = self.origin_state(&origin_of(url));
        let directives = state
            .directives
            .get_or_init(|| self.load_directives(url))
            .await;

        let allowed = directives.rules.is_allowed(url.as_str(), &self.agent);
        if !allowed {
            debug!("robots.txt disallows {}", url);
        }
        allowed
    }

    async fn load_directives(&self, url: &Url) -> PolitenessDirectives {
        let robots_url = match url.join("/robots.txt") {
            Ok(robots_url) => robots_url,
            Err(e) => {
                warn!("Cannot build robots.txt URL for {}: {}", url, e);
                return PolitenessDirectives::permit_all();
            }
        };

        // robots.txt counts as a request against the origin's pacing
        self.await_slot(&origin_of(url)).await;

        match self.fetcher.fetch(&robots_url, self.timeout).await {
            Ok(page) => {
                let directives = PolitenessDirectives::from_robots(&page.body, &self.agent);
                debug!(
                    "Loaded {} (crawl-delay: {:?})",
                    robots_url, directives.declared_delay
                );
                directives
            }
            Err(FetchError::Permanent { status, .. }) => {
                debug!("No robots.txt at {} ({:?}), permitting all", robots_url, status);
                PolitenessDirectives::permit_all()
            }
            Err(e) => {
                warn!(
                    "Could not fetch {} ({}), proceeding without robots rules",
                    robots_url, e
                );
                PolitenessDirectives::permit_all()
            }
        }
    }

    /// The minimum interval between requests to an origin
    ///
    /// The configured override wins; then the origin's declared
    /// `Crawl-delay`; then the baseline.
    pub fn delay_for(&self, origin: &str) -> Duration {
        if let Some(delay) = self.delay_override {
            return delay;
        }

        self.origin_state(origin)
            .directives
            .get()
            .and_then(|d| d.declared_delay)
            .unwrap_or(self.baseline_delay)
    }

    /// Waits until a request to `origin` is allowed, then claims the slot
    ///
    /// Callers for the same origin queue on the origin's mutex, so each one
    /// starts at least `delay_for(origin)` after the previous one.
    pub async fn await_slot(&self, origin: &str) {
        let state = self.origin_state(origin);
        let delay = self.delay_for(origin);

        let mut last_request = state.last_request.lock().await;
        if let Some(previous) = *last_request {
            tokio::time::sleep_until(previous + delay).await;
        }
        *last_request = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::FetchedPage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves a fixed robots.txt response and counts requests
    struct RobotsStub {
        response: Result<String, FetchError>,
        calls: AtomicUsize,
    }

    impl RobotsStub {
        fn new(response: Result<&str, FetchError>) -> Arc<Self> {
            Arc::new(Self {
                response: response.map(String::from),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PageFetcher for RobotsStub {
        async fn fetch(&self, url: &Url, _timeout: Duration) -> Result<FetchedPage, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone().map(|body| FetchedPage {
                final_url: url.clone(),
                status: 200,
                body,
            })
        }
    }

    fn create_gate(stub: Arc<RobotsStub>, delay_override: Option<Duration>) -> PolitenessGate {
        PolitenessGate::new(
            stub,
            "tribeca-insights",
            Duration::from_secs(1),
            delay_override,
            Duration::from_secs(5),
        )
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_disallowed_url_is_denied() {
        let stub = RobotsStub::new(Ok("User-agent: *\nDisallow: /private"));
        let gate = create_gate(stub.clone(), None);

        assert!(gate.permits(&url("https://example.com/public")).await);
        assert!(!gate.permits(&url("https://example.com/private/x")).await);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_robots_permits_all() {
        let stub = RobotsStub::new(Err(FetchError::Permanent {
            status: Some(404),
            reason: "HTTP 404".to_string(),
        }));
        let gate = create_gate(stub, None);

        assert!(gate.permits(&url("https://example.com/anything")).await);
    }

    #[tokio::test]
    async fn test_unreachable_robots_fails_open() {
        let stub = RobotsStub::new(Err(FetchError::Transient("HTTP 503".to_string())));
        let gate = create_gate(stub, None);

        assert!(gate.permits(&url("https://example.com/anything")).await);
    }

    #[tokio::test]
    async fn test_delay_precedence() {
        let stub = RobotsStub::new(Ok("User-agent: *\nCrawl-delay: 4"));
        let gate = create_gate(stub.clone(), None);
        let origin = "https://example.com";

        // Before robots.txt is known the baseline applies
        assert_eq!(gate.delay_for(origin), Duration::from_secs(1));

        gate.permits(&url("https://example.com/")).await;
        assert_eq!(gate.delay_for(origin), Duration::from_secs(4));

        let gate = create_gate(stub, Some(Duration::from_millis(250)));
        gate.permits(&url("https://example.com/")).await;
        assert_eq!(gate.delay_for(origin), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slots_are_spaced_by_crawl_delay() {
        let stub = RobotsStub::new(Ok(""));
        let directives = PolitenessDirectives {
            rules: ParsedRobots::allow_all(),
            declared_delay: Some(Duration::from_secs(2)),
        };
        let gate = Arc::new(
            create_gate(stub.clone(), None).with_directives("https://example.com", directives),
        );

        let start = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..3 {
            let gate = gate.clone();
            handles.push(tokio::spawn(async move {
                gate.await_slot("https://example.com").await;
                Instant::now()
            }));
        }

        let mut granted = Vec::new();
        for handle in handles {
            granted.push(handle.await.unwrap());
        }
        granted.sort();

        assert_eq!(granted[0] - start, Duration::ZERO);
        assert!(granted[1] - granted[0] >= Duration::from_secs(2));
        assert!(granted[2] - granted[1] >= Duration::from_secs(2));
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_robots_fetch_takes_a_slot() {
        let stub = RobotsStub::new(Ok("User-agent: *\nCrawl-delay: 3"));
        let gate = create_gate(stub.clone(), None);
        let origin = "https://example.com";

        let start = Instant::now();
        gate.await_slot(origin).await;
        assert!(gate.permits(&url("https://example.com/")).await);
        let robots_done = Instant::now();
        assert!(robots_done - start >= Duration::from_secs(1));

        gate.await_slot(origin).await;
        assert!(Instant::now() - robots_done >= Duration::from_secs(3));
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_origins_are_paced_independently() {
        let stub = RobotsStub::new(Ok(""));
        let gate = create_gate(stub, Some(Duration::from_secs(5)));

        gate.await_slot("https://a.example").await;
        let start = Instant::now();
        gate.await_slot("https://b.example").await;

        assert_eq!(Instant::now() - start, Duration::ZERO);
    }
}
