//! Crawl driver - main crawl orchestration logic
//!
//! This module contains the crawl loop that ties every component together:
//! - Loading and reconciling the visit ledger
//! - Seeding the frontier from the ledger, the base URL and the sitemap
//! - Dispatching bounded fetch jobs through the politeness gate
//! - Applying job outcomes to the ledger (the loop is the only writer)
//! - Cooperative stop, periodic flushing and final aggregation

use super::extract::{extract_page, ExtractedPage};
use super::fetcher::{FetchError, FetchedPage, HttpFetcher, PageFetcher};
use super::frontier::Frontier;
use super::render::BrowserRenderer;
use super::retry::RetryPolicy;
use super::sitemap::fetch_sitemap_urls;
use super::strategy::{FetchStrategy, StrategySelector};
use crate::config::Config;
use crate::ledger::{ledger_file_name, Ledger};
use crate::output::ArtifactWriter;
use crate::project::{aggregate, ProjectContext};
use crate::robots::PolitenessGate;
use crate::state::VisitStatus;
use crate::url::{normalize_url, origin_of, SiteScope};
use crate::CrawlError;
use chrono::Local;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use url::Url;

/// Completed jobs between ledger flushes and progress lines
const FLUSH_INTERVAL: usize = 10;

/// Lifecycle of one crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Seeding,
    Running,
    Draining,
    Terminated,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Seeding => "seeding",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Terminated => "terminated",
        };
        write!(f, "{}", name)
    }
}

/// Requests a cooperative stop of a running crawl
///
/// The driver stops dispatching new jobs, lets in-flight jobs finish, flushes
/// the ledger and aggregates as usual.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Counts reported at the end of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Pages visited by this run
    pub visited_this_run: usize,
    /// Visited records in the ledger after the run
    pub visited_total: usize,
    /// Records excluded after a permanent failure
    pub skipped: usize,
    /// Records waiting to be fetched again
    pub pending_reprocess: usize,
    /// Records never visited
    pub unvisited: usize,
    /// URLs not fetched this run because robots.txt disallows them
    pub policy_denied: usize,
    /// Engine that characterised the run
    pub engine: FetchStrategy,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Visited this run:     {}", self.visited_this_run)?;
        writeln!(f, "Visited in total:     {}", self.visited_total)?;
        writeln!(f, "Skipped permanently:  {}", self.skipped)?;
        writeln!(f, "Pending reprocess:    {}", self.pending_reprocess)?;
        writeln!(f, "Still unvisited:      {}", self.unvisited)?;
        writeln!(f, "Denied by robots.txt: {}", self.policy_denied)?;
        write!(f, "Engine:               {:?}", self.engine)
    }
}

/// What a finished job asks the driver to record
#[derive(Debug)]
enum JobOutcome {
    Visited {
        artifact_path: String,
        links: Vec<Url>,
    },
    NeedsReprocessing(String),
    Skipped(String),
    Fatal(String),
}

/// Everything a worker needs, shared across jobs
struct WorkerContext {
    gate: Arc<PolitenessGate>,
    writer: ArtifactWriter,
    scope: SiteScope,
    retry: RetryPolicy,
    timeout: Duration,
}

/// Orchestrates one crawl run over a single site
pub struct CrawlDriver {
    config: Arc<Config>,
    base_url: Url,
    scope: SiteScope,
    project_dir: PathBuf,
    ledger_path: PathBuf,
    http: Arc<dyn PageFetcher>,
    renderer: Option<Arc<dyn PageFetcher>>,
    browser: Option<Arc<BrowserRenderer>>,
    gate: Arc<PolitenessGate>,
    selector: StrategySelector,
    phase: RunPhase,
    reset_skipped: bool,
    stop_tx: Arc<watch::Sender<bool>>,
    stop_rx: watch::Receiver<bool>,
}

impl CrawlDriver {
    /// Creates a driver using the plain HTTP client
    ///
    /// # Arguments
    ///
    /// * `config` - A validated configuration
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlDriver)` - Ready to run
    /// * `Err(CrawlError)` - The base URL is unusable or the HTTP client failed to build
    pub fn new(config: Config) -> Result<Self, CrawlError> {
        let http: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(&config.user_agent)?);
        Self::with_fetcher(config, http)
    }

    /// Creates a driver with a caller-supplied page fetcher
    ///
    /// The fetcher also serves robots.txt and sitemap.xml.
    pub fn with_fetcher(config: Config, http: Arc<dyn PageFetcher>) -> Result<Self, CrawlError> {
        let base_url = normalize_url(&config.site.base_url)?;
        let scope = SiteScope::from_base(&base_url).ok_or(crate::UrlError::MissingDomain)?;
        let project_dir = config.project_dir()?;
        let ledger_path = project_dir.join(ledger_file_name(&config.project_slug()?));

        let gate = Arc::new(PolitenessGate::new(
            Arc::clone(&http),
            &config.user_agent.crawler_name,
            config.crawler.baseline_delay(),
            config.crawler.delay_override(),
            config.crawler.request_timeout(),
        ));
        let selector = StrategySelector::new(
            config.crawler.render_threshold,
            config.crawler.force_render,
        );
        let (stop_tx, stop_rx) = watch::channel(false);

        Ok(Self {
            config: Arc::new(config),
            base_url,
            scope,
            project_dir,
            ledger_path,
            http,
            renderer: None,
            browser: None,
            gate,
            selector,
            phase: RunPhase::Idle,
            reset_skipped: false,
            stop_tx: Arc::new(stop_tx),
            stop_rx,
        })
    }

    /// Uses the given fetcher for browser-rendered pages instead of launching Chromium
    pub fn with_renderer(mut self, renderer: Arc<dyn PageFetcher>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Turns Skipped records back into Unvisited during seeding
    pub fn with_reset_skipped(mut self, reset: bool) -> Self {
        self.reset_skipped = reset;
        self
    }

    /// Handle for stopping the run from another task
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            tx: Arc::clone(&self.stop_tx),
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn ledger_path(&self) -> &Path {
        &self.ledger_path
    }

    fn is_stopped(&self) -> bool {
        *self.stop_rx.borrow()
    }

    /// Runs the crawl to completion
    ///
    /// # Returns
    ///
    /// * `Ok(RunSummary)` - The run terminated normally (including after a stop request)
    /// * `Err(CrawlError)` - A fatal error ended the run; the ledger has been flushed
    pub async fn run(&mut self) -> Result<RunSummary, CrawlError> {
        info!("Starting crawl of {}", self.base_url);
        let started = Instant::now();

        self.phase = RunPhase::Seeding;
        let mut ledger = self.seed().await?;
        let mut frontier = Frontier::from_ledger(&ledger);
        ledger.flush(&self.ledger_path)?;
        info!("Seeded frontier with {} URLs", frontier.len());

        self.phase = RunPhase::Running;
        let context = Arc::new(WorkerContext {
            gate: Arc::clone(&self.gate),
            writer: ArtifactWriter::new(&self.project_dir, &self.config.site.language),
            scope: self.scope.clone(),
            retry: RetryPolicy::new(
                self.config.crawler.max_attempts,
                self.config.crawler.retry_backoff(),
            ),
            timeout: self.config.crawler.request_timeout(),
        });

        let max_pages = self.config.crawler.max_pages;
        let max_workers = self.config.crawler.max_workers.max(1);
        let mut jobs: JoinSet<(String, JobOutcome)> = JoinSet::new();
        let mut stop_rx = self.stop_rx.clone();
        let mut stop_seen = self.is_stopped();
        let mut dispatched = 0usize;
        let mut completed = 0usize;
        let mut visited_this_run = 0usize;
        let mut policy_denied: HashSet<String> = HashSet::new();
        let mut fatal: Option<CrawlError> = None;

        loop {
            while fatal.is_none()
                && !self.is_stopped()
                && dispatched < max_pages
                && jobs.len() < max_workers
            {
                let Some(url) = frontier.pop() else {
                    break;
                };

                match ledger.get(&url).map(|record| record.status) {
                    Some(VisitStatus::Visited) | Some(VisitStatus::Skipped) => {
                        debug!("Already settled, not fetching: {}", url);
                        continue;
                    }
                    Some(VisitStatus::Unvisited) | Some(VisitStatus::NeedsReprocessing) | None => {}
                }

                let parsed = match Url::parse(&url) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        warn!("Ledger URL {} does not parse, skipping: {}", url, e);
                        ledger.mark(&url, VisitStatus::Skipped);
                        continue;
                    }
                };

                if !self.gate.permits(&parsed).await {
                    info!("Disallowed by robots.txt: {}", url);
                    policy_denied.insert(url);
                    continue;
                }

                let strategy = self.selector.select(frontier.len() + 1, false);
                let fetcher = match self.fetcher_for(strategy).await {
                    Ok(fetcher) => fetcher,
                    Err(e) => {
                        error!("Cannot fetch {} with {}: {}", url, strategy, e);
                        fatal = Some(e);
                        break;
                    }
                };

                debug!("Dispatching {} ({})", url, strategy);
                dispatched += 1;
                let context = Arc::clone(&context);
                jobs.spawn(async move {
                    let outcome = process_url(&context, fetcher, &parsed, strategy).await;
                    (url, outcome)
                });
            }

            if self.phase == RunPhase::Running
                && (fatal.is_some() || self.is_stopped() || dispatched >= max_pages)
            {
                self.phase = RunPhase::Draining;
                info!("Draining {} in-flight jobs", jobs.len());
            }

            if jobs.is_empty() {
                break;
            }

            tokio::select! {
                joined = jobs.join_next() => {
                    let Some(joined) = joined else {
                        continue;
                    };
                    completed += 1;

                    match joined {
                        Ok((url, outcome)) => match outcome {
                            JobOutcome::Visited { artifact_path, links } => {
                                let today = Local::now().format("%Y-%m-%d").to_string();
                                ledger.mark_visited(&url, &artifact_path, &today);
                                visited_this_run += 1;
                                self.enqueue_links(&links, &mut ledger, &mut frontier);
                            }
                            JobOutcome::NeedsReprocessing(reason) => {
                                warn!("Will reprocess {}: {}", url, reason);
                                ledger.mark(&url, VisitStatus::NeedsReprocessing);
                            }
                            JobOutcome::Skipped(reason) => {
                                warn!("Skipping {}: {}", url, reason);
                                ledger.mark(&url, VisitStatus::Skipped);
                            }
                            JobOutcome::Fatal(reason) => {
                                error!("Fatal error while fetching {}: {}", url, reason);
                                if fatal.is_none() {
                                    fatal = Some(CrawlError::RenderingUnavailable(reason));
                                }
                            }
                        },
                        Err(e) => error!("Crawl job failed: {}", e),
                    }

                    if completed % FLUSH_INTERVAL == 0 {
                        ledger.flush(&self.ledger_path)?;
                        let rate = completed as f64 / started.elapsed().as_secs_f64().max(0.001);
                        info!(
                            "Progress: {} pages processed, {} in frontier, {:.2} pages/sec",
                            completed,
                            frontier.len(),
                            rate
                        );
                    }
                }
                changed = stop_rx.changed(), if !stop_seen => {
                    stop_seen = true;
                    if changed.is_ok() && *stop_rx.borrow() {
                        info!("Stop requested, no new pages will be dispatched");
                    }
                }
            }
        }

        ledger.flush(&self.ledger_path)?;
        if let Some(browser) = self.browser.take() {
            browser.shutdown().await;
        }

        if let Some(e) = fatal {
            self.phase = RunPhase::Terminated;
            return Err(e);
        }

        let engine = self.selector.engine();
        let context = ProjectContext::from_config(&self.config, Some(engine))?
            .with_crawl_delay(self.gate.delay_for(&origin_of(&self.base_url)).as_secs_f64());
        aggregate(&ledger, &self.project_dir, &context)?;

        self.phase = RunPhase::Terminated;

        let summary = RunSummary {
            visited_this_run,
            visited_total: ledger.count(VisitStatus::Visited),
            skipped: ledger.count(VisitStatus::Skipped),
            pending_reprocess: ledger.count(VisitStatus::NeedsReprocessing),
            unvisited: ledger.count(VisitStatus::Unvisited),
            policy_denied: policy_denied.len(),
            engine,
        };

        info!(
            "Crawl finished: {} pages visited in {:?}",
            visited_this_run,
            started.elapsed()
        );

        Ok(summary)
    }

    /// Loads and repairs the ledger, then adds the run's seed URLs
    async fn seed(&mut self) -> Result<Ledger, CrawlError> {
        std::fs::create_dir_all(&self.project_dir)?;

        let mut ledger = Ledger::load(&self.ledger_path)?;
        if ledger.corrupt_rows() > 0 {
            warn!("Skipped {} corrupt ledger rows", ledger.corrupt_rows());
        }

        let report = ledger.reconcile(&self.project_dir);
        debug!("{} visited URLs verified on disk", report.verified);

        if self.reset_skipped {
            let reset = ledger.reset_skipped();
            info!("Reset {} skipped URLs", reset);
        }

        if ledger.is_empty() {
            ledger.discover(self.base_url.as_str());
        }

        let depth = ledger.pending().count();
        if self.selector.would_render(depth) {
            if let Err(e) = self.fetcher_for(FetchStrategy::BrowserRendered).await {
                ledger.flush(&self.ledger_path)?;
                self.phase = RunPhase::Terminated;
                return Err(e);
            }
        }

        if self.config.crawler.use_sitemap {
            self.gate.await_slot(&origin_of(&self.base_url)).await;
            let listed = fetch_sitemap_urls(
                self.http.as_ref(),
                &self.base_url,
                self.config.crawler.request_timeout(),
            )
            .await;

            let mut added = 0;
            for loc in listed {
                match normalize_url(&loc) {
                    Ok(url) if self.scope.contains(&url) => {
                        if ledger.discover(url.as_str()) {
                            added += 1;
                        }
                    }
                    Ok(url) => debug!("Sitemap entry outside the site: {}", url),
                    Err(e) => debug!("Ignoring sitemap entry {}: {}", loc, e),
                }
            }
            if added > 0 {
                info!("Added {} URLs from sitemap.xml", added);
            }
        }

        Ok(ledger)
    }

    /// Records newly discovered in-site links and queues them
    ///
    /// Links already in the ledger, whatever their status, are not queued.
    fn enqueue_links(&self, links: &[Url], ledger: &mut Ledger, frontier: &mut Frontier) {
        for link in links {
            if !self.scope.contains(link) {
                continue;
            }
            let normalized = match normalize_url(link.as_str()) {
                Ok(url) => url,
                Err(e) => {
                    debug!("Failed to normalize link {}: {}", link, e);
                    continue;
                }
            };

            let key = normalized.as_str();
            if ledger.discover(key) {
                frontier.push(key);
            }
        }
    }

    /// Returns the fetcher for a strategy, launching the browser on first use
    async fn fetcher_for(&mut self, strategy: FetchStrategy) -> Result<Arc<dyn PageFetcher>, CrawlError> {
        match strategy {
            FetchStrategy::Http => Ok(Arc::clone(&self.http)),
            FetchStrategy::BrowserRendered => {
                if let Some(renderer) = &self.renderer {
                    return Ok(Arc::clone(renderer));
                }

                let browser = Arc::new(BrowserRenderer::launch(&self.config.renderer).await?);
                let renderer: Arc<dyn PageFetcher> = browser.clone();
                self.browser = Some(browser);
                self.renderer = Some(Arc::clone(&renderer));
                Ok(renderer)
            }
        }
    }
}

/// Fetches, extracts and writes one page
///
/// Transient fetch failures are retried with backoff, each attempt waiting
/// for its politeness slot. Extraction failures are retried on the body
/// already fetched. Both share the same attempt budget.
async fn process_url(
    context: &WorkerContext,
    fetcher: Arc<dyn PageFetcher>,
    url: &Url,
    strategy: FetchStrategy,
) -> JobOutcome {
    let origin = origin_of(url);
    let mut cached: Option<FetchedPage> = None;
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        let page = match cached.take() {
            Some(page) => page,
            None => {
                context.gate.await_slot(&origin).await;
                match fetcher.fetch(url, context.timeout).await {
                    Ok(page) => page,
                    Err(FetchError::Transient(reason)) => {
                        if context.retry.can_retry(attempt) {
                            let backoff = context.retry.backoff(attempt);
                            debug!(
                                "Attempt {} for {} failed ({}), retrying in {:?}",
                                attempt, url, reason, backoff
                            );
                            tokio::time::sleep(backoff).await;
                            continue;
                        }
                        return JobOutcome::NeedsReprocessing(format!(
                            "{} (after {} attempts)",
                            reason, attempt
                        ));
                    }
                    Err(FetchError::Permanent { reason, .. }) => {
                        return JobOutcome::Skipped(reason);
                    }
                    Err(FetchError::RenderingUnavailable(reason)) => {
                        return JobOutcome::Fatal(reason);
                    }
                }
            }
        };

        let extracted: ExtractedPage = match extract_page(&page.body, &page.final_url, &context.scope) {
            Ok(extracted) => extracted,
            Err(e) => {
                if context.retry.can_retry(attempt) {
                    debug!("Extraction of {} failed ({}), retrying", url, e);
                    cached = Some(page);
                    continue;
                }
                return JobOutcome::NeedsReprocessing(format!("extraction failed: {}", e));
            }
        };

        return match context
            .writer
            .write_artifact(url, &page.body, &extracted, strategy)
        {
            Ok(artifact_path) => JobOutcome::Visited {
                artifact_path,
                links: extracted.links,
            },
            Err(e) => JobOutcome::NeedsReprocessing(format!("writing artifact failed: {}", e)),
        };
    }
}
