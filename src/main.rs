//! Tribeca Insights main entry point
//!
//! This is the command-line interface for the Tribeca Insights site crawler.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tribeca_insights::config::{load_config_with_hash, validate, Config};
use tribeca_insights::crawler::CrawlDriver;
use tribeca_insights::ledger::{ledger_file_name, Ledger};
use tribeca_insights::output::{load_statistics, print_statistics};
use tribeca_insights::project::{aggregate, ProjectContext};
use tracing_subscriber::EnvFilter;

/// Tribeca Insights: a resumable single-site crawler
///
/// Crawls one site politely, writes a Markdown and JSON record per page, and
/// keeps a CSV ledger so that repeated runs pick up where the last one ended.
#[derive(Parser, Debug)]
#[command(name = "tribeca-insights")]
#[command(version)]
#[command(about = "A resumable single-site crawler", long_about = None)]
struct Cli {
    /// Starting URL of the site to crawl
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Project slug (defaults to one derived from the domain)
    #[arg(long)]
    slug: Option<String>,

    /// Maximum number of pages to fetch in this run
    #[arg(long)]
    max_pages: Option<usize>,

    /// Content language (en, pt-br, es, ...)
    #[arg(long)]
    language: Option<String>,

    /// Render every page in a headless browser
    #[arg(long)]
    render: bool,

    /// Queue depth above which pages are browser-rendered
    #[arg(long)]
    render_threshold: Option<usize>,

    /// Maximum number of concurrent fetches
    #[arg(long)]
    max_workers: Option<usize>,

    /// Delay between requests in seconds; overrides robots.txt
    #[arg(long, value_name = "SECONDS")]
    delay: Option<f64>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Directory that holds project folders
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Path to TOML configuration file
    #[arg(long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Give previously skipped URLs another chance
    #[arg(long)]
    reset_skipped: bool,

    /// Do not seed the crawl from /sitemap.xml
    #[arg(long)]
    no_sitemap: bool,

    /// Show ledger statistics and exit
    #[arg(long, conflicts_with = "export_summary")]
    stats: bool,

    /// Rebuild the project summary files from existing data and exit
    #[arg(long, conflicts_with = "stats")]
    export_summary: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    /// Applies command-line overrides on top of the file configuration
    fn apply(&self, config: &mut Config) {
        if let Some(base_url) = &self.base_url {
            config.site.base_url = base_url.clone();
        }
        if let Some(slug) = &self.slug {
            config.site.slug = Some(slug.clone());
        }
        if let Some(language) = &self.language {
            config.site.language = language.to_lowercase();
        }
        if let Some(max_pages) = self.max_pages {
            config.crawler.max_pages = max_pages;
        }
        if let Some(max_workers) = self.max_workers {
            config.crawler.max_workers = max_workers;
        }
        if let Some(threshold) = self.render_threshold {
            config.crawler.render_threshold = threshold;
        }
        if let Some(delay) = self.delay {
            config.crawler.crawl_delay_secs = Some(delay);
        }
        if let Some(timeout) = self.timeout {
            config.crawler.request_timeout_secs = timeout;
        }
        if let Some(dir) = &self.output_dir {
            config.output.projects_dir = dir.clone();
        }
        if self.render {
            config.crawler.force_render = true;
        }
        if self.no_sitemap {
            config.crawler.use_sitemap = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };
    cli.apply(&mut config);
    validate(&config).context("Invalid configuration")?;

    if cli.stats {
        handle_stats(&config)
    } else if cli.export_summary {
        handle_export_summary(&config)
    } else {
        handle_crawl(config, cli.reset_skipped).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("tribeca_insights=info,warn"),
            1 => EnvFilter::new("tribeca_insights=debug,info"),
            2 => EnvFilter::new("tribeca_insights=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --stats mode: shows statistics from the ledger
fn handle_stats(config: &Config) -> Result<()> {
    let ledger_path = config
        .project_dir()?
        .join(ledger_file_name(&config.project_slug()?));
    println!("Ledger: {}\n", ledger_path.display());

    let ledger = Ledger::load(&ledger_path)
        .with_context(|| format!("Failed to read {}", ledger_path.display()))?;
    print_statistics(&load_statistics(&ledger));

    Ok(())
}

/// Handles the --export-summary mode: rebuilds the project files without crawling
fn handle_export_summary(config: &Config) -> Result<()> {
    let project_dir = config.project_dir()?;
    let ledger_path = project_dir.join(ledger_file_name(&config.project_slug()?));

    println!("=== Exporting Project Summary ===\n");
    println!("Ledger: {}", ledger_path.display());
    println!("Output: {}", project_dir.display());
    println!();

    let mut ledger = Ledger::load(&ledger_path)
        .with_context(|| format!("Failed to read {}", ledger_path.display()))?;

    // Only pages whose artifacts still exist are exported
    let report = ledger.reconcile(&project_dir);
    if report.demoted > 0 {
        tracing::warn!(
            "{} visited URLs have no artifact and were left out",
            report.demoted
        );
    }

    let context = ProjectContext::from_config(config, None)?;
    let state = aggregate(&ledger, &project_dir, &context)?;

    println!(
        "✓ Exported {} pages to: {}",
        state.pages_count,
        project_dir.display()
    );

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, reset_skipped: bool) -> Result<()> {
    tracing::info!(
        "Crawling {} (max pages: {}, workers: {})",
        config.site.base_url,
        config.crawler.max_pages,
        config.crawler.max_workers
    );

    let mut driver = CrawlDriver::new(config)?.with_reset_skipped(reset_skipped);

    // First Ctrl+C stops gracefully, a second one exits immediately
    let stop = driver.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl+C, finishing in-flight pages...");
            eprintln!("Press Ctrl+C again to force quit");
            stop.stop();

            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nForce quit requested, exiting immediately...");
                std::process::exit(1);
            }
        }
    });

    match driver.run().await {
        Ok(summary) => {
            tracing::info!("Crawl completed successfully");
            println!("\n=== Crawl Summary ===\n");
            println!("{}", summary);
            println!("\nProject: {}", driver.project_dir().display());
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
