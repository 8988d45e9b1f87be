//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and drive the full
//! crawl cycle end-to-end against a scratch project directory.

use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::TempDir;
use tribeca_insights::config::{Config, CrawlerConfig, OutputConfig, RendererConfig, SiteConfig};
use tribeca_insights::crawler::{CrawlDriver, FetchStrategy, Frontier};
use tribeca_insights::ledger::Ledger;
use tribeca_insights::project::ProjectState;
use tribeca_insights::{CrawlError, VisitStatus};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SLUG: &str = "test-site";

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, projects_dir: &Path) -> Config {
    Config {
        site: SiteConfig {
            base_url: format!("{}/", base_url),
            slug: Some(SLUG.to_string()),
            language: "en".to_string(),
        },
        crawler: CrawlerConfig {
            max_pages: 50,
            max_workers: 4,
            min_crawl_delay_ms: 0,
            retry_backoff_ms: 1,
            render_threshold: 1000,
            use_sitemap: false,
            ..CrawlerConfig::default()
        },
        output: OutputConfig {
            projects_dir: projects_dir.to_path_buf(),
        },
        ..Config::default()
    }
}

fn project_dir(root: &Path) -> PathBuf {
    root.join(SLUG)
}

fn load_ledger(root: &Path) -> Ledger {
    Ledger::load(&project_dir(root).join(format!("visited_urls_{}.csv", SLUG))).unwrap()
}

async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body.to_string())
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

async fn mount_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Number of GET requests the server has received for a path
async fn requests_for(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == route)
        .count()
}

async fn run(config: Config) -> Result<tribeca_insights::RunSummary, CrawlError> {
    CrawlDriver::new(config)?.run().await
}

/// A small site: home links to two pages and one external site
async fn mount_small_site(server: &MockServer) {
    mount_page(
        server,
        "/",
        r#"<html><head><title>Home</title>
        <meta name="description" content="The home page"></head><body>
        <h1>Welcome</h1>
        <a href="/page1">Page 1</a>
        <a href="/page2#top">Page 2</a>
        <a href="https://external.example.org/ref">Elsewhere</a>
        </body></html>"#,
    )
    .await;
    mount_page(
        server,
        "/page1",
        r#"<html><head><title>Page One</title></head><body>
        <p>Gardening tools for gardening people</p><a href="/">Home</a>
        </body></html>"#,
    )
    .await;
    mount_page(
        server,
        "/page2",
        r#"<html><head><title>Page Two</title></head><body>
        <p>Second page</p><a href="/page1">Page 1</a>
        </body></html>"#,
    )
    .await;
}

#[tokio::test]
async fn test_full_crawl_single_site() {
    let server = MockServer::start().await;
    mount_small_site(&server).await;
    let dir = TempDir::new().unwrap();

    let summary = run(create_test_config(&server.uri(), dir.path()))
        .await
        .unwrap();

    assert_eq!(summary.visited_this_run, 3);
    assert_eq!(summary.visited_total, 3);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.engine, FetchStrategy::Http);

    let project = project_dir(dir.path());
    for file in ["pages_md/home.md", "pages_md/page1.md", "pages_md/page2.md"] {
        assert!(project.join(file).is_file(), "missing {}", file);
    }

    let state: ProjectState = serde_json::from_str(
        &std::fs::read_to_string(project.join(format!("project_{}.json", SLUG))).unwrap(),
    )
    .unwrap();
    assert_eq!(state.pages_count, 3);
    assert_eq!(state.project_slug, SLUG);

    let index = std::fs::read_to_string(project.join("index.md")).unwrap();
    assert!(index.starts_with("# Analyzed Pages Index"));
    assert!(index.contains("[Page One](pages_md/page1.md)"));

    let external = std::fs::read_to_string(project.join("external_urls.json")).unwrap();
    assert!(external.contains("https://external.example.org/ref"));

    // Each page fetched once despite being linked several times
    assert_eq!(requests_for(&server, "/page1").await, 1);
}

#[tokio::test]
async fn test_second_run_fetches_nothing() {
    let server = MockServer::start().await;
    mount_small_site(&server).await;
    let dir = TempDir::new().unwrap();

    run(create_test_config(&server.uri(), dir.path()))
        .await
        .unwrap();
    let before = load_ledger(dir.path());

    let summary = run(create_test_config(&server.uri(), dir.path()))
        .await
        .unwrap();
    let after = load_ledger(dir.path());

    assert_eq!(summary.visited_this_run, 0);
    assert_eq!(summary.visited_total, 3);
    assert_eq!(requests_for(&server, "/").await, 1);
    assert_eq!(
        before.iter().cloned().collect::<Vec<_>>(),
        after.iter().cloned().collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_missing_artifact_is_refetched() {
    let server = MockServer::start().await;
    mount_small_site(&server).await;
    let dir = TempDir::new().unwrap();

    run(create_test_config(&server.uri(), dir.path()))
        .await
        .unwrap();
    std::fs::remove_file(project_dir(dir.path()).join("pages_md/page1.md")).unwrap();

    let summary = run(create_test_config(&server.uri(), dir.path()))
        .await
        .unwrap();

    assert_eq!(summary.visited_this_run, 1);
    assert_eq!(requests_for(&server, "/page1").await, 2);
    assert_eq!(requests_for(&server, "/page2").await, 1);
    assert!(project_dir(dir.path()).join("pages_md/page1.md").is_file());
}

#[tokio::test]
async fn test_robots_disallowed_url_is_never_fetched() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/robots.txt",
        "User-agent: *\nDisallow: /private\n",
    )
    .await;
    mount_page(
        &server,
        "/",
        r#"<a href="/private/data">Secret</a><a href="/public">Public</a>"#,
    )
    .await;
    mount_page(&server, "/public", "<p>public page</p>").await;
    mount_page(&server, "/private/data", "<p>secret</p>").await;
    let dir = TempDir::new().unwrap();

    let summary = run(create_test_config(&server.uri(), dir.path()))
        .await
        .unwrap();

    assert_eq!(summary.visited_total, 2);
    assert_eq!(summary.policy_denied, 1);
    assert_eq!(requests_for(&server, "/private/data").await, 0);

    let ledger = load_ledger(dir.path());
    let private = format!("{}/private/data", server.uri());
    assert_eq!(ledger.get(&private).unwrap().status, VisitStatus::Unvisited);
}

#[tokio::test]
async fn test_crawl_delay_spaces_requests() {
    let server = MockServer::start().await;
    mount_page(&server, "/robots.txt", "User-agent: *\nCrawl-delay: 2\n").await;
    mount_page(&server, "/", r#"<a href="/next">next</a>"#).await;
    mount_page(&server, "/next", "<p>next</p>").await;
    let dir = TempDir::new().unwrap();

    let started = Instant::now();
    let summary = run(create_test_config(&server.uri(), dir.path()))
        .await
        .unwrap();

    assert_eq!(summary.visited_total, 2);
    assert!(started.elapsed().as_secs_f64() >= 2.0);
}

#[tokio::test]
async fn test_max_pages_budget_then_resume() {
    let server = MockServer::start().await;
    let links: String = (1..=9)
        .map(|i| format!(r#"<a href="/p{}">p{}</a>"#, i, i))
        .collect();
    mount_page(&server, "/", &links).await;
    for i in 1..=9 {
        mount_page(&server, &format!("/p{}", i), &format!("<p>page {}</p>", i)).await;
    }
    let dir = TempDir::new().unwrap();

    let mut config = create_test_config(&server.uri(), dir.path());
    config.crawler.max_pages = 5;
    config.crawler.max_workers = 1;

    let summary = run(config.clone()).await.unwrap();
    assert_eq!(summary.visited_this_run, 5);
    assert_eq!(summary.unvisited, 5);

    let summary = run(config).await.unwrap();
    assert_eq!(summary.visited_this_run, 5);
    assert_eq!(summary.visited_total, 10);
    assert_eq!(summary.unvisited, 0);
}

#[tokio::test]
async fn test_transient_failures_exhaust_retries() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/flaky">flaky</a>"#).await;
    mount_status(&server, "/flaky", 503).await;
    let dir = TempDir::new().unwrap();

    let summary = run(create_test_config(&server.uri(), dir.path()))
        .await
        .unwrap();

    assert_eq!(summary.pending_reprocess, 1);
    assert_eq!(requests_for(&server, "/flaky").await, 3);

    let ledger = load_ledger(dir.path());
    let flaky = format!("{}/flaky", server.uri());
    let record = ledger.get(&flaky).unwrap();
    assert_eq!(record.status, VisitStatus::NeedsReprocessing);
    assert!(record.artifact_path.is_none());

    let mut frontier = Frontier::from_ledger(&ledger);
    assert_eq!(frontier.pop(), Some(flaky));
}

#[tokio::test]
async fn test_not_found_is_skipped_until_reset() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/gone">gone</a>"#).await;
    mount_status(&server, "/gone", 404).await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server.uri(), dir.path());

    let summary = run(config.clone()).await.unwrap();
    assert_eq!(summary.skipped, 1);
    assert_eq!(requests_for(&server, "/gone").await, 1);

    // Not retried on a plain second run
    run(config.clone()).await.unwrap();
    assert_eq!(requests_for(&server, "/gone").await, 1);

    let summary = CrawlDriver::new(config)
        .unwrap()
        .with_reset_skipped(true)
        .run()
        .await
        .unwrap();
    assert_eq!(summary.skipped, 1);
    assert_eq!(requests_for(&server, "/gone").await, 2);
}

#[tokio::test]
async fn test_rendering_unavailable_aborts_before_fetching() {
    let server = MockServer::start().await;
    mount_small_site(&server).await;
    let dir = TempDir::new().unwrap();

    let mut config = create_test_config(&server.uri(), dir.path());
    config.crawler.force_render = true;
    config.renderer = RendererConfig {
        chrome_executable: Some(PathBuf::from("/nonexistent/chromium")),
        headless: true,
    };

    let result = run(config).await;

    assert!(matches!(result, Err(CrawlError::RenderingUnavailable(_))));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
    assert!(!project_dir(dir.path())
        .join(format!("project_{}.json", SLUG))
        .exists());
}

#[tokio::test]
async fn test_sitemap_urls_are_seeded() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "<p>no links here</p>").await;
    mount_page(&server, "/orphan", "<p>only in the sitemap</p>").await;
    let sitemap = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url><loc>{uri}/</loc></url>
          <url><loc>{uri}/orphan</loc></url>
          <url><loc>https://elsewhere.example.org/page</loc></url>
        </urlset>"#,
        uri = server.uri()
    );
    mount_page(&server, "/sitemap.xml", &sitemap).await;
    let dir = TempDir::new().unwrap();

    let mut config = create_test_config(&server.uri(), dir.path());
    config.crawler.use_sitemap = true;

    let summary = run(config).await.unwrap();

    assert_eq!(summary.visited_total, 2);
    assert_eq!(requests_for(&server, "/orphan").await, 1);
    assert!(!load_ledger(dir.path()).contains("https://elsewhere.example.org/page"));
}

#[tokio::test]
async fn test_legacy_ledger_is_resumed() {
    let server = MockServer::start().await;
    mount_small_site(&server).await;
    let dir = TempDir::new().unwrap();
    let project = project_dir(dir.path());
    std::fs::create_dir_all(project.join("pages_md")).unwrap();
    std::fs::write(project.join("pages_md/home.md"), "# `home`\n").unwrap();

    let base = format!("{}/", server.uri());
    let ledger_csv = format!(
        "URL,Status,MD File,Data,Notes\n\
         {base},1,home.md,2024-01-01,keep me\n\
         {uri}/page1,0,,,\n\
         ,1,,,broken row\n",
        base = base,
        uri = server.uri()
    );
    std::fs::write(
        project.join(format!("visited_urls_{}.csv", SLUG)),
        ledger_csv,
    )
    .unwrap();

    let summary = run(create_test_config(&server.uri(), dir.path()))
        .await
        .unwrap();

    assert_eq!(requests_for(&server, "/").await, 0);
    assert_eq!(requests_for(&server, "/page1").await, 1);
    assert_eq!(summary.visited_this_run, 1);

    let ledger = load_ledger(dir.path());
    let home = ledger.get(&base).unwrap();
    assert_eq!(home.status, VisitStatus::Visited);
    assert_eq!(home.extra.get("Notes").map(String::as_str), Some("keep me"));
}
