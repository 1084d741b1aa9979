//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use spider_scraper::config::{Config, DomainScope, RateLimitConfig};
use spider_scraper::output::{load_sitemap_entries, load_statistics, MemorySink, SqliteSink};
use spider_scraper::storage::{RunStatus, SqliteStorage, Storage};
use spider_scraper::{Coordinator, CrawlState, FailureKind, PageStatus, SkipReason};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a fast test configuration seeded at the mock server's root
fn create_test_config(server: &MockServer) -> Config {
    let mut config = Config::with_seed(&format!("{}/", server.uri()));
    config.crawl.concurrency = 2;
    config.crawl.abort_grace_ms = 100;
    config.fetch.timeout_ms = 5000;
    config.fetch.max_attempts = 1;
    config.fetch.backoff_base_ms = 1;
    config.fetch.backoff_jitter = false;
    config.robots.timeout_ms = 1000;
    config.rate_limit = RateLimitConfig {
        min_delay_ms: 0,
        max_delay_ms: 0,
    };
    config
}

/// Builds an HTML page with the given title and links
fn html_page(title: &str, links: &[&str]) -> ResponseTemplate {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{}">{}</a>"#, href, href))
        .collect();
    let body = format!(
        "<html><head><title>{}</title></head><body>{}</body></html>",
        title, anchors
    );
    ResponseTemplate::new(200).set_body_raw(body, "text/html")
}

async fn mount_page(server: &MockServer, route: &str, title: &str, links: &[&str]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html_page(title, links))
        .expect(1)
        .mount(server)
        .await;
}

fn page_paths(sink: &MemorySink) -> Vec<String> {
    let mut paths: Vec<String> = sink
        .pages()
        .iter()
        .map(|page| page.url().path().to_string())
        .collect();
    paths.sort();
    paths
}

#[tokio::test]
async fn test_full_crawl_visits_each_url_once() {
    let server = MockServer::start().await;

    mount_page(&server, "/", "Home", &["/a", "/b"]).await;
    mount_page(&server, "/a", "Page A", &["/b", "/", "/c#section"]).await;
    mount_page(&server, "/b", "Page B", &["/a", "/b/", "/?utm_source=x"]).await;
    mount_page(&server, "/c", "Page C", &[]).await;

    let coordinator = Coordinator::new(create_test_config(&server)).unwrap();
    let sink = Arc::new(MemorySink::new());

    let state = coordinator.run(sink.clone()).await.unwrap();

    assert_eq!(state, CrawlState::Completed);
    assert_eq!(page_paths(&sink), vec!["/", "/a", "/b", "/c"]);
    assert!(sink.failures().is_empty());
    assert_eq!(sink.completed_count(), 1);
    assert_eq!(sink.aborted_count(), 0);

    let frontier = coordinator.frontier();
    assert_eq!(frontier.visited_count(), 4);
    assert_eq!(frontier.pending(), 0);
    assert_eq!(frontier.in_flight(), 0);

    let home = sink
        .pages()
        .into_iter()
        .find(|page| page.url().path() == "/")
        .unwrap();
    assert_eq!(home.depth(), 0);
    assert_eq!(home.status, 200);
    assert_eq!(home.title.as_deref(), Some("Home"));
    assert_eq!(home.links.len(), 2);

    let c = sink
        .pages()
        .into_iter()
        .find(|page| page.url().path() == "/c")
        .unwrap();
    assert_eq!(c.depth(), 2);
    assert_eq!(c.record.parent.as_ref().map(|p| p.path()), Some("/a"));
}

#[tokio::test]
async fn test_crawl_with_depth_limit() {
    let server = MockServer::start().await;

    mount_page(&server, "/", "Home", &["/level1"]).await;
    mount_page(&server, "/level1", "Level 1", &["/level2"]).await;

    // Depth 2 is beyond max_depth = 1 and must never be requested
    Mock::given(method("GET"))
        .and(path("/level2"))
        .respond_with(html_page("Level 2", &[]))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = create_test_config(&server);
    config.crawl.max_depth = 1;

    let coordinator = Coordinator::new(config).unwrap();
    let sink = Arc::new(MemorySink::new());
    let state = coordinator.run(sink.clone()).await.unwrap();

    assert_eq!(state, CrawlState::Completed);
    assert_eq!(page_paths(&sink), vec!["/", "/level1"]);
    assert!(sink.pages().iter().all(|page| page.depth() <= 1));
}

#[tokio::test]
async fn test_page_budget_limits_admissions() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page("Home", &["/p1", "/p2", "/p3", "/p4"]))
        .mount(&server)
        .await;
    for route in ["/p1", "/p2", "/p3", "/p4"] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(html_page(route, &[]))
            .mount(&server)
            .await;
    }

    let mut config = create_test_config(&server);
    config.crawl.max_pages = Some(3);

    let coordinator = Coordinator::new(config).unwrap();
    let sink = Arc::new(MemorySink::new());
    coordinator.run(sink.clone()).await.unwrap();

    // Links are admitted in discovery order, so the seed plus /p1 and /p2
    assert_eq!(page_paths(&sink), vec!["/", "/p1", "/p2"]);
    assert_eq!(coordinator.frontier().visited_count(), 3);
}

#[tokio::test]
async fn test_retries_exhausted_on_server_error() {
    let server = MockServer::start().await;

    mount_page(&server, "/", "Home", &["/flaky"]).await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let mut config = create_test_config(&server);
    config.fetch.max_attempts = 3;

    let coordinator = Coordinator::new(config).unwrap();
    let sink = Arc::new(MemorySink::new());
    let state = coordinator.run(sink.clone()).await.unwrap();

    assert_eq!(state, CrawlState::Completed);
    assert_eq!(page_paths(&sink), vec!["/"]);

    let failures = sink.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].url().path(), "/flaky");
    assert_eq!(failures[0].kind, FailureKind::HttpError { status: 503 });
    assert_eq!(failures[0].attempts, 3);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;

    mount_page(&server, "/", "Home", &["/missing"]).await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = create_test_config(&server);
    config.fetch.max_attempts = 3;

    let coordinator = Coordinator::new(config).unwrap();
    let sink = Arc::new(MemorySink::new());
    coordinator.run(sink.clone()).await.unwrap();

    let failures = sink.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, FailureKind::HttpError { status: 404 });
    assert_eq!(failures[0].attempts, 1);
}

#[tokio::test]
async fn test_robots_txt_respect() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private"),
        )
        .expect(1)
        .mount(&server)
        .await;

    mount_page(&server, "/", "Home", &["/public", "/private/secret"]).await;
    mount_page(&server, "/public", "Public", &[]).await;

    Mock::given(method("GET"))
        .and(path("/private/secret"))
        .respond_with(html_page("Secret", &[]))
        .expect(0)
        .mount(&server)
        .await;

    let coordinator = Coordinator::new(create_test_config(&server)).unwrap();
    let sink = Arc::new(MemorySink::new());
    let state = coordinator.run(sink.clone()).await.unwrap();

    assert_eq!(state, CrawlState::Completed);
    assert_eq!(page_paths(&sink), vec!["/", "/public"]);

    let skipped = sink.skipped();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].0.url.path(), "/private/secret");
    assert_eq!(skipped[0].1, SkipReason::RobotsDisallowed);
}

#[tokio::test]
async fn test_robots_txt_ignored_when_disabled() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /"))
        .expect(0)
        .mount(&server)
        .await;

    mount_page(&server, "/", "Home", &["/private"]).await;
    mount_page(&server, "/private", "Private", &[]).await;

    let mut config = create_test_config(&server);
    config.robots.respect = false;

    let coordinator = Coordinator::new(config).unwrap();
    let sink = Arc::new(MemorySink::new());
    coordinator.run(sink.clone()).await.unwrap();

    assert_eq!(page_paths(&sink), vec!["/", "/private"]);
    assert!(sink.skipped().is_empty());
}

#[tokio::test]
async fn test_content_type_handling() {
    let server = MockServer::start().await;

    mount_page(&server, "/", "Home", &["/data.json"]).await;

    Mock::given(method("GET"))
        .and(path("/data.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"{"href": "<a href='/hidden'>x</a>"}"#, "application/json"),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/hidden"))
        .respond_with(html_page("Hidden", &[]))
        .expect(0)
        .mount(&server)
        .await;

    let coordinator = Coordinator::new(create_test_config(&server)).unwrap();
    let sink = Arc::new(MemorySink::new());
    coordinator.run(sink.clone()).await.unwrap();

    let json = sink
        .pages()
        .into_iter()
        .find(|page| page.url().path() == "/data.json")
        .unwrap();
    assert_eq!(json.content_type.as_deref(), Some("application/json"));
    assert!(json.links.is_empty());
    assert!(json.title.is_none());
    assert!(!json.body.is_empty());
}

#[tokio::test]
async fn test_domain_scope_applied_to_links() {
    let server = MockServer::start().await;

    let links = [
        "/local",
        "http://example.test/root",
        "http://blog.example.test/post",
        "http://other.test/page",
    ];
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page("Home", &links))
        .mount(&server)
        .await;

    let hosts = |sink: &MemorySink| -> Vec<String> {
        let mut hosts: Vec<String> = sink.pages()[0]
            .links
            .iter()
            .filter_map(|link| link.host_str().map(str::to_string))
            .collect();
        hosts.sort();
        hosts
    };

    // Depth 0 keeps the crawl on the seed; the reported links still pass the filter
    let mut config = create_test_config(&server);
    config.crawl.max_depth = 0;
    let coordinator = Coordinator::new(config).unwrap();
    let sink = Arc::new(MemorySink::new());
    coordinator.run(sink.clone()).await.unwrap();
    assert_eq!(hosts(&sink), vec!["127.0.0.1"]);

    let mut config = create_test_config(&server);
    config.crawl.max_depth = 0;
    config.filters.domain = DomainScope::Subdomains {
        host: Some("example.test".to_string()),
    };
    let coordinator = Coordinator::new(config).unwrap();
    let sink = Arc::new(MemorySink::new());
    coordinator.run(sink.clone()).await.unwrap();
    assert_eq!(hosts(&sink), vec!["blog.example.test", "example.test"]);

    let mut config = create_test_config(&server);
    config.crawl.max_depth = 0;
    config.filters.domain = DomainScope::ExactHost {
        host: Some("example.test".to_string()),
    };
    let coordinator = Coordinator::new(config).unwrap();
    let sink = Arc::new(MemorySink::new());
    coordinator.run(sink.clone()).await.unwrap();
    assert_eq!(hosts(&sink), vec!["example.test"]);
}

#[tokio::test]
async fn test_abort_during_slow_responses() {
    let server = MockServer::start().await;

    let slow = ["/slow1", "/slow2", "/slow3", "/slow4", "/slow5"];
    mount_page(&server, "/", "Home", &slow).await;
    for route in slow {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(html_page(route, &[]).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;
    }

    let mut config = create_test_config(&server);
    config.fetch.timeout_ms = 30_000;

    let coordinator = Arc::new(Coordinator::new(config).unwrap());
    let handle = coordinator.handle();
    let sink = Arc::new(MemorySink::new());

    let task = {
        let coordinator = coordinator.clone();
        let sink = sink.clone();
        tokio::spawn(async move { coordinator.run(sink).await })
    };

    // Wait until the seed is done and the slow pages are in flight
    for _ in 0..100 {
        if !sink.pages().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(handle.state(), CrawlState::Running);

    handle.abort().unwrap();
    let requests_at_abort = server.received_requests().await.unwrap().len();

    let state = tokio::time::timeout(Duration::from_secs(3), task)
        .await
        .expect("crawl did not stop within the grace period")
        .unwrap()
        .unwrap();

    assert_eq!(state, CrawlState::Aborted);
    assert_eq!(sink.aborted_count(), 1);
    assert_eq!(sink.completed_count(), 0);
    assert_eq!(page_paths(&sink), vec!["/"]);

    let frontier = coordinator.frontier();
    assert!(frontier.is_closed());
    assert_eq!(frontier.in_flight(), 0);
    assert!(frontier.pending() < slow.len());

    // Nothing is dispatched after the abort, even once the grace period is over
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(
        server.received_requests().await.unwrap().len(),
        requests_at_abort
    );

    // A second abort is an invalid transition
    assert!(handle.abort().is_err());
}

#[tokio::test]
async fn test_pause_and_resume() {
    let server = MockServer::start().await;

    mount_page(&server, "/", "Home", &["/next"]).await;
    mount_page(&server, "/next", "Next", &[]).await;

    let mut config = create_test_config(&server);
    config.rate_limit = RateLimitConfig {
        min_delay_ms: 200,
        max_delay_ms: 200,
    };
    config.crawl.concurrency = 1;

    let coordinator = Arc::new(Coordinator::new(config).unwrap());
    let handle = coordinator.handle();
    let sink = Arc::new(MemorySink::new());

    let task = {
        let coordinator = coordinator.clone();
        let sink = sink.clone();
        tokio::spawn(async move { coordinator.run(sink).await })
    };

    for _ in 0..50 {
        if handle.state() == CrawlState::Running {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    handle.pause().unwrap();
    assert_eq!(handle.state(), CrawlState::Paused);

    // Nothing completes while paused
    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(sink.completed_count(), 0);
    assert!(!task.is_finished());

    handle.resume().unwrap();
    let state = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("crawl did not finish after resume")
        .unwrap()
        .unwrap();

    assert_eq!(state, CrawlState::Completed);
    assert_eq!(page_paths(&sink), vec!["/", "/next"]);
    assert_eq!(sink.completed_count(), 1);
}

#[tokio::test]
async fn test_crawl_recorded_to_sqlite() {
    let server = MockServer::start().await;

    mount_page(&server, "/", "Home", &["/docs/intro", "/gone"]).await;
    mount_page(&server, "/docs/intro", "Intro", &["/"]).await;

    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(410))
        .expect(1)
        .mount(&server)
        .await;

    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("crawl.db");

    let mut config = create_test_config(&server);
    config.output.database_path = db_path.to_string_lossy().to_string();

    let coordinator = Coordinator::new(config).unwrap();

    let mut storage = SqliteStorage::new(&db_path).unwrap();
    let run_id = storage
        .create_run("test-hash", coordinator.seed().as_str())
        .unwrap();
    let storage: Arc<Mutex<dyn Storage>> = Arc::new(Mutex::new(storage));
    let sink = Arc::new(SqliteSink::new(storage, run_id));

    let state = coordinator.run(sink.clone()).await.unwrap();
    assert_eq!(state, CrawlState::Completed);
    assert_eq!(sink.write_errors(), 0);

    // Read back through a fresh connection
    let storage = SqliteStorage::new(&db_path).unwrap();
    let stats = load_statistics(&storage).unwrap();

    assert_eq!(stats.run.id, run_id);
    assert_eq!(stats.run.status, RunStatus::Completed);
    assert!(stats.run.finished_at.is_some());
    assert_eq!(stats.total_pages, 3);
    assert_eq!(stats.count(PageStatus::Fetched), 2);
    assert_eq!(stats.count(PageStatus::HttpError), 1);
    assert_eq!(stats.http_errors.get(&410), Some(&1));
    assert_eq!(stats.max_depth, Some(1));
    assert!(stats.total_links >= 3);

    let gone_url = format!("{}/gone", server.uri());
    let gone = storage.get_page_by_url(run_id, &gone_url).unwrap().unwrap();
    assert_eq!(gone.status, PageStatus::HttpError);
    assert_eq!(gone.http_status, Some(410));
    assert!(gone.error_message.is_some());

    let mut entries = load_sitemap_entries(&storage).unwrap();
    entries.sort_by(|a, b| a.url.cmp(&b.url));
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].title, "Intro");
    assert_eq!(entries[1].category, "docs");
}
