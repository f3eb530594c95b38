mod common;

use common::{fast_scrape, murl, write_image, BrowserLog, FakeFactory, PageScript};
use lookalike_crawl::{
    CrawlError, DedupCache, Downloader, ProviderSelectors, ResultScraper, TraversalController,
};
use lookalike_http::HttpClient;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn image_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/img/.+\.jpg$"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\xFF\xD8\xFF".to_vec()))
        .mount(&server)
        .await;
    server
}

fn urls(server: &MockServer, prefix: &str, n: usize) -> Vec<Option<String>> {
    (1..=n)
        .map(|i| murl(&format!("{}/img/{prefix}-{i}.jpg", server.uri())))
        .collect()
}

fn controller(input: &Path, output: &Path, factory: Arc<FakeFactory>) -> TraversalController {
    let http = HttpClient::new()
        .expect("client builds")
        .with_backoff(Duration::from_millis(5));
    let downloader = Downloader::new(http, DedupCache::new(), 4);
    let scraper = ResultScraper::new(ProviderSelectors::default(), fast_scrape());
    TraversalController::new(input, output, scraper, downloader, factory)
}

#[tokio::test]
async fn crawls_every_category_into_stem_folders() {
    common::init_test_tracing();
    let server = image_server().await;
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_image(input.path(), "ant", "1.png");
    write_image(input.path(), "ant", "2.png");
    write_image(input.path(), "bee", "1.png");

    let log = BrowserLog::new();
    log.script("ant/1.png", PageScript::results(urls(&server, "ant1", 3)));
    log.script("ant/2.png", PageScript::results(urls(&server, "ant2", 2)));
    log.script("bee/1.png", PageScript::results(urls(&server, "bee1", 1)));
    let factory = FakeFactory::new(log.clone());

    let summary = controller(input.path(), output.path(), factory).run().await.unwrap();

    for file in ["ant/1/1.jpg", "ant/1/2.jpg", "ant/1/3.jpg", "ant/2/1.jpg", "ant/2/2.jpg", "bee/1/1.jpg"] {
        assert!(output.path().join(file).is_file(), "missing {file}");
    }
    assert!(!output.path().join("ant/2/3.jpg").exists());
    assert_eq!(log.uploads(), vec!["ant/1.png", "ant/2.png", "bee/1.png"]);
    assert_eq!(summary.categories, 2);
    assert_eq!(summary.searched, 3);
    assert_eq!(summary.files_saved, 6);
    assert_eq!(log.opened.load(Ordering::SeqCst), 1);
    assert_eq!(log.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn existing_output_folder_skips_the_search() {
    let server = image_server().await;
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_image(input.path(), "ant", "1.png");
    write_image(input.path(), "ant", "2.png");
    std::fs::create_dir_all(output.path().join("ant/1")).unwrap();

    let log = BrowserLog::new();
    log.script("ant/2.png", PageScript::results(urls(&server, "ant2", 1)));

    let summary = controller(input.path(), output.path(), FakeFactory::new(log.clone()))
        .run()
        .await
        .unwrap();

    assert_eq!(log.uploads(), vec!["ant/2.png"]);
    assert_eq!(summary.skipped_existing, 1);
    assert!(std::fs::read_dir(output.path().join("ant/1")).unwrap().next().is_none());
}

#[tokio::test]
async fn images_are_visited_in_natural_order() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    for name in ["img10.png", "img2.png", "img1.png"] {
        write_image(input.path(), "cat2", name);
    }
    write_image(input.path(), "cat10", "a.png");
    write_image(input.path(), "cat1", "a.png");
    std::fs::write(input.path().join("notes.txt"), b"not a category").unwrap();

    let log = BrowserLog::new();
    controller(input.path(), output.path(), FakeFactory::new(log.clone()))
        .run()
        .await
        .unwrap();

    assert_eq!(
        log.uploads(),
        vec!["cat1/a.png", "cat2/img1.png", "cat2/img2.png", "cat2/img10.png", "cat10/a.png"]
    );
}

#[tokio::test]
async fn empty_results_still_mark_the_image_done() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_image(input.path(), "ant", "1.png");

    let log = BrowserLog::new();
    let summary = controller(input.path(), output.path(), FakeFactory::new(log.clone()))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.no_results, 1);
    assert!(output.path().join("ant/1").is_dir());
}

#[tokio::test]
async fn failed_search_leaves_no_folder_and_the_run_continues() {
    let server = image_server().await;
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_image(input.path(), "ant", "1.png");
    write_image(input.path(), "ant", "2.png");

    let log = BrowserLog::new();
    log.script("ant/1.png", PageScript::timeout());
    log.script("ant/2.png", PageScript::results(urls(&server, "ant2", 1)));

    let summary = controller(input.path(), output.path(), FakeFactory::new(log.clone()))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.scrape_failures, 1);
    assert!(!output.path().join("ant/1").exists());
    assert!(output.path().join("ant/2/1.jpg").is_file());
    // The session still answered, so it was kept.
    assert_eq!(log.opened.load(Ordering::SeqCst), 1);
    assert_eq!(summary.sessions_recreated, 0);
}

#[tokio::test]
async fn dead_session_is_replaced() {
    let server = image_server().await;
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_image(input.path(), "ant", "1.png");
    write_image(input.path(), "ant", "2.png");

    let log = BrowserLog::new();
    log.script("ant/1.png", PageScript::crash());
    log.script("ant/1.png", PageScript::results(urls(&server, "ant1", 1)));
    log.script("ant/2.png", PageScript::results(urls(&server, "ant2", 2)));

    let summary = controller(input.path(), output.path(), FakeFactory::new(log.clone()))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.sessions_recreated, 1);
    assert_eq!(summary.scrape_failures, 0);
    assert_eq!(log.opened.load(Ordering::SeqCst), 2);
    assert_eq!(log.closed.load(Ordering::SeqCst), 2);
    assert!(output.path().join("ant/1/1.jpg").is_file());
    assert!(output.path().join("ant/2/2.jpg").is_file());
}

#[tokio::test]
async fn timed_out_search_is_retried_within_the_run() {
    let server = image_server().await;
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_image(input.path(), "ant", "1.png");

    let log = BrowserLog::new();
    log.script("ant/1.png", PageScript::timeout());
    log.script("ant/1.png", PageScript::results(urls(&server, "ant1", 2)));

    let summary = controller(input.path(), output.path(), FakeFactory::new(log.clone()))
        .run()
        .await
        .unwrap();

    assert_eq!(log.uploads(), vec!["ant/1.png", "ant/1.png"]);
    assert_eq!(summary.searched, 1);
    assert_eq!(summary.scrape_failures, 0);
    assert_eq!(summary.files_saved, 2);
    assert_eq!(summary.sessions_recreated, 0);
}

#[tokio::test]
async fn search_gives_up_after_the_attempt_budget() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_image(input.path(), "ant", "1.png");

    let log = BrowserLog::new();
    log.script("ant/1.png", PageScript::timeout());

    let summary = controller(input.path(), output.path(), FakeFactory::new(log.clone()))
        .with_search_attempts(2)
        .run()
        .await
        .unwrap();

    assert_eq!(log.uploads().len(), 2);
    assert_eq!(summary.scrape_failures, 1);
    assert!(!output.path().join("ant/1").exists());
}

#[tokio::test]
async fn failed_reconnect_aborts_and_closes() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_image(input.path(), "ant", "1.png");
    write_image(input.path(), "ant", "2.png");

    let log = BrowserLog::new();
    log.script("ant/1.png", PageScript::crash());
    let factory = Arc::new(FakeFactory {
        log: log.clone(),
        max_opens: Some(1),
    });

    let err = controller(input.path(), output.path(), factory).run().await.unwrap_err();

    assert!(matches!(err, CrawlError::Session(_)));
    assert_eq!(log.uploads(), vec!["ant/1.png"]);
    assert_eq!(log.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancelled_run_stops_cleanly() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_image(input.path(), "ant", "1.png");

    let log = BrowserLog::new();
    let crawl = controller(input.path(), output.path(), FakeFactory::new(log.clone()));
    crawl.cancellation_token().cancel();

    let summary = crawl.run().await.unwrap();

    assert!(summary.interrupted);
    assert!(log.uploads().is_empty());
    assert_eq!(log.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_input_root_fails_before_opening_a_browser() {
    let output = tempfile::tempdir().unwrap();
    let log = BrowserLog::new();

    let err = controller(Path::new("/no/such/input"), output.path(), FakeFactory::new(log.clone()))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, CrawlError::Io { .. }));
    assert_eq!(log.opened.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn one_hit_one_timeout_completes() {
    let server = image_server().await;
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_image(input.path(), "ant", "queen.png");
    write_image(input.path(), "bee", "drone.png");

    let log = BrowserLog::new();
    log.script("ant/queen.png", PageScript::results(urls(&server, "ant", 1)));
    log.script("bee/drone.png", PageScript::timeout());

    let summary = controller(input.path(), output.path(), FakeFactory::new(log.clone()))
        .run()
        .await
        .expect("run completes");

    assert!(output.path().join("ant/queen/1.jpg").is_file());
    assert!(!output.path().join("bee/drone").exists());
    assert_eq!(summary.files_saved, 1);
    assert_eq!(summary.scrape_failures, 1);
}
