//! Robots policy tests across the three admission modes.

mod common;

use bluesnake::{CrawlConfig, Crawler, RobotsMode};
use common::{collect_results, html_page};

const ROBOTS_TXT: &str = "User-agent: *\nDisallow: /disallowed\n";

async fn site(server: &mut mockito::ServerGuard) -> (mockito::Mock, mockito::Mock) {
    let robots = server
        .mock("GET", "/robots.txt")
        .with_status(200)
        .with_body(ROBOTS_TXT)
        .create_async()
        .await;
    server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(html_page("Seed", &["/disallowed", "/open"]))
        .create_async()
        .await;
    server
        .mock("GET", "/open")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(html_page("Open", &[]))
        .create_async()
        .await;
    let disallowed = server
        .mock("GET", "/disallowed")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(html_page("Disallowed", &[]))
        .create_async()
        .await;
    (robots, disallowed)
}

fn config(mode: RobotsMode) -> CrawlConfig {
    CrawlConfig::builder()
        .robots_mode(mode)
        .max_retries(0)
        .build()
        .unwrap()
}

#[tokio::test]
async fn respect_mode_blocks_disallowed_urls() {
    let mut server = mockito::Server::new_async().await;
    let (robots, disallowed) = site(&mut server).await;

    let crawler = Crawler::new(config(RobotsMode::Respect)).unwrap();
    let results = collect_results(&crawler);

    crawler.start(&server.url()).await.unwrap();
    crawler.wait().await;

    let results = results.lock().unwrap();
    assert!(results.iter().any(|r| r.title == "Open"));
    assert!(!results.iter().any(|r| r.title == "Disallowed"));
    assert_eq!(crawler.stats().robots_blocked, 1);

    // robots.txt fetched once per host, never re-fetched per URL.
    robots.assert_async().await;
    // The disallowed page was never requested.
    assert!(!disallowed.matched_async().await);
}

#[tokio::test]
async fn ignore_mode_skips_the_check() {
    let mut server = mockito::Server::new_async().await;
    let (robots, _disallowed) = site(&mut server).await;

    let crawler = Crawler::new(config(RobotsMode::Ignore)).unwrap();
    let results = collect_results(&crawler);

    crawler.start(&server.url()).await.unwrap();
    crawler.wait().await;

    let results = results.lock().unwrap();
    assert!(results.iter().any(|r| r.title == "Disallowed"));
    assert_eq!(crawler.stats().robots_blocked, 0);
    // Ignore mode never even fetches robots.txt.
    assert!(!robots.matched_async().await);
}

#[tokio::test]
async fn ignore_report_mode_crawls_but_counts_nothing() {
    let mut server = mockito::Server::new_async().await;
    let (_robots, _disallowed) = site(&mut server).await;

    let crawler = Crawler::new(config(RobotsMode::IgnoreReport)).unwrap();
    let results = collect_results(&crawler);

    crawler.start(&server.url()).await.unwrap();
    crawler.wait().await;

    let results = results.lock().unwrap();
    assert!(results.iter().any(|r| r.title == "Disallowed"));
    assert_eq!(crawler.stats().robots_blocked, 0);
}

#[tokio::test]
async fn missing_robots_file_allows_all() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/robots.txt")
        .with_status(404)
        .create_async()
        .await;
    server
        .mock("GET", "/page")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(html_page("Page", &[]))
        .create_async()
        .await;

    let crawler = Crawler::new(config(RobotsMode::Respect)).unwrap();
    let results = collect_results(&crawler);

    crawler.start(&format!("{}/page", server.url())).await.unwrap();
    crawler.wait().await;

    assert_eq!(results.lock().unwrap().len(), 1);
}
