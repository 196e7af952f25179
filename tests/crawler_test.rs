//! End-to-end crawler tests against a local mock server.

mod common;

use std::sync::Arc;
use std::sync::Mutex;

use bluesnake::{CrawlConfig, Crawler, RobotsMode};
use common::{collect_results, html_page, local_config};

#[tokio::test]
async fn single_page_emits_one_result() {
    common::init_logging();
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/page-a")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(html_page("Page A", &[]))
        .expect(1)
        .create_async()
        .await;

    let crawler = Crawler::new(local_config()).unwrap();
    let results = collect_results(&crawler);

    crawler.start(&format!("{}/page-a", server.url())).await.unwrap();
    crawler.wait().await;

    let results = results.lock().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, 200);
    assert_eq!(results[0].title, "Page A");
    assert!(results[0].url.ends_with("/page-a"));
}

#[tokio::test]
async fn redirect_chain_reports_every_hop_then_the_final_page() {
    let mut server = mockito::Server::new_async().await;
    let a = server
        .mock("GET", "/page-a")
        .with_status(301)
        .with_header("Location", "/page-b")
        .expect(1)
        .create_async()
        .await;
    let b = server
        .mock("GET", "/page-b")
        .with_status(302)
        .with_header("Location", "/page-c")
        .expect(1)
        .create_async()
        .await;
    let c = server
        .mock("GET", "/page-c")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(html_page("Page C", &[]))
        .expect(1)
        .create_async()
        .await;

    let crawler = Crawler::new(local_config()).unwrap();
    let results = collect_results(&crawler);

    crawler.start(&format!("{}/page-a", server.url())).await.unwrap();
    crawler.wait().await;

    {
        let results = results.lock().unwrap();
        assert_eq!(results.len(), 3);

        assert_eq!(results[0].status, 301);
        assert!(results[0].url.ends_with("/page-a"));
        assert!(results[0].title.is_empty());
        assert!(results[0].internal_links.is_empty());

        assert_eq!(results[1].status, 302);
        assert!(results[1].url.ends_with("/page-b"));

        assert_eq!(results[2].status, 200);
        assert!(results[2].url.ends_with("/page-c"));
        assert_eq!(results[2].title, "Page C");
        assert_eq!(results[2].redirect_chain.len(), 2);
    }

    // Every URL in the chain is now in the visited store.
    for path in ["/page-a", "/page-b", "/page-c"] {
        assert!(crawler.is_visited(&format!("{}{path}", server.url())));
    }

    // A later start on an already-visited chain member fetches nothing.
    crawler.start(&format!("{}/page-b", server.url())).await.unwrap();
    crawler.wait().await;
    assert_eq!(results.lock().unwrap().len(), 3);

    a.assert_async().await;
    b.assert_async().await;
    c.assert_async().await;
}

#[tokio::test]
async fn long_chain_statuses_arrive_in_order() {
    let mut server = mockito::Server::new_async().await;
    for i in 0..8 {
        let status = if i % 2 == 0 { 301 } else { 302 };
        server
            .mock("GET", format!("/hop{i}").as_str())
            .with_status(status)
            .with_header("Location", &format!("/hop{}", i + 1))
            .create_async()
            .await;
    }
    server
        .mock("GET", "/hop8")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(html_page("Page I", &[]))
        .create_async()
        .await;

    let crawler = Crawler::new(local_config()).unwrap();
    let results = collect_results(&crawler);

    crawler.start(&format!("{}/hop0", server.url())).await.unwrap();
    crawler.wait().await;

    let statuses: Vec<u16> = results.lock().unwrap().iter().map(|r| r.status).collect();
    assert_eq!(statuses, vec![301, 302, 301, 302, 301, 302, 301, 302, 200]);
    assert!(crawler.is_visited(&format!("{}/hop8", server.url())));
}

#[tokio::test]
async fn redirect_cap_surfaces_on_the_seed_result() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/loop")
        .with_status(301)
        .with_header("Location", "/loop")
        .create_async()
        .await;

    let crawler = Crawler::new(local_config()).unwrap();
    let results = collect_results(&crawler);

    crawler.start(&format!("{}/loop", server.url())).await.unwrap();
    crawler.wait().await;

    let results = results.lock().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, 0);
    let error = results[0].error.as_deref().unwrap_or_default();
    assert!(error.contains("too many redirects"), "error was: {error}");
}

#[tokio::test]
async fn discovered_links_are_followed_once_and_depth_limited() {
    let mut server = mockito::Server::new_async().await;
    // Seed links to B twice and C once; B and C both link back to the
    // seed and B links on to D, which sits beyond max_depth.
    server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(html_page("Seed", &["/b", "/b", "/c"]))
        .expect(1)
        .create_async()
        .await;
    let b = server
        .mock("GET", "/b")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(html_page("B", &["/", "/d"]))
        .expect(1)
        .create_async()
        .await;
    let c = server
        .mock("GET", "/c")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(html_page("C", &["/b"]))
        .expect(1)
        .create_async()
        .await;
    let d = server
        .mock("GET", "/d")
        .with_status(200)
        .expect(0)
        .create_async()
        .await;

    let config = CrawlConfig::builder()
        .robots_mode(RobotsMode::Ignore)
        .max_depth(1)
        .parallelism(4)
        .max_retries(0)
        .build()
        .unwrap();
    let crawler = Crawler::new(config).unwrap();
    let results = collect_results(&crawler);

    crawler.start(&server.url()).await.unwrap();
    crawler.wait().await;

    let results = results.lock().unwrap();
    assert_eq!(results.len(), 3);

    let seed = results.iter().find(|r| r.title == "Seed").unwrap();
    assert_eq!(seed.depth, 0);
    assert_eq!(seed.internal_links.len(), 3);
    assert!(seed.internal_links[0].context.contains("See"));

    for title in ["B", "C"] {
        let page = results.iter().find(|r| r.title == title).unwrap();
        assert_eq!(page.depth, 1);
    }

    let stats = crawler.stats();
    assert!(stats.depth_exceeded >= 1, "stats: {stats:?}");
    assert!(stats.already_visited >= 1, "stats: {stats:?}");

    b.assert_async().await;
    c.assert_async().await;
    d.assert_async().await;
}

#[tokio::test]
async fn external_links_are_classified_not_followed() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(html_page("Seed", &["https://external.example/out", "/in"]))
        .create_async()
        .await;
    server
        .mock("GET", "/in")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(html_page("In", &[]))
        .create_async()
        .await;

    let crawler = Crawler::new(local_config()).unwrap();
    let results = collect_results(&crawler);

    crawler.start(&server.url()).await.unwrap();
    crawler.wait().await;

    let results = results.lock().unwrap();
    let seed = results.iter().find(|r| r.title == "Seed").unwrap();
    assert_eq!(seed.external_links.len(), 1);
    assert!(seed.external_links[0].url.starts_with("https://external.example/"));
    assert_eq!(seed.internal_links.len(), 1);
}

#[tokio::test]
async fn four_oh_four_is_reported_without_retry() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/missing")
        .with_status(404)
        .with_body("not here")
        .expect(1)
        .create_async()
        .await;

    let crawler = Crawler::new(local_config()).unwrap();
    let results = collect_results(&crawler);

    crawler.start(&format!("{}/missing", server.url())).await.unwrap();
    crawler.wait().await;

    let results = results.lock().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, 404);
    assert!(results[0].internal_links.is_empty());
    assert!(results[0].error.is_none());
}

#[tokio::test]
async fn server_errors_retry_then_report() {
    let mut server = mockito::Server::new_async().await;
    let failing = server
        .mock("GET", "/flaky")
        .with_status(503)
        .expect(3)
        .create_async()
        .await;

    let config = CrawlConfig::builder()
        .robots_mode(RobotsMode::Ignore)
        .max_retries(2)
        .build()
        .unwrap();
    let crawler = Crawler::new(config).unwrap();
    let results = collect_results(&crawler);

    crawler.start(&format!("{}/flaky", server.url())).await.unwrap();
    crawler.wait().await;

    let results = results.lock().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, 503);
    failing.assert_async().await;
}

#[tokio::test]
async fn transport_failure_reports_status_zero() {
    // Nothing listens on this port.
    let config = CrawlConfig::builder()
        .robots_mode(RobotsMode::Ignore)
        .max_retries(0)
        .request_timeout(std::time::Duration::from_secs(2))
        .build()
        .unwrap();
    let crawler = Crawler::new(config).unwrap();
    let results = collect_results(&crawler);

    let errors = Arc::new(Mutex::new(Vec::new()));
    let error_sink = Arc::clone(&errors);
    crawler.on_error(move |url, error| {
        error_sink.lock().unwrap().push((url.to_string(), error.to_string()));
    });

    crawler.start("http://127.0.0.1:9/page").await.unwrap();
    crawler.wait().await;

    let results = results.lock().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, 0);
    assert!(results[0].error.is_some());
    assert_eq!(errors.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn page_limit_stops_admission() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(html_page("Seed", &["/p1", "/p2", "/p3", "/p4"]))
        .create_async()
        .await;
    for i in 1..=4 {
        server
            .mock("GET", format!("/p{i}").as_str())
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(html_page(&format!("P{i}"), &[]))
            .create_async()
            .await;
    }

    let config = CrawlConfig::builder()
        .robots_mode(RobotsMode::Ignore)
        .parallelism(1)
        .limit(2)
        .max_retries(0)
        .build()
        .unwrap();
    let crawler = Crawler::new(config).unwrap();
    let results = collect_results(&crawler);

    crawler.start(&server.url()).await.unwrap();
    crawler.wait().await;

    let emitted = results.lock().unwrap().len();
    assert!(emitted <= 3, "limit was not applied: {emitted} results");
    assert!(crawler.stats().page_limit_reached > 0);
}

#[tokio::test]
async fn html_callbacks_see_elements_and_can_visit() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(
            r#"<html><head><title>Docs</title></head>
               <body><nav><a class="next" href="/chapter-2">Next</a></nav></body></html>"#,
        )
        .create_async()
        .await;
    let chapter = server
        .mock("GET", "/chapter-2")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(html_page("Chapter 2", &[]))
        .expect(1)
        .create_async()
        .await;

    let crawler = Crawler::new(local_config()).unwrap();
    let results = collect_results(&crawler);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_sink = Arc::clone(&seen);
    crawler
        .on_html("a.next", move |el| {
            seen_sink.lock().unwrap().push(el.text());
            if let Some(href) = el.attr("href") {
                el.visit(href);
            }
        })
        .unwrap();

    crawler.start(&server.url()).await.unwrap();
    crawler.wait().await;

    assert_eq!(*seen.lock().unwrap(), vec!["Next".to_string()]);
    assert!(results.lock().unwrap().iter().any(|r| r.title == "Chapter 2"));
    chapter.assert_async().await;
}

#[tokio::test]
async fn xml_seed_runs_xml_callbacks() {
    let mut server = mockito::Server::new_async().await;
    let body = format!(
        r#"<?xml version="1.0"?><urlset><url><loc>{0}/a</loc></url><url><loc>{0}/b</loc></url></urlset>"#,
        server.url()
    );
    server
        .mock("GET", "/feed.xml")
        .with_status(200)
        .with_header("content-type", "application/xml")
        .with_body(body)
        .create_async()
        .await;
    for path in ["/a", "/b"] {
        server
            .mock("GET", path)
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(html_page(path, &[]))
            .expect(1)
            .create_async()
            .await;
    }

    let crawler = Crawler::new(local_config()).unwrap();
    let results = collect_results(&crawler);

    crawler
        .on_xml("/urlset/url/loc", |el| {
            el.visit(&el.text);
        })
        .unwrap();

    crawler.start(&format!("{}/feed.xml", server.url())).await.unwrap();
    crawler.wait().await;

    let results = results.lock().unwrap();
    assert_eq!(results.len(), 3);
}

#[tokio::test]
async fn sitemap_seeding_admits_listed_urls() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(html_page("Seed", &[]))
        .create_async()
        .await;
    let sitemap_body = format!(
        r#"<?xml version="1.0"?><urlset><url><loc>{0}/from-sitemap</loc></url></urlset>"#,
        server.url()
    );
    server
        .mock("GET", "/sitemap.xml")
        .with_status(200)
        .with_header("content-type", "application/xml")
        .with_body(sitemap_body)
        .create_async()
        .await;
    let listed = server
        .mock("GET", "/from-sitemap")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(html_page("Listed", &[]))
        .expect(1)
        .create_async()
        .await;

    let config = CrawlConfig::builder()
        .robots_mode(RobotsMode::Ignore)
        .use_sitemap(true)
        .max_retries(0)
        .build()
        .unwrap();
    let crawler = Crawler::new(config).unwrap();
    let results = collect_results(&crawler);

    crawler.start(&server.url()).await.unwrap();
    crawler.wait().await;

    assert!(results.lock().unwrap().iter().any(|r| r.title == "Listed"));
    listed.assert_async().await;
}

#[tokio::test]
async fn stop_cancels_and_drains() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(html_page("Seed", &[]))
        .create_async()
        .await;

    let crawler = Crawler::new(local_config()).unwrap();
    let _results = collect_results(&crawler);

    crawler.start(&server.url()).await.unwrap();
    crawler.stop().await;
    // A stopped crawler's queue is drained; wait returns immediately.
    crawler.wait().await;
}
