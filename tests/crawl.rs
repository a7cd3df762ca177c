//! End-to-end scenarios against a real `ReqwestFetcher` and a `wiremock`
//! server, covering the literal I/O scenarios from the engine's testable
//! properties.

use politecrawl::{crawl, CrawlOptions, RateLimiter, ReqwestFetcher};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher() -> Arc<ReqwestFetcher> {
    Arc::new(
        ReqwestFetcher::new(
            "test-crawler/1.0",
            Duration::from_secs(5),
            0,
            Duration::from_millis(10),
        )
        .unwrap(),
    )
}

async fn mount_empty_robots(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .mount(server)
        .await;
}

#[tokio::test]
async fn single_page_no_links() {
    let server = MockServer::start().await;
    mount_empty_robots(&server).await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html>hi</html>", "text/html"))
        .mount(&server)
        .await;

    let mut stream = crawl(fetcher(), &server.uri(), CrawlOptions::default())
        .await
        .unwrap();

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.url.as_str(), format!("{}/", server.uri()));
    assert!(first.links.is_empty());
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn two_page_chain_with_cycle() {
    let server = MockServer::start().await;
    mount_empty_robots(&server).await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(r#"<a href="/b">b</a>"#, "text/html"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(format!(r#"<a href="{}">home</a>"#, server.uri()), "text/html"))
        .mount(&server)
        .await;

    let mut stream = crawl(fetcher(), &server.uri(), CrawlOptions::default())
        .await
        .unwrap();

    let mut seen = HashSet::new();
    while let Some(result) = stream.next().await {
        seen.insert(result.unwrap().url.to_string());
    }

    let expected: HashSet<_> = [format!("{}/", server.uri()), format!("{}/b", server.uri())]
        .into_iter()
        .collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn non_html_skipped_as_page_but_kept_as_link() {
    let server = MockServer::start().await;
    mount_empty_robots(&server).await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<a href="/file.pdf">pdf</a><img src="/logo.png">"#,
            "text/html",
        ))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/file.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"%PDF-1.4".to_vec(), "application/pdf"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"\x89PNG".to_vec(), "image/png"))
        .mount(&server)
        .await;

    let mut stream = crawl(fetcher(), &server.uri(), CrawlOptions::default())
        .await
        .unwrap();

    let only = stream.next().await.unwrap().unwrap();
    let links: HashSet<_> = only.links.iter().map(|u| u.to_string()).collect();
    assert!(links.contains(&format!("{}/file.pdf", server.uri())));
    assert!(links.contains(&format!("{}/logo.png", server.uri())));
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn robots_disallow_blocks_matching_path() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /secret\n"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<a href="/public">pub</a><a href="/secret">secret</a>"#,
            "text/html",
        ))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/public"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .mount(&server)
        .await;

    let secret_guard = Mock::given(method("GET"))
        .and(path("/secret"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .expect(0)
        .mount_as_scoped(&server)
        .await;

    let mut stream = crawl(fetcher(), &server.uri(), CrawlOptions::default())
        .await
        .unwrap();

    let mut seen = HashSet::new();
    while let Some(result) = stream.next().await {
        seen.insert(result.unwrap().url.to_string());
    }

    let expected: HashSet<_> = [format!("{}/", server.uri()), format!("{}/public", server.uri())]
        .into_iter()
        .collect();
    assert_eq!(seen, expected);
    drop(secret_guard);
}

#[tokio::test]
async fn redirect_off_host_is_not_followed_or_emitted() {
    let origin = MockServer::start().await;
    let other = MockServer::start().await;

    mount_empty_robots(&origin).await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(r#"<a href="/moved">moved</a>"#, "text/html"))
        .mount(&origin)
        .await;

    Mock::given(method("GET"))
        .and(path("/moved"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", format!("{}/landing", other.uri())),
        )
        .mount(&origin)
        .await;

    Mock::given(method("GET"))
        .and(path("/landing"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .mount(&other)
        .await;

    let mut stream = crawl(fetcher(), &origin.uri(), CrawlOptions::default())
        .await
        .unwrap();

    let mut results = Vec::new();
    while let Some(result) = stream.next().await {
        results.push(result.unwrap());
    }

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].url.as_str(), format!("{}/", origin.uri()));
}

#[tokio::test]
async fn depth_cap_stops_traversal() {
    let server = MockServer::start().await;
    mount_empty_robots(&server).await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(r#"<a href="/a">a</a>"#, "text/html"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(r#"<a href="/b">b</a>"#, "text/html"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(r#"<a href="/c">c</a>"#, "text/html"))
        .mount(&server)
        .await;
    let c_guard = Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .expect(0)
        .mount_as_scoped(&server)
        .await;

    let opts = CrawlOptions {
        max_depth: Some(2),
        ..CrawlOptions::default()
    };

    let mut stream = crawl(fetcher(), &server.uri(), opts).await.unwrap();

    let mut seen = HashSet::new();
    while let Some(result) = stream.next().await {
        seen.insert(result.unwrap().url.to_string());
    }

    let expected: HashSet<_> = [
        format!("{}/", server.uri()),
        format!("{}/a", server.uri()),
        format!("{}/b", server.uri()),
    ]
    .into_iter()
    .collect();
    assert_eq!(seen, expected);
    drop(c_guard);
}

#[tokio::test]
async fn page_cap_bounds_results_under_concurrency() {
    let server = MockServer::start().await;
    mount_empty_robots(&server).await;

    let mut links = String::new();
    for i in 0..20 {
        links.push_str(&format!(r#"<a href="/leaf/{i}">leaf</a>"#));
    }
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(links, "text/html"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/leaf/\d+$"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .mount(&server)
        .await;

    let opts = CrawlOptions {
        max_concurrency: 10,
        max_pages: Some(5),
        ..CrawlOptions::default()
    };

    let mut stream = crawl(fetcher(), &server.uri(), opts).await.unwrap();

    let mut count = 0;
    while let Some(result) = stream.next().await {
        result.unwrap();
        count += 1;
    }

    assert!(count <= 5);
}

#[tokio::test]
async fn crawl_delay_throttles_before_first_page_fetch() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nCrawl-delay: 2\n"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .mount(&server)
        .await;

    let opts = CrawlOptions {
        rate_limiter: Some(Arc::new(RateLimiter::new(100.0).unwrap())),
        ..CrawlOptions::default()
    };

    let start = Instant::now();
    let mut stream = crawl(fetcher(), &server.uri(), opts).await.unwrap();
    let _ = stream.next().await.unwrap().unwrap();

    // Crawl-delay: 2 implies a rate of 0.5 tokens/sec, so the bucket starts
    // below one token and the first page fetch must wait for a refill.
    assert!(start.elapsed() >= Duration::from_millis(1500));
}

#[tokio::test]
async fn non_utf8_body_is_decoded_lossily_not_skipped() {
    let server = MockServer::start().await;
    mount_empty_robots(&server).await;

    // Invalid UTF-8 byte (0xFF) embedded in an otherwise ordinary page; the
    // fetch must still succeed and the page must still be emitted, with the
    // byte replaced rather than the page dropped as a fetch failure.
    let mut body = b"<html>bad byte: ".to_vec();
    body.push(0xFF);
    body.extend_from_slice(b" end</html>".as_slice());

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .mount(&server)
        .await;

    let mut stream = crawl(fetcher(), &server.uri(), CrawlOptions::default())
        .await
        .unwrap();

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.url.as_str(), format!("{}/", server.uri()));
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn abandoning_the_stream_stops_further_fetches() {
    let server = MockServer::start().await;
    mount_empty_robots(&server).await;

    let mut links = String::new();
    for i in 0..50 {
        links.push_str(&format!(r#"<a href="/leaf/{i}">leaf</a>"#));
    }
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(links, "text/html"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/leaf/\d+$"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(200)).set_body_raw(
            "<html></html>",
            "text/html",
        ))
        .mount(&server)
        .await;

    let opts = CrawlOptions {
        max_concurrency: 5,
        ..CrawlOptions::default()
    };

    {
        let mut stream = crawl(fetcher(), &server.uri(), opts).await.unwrap();
        let _ = stream.next().await.unwrap().unwrap();
        // stream dropped here, cancelling the crawl
    }

    tokio::time::sleep(Duration::from_millis(300)).await;
    let requests = server.received_requests().await.unwrap();
    let leaf_fetches = requests.iter().filter(|r| r.url.path().starts_with("/leaf/")).count();
    assert!(leaf_fetches < 50, "expected cancellation to cut off most leaf fetches, got {leaf_fetches}");
}
