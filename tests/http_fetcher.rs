//! Integration tests for `HttpFetcher` against a local wiremock server.

use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use catalog_scraper::config::CrawlConfig;
use catalog_scraper::error::FetchError;
use catalog_scraper::fetcher::{HttpFetcher, PageFetcher, PageRequest, RequestContext};

/// No delay, short timeout, retries as requested with a negligible backoff.
fn test_fetcher(max_retries: u32) -> HttpFetcher {
    let config = CrawlConfig {
        request_delay: Duration::ZERO,
        timeout: Duration::from_millis(500),
        max_retries,
        retry_backoff: Duration::from_millis(10),
        user_agent: "catalog-scraper-test/0.1".to_string(),
        ..CrawlConfig::default()
    };
    HttpFetcher::new(&config).expect("failed to build test fetcher")
}

#[tokio::test]
async fn fetch_returns_body_and_context() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/p/P60639245.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><h1>Shirt</h1></html>"))
        .mount(&server)
        .await;

    let context = RequestContext {
        variant_id: Some("P60639245-NY".to_string()),
        ..RequestContext::default()
    };
    let url = format!("{}/p/P60639245.html", server.uri());
    let page = test_fetcher(0)
        .fetch(PageRequest::new(&url).with_context(context.clone()))
        .await
        .expect("fetch should succeed");

    assert_eq!(page.url, url);
    assert_eq!(page.body, "<html><h1>Shirt</h1></html>");
    assert_eq!(page.context, context);
    assert!(page.revealed_images.is_empty());
}

#[tokio::test]
async fn not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products/missing-1"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/products/missing-1", server.uri());
    let failure = test_fetcher(3).fetch(PageRequest::new(&url)).await.unwrap_err();

    assert!(matches!(failure.error, FetchError::Status { status: 404, .. }));
    assert_eq!(failure.request.url, url);
    assert_eq!(
        failure.error.classification(),
        format!("unexpected HTTP status 404 from {url}")
    );
}

#[tokio::test]
async fn slow_response_is_classified_as_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let failure = test_fetcher(0)
        .fetch(PageRequest::new(format!("{}/slow", server.uri())))
        .await
        .unwrap_err();

    assert!(matches!(failure.error, FetchError::Timeout { .. }));
    assert_eq!(failure.error.classification(), "Timeout Error");
}

#[tokio::test]
async fn server_error_is_retried_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<urlset></urlset>"))
        .mount(&server)
        .await;

    let page = test_fetcher(2)
        .fetch(PageRequest::new(format!("{}/sitemap.xml", server.uri())))
        .await
        .expect("retry should recover");

    assert_eq!(page.body, "<urlset></urlset>");
}

#[tokio::test]
async fn retries_are_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3) // 1 initial + 2 retries
        .mount(&server)
        .await;

    let failure = test_fetcher(2)
        .fetch(PageRequest::new(format!("{}/busy", server.uri())))
        .await
        .unwrap_err();

    assert!(matches!(failure.error, FetchError::Status { status: 429, .. }));
}
