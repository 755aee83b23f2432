//! HTTP fetcher tests against a mock server

use std::time::Duration;

use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fbmedia::crawler::fetcher::{ImageMetaFetcher, PageFetcher};
use fbmedia::error::FetchError;

fn fetcher(server: &MockServer, max_retries: u32) -> PageFetcher {
    PageFetcher::with_config(100, max_retries, Duration::from_secs(5))
        .unwrap()
        .with_base_url(&server.uri())
        .with_base_delay(Duration::from_millis(1))
}

#[tokio::test]
async fn test_fetch_page_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/groups/9"))
        .and(header_exists("user-agent"))
        .and(header("accept-language", "en-US,en;q=0.9"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>group</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let body = fetcher(&server, 0)
        .fetch_page("https://www.facebook.com/groups/9")
        .await
        .unwrap();
    assert_eq!(body, "<html>group</html>");
}

#[tokio::test]
async fn test_fetch_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/photo/"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/photo/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("photo"))
        .mount(&server)
        .await;

    let body = fetcher(&server, 3)
        .fetch_page("https://www.facebook.com/photo/?fbid=1")
        .await
        .unwrap();
    assert_eq!(body, "photo");
}

#[tokio::test]
async fn test_fetch_does_not_retry_client_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/groups/404"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = fetcher(&server, 3)
        .fetch_page("https://www.facebook.com/groups/404")
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::ServerError(404)));
}

#[tokio::test]
async fn test_fetch_gives_up_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/groups/9/media"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let err = fetcher(&server, 2)
        .fetch_page("https://www.facebook.com/groups/9/media")
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::MaxRetriesExceeded));
}

#[tokio::test]
async fn test_persistent_rate_limit_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/groups/9/media/photos"))
        .respond_with(ResponseTemplate::new(429))
        .expect(2)
        .mount(&server)
        .await;

    let err = fetcher(&server, 1)
        .fetch_page("https://www.facebook.com/groups/9/media/photos")
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::RateLimit));
}

#[tokio::test]
async fn test_timeout_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/photo/"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let fetcher = PageFetcher::with_config(100, 0, Duration::from_millis(200))
        .unwrap()
        .with_base_url(&server.uri());
    let err = fetcher
        .fetch_page("https://www.facebook.com/photo/?fbid=1")
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Timeout));
}

#[tokio::test]
async fn test_invalid_url_rejected() {
    let fetcher = PageFetcher::new(10).unwrap();
    let err = fetcher.fetch_page("not a url").await.unwrap_err();
    assert!(matches!(err, FetchError::InvalidUrl(_)));
}

#[tokio::test]
async fn test_image_info_from_head() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/img/a.jpg"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("content-type", "image/jpeg; charset=binary"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let images = ImageMetaFetcher::new(Duration::from_secs(5)).unwrap();
    let info = images
        .file_info(&format!("{}/img/a.jpg", server.uri()))
        .await
        .unwrap();
    assert_eq!(info.mime.as_deref(), Some("image/jpeg"));
}

#[tokio::test]
async fn test_image_info_falls_back_to_range_request() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/img/b.png"))
        .respond_with(ResponseTemplate::new(405))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/img/b.png"))
        .and(header("range", "bytes=0-0"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-type", "image/png")
                .insert_header("content-range", "bytes 0-0/48213")
                .set_body_bytes(vec![0x89]),
        )
        .expect(1)
        .mount(&server)
        .await;

    let images = ImageMetaFetcher::new(Duration::from_secs(5)).unwrap();
    let mut image = fbmedia::models::ImageMeta::new(format!("{}/img/b.png", server.uri()), None);
    images.enrich(&mut image).await;

    assert_eq!(image.size, Some(48213));
    assert_eq!(image.mime.as_deref(), Some("image/png"));
}

#[tokio::test]
async fn test_image_enrich_failure_leaves_fields_empty() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let images = ImageMetaFetcher::new(Duration::from_secs(5)).unwrap();
    let mut image = fbmedia::models::ImageMeta::new(format!("{}/img/gone.jpg", server.uri()), None);
    images.enrich(&mut image).await;

    assert_eq!(image.size, None);
    assert_eq!(image.mime, None);
}
