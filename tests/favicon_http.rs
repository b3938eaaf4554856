//! Real HTTP round trips against an in-process server

use axum::{
    Router,
    http::{StatusCode, header},
    response::{Html, IntoResponse},
    routing::get,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use linkshelf::errors::{FaviconError, ScrapeError};
use linkshelf::favicon::{
    FaviconFetcher, FaviconScraper, FaviconStorage, HtmlFaviconScraper, ReqwestFaviconClient,
};

const UA: &str = "linkshelf-test/1.0";
const ICON: &[u8] = b"\x00\x00\x01\x00fake-icon";

async fn spawn_server() -> SocketAddr {
    async fn icon() -> impl IntoResponse {
        ([(header::CONTENT_TYPE, "image/x-icon")], ICON)
    }

    async fn with_icon() -> Html<&'static str> {
        Html(r#"<html><head><link rel="icon" href="/static/icon.png"></head><body></body></html>"#)
    }

    async fn without_icon() -> Html<&'static str> {
        Html("<html><head><title>plain</title></head></html>")
    }

    async fn slow() -> &'static str {
        tokio::time::sleep(Duration::from_secs(5)).await;
        "late"
    }

    let app = Router::new()
        .route("/favicon.ico", get(icon))
        .route("/static/icon.png", get(icon))
        .route("/with-icon", get(with_icon))
        .route("/without-icon", get(without_icon))
        .route("/broken", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
        .route("/slow.ico", get(slow))
        .route(
            "/user-agent",
            get(|headers: axum::http::HeaderMap| async move {
                headers
                    .get(header::USER_AGENT)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string()
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn fetcher(temp: &TempDir, timeout: Duration) -> FaviconFetcher {
    let client = ReqwestFaviconClient::new(timeout, UA).unwrap();
    FaviconFetcher::new(FaviconStorage::new(temp.path()), Arc::new(client))
}

#[tokio::test]
async fn test_download_writes_body_to_cache() {
    let addr = spawn_server().await;
    let temp = TempDir::new().unwrap();
    let fetcher = fetcher(&temp, Duration::from_secs(5));

    let page = format!("http://{addr}/some/page");
    let icon = format!("http://{addr}/favicon.ico");
    let path = fetcher.fetch(&page, &icon).await.unwrap().unwrap();

    assert_eq!(path.extension().unwrap(), "ico");
    assert_eq!(std::fs::read(&path).unwrap(), ICON);
}

#[tokio::test]
async fn test_not_found_is_rejected_without_file() {
    let addr = spawn_server().await;
    let temp = TempDir::new().unwrap();
    let fetcher = fetcher(&temp, Duration::from_secs(5));

    let err = fetcher
        .fetch(&format!("http://{addr}/"), &format!("http://{addr}/missing.png"))
        .await
        .unwrap_err();

    assert!(matches!(err, FaviconError::NonOkStatus { status: 404, .. }));
    assert_eq!(std::fs::read_dir(temp.path()).map(|d| d.count()).unwrap_or(0), 0);
}

#[tokio::test]
async fn test_timeout_is_transport_error() {
    let addr = spawn_server().await;
    let temp = TempDir::new().unwrap();
    let fetcher = fetcher(&temp, Duration::from_millis(200));

    let err = fetcher
        .fetch(&format!("http://{addr}/"), &format!("http://{addr}/slow.ico"))
        .await
        .unwrap_err();

    assert!(matches!(err, FaviconError::Transport { .. }));
    assert!(err.is_remote());
}

#[tokio::test]
async fn test_requests_carry_configured_user_agent() {
    let addr = spawn_server().await;
    let client = reqwest::Client::new();
    let plain = client
        .get(format!("http://{addr}/user-agent"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_ne!(plain, UA);

    let temp = TempDir::new().unwrap();
    let fetcher = fetcher(&temp, Duration::from_secs(5));
    let path = fetcher
        .fetch(&format!("http://{addr}/"), &format!("http://{addr}/user-agent"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(std::fs::read_to_string(path).unwrap(), UA);
}

#[tokio::test]
async fn test_scraper_resolves_declared_icon() {
    let addr = spawn_server().await;
    let scraper = HtmlFaviconScraper::new(Duration::from_secs(5), UA).unwrap();

    let found = scraper
        .discover(&format!("http://{addr}/with-icon"))
        .await
        .unwrap();
    assert_eq!(found, format!("http://{addr}/static/icon.png"));
}

#[tokio::test]
async fn test_scraper_falls_back_to_root_favicon() {
    let addr = spawn_server().await;
    let scraper = HtmlFaviconScraper::new(Duration::from_secs(5), UA).unwrap();

    let found = scraper
        .discover(&format!("http://{addr}/without-icon"))
        .await
        .unwrap();
    assert_eq!(found, format!("http://{addr}/favicon.ico"));
}

#[tokio::test]
async fn test_scraper_reports_error_status() {
    let addr = spawn_server().await;
    let scraper = HtmlFaviconScraper::new(Duration::from_secs(5), UA).unwrap();

    let err = scraper
        .discover(&format!("http://{addr}/broken"))
        .await
        .unwrap_err();
    assert!(matches!(err, ScrapeError::Status { status: 500, .. }));
}
