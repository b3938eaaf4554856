//! Outbound HTTP for favicon downloads and page scraping

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, CONNECTION, HeaderMap, HeaderName, HeaderValue, USER_AGENT,
};
use std::time::Duration;

use crate::errors::{FaviconError, FaviconResult};

pub type ByteStream = BoxStream<'static, FaviconResult<Bytes>>;

/// Status and streaming body of a GET
pub struct HttpResponse {
    pub status: u16,
    pub body: ByteStream,
}

/// Minimal GET client used by the fetch stage
#[async_trait]
pub trait FaviconHttpClient: Send + Sync {
    async fn get(&self, url: &str) -> FaviconResult<HttpResponse>;
}

/// Headers presented on every request; some hosts refuse non-browser clients
pub fn browser_headers(user_agent: &str) -> Result<HeaderMap, reqwest::header::InvalidHeaderValue> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_str(user_agent)?);
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(
        HeaderName::from_static("upgrade-insecure-requests"),
        HeaderValue::from_static("1"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-dest"),
        HeaderValue::from_static("document"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-mode"),
        HeaderValue::from_static("navigate"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-site"),
        HeaderValue::from_static("none"),
    );
    Ok(headers)
}

/// Build a reqwest client with browser headers and a whole-request timeout
pub fn build_client(timeout: Duration, user_agent: &str) -> FaviconResult<reqwest::Client> {
    let headers = browser_headers(user_agent)
        .map_err(|e| FaviconError::transport("<client>", format!("invalid user agent: {e}")))?;

    reqwest::Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .map_err(|e| FaviconError::transport("<client>", e))
}

#[derive(Clone)]
pub struct ReqwestFaviconClient {
    client: reqwest::Client,
}

impl ReqwestFaviconClient {
    pub fn new(timeout: Duration, user_agent: &str) -> FaviconResult<Self> {
        Ok(Self {
            client: build_client(timeout, user_agent)?,
        })
    }
}

#[async_trait]
impl FaviconHttpClient for ReqwestFaviconClient {
    async fn get(&self, url: &str) -> FaviconResult<HttpResponse> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FaviconError::transport(url, e))?;

        let status = response.status().as_u16();
        let source = url.to_string();
        let body = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| FaviconError::transport(&source, e)))
            .boxed();

        Ok(HttpResponse { status, body })
    }
}
