//! Page scraping for favicon discovery

use async_trait::async_trait;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::trace;
use url::Url;

use super::http::build_client;
use crate::errors::{FaviconResult, ScrapeError};

/// Given a page URL, return its favicon reference (remote URL or `data:` URI)
#[async_trait]
pub trait FaviconScraper: Send + Sync {
    async fn discover(&self, page_url: &str) -> Result<String, ScrapeError>;
}

/// Fetches the page and reads its `<link rel="icon">` declarations,
/// falling back to `/favicon.ico` at the page origin
#[derive(Clone)]
pub struct HtmlFaviconScraper {
    client: reqwest::Client,
}

impl HtmlFaviconScraper {
    pub fn new(timeout: Duration, user_agent: &str) -> FaviconResult<Self> {
        Ok(Self {
            client: build_client(timeout, user_agent)?,
        })
    }
}

#[async_trait]
impl FaviconScraper for HtmlFaviconScraper {
    async fn discover(&self, page_url: &str) -> Result<String, ScrapeError> {
        let base = Url::parse(page_url).map_err(|e| ScrapeError::InvalidUrl {
            url: page_url.to_string(),
            message: e.to_string(),
        })?;

        let response =
            self.client
                .get(base.clone())
                .send()
                .await
                .map_err(|e| ScrapeError::Request {
                    url: page_url.to_string(),
                    message: e.to_string(),
                })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: page_url.to_string(),
                status: status.as_u16(),
            });
        }

        // Redirects move the base that relative hrefs resolve against
        let final_url = response.url().clone();
        let body = response.text().await.map_err(|e| ScrapeError::Request {
            url: page_url.to_string(),
            message: e.to_string(),
        })?;

        if let Some(icon) = extract_icon_href(&body, &final_url) {
            trace!("Found declared favicon {} on {}", icon, page_url);
            return Ok(icon);
        }

        default_favicon_url(&final_url).ok_or_else(|| ScrapeError::NotFound(page_url.to_string()))
    }
}

/// Best icon declared in `html`, resolved against `base`
///
/// Plain `icon` / `shortcut icon` links win over `apple-touch-icon`.
pub fn extract_icon_href(html: &str, base: &Url) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("link[rel][href]").ok()?;

    let mut touch_icon = None;
    for element in document.select(&selector) {
        let (Some(rel), Some(href)) = (element.value().attr("rel"), element.value().attr("href"))
        else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() {
            continue;
        }

        let rel = rel.to_ascii_lowercase();
        let mut tokens = rel.split_ascii_whitespace();
        if tokens.clone().any(|t| t == "icon") {
            return resolve_href(href, base);
        }
        if touch_icon.is_none() && tokens.any(|t| t.starts_with("apple-touch-icon")) {
            touch_icon = resolve_href(href, base);
        }
    }
    touch_icon
}

fn resolve_href(href: &str, base: &Url) -> Option<String> {
    if href.starts_with("data:") {
        return Some(href.to_string());
    }
    base.join(href).ok().map(String::from)
}

fn default_favicon_url(page: &Url) -> Option<String> {
    page.host_str()?;
    page.join("/favicon.ico").ok().map(String::from)
}
