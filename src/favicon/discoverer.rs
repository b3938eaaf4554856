use std::sync::Arc;
use tracing::debug;

use super::scraper::FaviconScraper;

/// Turns scraper outcomes into an optional favicon reference
///
/// Every scraper failure means "nothing found" for the pipeline; the reason
/// is only logged.
#[derive(Clone)]
pub struct FaviconDiscoverer {
    scraper: Arc<dyn FaviconScraper>,
}

impl FaviconDiscoverer {
    pub fn new(scraper: Arc<dyn FaviconScraper>) -> Self {
        Self { scraper }
    }

    pub async fn discover(&self, bookmark_url: &str) -> Option<String> {
        match self.scraper.discover(bookmark_url).await {
            Ok(found) if !found.trim().is_empty() => Some(found.trim().to_string()),
            Ok(_) => {
                debug!("Scraper returned an empty favicon reference for {}", bookmark_url);
                None
            }
            Err(e) => {
                debug!("Favicon discovery failed for {}: {}", bookmark_url, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ScrapeError;
    use async_trait::async_trait;
    use tracing_test::traced_test;

    struct Fixed(Result<&'static str, u16>);

    #[async_trait]
    impl FaviconScraper for Fixed {
        async fn discover(&self, page_url: &str) -> Result<String, ScrapeError> {
            self.0.map(str::to_string).map_err(|status| ScrapeError::Status {
                url: page_url.to_string(),
                status,
            })
        }
    }

    #[tokio::test]
    async fn test_found_reference_is_returned() {
        let d = FaviconDiscoverer::new(Arc::new(Fixed(Ok(" https://example.com/f.ico "))));
        assert_eq!(
            d.discover("https://example.com").await.as_deref(),
            Some("https://example.com/f.ico")
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failures_and_blanks_are_absent() {
        let failing = FaviconDiscoverer::new(Arc::new(Fixed(Err(503))));
        assert!(failing.discover("https://example.com").await.is_none());
        assert!(logs_contain("Favicon discovery failed for https://example.com"));

        let blank = FaviconDiscoverer::new(Arc::new(Fixed(Ok("   "))));
        assert!(blank.discover("https://example.com").await.is_none());
    }
}
