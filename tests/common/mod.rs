//! Shared test doubles for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use linkshelf::errors::{FaviconResult, RepositoryError, RepositoryResult, ScrapeError};
use linkshelf::favicon::{
    FaviconDiscoverer, FaviconFetcher, FaviconHttpClient, FaviconPipeline, FaviconScraper,
    FaviconStorage, HttpResponse, PersistenceSink, PipelineOptions,
};
use linkshelf::models::{Bookmark, NewBookmark};
use linkshelf::repositories::BookmarkRepository;

/// Tracks how many calls are running at once and the highest value seen
#[derive(Default)]
pub struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Scraper answering from a fixed table; unknown pages are 404s
#[derive(Default)]
pub struct CountingScraper {
    answers: HashMap<String, String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: InFlight,
}

impl CountingScraper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, page_url: &str, favicon_ref: &str) -> Self {
        self.answers
            .insert(page_url.to_string(), favicon_ref.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.in_flight.peak()
    }
}

#[async_trait]
impl FaviconScraper for CountingScraper {
    async fn discover(&self, page_url: &str) -> Result<String, ScrapeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.in_flight.enter();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.leave();
        self.answers
            .get(page_url)
            .cloned()
            .ok_or_else(|| ScrapeError::Status {
                url: page_url.to_string(),
                status: 404,
            })
    }
}

/// HTTP client answering from a fixed table; unknown URLs are 404s
#[derive(Default)]
pub struct CountingHttp {
    responses: HashMap<String, (u16, Vec<u8>)>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: InFlight,
}

impl CountingHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, status: u16, body: &[u8]) -> Self {
        self.responses
            .insert(url.to_string(), (status, body.to_vec()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.in_flight.peak()
    }
}

#[async_trait]
impl FaviconHttpClient for CountingHttp {
    async fn get(&self, url: &str) -> FaviconResult<HttpResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.in_flight.enter();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.leave();
        let (status, body) = self
            .responses
            .get(url)
            .cloned()
            .unwrap_or((404, b"not found".to_vec()));
        Ok(HttpResponse {
            status,
            body: futures::stream::iter(vec![Ok(Bytes::from(body))]).boxed(),
        })
    }
}

/// In-memory repository that records every `update_one`
#[derive(Default)]
pub struct RecordingRepository {
    bookmarks: Mutex<Vec<Bookmark>>,
    updates: Mutex<Vec<Bookmark>>,
    failing_ids: Vec<i64>,
}

impl RecordingRepository {
    pub fn new(bookmarks: Vec<Bookmark>) -> Self {
        Self {
            bookmarks: Mutex::new(bookmarks),
            ..Default::default()
        }
    }

    pub fn failing_for(mut self, id: i64) -> Self {
        self.failing_ids.push(id);
        self
    }

    pub fn updates(&self) -> Vec<Bookmark> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl BookmarkRepository for RecordingRepository {
    async fn all(&self) -> RepositoryResult<Vec<Bookmark>> {
        Ok(self.bookmarks.lock().unwrap().clone())
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Bookmark>> {
        Ok(self
            .bookmarks
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.id == id)
            .cloned())
    }

    async fn insert_one(&self, bookmark: &NewBookmark) -> RepositoryResult<i64> {
        let mut bookmarks = self.bookmarks.lock().unwrap();
        let id = bookmarks.len() as i64 + 1;
        let mut stored = Bookmark::new(id, bookmark.url.clone());
        stored.favicon_url = bookmark.favicon_url.clone();
        bookmarks.push(stored);
        Ok(id)
    }

    async fn update_one(&self, bookmark: &Bookmark) -> RepositoryResult<()> {
        if self.failing_ids.contains(&bookmark.id) {
            return Err(RepositoryError::bookmark_not_found(bookmark.id));
        }
        self.updates.lock().unwrap().push(bookmark.clone());
        Ok(())
    }

    async fn count(&self) -> RepositoryResult<u64> {
        Ok(self.bookmarks.lock().unwrap().len() as u64)
    }
}

pub fn options() -> PipelineOptions {
    PipelineOptions {
        discovery_concurrency: 4,
        fetch_concurrency: 4,
        queue_capacity: 2,
        cache_url_prefix: "/cache/favicon/".to_string(),
    }
}

pub fn pipeline(
    cache_dir: &std::path::Path,
    scraper: Arc<CountingScraper>,
    http: Arc<CountingHttp>,
    repo: Arc<dyn BookmarkRepository>,
) -> FaviconPipeline {
    pipeline_with(cache_dir, scraper, http, repo, options())
}

pub fn pipeline_with(
    cache_dir: &std::path::Path,
    scraper: Arc<CountingScraper>,
    http: Arc<CountingHttp>,
    repo: Arc<dyn BookmarkRepository>,
    options: PipelineOptions,
) -> FaviconPipeline {
    FaviconPipeline::new(
        FaviconDiscoverer::new(scraper),
        PersistenceSink::new(repo),
        Arc::new(FaviconFetcher::new(FaviconStorage::new(cache_dir), http)),
        options,
    )
}

pub fn bookmark(id: i64, url: &str) -> Bookmark {
    Bookmark::new(id, url)
}
