//! Favicon pipeline coordinator
//!
//! A run takes one page of bookmarks and pushes each unresolved record through
//! up to three stages:
//!
//! ```text
//!   no ref ──> discovery (N) ──> persistence (1) ──┐
//!                                                  ├──> fetch (M) ──> cache dir
//!   ref, no local copy ────────────────────────────┘
//! ```
//!
//! Stages are connected by bounded channels so a slow fetch stage pushes back
//! on discovery. The persistence stage is a single task, which keeps repository
//! writes for a run strictly sequential. Every per-record failure is logged and
//! the record is dropped from the remaining stages; the run itself never fails.
//!
//! Stage tasks never touch the caller's records. They report [`StageOutcome`]s
//! over an unbounded channel and the coordinator applies those to the slice.
//! That channel closing is the signal that every stage has drained.

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::discoverer::FaviconDiscoverer;
use super::fetcher::FaviconFetcher;
use super::http::ReqwestFaviconClient;
use super::persistence::PersistenceSink;
use super::scraper::HtmlFaviconScraper;
use super::storage::FaviconStorage;
use crate::config::{Config, FaviconConfig};
use crate::errors::{FaviconError, FaviconResult};
use crate::models::{Bookmark, FaviconState};
use crate::repositories::BookmarkRepository;

/// Concurrency and output settings for a pipeline
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub discovery_concurrency: usize,
    pub fetch_concurrency: usize,
    pub queue_capacity: usize,
    /// Prepended to the cache filename to form `favicon_local`
    pub cache_url_prefix: String,
}

impl From<&FaviconConfig> for PipelineOptions {
    fn from(config: &FaviconConfig) -> Self {
        Self {
            discovery_concurrency: config.discovery_concurrency,
            fetch_concurrency: config.fetch_concurrency,
            queue_capacity: config.queue_capacity,
            cache_url_prefix: config.cache_url_prefix.clone(),
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from(&FaviconConfig::default())
    }
}

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub total: usize,
    pub already_resolved: usize,
    pub queued_for_discovery: usize,
    pub queued_for_fetch: usize,
    pub discovered: usize,
    pub discovery_failed: usize,
    pub persisted: usize,
    pub persist_failed: usize,
    pub fetched: usize,
    pub fetch_failed: usize,
    pub cancelled: bool,
}

#[derive(Debug)]
enum StageOutcome {
    Discovered { index: usize, favicon_url: String },
    DiscoveryFailed { index: usize },
    Persisted { index: usize },
    PersistFailed { index: usize },
    Fetched { index: usize, file_name: String },
    FetchFailed { index: usize },
}

#[derive(Debug)]
struct FetchJob {
    index: usize,
    bookmark_url: String,
    favicon_ref: String,
}

#[derive(Clone)]
pub struct FaviconPipeline {
    discoverer: FaviconDiscoverer,
    sink: PersistenceSink,
    fetcher: Arc<FaviconFetcher>,
    options: PipelineOptions,
}

impl FaviconPipeline {
    pub fn new(
        discoverer: FaviconDiscoverer,
        sink: PersistenceSink,
        fetcher: Arc<FaviconFetcher>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            discoverer,
            sink,
            fetcher,
            options,
        }
    }

    /// Wire the production pipeline: HTML scraping, SQLite persistence and
    /// reqwest downloads into `<cache_path>/favicon`
    pub fn from_config(
        config: &Config,
        repo: Arc<dyn BookmarkRepository>,
    ) -> FaviconResult<Self> {
        let favicon = &config.favicon;
        let scraper = HtmlFaviconScraper::new(favicon.scrape_timeout, &favicon.user_agent)?;
        let http = ReqwestFaviconClient::new(favicon.fetch_timeout, &favicon.user_agent)?;
        let storage = FaviconStorage::new(config.storage.favicon_dir());

        Ok(Self::new(
            FaviconDiscoverer::new(Arc::new(scraper)),
            PersistenceSink::new(repo),
            Arc::new(FaviconFetcher::new(storage, Arc::new(http))),
            PipelineOptions::from(favicon),
        ))
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn fetcher(&self) -> &FaviconFetcher {
        &self.fetcher
    }

    /// Servable path for a cache filename
    pub fn local_path_for(&self, file_name: &str) -> String {
        format!("{}{}", self.options.cache_url_prefix, file_name)
    }

    /// Fill `favicon_local` for records whose icon is already on disk
    ///
    /// Touches only the filesystem, so it is safe to call on the request path
    /// before handing the page to [`FaviconPipeline::run`].
    pub async fn annotate_cached(&self, records: &mut [Bookmark]) -> usize {
        let mut resolved = 0;
        for bookmark in records.iter_mut().filter(|b| !b.is_resolved()) {
            let Some(favicon_ref) = bookmark.favicon_ref() else {
                continue;
            };
            let Some(path) = self.fetcher.cached_path(&bookmark.url, favicon_ref).await else {
                continue;
            };
            if let Some(file_name) = file_name_of(&path) {
                bookmark.favicon_local = Some(self.local_path_for(file_name));
                resolved += 1;
            }
        }
        resolved
    }

    pub async fn run(&self, records: &mut [Bookmark]) -> PipelineReport {
        self.run_with_cancellation(records, CancellationToken::new())
            .await
    }

    /// Run every stage to completion or until `token` is cancelled
    ///
    /// On cancellation, in-flight scrapes and downloads are abandoned and
    /// queued work is dropped. Partially written cache files are removed.
    pub async fn run_with_cancellation(
        &self,
        records: &mut [Bookmark],
        token: CancellationToken,
    ) -> PipelineReport {
        let started = Instant::now();
        let mut report = PipelineReport {
            total: records.len(),
            ..Default::default()
        };

        let mut discovery_jobs = Vec::new();
        let mut fetch_jobs = Vec::new();
        for (index, bookmark) in records.iter().enumerate() {
            match (bookmark.favicon_state(), bookmark.favicon_ref()) {
                (FaviconState::Resolved, _) => report.already_resolved += 1,
                (FaviconState::NeedsFetch, Some(favicon_ref)) => fetch_jobs.push(FetchJob {
                    index,
                    bookmark_url: bookmark.url.clone(),
                    favicon_ref: favicon_ref.to_string(),
                }),
                _ => discovery_jobs.push((index, bookmark.clone())),
            }
        }
        report.queued_for_discovery = discovery_jobs.len();
        report.queued_for_fetch = fetch_jobs.len();

        if discovery_jobs.is_empty() && fetch_jobs.is_empty() {
            trace!("All {} bookmarks already have cached favicons", records.len());
            return report;
        }

        let capacity = self.options.queue_capacity.max(1);
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
        let (persist_tx, persist_rx) = mpsc::channel(capacity);
        let (fetch_tx, fetch_rx) = mpsc::channel(capacity);

        let fetch_stage = tokio::spawn(run_fetch_stage(
            self.fetcher.clone(),
            fetch_rx,
            outcome_tx.clone(),
            self.options.fetch_concurrency,
            token.clone(),
        ));
        let persist_stage = tokio::spawn(run_persist_stage(
            self.sink.clone(),
            persist_rx,
            fetch_tx.clone(),
            outcome_tx.clone(),
            token.clone(),
        ));
        let discovery_stage = tokio::spawn(run_discovery_stage(
            self.discoverer.clone(),
            discovery_jobs,
            persist_tx,
            outcome_tx.clone(),
            self.options.discovery_concurrency,
            token.clone(),
        ));
        let direct_feed = tokio::spawn(feed_fetch_jobs(fetch_jobs, fetch_tx, token.clone()));
        drop(outcome_tx);

        while let Some(outcome) = outcome_rx.recv().await {
            self.apply(records, &mut report, outcome);
        }

        for (stage, handle) in [
            ("discovery", discovery_stage),
            ("persistence", persist_stage),
            ("direct fetch feed", direct_feed),
            ("fetch", fetch_stage),
        ] {
            if let Err(e) = handle.await {
                error!("Favicon {} stage terminated abnormally: {}", stage, e);
            }
        }

        report.cancelled = token.is_cancelled();
        info!(
            "Favicon pipeline finished in {}ms: {} records, {} discovered, {} persisted, {} fetched, {} failed{}",
            started.elapsed().as_millis(),
            report.total,
            report.discovered,
            report.persisted,
            report.fetched,
            report.discovery_failed + report.persist_failed + report.fetch_failed,
            if report.cancelled { " (cancelled)" } else { "" }
        );
        report
    }

    fn apply(&self, records: &mut [Bookmark], report: &mut PipelineReport, outcome: StageOutcome) {
        match outcome {
            StageOutcome::Discovered { index, favicon_url } => {
                report.discovered += 1;
                if let Some(bookmark) = records.get_mut(index) {
                    bookmark.favicon_url = Some(favicon_url);
                }
            }
            StageOutcome::DiscoveryFailed { index } => {
                report.discovery_failed += 1;
                trace!("No favicon discovered for record {}", index);
            }
            StageOutcome::Persisted { index } => {
                report.persisted += 1;
                trace!("Favicon reference stored for record {}", index);
            }
            StageOutcome::PersistFailed { index } => {
                report.persist_failed += 1;
                trace!("Record {} dropped after persistence failure", index);
            }
            StageOutcome::Fetched { index, file_name } => {
                report.fetched += 1;
                if let Some(bookmark) = records.get_mut(index) {
                    bookmark.favicon_local = Some(self.local_path_for(&file_name));
                }
            }
            StageOutcome::FetchFailed { index } => {
                report.fetch_failed += 1;
                trace!("Favicon fetch failed for record {}", index);
            }
        }
    }
}

fn file_name_of(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

fn log_task_result(stage: &str, result: Result<(), JoinError>) {
    if let Err(e) = result {
        error!("Favicon {} task failed: {}", stage, e);
    }
}

fn reap_finished(tasks: &mut JoinSet<()>, stage: &str) {
    while let Some(result) = tasks.try_join_next() {
        log_task_result(stage, result);
    }
}

async fn run_discovery_stage(
    discoverer: FaviconDiscoverer,
    jobs: Vec<(usize, Bookmark)>,
    persist: mpsc::Sender<(usize, Bookmark)>,
    outcomes: mpsc::UnboundedSender<StageOutcome>,
    concurrency: usize,
    token: CancellationToken,
) {
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for (index, mut bookmark) in jobs {
        let permit = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            permit = permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let discoverer = discoverer.clone();
        let persist = persist.clone();
        let outcomes = outcomes.clone();
        let token = token.clone();
        tasks.spawn(async move {
            let _permit = permit;
            let found = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                found = discoverer.discover(&bookmark.url) => found,
            };

            let Some(favicon_url) = found else {
                let _ = outcomes.send(StageOutcome::DiscoveryFailed { index });
                return;
            };

            let _ = outcomes.send(StageOutcome::Discovered {
                index,
                favicon_url: favicon_url.clone(),
            });
            bookmark.favicon_url = Some(favicon_url);

            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = persist.send((index, bookmark)) => {}
            }
        });
        reap_finished(&mut tasks, "discovery");
    }

    drop(persist);
    while let Some(result) = tasks.join_next().await {
        log_task_result("discovery", result);
    }
}

async fn run_persist_stage(
    sink: PersistenceSink,
    mut records: mpsc::Receiver<(usize, Bookmark)>,
    fetch_jobs: mpsc::Sender<FetchJob>,
    outcomes: mpsc::UnboundedSender<StageOutcome>,
    token: CancellationToken,
) {
    loop {
        let (index, bookmark) = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            next = records.recv() => match next {
                Some(next) => next,
                None => break,
            },
        };

        let Some(favicon_ref) = bookmark.favicon_ref().map(str::to_string) else {
            continue;
        };

        if let Err(e) = sink.persist(&bookmark).await {
            error!(
                "Failed to persist favicon reference for bookmark {} ({}): {}",
                bookmark.id, bookmark.url, e
            );
            let _ = outcomes.send(StageOutcome::PersistFailed { index });
            continue;
        }
        let _ = outcomes.send(StageOutcome::Persisted { index });

        let job = FetchJob {
            index,
            bookmark_url: bookmark.url,
            favicon_ref,
        };
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            sent = fetch_jobs.send(job) => if sent.is_err() { break },
        }
    }
}

async fn feed_fetch_jobs(
    jobs: Vec<FetchJob>,
    fetch_jobs: mpsc::Sender<FetchJob>,
    token: CancellationToken,
) {
    for job in jobs {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            sent = fetch_jobs.send(job) => if sent.is_err() { break },
        }
    }
}

async fn run_fetch_stage(
    fetcher: Arc<FaviconFetcher>,
    mut jobs: mpsc::Receiver<FetchJob>,
    outcomes: mpsc::UnboundedSender<StageOutcome>,
    concurrency: usize,
    token: CancellationToken,
) {
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    loop {
        let job = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            job = jobs.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };
        let permit = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            permit = permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let fetcher = fetcher.clone();
        let outcomes = outcomes.clone();
        let token = token.clone();
        tasks.spawn(async move {
            let _permit = permit;
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => Err(FaviconError::Cancelled),
                result = fetcher.fetch(&job.bookmark_url, &job.favicon_ref) => result,
            };

            let outcome = match result {
                Ok(Some(path)) => match file_name_of(&path) {
                    Some(file_name) => StageOutcome::Fetched {
                        index: job.index,
                        file_name: file_name.to_string(),
                    },
                    None => {
                        error!("Cached favicon path {} has no file name", path.display());
                        StageOutcome::FetchFailed { index: job.index }
                    }
                },
                Ok(None) => return,
                Err(FaviconError::Cancelled) => {
                    debug!("Favicon fetch for {} cancelled", job.bookmark_url);
                    return;
                }
                Err(e) if e.is_remote() => {
                    warn!(
                        "Failed to fetch favicon {} for {}: {}",
                        job.favicon_ref, job.bookmark_url, e
                    );
                    StageOutcome::FetchFailed { index: job.index }
                }
                Err(e) => {
                    error!(
                        "Failed to cache favicon {} for {}: {}",
                        job.favicon_ref, job.bookmark_url, e
                    );
                    StageOutcome::FetchFailed { index: job.index }
                }
            };
            let _ = outcomes.send(outcome);
        });
        reap_finished(&mut tasks, "fetch");
    }

    while let Some(result) = tasks.join_next().await {
        log_task_result("fetch", result);
    }
}
