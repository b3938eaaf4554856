//! Favicon acquisition and caching
//!
//! Bookmarks arrive with a remote favicon URL, an inline `data:` URI, or
//! nothing at all. The [`FaviconPipeline`] discovers missing references,
//! writes them back through the repository, and materializes the bytes into
//! a host-keyed cache directory served under the configured URL prefix.

pub mod cache_key;
pub mod discoverer;
pub mod fetcher;
pub mod http;
pub mod locks;
pub mod persistence;
pub mod pipeline;
pub mod scraper;
pub mod storage;

pub use cache_key::{cache_file_name, extension_for, resolve_cache_key};
pub use discoverer::FaviconDiscoverer;
pub use fetcher::{FaviconFetcher, decode_data_url};
pub use http::{FaviconHttpClient, HttpResponse, ReqwestFaviconClient};
pub use persistence::PersistenceSink;
pub use pipeline::{FaviconPipeline, PipelineOptions, PipelineReport};
pub use scraper::{FaviconScraper, HtmlFaviconScraper};
pub use storage::FaviconStorage;
