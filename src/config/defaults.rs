/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Database defaults
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./data/linkshelf.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_BUSY_TIMEOUT: &str = "5s";

// Web server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_ITEMS_PER_PAGE: u32 = 32;

// Storage defaults
pub const DEFAULT_CACHE_PATH: &str = "./data/cache";
pub const FAVICON_CACHE_SUBDIR: &str = "favicon";

// Favicon pipeline defaults
pub const DEFAULT_CACHE_URL_PREFIX: &str = "/cache/favicon/";
pub const DEFAULT_FETCH_TIMEOUT: &str = "5s";
pub const DEFAULT_SCRAPE_TIMEOUT: &str = "10s";
pub const DEFAULT_DISCOVERY_CONCURRENCY: usize = 8;
pub const DEFAULT_FETCH_CONCURRENCY: usize = 8;
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0";
