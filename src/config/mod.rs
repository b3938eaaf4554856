use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use defaults::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub favicon: FaviconConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_busy_timeout", with = "duration_serde::duration")]
    pub busy_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_items_per_page")]
    pub items_per_page: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root of the on-disk cache; favicons live in `<cache_path>/favicon`
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
}

/// Favicon pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaviconConfig {
    /// URL prefix the static handler serves cached icons under
    #[serde(default = "default_cache_url_prefix")]
    pub cache_url_prefix: String,
    /// Timeout for a single favicon download
    #[serde(default = "default_fetch_timeout", with = "duration_serde::duration")]
    pub fetch_timeout: Duration,
    /// Timeout for fetching a bookmarked page during discovery
    #[serde(default = "default_scrape_timeout", with = "duration_serde::duration")]
    pub scrape_timeout: Duration,
    /// Maximum in-flight discovery tasks per run
    #[serde(default = "default_discovery_concurrency")]
    pub discovery_concurrency: usize,
    /// Maximum in-flight fetch tasks per run
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
    /// Capacity of the channels connecting pipeline stages
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

fn default_busy_timeout() -> Duration {
    humantime::parse_duration(DEFAULT_BUSY_TIMEOUT).unwrap_or(Duration::from_secs(5))
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_items_per_page() -> u32 {
    DEFAULT_ITEMS_PER_PAGE
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_PATH)
}

fn default_cache_url_prefix() -> String {
    DEFAULT_CACHE_URL_PREFIX.to_string()
}

fn default_fetch_timeout() -> Duration {
    humantime::parse_duration(DEFAULT_FETCH_TIMEOUT).unwrap_or(Duration::from_secs(5))
}

fn default_scrape_timeout() -> Duration {
    humantime::parse_duration(DEFAULT_SCRAPE_TIMEOUT).unwrap_or(Duration::from_secs(10))
}

fn default_discovery_concurrency() -> usize {
    DEFAULT_DISCOVERY_CONCURRENCY
}

fn default_fetch_concurrency() -> usize {
    DEFAULT_FETCH_CONCURRENCY
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            busy_timeout: default_busy_timeout(),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            items_per_page: default_items_per_page(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_path: default_cache_path(),
        }
    }
}

impl Default for FaviconConfig {
    fn default() -> Self {
        Self {
            cache_url_prefix: default_cache_url_prefix(),
            fetch_timeout: default_fetch_timeout(),
            scrape_timeout: default_scrape_timeout(),
            discovery_concurrency: default_discovery_concurrency(),
            fetch_concurrency: default_fetch_concurrency(),
            queue_capacity: default_queue_capacity(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            web: WebConfig::default(),
            storage: StorageConfig::default(),
            favicon: FaviconConfig::default(),
        }
    }
}

impl StorageConfig {
    /// Directory holding cached favicon files
    pub fn favicon_dir(&self) -> PathBuf {
        self.cache_path.join(FAVICON_CACHE_SUBDIR)
    }
}

impl Config {
    /// Load `config_file`, writing a default one first if it does not exist
    pub fn load_from_file(config_file: &str) -> Result<Self> {
        let config: Self = if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            toml::from_str(&contents)?
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
            default_config
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.favicon.discovery_concurrency == 0 || self.favicon.fetch_concurrency == 0 {
            anyhow::bail!("favicon concurrency limits must be at least 1");
        }
        if self.favicon.queue_capacity == 0 {
            anyhow::bail!("favicon.queue_capacity must be at least 1");
        }
        if !self.favicon.cache_url_prefix.starts_with('/')
            || !self.favicon.cache_url_prefix.ends_with('/')
        {
            anyhow::bail!(
                "favicon.cache_url_prefix must start and end with '/', got {:?}",
                self.favicon.cache_url_prefix
            );
        }
        Ok(())
    }
}
