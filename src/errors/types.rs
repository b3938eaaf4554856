//! Error type definitions for linkshelf
//!
//! Every favicon failure is scoped to the record that produced it; none of
//! these types abort a pipeline run.

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Database driver errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Repository layer errors
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Favicon pipeline errors
    #[error("Favicon error: {0}")]
    Favicon(#[from] FaviconError),

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Resource not found errors
    #[error("Not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },
}

/// Repository layer specific errors
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database errors from sqlx
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Record not found
    #[error("Record not found: {table} with {field} = {value}")]
    RecordNotFound {
        table: String,
        field: String,
        value: String,
    },

    /// Constraint violations (unique URL, etc.)
    #[error("Constraint violation: {constraint} - {message}")]
    ConstraintViolation { constraint: String, message: String },

    /// Stored values that cannot be mapped back to a model
    #[error("Invalid stored value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Per-record favicon acquisition errors
#[derive(Error, Debug)]
pub enum FaviconError {
    /// Inline data URI without the header/payload comma separator
    #[error("invalid data URL format: {0:?}")]
    InvalidDataUrlFormat(String),

    /// Remote host answered with something other than 200
    #[error("non-OK HTTP status {status} from {url}")]
    NonOkStatus { status: u16, url: String },

    /// Timeout, DNS, connection refused and similar
    #[error("transport error fetching {url}: {message}")]
    Transport { url: String, message: String },

    /// Bookmark URL could not be parsed into a host
    #[error("invalid bookmark URL {url:?}: {message}")]
    InvalidBookmarkUrl { url: String, message: String },

    /// base64 or percent decoding of a data URI payload failed
    #[error("failed to decode data URL payload: {0}")]
    Decode(String),

    /// Source produced zero bytes; no cache entry is kept
    #[error("empty favicon payload from {0}")]
    EmptyPayload(String),

    /// Filesystem failure while writing the cache entry
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The run was cancelled before this record finished
    #[error("favicon work cancelled")]
    Cancelled,
}

/// Failures while scraping a page for its favicon reference
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("invalid page URL {url:?}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("page request failed for {url}: {message}")]
    Request { url: String, message: String },

    #[error("page {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("no favicon found for {0}")]
    NotFound(String),
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<R: Into<String>, I: ToString>(resource: R, id: I) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.to_string(),
        }
    }
}

impl RepositoryError {
    pub fn bookmark_not_found(id: i64) -> Self {
        Self::RecordNotFound {
            table: "bookmarks".to_string(),
            field: "id".to_string(),
            value: id.to_string(),
        }
    }
}

impl FaviconError {
    /// Build a transport error from a reqwest failure, keeping the target URL
    pub fn transport(url: &str, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            url: url.to_string(),
            message: err.to_string(),
        }
    }

    /// Whether the failure came from the remote side rather than local I/O
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::NonOkStatus { .. } | Self::Transport { .. })
    }
}
