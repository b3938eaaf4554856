//! Centralized error handling for linkshelf
//!
//! Errors are grouped by the layer that produces them and converge into
//! [`AppError`] at the web and CLI boundaries.
//!
//! # Error Categories
//!
//! - **Repository Errors**: SQLite access for bookmark records
//! - **Favicon Errors**: per-record failures inside the favicon pipeline
//! - **Scrape Errors**: page fetch and parse failures during favicon discovery
//!
//! # Usage
//!
//! ```rust
//! use linkshelf::errors::{AppError, AppResult};
//!
//! async fn example_function() -> AppResult<String> {
//!     Ok("success".to_string())
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for Repository Results
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Convenience type alias for favicon pipeline Results
pub type FaviconResult<T> = Result<T, FaviconError>;
