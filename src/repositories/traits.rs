//! Repository trait definitions
//!
//! The favicon pipeline only ever writes through [`BookmarkRepository::update_one`];
//! the remaining operations back the web listing and the CLI.

use async_trait::async_trait;

use crate::errors::RepositoryResult;
use crate::models::{Bookmark, NewBookmark};

/// Data access for bookmark records
///
/// # Examples
///
/// ```rust,ignore
/// async fn touch<R: BookmarkRepository>(repo: &R, id: i64) -> RepositoryResult<()> {
///     if let Some(bookmark) = repo.find_by_id(id).await? {
///         repo.update_one(&bookmark).await?;
///     }
///     Ok(())
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookmarkRepository: Send + Sync {
    /// All bookmarks, newest first
    async fn all(&self) -> RepositoryResult<Vec<Bookmark>>;

    /// Find a bookmark by its ID
    ///
    /// * `Ok(Some(Bookmark))` - found
    /// * `Ok(None)` - no such bookmark
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Bookmark>>;

    /// Insert a bookmark and return its new ID
    async fn insert_one(&self, bookmark: &NewBookmark) -> RepositoryResult<i64>;

    /// Persist the current field values of an existing bookmark
    ///
    /// Fails with `RecordNotFound` when the bookmark was deleted underneath us.
    async fn update_one(&self, bookmark: &Bookmark) -> RepositoryResult<()>;

    /// Number of stored bookmarks
    async fn count(&self) -> RepositoryResult<u64>;
}
