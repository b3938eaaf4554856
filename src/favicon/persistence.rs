use std::sync::Arc;
use tracing::debug;

use crate::errors::RepositoryResult;
use crate::models::Bookmark;
use crate::repositories::BookmarkRepository;

/// Writes discovered favicon references back to storage
///
/// The pipeline drives this from a single consumer task, so writes for one
/// run never overlap each other.
#[derive(Clone)]
pub struct PersistenceSink {
    repo: Arc<dyn BookmarkRepository>,
}

impl PersistenceSink {
    pub fn new(repo: Arc<dyn BookmarkRepository>) -> Self {
        Self { repo }
    }

    pub async fn persist(&self, bookmark: &Bookmark) -> RepositoryResult<()> {
        self.repo.update_one(bookmark).await?;
        debug!(
            "Persisted favicon reference for bookmark {} ({})",
            bookmark.id, bookmark.url
        );
        Ok(())
    }
}
