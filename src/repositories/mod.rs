//! Repository layer for bookmark persistence

pub mod bookmark;
pub mod traits;

pub use bookmark::SqliteBookmarkRepository;
pub use traits::BookmarkRepository;

#[cfg(test)]
pub use traits::MockBookmarkRepository;
