//! Bookmark records and their favicon state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored bookmark
///
/// `favicon_url` holds where the icon comes from (remote URL or `data:` URI);
/// `favicon_local` holds the servable path of the cached copy once the
/// favicon pipeline has materialized it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub tags: String,
    pub desc: String,
    pub favicon_url: Option<String>,
    pub favicon_local: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request for inserting a bookmark
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewBookmark {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub favicon_url: Option<String>,
}

/// Where a bookmark sits in the favicon pipeline before a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaviconState {
    /// A cached copy exists; nothing to do
    Resolved,
    /// Reference known, bytes not cached yet
    NeedsFetch,
    /// Neither reference nor cached copy
    NeedsDiscovery,
}

impl Bookmark {
    /// Build a bookmark with the given URL and no favicon data
    pub fn new(id: i64, url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            url: url.into(),
            title: String::new(),
            tags: String::new(),
            desc: String::new(),
            favicon_url: None,
            favicon_local: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Favicon reference, treating an empty string as absent
    pub fn favicon_ref(&self) -> Option<&str> {
        self.favicon_url.as_deref().filter(|s| !s.is_empty())
    }

    /// Cached favicon path, treating an empty string as absent
    pub fn favicon_local_path(&self) -> Option<&str> {
        self.favicon_local.as_deref().filter(|s| !s.is_empty())
    }

    pub fn is_resolved(&self) -> bool {
        self.favicon_local_path().is_some()
    }

    pub fn favicon_state(&self) -> FaviconState {
        if self.is_resolved() {
            FaviconState::Resolved
        } else if self.favicon_ref().is_some() {
            FaviconState::NeedsFetch
        } else {
            FaviconState::NeedsDiscovery
        }
    }
}

impl NewBookmark {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}
