//! Materializes a favicon reference into the local cache
//!
//! A reference is either a remote URL, downloaded with a bounded timeout, or
//! an inline `data:` URI decoded in place. Either way the bytes land in
//! `<cache_dir>/<host key><ext>`, and a non-empty file already there short
//! circuits the whole operation.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, trace};

use super::cache_key::cache_file_name;
use super::http::FaviconHttpClient;
use super::locks::StripedLocks;
use super::storage::FaviconStorage;
use crate::errors::{FaviconError, FaviconResult};

pub struct FaviconFetcher {
    storage: FaviconStorage,
    http: Arc<dyn FaviconHttpClient>,
    locks: StripedLocks,
}

impl FaviconFetcher {
    pub fn new(storage: FaviconStorage, http: Arc<dyn FaviconHttpClient>) -> Self {
        Self {
            storage,
            http,
            locks: StripedLocks::default(),
        }
    }

    pub fn storage(&self) -> &FaviconStorage {
        &self.storage
    }

    /// Ensure the icon for `bookmark_url` is cached, returning its path
    ///
    /// * `Ok(None)` - `favicon_ref` was empty; nothing was attempted
    /// * `Ok(Some(path))` - the cache file exists and is non-empty
    pub async fn fetch(
        &self,
        bookmark_url: &str,
        favicon_ref: &str,
    ) -> FaviconResult<Option<PathBuf>> {
        if favicon_ref.is_empty() {
            return Ok(None);
        }

        let file_name = cache_file_name(bookmark_url, favicon_ref)?;
        let path = self.storage.path_for(&file_name);

        let _guard = self.locks.lock(&file_name).await;

        if self.storage.is_cached(&path).await {
            trace!("Favicon cache hit for {} ({})", bookmark_url, file_name);
            return Ok(Some(path));
        }

        if favicon_ref.starts_with("data:") {
            let data = decode_data_url(favicon_ref)?;
            self.storage.write_bytes(&path, &data, bookmark_url).await?;
            debug!(
                "Cached inline favicon for {} ({} bytes)",
                bookmark_url,
                data.len()
            );
        } else {
            let response = self.http.get(favicon_ref).await?;
            if response.status != 200 {
                return Err(FaviconError::NonOkStatus {
                    status: response.status,
                    url: favicon_ref.to_string(),
                });
            }
            let written = self
                .storage
                .write_stream(&path, response.body, favicon_ref)
                .await?;
            debug!(
                "Downloaded favicon {} for {} ({} bytes)",
                favicon_ref, bookmark_url, written
            );
        }

        Ok(Some(path))
    }

    /// Path of an already cached icon, without any network activity
    pub async fn cached_path(&self, bookmark_url: &str, favicon_ref: &str) -> Option<PathBuf> {
        if favicon_ref.is_empty() {
            return None;
        }
        let file_name = cache_file_name(bookmark_url, favicon_ref).ok()?;
        let path = self.storage.path_for(&file_name);
        self.storage.is_cached(&path).await.then_some(path)
    }
}

/// Decode the payload of a `data:` URI
///
/// Base64 payloads tolerate embedded whitespace; anything else is
/// percent-decoded byte for byte.
pub fn decode_data_url(data_url: &str) -> FaviconResult<Vec<u8>> {
    let (header, payload) = data_url
        .split_once(',')
        .ok_or_else(|| FaviconError::InvalidDataUrlFormat(truncate_for_log(data_url)))?;

    if header.contains("base64") {
        let compact: String = payload
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| FaviconError::Decode(e.to_string()))
    } else {
        Ok(urlencoding::decode_binary(payload.as_bytes()).into_owned())
    }
}

fn truncate_for_log(s: &str) -> String {
    const MAX: usize = 64;
    match s.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
