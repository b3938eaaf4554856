//! Cache filenames for favicons
//!
//! Icons are keyed by the bookmark's host rather than its full URL, so every
//! page bookmarked on a site shares a single cached file.

use sha2::{Digest, Sha256};
use std::path::Path;
use url::Url;

use crate::errors::{FaviconError, FaviconResult};

/// Number of hex characters kept from the host digest
pub const CACHE_KEY_LEN: usize = 12;

/// Extension used when neither the media type nor the URL suffix tells us better
pub const DEFAULT_EXTENSION: &str = ".ico";

/// Hash the host (and explicit non-default port) of `bookmark_url`
pub fn resolve_cache_key(bookmark_url: &str) -> FaviconResult<String> {
    let parsed = Url::parse(bookmark_url).map_err(|e| FaviconError::InvalidBookmarkUrl {
        url: bookmark_url.to_string(),
        message: e.to_string(),
    })?;

    let host = parsed
        .host_str()
        .ok_or_else(|| FaviconError::InvalidBookmarkUrl {
            url: bookmark_url.to_string(),
            message: "URL has no host".to_string(),
        })?;

    let host_key = match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    let digest = Sha256::digest(host_key.as_bytes());
    let mut key = hex::encode(digest);
    key.truncate(CACHE_KEY_LEN);
    Ok(key)
}

/// Pick the cache file extension (with leading dot) for a favicon reference
pub fn extension_for(favicon_ref: &str) -> String {
    if favicon_ref.starts_with("data:") {
        let header = favicon_ref
            .split_once(',')
            .map(|(header, _)| header)
            .unwrap_or(favicon_ref);
        return extension_for_media_type(header).to_string();
    }

    Url::parse(favicon_ref)
        .ok()
        .and_then(|url| {
            url.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .and_then(|last| extension_from_file_name(&last))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

/// Full cache filename, `<key><ext>`
pub fn cache_file_name(bookmark_url: &str, favicon_ref: &str) -> FaviconResult<String> {
    let key = resolve_cache_key(bookmark_url)?;
    Ok(format!("{}{}", key, extension_for(favicon_ref)))
}

fn extension_for_media_type(header: &str) -> &'static str {
    let header = header.to_ascii_lowercase();
    let has = |needle: &str| header.contains(needle);

    if has("image/png") {
        ".png"
    } else if has("image/jpeg") || has("image/jpg") {
        ".jpg"
    } else if has("image/gif") {
        ".gif"
    } else if has("image/svg") {
        ".svg"
    } else if has("image/webp") {
        ".webp"
    } else {
        DEFAULT_EXTENSION
    }
}

// Suffixes of 1-4 characters are kept; only ASCII alphanumerics reach the filesystem
fn extension_from_file_name(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?;
    if ext.is_empty() || ext.len() > 4 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(format!(".{}", ext.to_ascii_lowercase()))
}
