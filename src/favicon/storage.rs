use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::errors::{FaviconError, FaviconResult};

/// On-disk favicon cache directory
///
/// A file that exists with non-zero size is a completed download. Writes go
/// to a `.part` sibling that is renamed into place only once the payload is
/// complete, and removed again on any failure.
#[derive(Debug, Clone)]
pub struct FaviconStorage {
    dir: PathBuf,
}

impl FaviconStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> Result<(), std::io::Error> {
        if !fs::try_exists(&self.dir).await.unwrap_or(false) {
            fs::create_dir_all(&self.dir).await?;
            debug!("Created favicon cache directory {}", self.dir.display());
        }
        Ok(())
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// True when `path` is a regular file with at least one byte
    pub async fn is_cached(&self, path: &Path) -> bool {
        match fs::metadata(path).await {
            Ok(meta) => meta.is_file() && meta.len() > 0,
            Err(_) => false,
        }
    }

    /// Write a fully decoded payload
    pub async fn write_bytes(&self, path: &Path, data: &[u8], source: &str) -> FaviconResult<()> {
        if data.is_empty() {
            return Err(FaviconError::EmptyPayload(source.to_string()));
        }

        self.ensure_dir().await?;
        let partial = PartialFile::for_target(path);
        fs::write(partial.path(), data).await?;
        partial.commit(path).await?;
        Ok(())
    }

    /// Stream a response body into `path`, returning the number of bytes written
    ///
    /// Nothing appears at `path` unless the whole body arrived. The partial
    /// file is removed if the body fails, turns out empty, or the future is
    /// dropped before completion.
    pub async fn write_stream<S>(&self, path: &Path, mut body: S, source: &str) -> FaviconResult<u64>
    where
        S: Stream<Item = FaviconResult<Bytes>> + Unpin,
    {
        self.ensure_dir().await?;
        let partial = PartialFile::for_target(path);
        let mut file = fs::File::create(partial.path()).await?;

        let mut written: u64 = 0;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        if written == 0 {
            return Err(FaviconError::EmptyPayload(source.to_string()));
        }
        partial.commit(path).await?;
        Ok(written)
    }
}

/// `<path>.part`, where in-progress writes land
fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Removes the partial file on drop unless it was committed
struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    fn for_target(target: &Path) -> Self {
        Self {
            path: partial_path(target),
            armed: true,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn commit(mut self, target: &Path) -> std::io::Result<()> {
        fs::rename(&self.path, target).await?;
        self.armed = false;
        Ok(())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed partial favicon {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove partial favicon {}: {}", self.path.display(), e),
        }
    }
}
