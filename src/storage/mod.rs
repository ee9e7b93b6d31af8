//! Retrieval of confirmed resources to disk.
//!
//! The engine hands an open response and a suggested file name to a
//! [`FileStore`] and folds the result into the outcome's comment.

mod filename;

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;
use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};

pub use filename::{
    candidate_paths, filename_from_disposition, filename_from_url, sanitize_filename,
    suggested_filename,
};

/// Retrieval failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Creating or writing the file failed.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Reading the response body failed.
    #[error("network error reading {url}: {source}")]
    Network {
        /// URL being read.
        url: String,
        /// Underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The body grew past the size limit.
    #[error("{url} exceeded the size limit of {limit} bytes")]
    TooLarge {
        /// URL being read.
        url: String,
        /// Configured limit.
        limit: u64,
    },
}

impl StoreError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Destination for retrieved resources.
#[async_trait]
pub trait FileStore: Send + Sync + std::fmt::Debug {
    /// Streams `response` into storage under a name derived from `hint`.
    /// Returns where it was stored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if reading or writing fails.
    async fn store(&self, response: reqwest::Response, hint: &str) -> Result<PathBuf, StoreError>;
}

/// [`FileStore`] writing into one directory.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    dir: PathBuf,
    max_bytes: u64,
}

impl DirectoryStore {
    /// Creates a store for `dir` with a per-file size limit.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }

    /// Target directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl FileStore for DirectoryStore {
    #[instrument(skip(self, response), fields(url = %response.url()))]
    async fn store(&self, response: reqwest::Response, hint: &str) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?;

        let (path, file) = create_unique(&self.dir, hint).await?;
        let url = response.url().to_string();

        match stream_to_file(file, response, &url, &path, self.max_bytes).await {
            Ok(bytes) => {
                info!(path = %path.display(), bytes, "resource stored");
                Ok(path)
            }
            Err(error) => {
                if let Err(e) = fs::remove_file(&path).await {
                    warn!(path = %path.display(), error = %e, "failed to remove partial file");
                }
                Err(error)
            }
        }
    }
}

/// Claims the first free name for `hint` in `dir` by exclusive creation,
/// so concurrent stores with the same hint never share a file.
async fn create_unique(dir: &Path, hint: &str) -> Result<(PathBuf, File), StoreError> {
    let mut taken = None;
    for path in candidate_paths(dir, hint) {
        match OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => taken = Some(path),
            Err(e) => return Err(StoreError::io(path, e)),
        }
    }
    Err(StoreError::io(
        taken.unwrap_or_else(|| dir.join(hint)),
        io::Error::new(io::ErrorKind::AlreadyExists, "no free file name left"),
    ))
}

async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &str,
    path: &Path,
    max_bytes: u64,
) -> Result<u64, StoreError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|source| StoreError::Network {
            url: url.to_string(),
            source,
        })?;
        written += chunk.len() as u64;
        if written > max_bytes {
            debug!(url, written, max_bytes, "size limit exceeded while streaming");
            return Err(StoreError::TooLarge {
                url: url.to_string(),
                limit: max_bytes,
            });
        }
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| StoreError::io(path, e))?;
    }

    writer.flush().await.map_err(|e| StoreError::io(path, e))?;
    Ok(written)
}
