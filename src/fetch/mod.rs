//! Source fetching
//!
//! A [`SourceFetcher`] copies a study's source file into the staging area.
//! [`DefaultFetcher`] picks the transport from the location's scheme:
//! - `http://` / `https://` - [`HttpFetcher`]
//! - `file://` or a plain filesystem path - [`LocalFileFetcher`]

use crate::config::FetchConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

mod http;
mod local;

pub use http::HttpFetcher;
pub use local::LocalFileFetcher;

/// Retrieves a source location into a destination file
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Write the content of `location` to `dest`, replacing any existing file
    ///
    /// # Returns
    ///
    /// Number of bytes written.
    ///
    /// # Errors
    ///
    /// Transient failures should map to errors for which
    /// [`IsRetryable`](crate::retry::IsRetryable) returns `true`; the worker
    /// retries those before failing the task.
    async fn fetch(&self, location: &str, dest: &Path) -> Result<u64>;
}

/// Where a source location points to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// Remote file reachable over HTTP(S)
    Http(url::Url),
    /// File on a local or mounted filesystem
    Local(PathBuf),
}

impl SourceKind {
    /// Classify a source location
    pub fn parse(location: &str) -> Result<Self> {
        match url::Url::parse(location) {
            Ok(url) => match url.scheme() {
                "http" | "https" => Ok(SourceKind::Http(url)),
                "file" => url.to_file_path().map(SourceKind::Local).map_err(|_| {
                    Error::InvalidLocation(format!("not a local file URL: {}", location))
                }),
                // Single-letter schemes are Windows drive letters
                scheme if scheme.len() == 1 => Ok(SourceKind::Local(PathBuf::from(location))),
                scheme => Err(Error::InvalidLocation(format!(
                    "unsupported scheme '{}' in {}",
                    scheme, location
                ))),
            },
            Err(url::ParseError::RelativeUrlWithoutBase) if !location.trim().is_empty() => {
                Ok(SourceKind::Local(PathBuf::from(location)))
            }
            Err(e) => Err(Error::InvalidLocation(format!("{}: {}", location, e))),
        }
    }
}

/// Fetcher that dispatches on the location's scheme
#[derive(Debug, Clone)]
pub struct DefaultFetcher {
    http: HttpFetcher,
    local: LocalFileFetcher,
}

impl DefaultFetcher {
    /// Build the default fetcher from fetch settings
    pub fn new(config: &FetchConfig) -> Result<Self> {
        Ok(Self {
            http: HttpFetcher::new(config)?,
            local: LocalFileFetcher,
        })
    }
}

#[async_trait]
impl SourceFetcher for DefaultFetcher {
    async fn fetch(&self, location: &str, dest: &Path) -> Result<u64> {
        match SourceKind::parse(location)? {
            SourceKind::Http(url) => self.http.fetch_url(&url, dest).await,
            SourceKind::Local(path) => self.local.copy_file(&path, dest).await,
        }
    }
}
