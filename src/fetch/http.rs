//! HTTP(S) source fetcher

use super::SourceFetcher;
use crate::config::FetchConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Streams a remote file to disk with reqwest
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with the configured timeout and user agent
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client })
    }

    /// Download `url` into `dest`, streaming chunk by chunk
    pub async fn fetch_url(&self, url: &url::Url, dest: &Path) -> Result<u64> {
        let mut response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http {
                location: url.to_string(),
                status: status.as_u16(),
            });
        }

        let expected = response.content_length();
        let mut file = tokio::fs::File::create(dest).await?;
        let mut written: u64 = 0;

        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        if let Some(expected) = expected {
            if expected != written {
                return Err(Error::Truncated {
                    location: url.to_string(),
                    expected,
                    received: written,
                });
            }
        }

        tracing::debug!(url = %url, bytes = written, dest = %dest.display(), "fetched source");
        Ok(written)
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, location: &str, dest: &Path) -> Result<u64> {
        let url = url::Url::parse(location)
            .map_err(|e| Error::InvalidLocation(format!("{}: {}", location, e)))?;
        self.fetch_url(&url, dest).await
    }
}
