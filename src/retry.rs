//! Fetch retries with exponential backoff
//!
//! Only the fetch step of an import task is retried, and only for transient
//! failures: timeouts, refused or dropped connections, truncated bodies and
//! HTTP 5xx/429. Every attempt writes into the same `.part` file, which is
//! discarded after each failed attempt. Tasks themselves are never re-run.
//!
//! # Example
//!
//! ```no_run
//! use somatic_etl::config::{FetchConfig, RetryConfig};
//! use somatic_etl::fetch::DefaultFetcher;
//! use somatic_etl::retry::fetch_with_retry;
//! use std::path::Path;
//!
//! # async fn example() -> somatic_etl::Result<()> {
//! let fetcher = DefaultFetcher::new(&FetchConfig::default())?;
//! let bytes = fetch_with_retry(
//!     &RetryConfig::default(),
//!     &fetcher,
//!     "https://dcc.example.org/ssm.BRCA-UK.tsv.gz",
//!     Path::new("/data/staging/brca_uk/ssm.BRCA-UK.tsv.gz.part"),
//! )
//! .await?;
//! println!("fetched {} bytes", bytes);
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::fetch::SourceFetcher;
use rand::Rng;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Classifies a fetch error as worth another attempt
///
/// Transient failures (network timeouts, server busy, connection dropped) return `true`.
/// Permanent failures (missing file, bad URL, rejected request) return `false`.
pub trait IsRetryable {
    /// Returns true if the fetch should be attempted again
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Request covers connections dropped before the response,
            // body covers connections dropped while streaming it
            Error::Network(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            Error::Http { status, .. } => *status >= 500 || *status == 429,
            Error::Truncated { .. } => true,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            Error::Fetch { .. }
            | Error::Config { .. }
            | Error::Resolution(_)
            | Error::Transform(_)
            | Error::InvalidLocation(_)
            | Error::Serialization(_)
            | Error::Other(_) => false,
        }
    }
}

/// Delay schedule between fetch attempts
///
/// Delays start at `initial_delay`, grow by `backoff_multiplier` and are capped
/// at `max_delay`. With jitter each delay is drawn from `[delay / 2, delay]`.
#[derive(Debug, Clone)]
pub struct Backoff {
    delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: bool,
    retries_left: u32,
}

impl Backoff {
    /// Schedule allowing `config.max_attempts` retries
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            delay: config.initial_delay.min(config.max_delay),
            max_delay: config.max_delay,
            multiplier: config.backoff_multiplier,
            jitter: config.jitter,
            retries_left: config.max_attempts,
        }
    }

    /// Delay before the next retry, or `None` once every retry is spent
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.retries_left == 0 {
            return None;
        }
        self.retries_left -= 1;

        let current = self.delay;
        self.delay = Duration::from_secs_f64(current.as_secs_f64() * self.multiplier)
            .min(self.max_delay);

        Some(if self.jitter {
            spread(current)
        } else {
            current
        })
    }
}

fn spread(delay: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(0.5..=1.0);
    delay.mul_f64(factor)
}

/// Fetch `location` into `partial`, retrying transient failures
///
/// Each attempt starts without a partial file: whatever a failed attempt
/// wrote is removed before backing off, and after the final failure, so an
/// `Err` never leaves `partial` behind.
///
/// # Returns
///
/// Bytes written by the successful attempt, or the last attempt's error.
pub async fn fetch_with_retry(
    config: &RetryConfig,
    fetcher: &dyn SourceFetcher,
    location: &str,
    partial: &Path,
) -> Result<u64> {
    let mut backoff = Backoff::new(config);
    let mut attempt: u32 = 1;

    loop {
        let error = match fetcher.fetch(location, partial).await {
            Ok(bytes) => {
                if attempt > 1 {
                    info!(location, attempts = attempt, bytes, "fetch succeeded after retry");
                }
                return Ok(bytes);
            }
            Err(e) => e,
        };

        discard_partial(partial).await;

        if !error.is_retryable() {
            return Err(error);
        }
        let Some(delay) = backoff.next_delay() else {
            debug!(location, attempts = attempt, error = %error, "fetch retries exhausted");
            return Err(error);
        };

        warn!(
            location,
            attempt,
            error = %error,
            delay_ms = delay.as_millis() as u64,
            "transient fetch failure, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

async fn discard_partial(partial: &Path) {
    match tokio::fs::remove_file(partial).await {
        Ok(()) => debug!(path = %partial.display(), "discarded partial file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %partial.display(), error = %e, "failed to remove partial file"),
    }
}
