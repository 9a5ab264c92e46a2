//! Configuration types for somatic-etl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Source fetching settings
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Timeout for a single HTTP fetch, in seconds on the wire (default: 300)
    #[serde(default = "default_fetch_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// User-Agent header sent with HTTP requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: default_fetch_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Retry configuration for transient fetch failures
///
/// Retries happen inside a task's fetch step only. A task that still fails
/// afterwards is final for the run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Main configuration for an [`Orchestrator`](crate::Orchestrator)
///
/// Supplied at construction; nothing is discovered at runtime.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Base directory under which each study gets its staging directory
    /// (default: "./staging")
    #[serde(default = "default_base_staging_path")]
    pub base_staging_path: PathBuf,

    /// Number of tasks allowed to run concurrently (default: 4)
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Source fetching settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Retry settings for transient fetch failures
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_staging_path: default_base_staging_path(),
            worker_count: default_worker_count(),
            fetch: FetchConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Create a config with the given staging base and default settings otherwise
    pub fn with_staging_path(base_staging_path: impl Into<PathBuf>) -> Self {
        Self {
            base_staging_path: base_staging_path.into(),
            ..Default::default()
        }
    }

    /// Check the configuration for values the orchestrator cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(Error::Config {
                message: "worker_count must be at least 1".to_string(),
                key: Some("worker_count".to_string()),
            });
        }

        if self.base_staging_path.as_os_str().is_empty() {
            return Err(Error::Config {
                message: "base_staging_path must not be empty".to_string(),
                key: Some("base_staging_path".to_string()),
            });
        }

        if self.fetch.timeout.is_zero() {
            return Err(Error::Config {
                message: "fetch timeout must be greater than zero".to_string(),
                key: Some("fetch.timeout".to_string()),
            });
        }

        if self.retry.backoff_multiplier < 1.0 {
            return Err(Error::Config {
                message: format!(
                    "backoff_multiplier must be >= 1.0, got {}",
                    self.retry.backoff_multiplier
                ),
                key: Some("retry.backoff_multiplier".to_string()),
            });
        }

        Ok(())
    }
}

fn default_base_staging_path() -> PathBuf {
    PathBuf::from("./staging")
}

fn default_worker_count() -> usize {
    4
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_user_agent() -> String {
    concat!("somatic-etl/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
