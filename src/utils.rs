//! Utility functions for staging paths and staged files

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncReadExt;

/// File name used when a source location has no usable final segment
pub const FALLBACK_FILE_NAME: &str = "source.dat";

/// Suffix of a file that is still being fetched
pub const PARTIAL_SUFFIX: &str = ".part";

const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Derive the staged file name from a source location
///
/// Uses the last path segment of a URL or filesystem path. Characters outside
/// `[A-Za-z0-9._-]` are replaced with `_` so the name is safe on every platform.
///
/// # Examples
///
/// ```
/// use somatic_etl::utils::staged_file_name;
///
/// assert_eq!(
///     staged_file_name("https://dcc.example.org/api/v1/simple_somatic_mutation.open.BRCA-UK.tsv.gz"),
///     "simple_somatic_mutation.open.BRCA-UK.tsv.gz"
/// );
/// assert_eq!(staged_file_name("/mnt/icgc/ssm.tsv"), "ssm.tsv");
/// ```
pub fn staged_file_name(location: &str) -> String {
    let raw = match url::Url::parse(location) {
        Ok(url) if url.scheme().len() > 1 => url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
            .map(|s| s.to_string()),
        _ => Path::new(location)
            .file_name()
            .and_then(|name| name.to_str())
            .map(|s| s.to_string()),
    };

    let sanitized: String = raw
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        FALLBACK_FILE_NAME.to_string()
    } else {
        sanitized
    }
}

/// Path of the in-flight file for `staged_file`
pub fn partial_path(staged_file: &Path) -> PathBuf {
    let mut name = staged_file
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(PARTIAL_SUFFIX);
    staged_file.with_file_name(name)
}

/// Check that a download directory stays inside the staging base
///
/// Only plain relative components are accepted: no root, no drive prefix,
/// no `.` or `..`.
pub fn is_valid_download_directory(directory: &str) -> bool {
    let path = Path::new(directory);
    !directory.trim().is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}

/// Hex-encoded SHA-256 digest of a file
pub async fn sha256_file(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hasher
        .finalize()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect())
}
