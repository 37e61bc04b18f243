//! Input resolution: turn a user-supplied path or URL into document text.
//!
//! Local files are read directly; HTTP(S) URLs are downloaded into memory.
//! Either way the bytes must be UTF-8 — the paginator has no encoding
//! detection.

use crate::error::BenchError;
use std::path::PathBuf;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to the document's text.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<String, BenchError> {
    if input.trim().is_empty() {
        return Err(BenchError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

/// Read a local file, mapping I/O failures to specific errors.
async fn read_local(path_str: &str) -> Result<String, BenchError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(BenchError::PermissionDenied { path });
        }
        Err(_) => return Err(BenchError::FileNotFound { path }),
    };

    debug!("Read local document: {} ({} bytes)", path.display(), bytes.len());
    decode_utf8(bytes, path_str)
}

/// Download a URL and return its body as text.
async fn download_url(url: &str, timeout_secs: u64) -> Result<String, BenchError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| BenchError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            BenchError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            BenchError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(BenchError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(|e| BenchError::DownloadFailed {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    info!("Downloaded {} bytes", bytes.len());
    decode_utf8(bytes.to_vec(), url)
}

fn decode_utf8(bytes: Vec<u8>, source_name: &str) -> Result<String, BenchError> {
    String::from_utf8(bytes).map_err(|e| BenchError::NotUtf8 {
        source_name: source_name.to_string(),
        detail: e.utf8_error().to_string(),
    })
}
