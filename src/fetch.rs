//! Upstream archive retrieval
//!
//! One GET per call, no retries. The whole exchange (connect, headers and body) is
//! bounded by the configured timeout.

use crate::config::UpstreamConfig;
use crate::error::{FetchError, Result};
use crate::types::ArchiveSource;
use bytes::BytesMut;
use std::time::Instant;

/// Download the raw archive from the configured upstream.
///
/// The response's `Content-Length` (when present) becomes the source's declared
/// length, so a body that ends early is caught as an archive error by the reader.
pub async fn fetch_archive(config: &UpstreamConfig) -> Result<ArchiveSource> {
    let url = config.url.as_str();
    let started = Instant::now();

    let client = reqwest::Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| FetchError::Request {
            url: url.to_string(),
            reason: format!("failed to create HTTP client: {}", e),
        })?;

    tracing::debug!(url, timeout_secs = config.timeout.as_secs(), "fetching archive");

    let mut response = client
        .get(url)
        .send()
        .await
        .map_err(|e| classify(url, config, e, false))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        }
        .into());
    }

    let declared_len = response.content_length();
    if let (Some(size), Some(max)) = (declared_len, config.max_archive_bytes) {
        if size > max {
            return Err(FetchError::TooLarge {
                url: url.to_string(),
                size,
                max,
            }
            .into());
        }
    }

    let mut body = BytesMut::with_capacity(initial_capacity(declared_len, config.max_archive_bytes));
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| classify(url, config, e, true))?
    {
        body.extend_from_slice(&chunk);
        if let Some(max) = config.max_archive_bytes {
            let size = body.len() as u64;
            if size > max {
                return Err(FetchError::TooLarge {
                    url: url.to_string(),
                    size,
                    max,
                }
                .into());
            }
        }
    }

    tracing::info!(
        url,
        bytes = body.len(),
        declared = ?declared_len,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "archive fetched"
    );

    Ok(ArchiveSource::with_declared_len(body.freeze(), declared_len))
}

fn classify(url: &str, config: &UpstreamConfig, e: reqwest::Error, reading_body: bool) -> crate::Error {
    let error = if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
            secs: config.timeout.as_secs(),
        }
    } else if reading_body {
        FetchError::Body {
            url: url.to_string(),
            reason: e.to_string(),
        }
    } else if e.is_connect() {
        FetchError::Request {
            url: url.to_string(),
            reason: format!("connection failed: {}", e),
        }
    } else {
        FetchError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        }
    };
    error.into()
}

// Cap the up-front allocation; a lying Content-Length should not reserve gigabytes.
fn initial_capacity(declared: Option<u64>, max: Option<u64>) -> usize {
    const CEILING: u64 = 64 * 1024 * 1024;
    let wanted = declared.unwrap_or(0).min(max.unwrap_or(CEILING)).min(CEILING);
    wanted as usize
}
