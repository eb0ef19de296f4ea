//! Error types for ip2loc-feed
//!
//! This module provides the error taxonomy for the library:
//! - Pipeline stage failures (archive extraction, row parsing)
//! - Upstream fetch failures surfaced through the same run contract
//! - HTTP status code mapping and structured JSON error bodies for the API

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for ip2loc-feed operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ip2loc-feed
///
/// Any error produced by a pipeline stage is terminal for its run. The coordinator
/// surfaces exactly one of these per failed run.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "pipeline.queue_capacity")
        key: Option<String>,
    },

    /// The container or its target entry could not be opened or decompressed
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// A row could not be turned into a range record
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// The upstream archive could not be retrieved
    #[error("upstream fetch error: {0}")]
    UpstreamFetch(#[from] FetchError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A pipeline stage panicked or was aborted before signaling
    #[error("pipeline task failed: {0}")]
    TaskFailed(String),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Taxonomy name of this error, stable across message changes.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Archive(_) => "ArchiveError",
            Error::Parse(_) => "ParseError",
            Error::UpstreamFetch(_) => "UpstreamFetchError",
            Error::Config { .. } => "ConfigError",
            Error::Io(_) => "IoError",
            Error::Serialization(_) => "SerializationError",
            Error::TaskFailed(_) => "TaskFailed",
            Error::ApiServerError(_) => "ApiServerError",
            Error::Other(_) => "Other",
        }
    }
}

/// Container and entry level failures raised by the archive stream reader
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The container itself could not be opened (bad magic, truncated directory, ...)
    #[error("failed to open archive: {reason}")]
    Open {
        /// The reason the container could not be opened
        reason: String,
    },

    /// The target entry was found but could not be opened for reading
    #[error("failed to open entry {entry}: {reason}")]
    EntryOpen {
        /// Name of the entry inside the container
        entry: String,
        /// The reason the entry could not be opened
        reason: String,
    },

    /// Decompression or tokenizing failed partway through the entry
    #[error("failed to read entry {entry}: {reason}")]
    Read {
        /// Name of the entry inside the container
        entry: String,
        /// The underlying read failure
        reason: String,
    },

    /// The declared container length exceeds the bytes actually supplied
    #[error("declared archive length {declared} exceeds {actual} available bytes")]
    LengthMismatch {
        /// Length announced by the archive source
        declared: u64,
        /// Number of bytes actually supplied
        actual: u64,
    },
}

/// Row level failures raised by the record parser
#[derive(Debug, Error)]
pub enum ParseError {
    /// The upper bound field is not a non-negative base-10 integer
    #[error("invalid upper bound in record: {row:?}")]
    InvalidUpperBound {
        /// The offending row, verbatim
        row: Vec<String>,
    },

    /// The row is too short for the field the parser needs
    #[error("record has no field {index}: {row:?}")]
    MissingField {
        /// 0-based index of the missing field
        index: usize,
        /// The offending row, verbatim
        row: Vec<String>,
    },
}

impl ParseError {
    /// The row that caused this failure
    pub fn row(&self) -> &[String] {
        match self {
            ParseError::InvalidUpperBound { row } => row,
            ParseError::MissingField { row, .. } => row,
        }
    }
}

/// Failures retrieving the archive from the upstream server
#[derive(Debug, Error)]
pub enum FetchError {
    /// The HTTP client could not be built or the request could not be sent
    #[error("request to {url} failed: {reason}")]
    Request {
        /// Upstream URL
        url: String,
        /// The underlying client error
        reason: String,
    },

    /// The request exceeded the configured wall-clock timeout
    #[error("timeout fetching {url} (exceeded {secs} seconds)")]
    Timeout {
        /// Upstream URL
        url: String,
        /// Configured timeout in seconds
        secs: u64,
    },

    /// The upstream answered with a non-success status
    #[error("upstream {url} responded with HTTP {status}")]
    Status {
        /// Upstream URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// The response body could not be read
    #[error("failed to read body from {url}: {reason}")]
    Body {
        /// Upstream URL
        url: String,
        /// The underlying read failure
        reason: String,
    },

    /// The response body exceeded the configured size cap
    #[error("archive from {url} too large: {size} bytes (max: {max} bytes)")]
    TooLarge {
        /// Upstream URL
        url: String,
        /// Observed (or announced) size in bytes
        size: u64,
        /// Configured maximum in bytes
        max: u64,
    },
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "parse_error",
///     "message": "parse error: invalid upper bound in record: [\"0\", \"x\", \"US\"]",
///     "details": { "kind": "ParseError" }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "archive_error", "parse_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::Config { .. } => 400,

            // 422 Unprocessable Entity - the upstream data itself is unusable
            Error::Archive(_) => 422,
            Error::Parse(_) => 422,

            // 502 Bad Gateway - upstream unavailable or misbehaving
            Error::UpstreamFetch(FetchError::Timeout { .. }) => 504,
            Error::UpstreamFetch(_) => 502,

            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::TaskFailed(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Archive(e) => match e {
                ArchiveError::Open { .. } => "archive_open_failed",
                ArchiveError::EntryOpen { .. } => "archive_entry_open_failed",
                ArchiveError::Read { .. } => "archive_read_failed",
                ArchiveError::LengthMismatch { .. } => "archive_length_mismatch",
            },
            Error::Parse(e) => match e {
                ParseError::InvalidUpperBound { .. } => "invalid_upper_bound",
                ParseError::MissingField { .. } => "missing_field",
            },
            Error::UpstreamFetch(e) => match e {
                FetchError::Timeout { .. } => "upstream_timeout",
                FetchError::Status { .. } => "upstream_status",
                FetchError::TooLarge { .. } => "upstream_too_large",
                FetchError::Request { .. } | FetchError::Body { .. } => "upstream_fetch_failed",
            },
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::TaskFailed(_) => "task_failed",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Parse(e) => Some(serde_json::json!({
                "kind": error.kind(),
                "row": e.row(),
            })),
            Error::Archive(ArchiveError::EntryOpen { entry, .. })
            | Error::Archive(ArchiveError::Read { entry, .. }) => Some(serde_json::json!({
                "kind": error.kind(),
                "entry": entry,
            })),
            Error::UpstreamFetch(FetchError::Status { url, status }) => Some(serde_json::json!({
                "kind": error.kind(),
                "url": url,
                "upstream_status": status,
            })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            _ => Some(serde_json::json!({ "kind": error.kind() })),
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn all_error_variants() -> Vec<(Error, u16, &'static str)> {
        vec![
            (
                Error::Config {
                    message: "queue capacity must be positive".into(),
                    key: Some("pipeline.queue_capacity".into()),
                },
                400,
                "config_error",
            ),
            (
                Error::Archive(ArchiveError::Open {
                    reason: "invalid Zip archive".into(),
                }),
                422,
                "archive_open_failed",
            ),
            (
                Error::Archive(ArchiveError::EntryOpen {
                    entry: "IPV6-COUNTRY-REGION-CITY.CSV".into(),
                    reason: "unsupported compression".into(),
                }),
                422,
                "archive_entry_open_failed",
            ),
            (
                Error::Archive(ArchiveError::Read {
                    entry: "IPV6-COUNTRY-REGION-CITY.CSV".into(),
                    reason: "corrupt deflate stream".into(),
                }),
                422,
                "archive_read_failed",
            ),
            (
                Error::Archive(ArchiveError::LengthMismatch {
                    declared: 10,
                    actual: 5,
                }),
                422,
                "archive_length_mismatch",
            ),
            (
                Error::Parse(ParseError::InvalidUpperBound {
                    row: vec!["0".into(), "abc".into()],
                }),
                422,
                "invalid_upper_bound",
            ),
            (
                Error::Parse(ParseError::MissingField {
                    index: 2,
                    row: vec!["0".into(), "1".into()],
                }),
                422,
                "missing_field",
            ),
            (
                Error::UpstreamFetch(FetchError::Timeout {
                    url: "http://127.0.0.1:4000".into(),
                    secs: 180,
                }),
                504,
                "upstream_timeout",
            ),
            (
                Error::UpstreamFetch(FetchError::Status {
                    url: "http://127.0.0.1:4000".into(),
                    status: 500,
                }),
                502,
                "upstream_status",
            ),
            (
                Error::UpstreamFetch(FetchError::Request {
                    url: "http://127.0.0.1:4000".into(),
                    reason: "connection refused".into(),
                }),
                502,
                "upstream_fetch_failed",
            ),
            (
                Error::UpstreamFetch(FetchError::TooLarge {
                    url: "http://127.0.0.1:4000".into(),
                    size: 10,
                    max: 5,
                }),
                502,
                "upstream_too_large",
            ),
            (
                Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone")),
                500,
                "io_error",
            ),
            (
                Error::TaskFailed("parser panicked".into()),
                500,
                "task_failed",
            ),
            (
                Error::ApiServerError("bind failed".into()),
                500,
                "api_server_error",
            ),
            (Error::Other("unknown".into()), 500, "internal_error"),
        ]
    }

    #[test]
    fn test_status_and_error_codes() {
        for (error, status, code) in all_error_variants() {
            assert_eq!(error.status_code(), status, "status for {error}");
            assert_eq!(error.error_code(), code, "code for {error}");
        }
    }

    #[test]
    fn test_kind_matches_taxonomy() {
        let archive = Error::Archive(ArchiveError::Open {
            reason: "bad".into(),
        });
        let parse = Error::Parse(ParseError::InvalidUpperBound { row: vec![] });
        let fetch = Error::UpstreamFetch(FetchError::Status {
            url: "http://x".into(),
            status: 404,
        });

        assert_eq!(archive.kind(), "ArchiveError");
        assert_eq!(parse.kind(), "ParseError");
        assert_eq!(fetch.kind(), "UpstreamFetchError");
    }

    #[test]
    fn test_parse_error_message_carries_row() {
        let error = Error::Parse(ParseError::InvalidUpperBound {
            row: vec!["0".into(), "not-a-number".into(), "US".into()],
        });
        let message = error.to_string();
        assert!(message.contains("not-a-number"), "message: {message}");
        assert!(message.starts_with("parse error:"));
    }

    #[test]
    fn test_api_error_from_parse_error_includes_row_details() {
        let error = Error::Parse(ParseError::InvalidUpperBound {
            row: vec!["0".into(), "x".into()],
        });
        let api: ApiError = error.into();

        assert_eq!(api.error.code, "invalid_upper_bound");
        let details = api.error.details.unwrap();
        assert_eq!(details["kind"], "ParseError");
        assert_eq!(details["row"][1], "x");
    }

    #[test]
    fn test_api_error_serialization_skips_missing_details() {
        let api = ApiError::internal("boom");
        let json = serde_json::to_value(&api).unwrap();
        assert_eq!(json["error"]["code"], "internal_error");
        assert!(json["error"].get("details").is_none());
    }
}
