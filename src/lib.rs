//! # ip2loc-feed
//!
//! Turns an IP2Location range database, delivered as a ZIP archive, into a flat list of
//! range records (upper bound, country, and for selected countries region and city).
//!
//! ## Design
//!
//! - **Streaming** - The archive entry is tokenized on a blocking thread and handed to an
//!   async parser through a bounded queue, so parsing overlaps decompression
//! - **All or nothing** - A failure in either stage cancels the other; the run yields
//!   exactly one error and no partial output
//! - **Per-run state** - Every run owns its cancellation token, completion latch and
//!   failure channel, so concurrent runs never interfere
//!
//! ## Quick Start
//!
//! ```no_run
//! use ip2loc_feed::{ArchiveSource, Pipeline, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bytes = std::fs::read("IP2LOCATION-LITE-DB3.IPV6.CSV.zip")?;
//!
//!     let pipeline = Pipeline::from_config(&PipelineConfig::default());
//!     let summary = pipeline.run(ArchiveSource::new(bytes)).await?;
//!
//!     for record in &summary.records {
//!         println!("{} {} {}", record.upper_bound, record.country_code, record.city);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// HTTP API module
pub mod api;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Upstream archive retrieval
pub mod fetch;
/// Reader/parser pipeline and its run-scoped signals
pub mod pipeline;
/// Core types
pub mod types;

// Re-export commonly used types
pub use config::{Config, PipelineConfig, ServerConfig, UpstreamConfig};
pub use error::{ArchiveError, Error, FetchError, ParseError, Result};
pub use fetch::fetch_archive;
pub use pipeline::{CompletionSignal, Pipeline, PipelineOptions, RunContext, run_pipeline};
pub use types::{ArchiveSource, CountryWhitelist, RangeRecord, RunState, RunSummary};

use std::sync::Arc;

/// Serve the API until SIGTERM or SIGINT, then stop gracefully
///
/// On Unix this listens for both SIGTERM and SIGINT; elsewhere for Ctrl+C.
/// Requests already in flight are allowed to finish.
///
/// # Example
///
/// ```no_run
/// use ip2loc_feed::{Config, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::load("ip2loc-feed.toml")?;
///     run_with_shutdown(config).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(config: Config) -> Result<()> {
    api::serve_with_shutdown(Arc::new(config), wait_for_signal()).await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
