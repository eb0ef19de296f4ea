//! HTTP surface
//!
//! Every request to the feed endpoint fetches the upstream archive and runs a fresh
//! pipeline over it; nothing is cached between requests.

use crate::{Config, Result};
use axum::{Router, routing::get};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub mod error_response;
pub mod routes;
pub mod state;

pub use state::AppState;

/// Create the API router
///
/// # Routes
///
/// - `GET /` - Fetch, extract and parse the archive; stream records as NDJSON
/// - `GET /health` - Health check
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::records_feed))
        .route("/health", get(routes::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the API server on the configured bind address.
///
/// Runs until the listener fails; see [`serve_with_shutdown`] for a stoppable server.
pub async fn start_api_server(config: Arc<Config>) -> Result<()> {
    serve_with_shutdown(config, std::future::pending()).await
}

/// Start the API server and stop accepting connections once `shutdown` resolves.
///
/// In-flight requests are allowed to finish.
pub async fn serve_with_shutdown<F>(config: Arc<Config>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let bind_address = config.server.bind_address;

    tracing::info!(address = %bind_address, upstream = %config.upstream.url, "Starting API server");

    let app = create_router(AppState::new(config));

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(
        address = %listener.local_addr().map_err(crate::error::Error::Io)?,
        "API server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}
