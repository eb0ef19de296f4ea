//! Application state for the API server

use crate::{Config, Pipeline};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request. The pipeline holds only immutable settings; each
/// request's run builds its own signals and queue.
#[derive(Clone)]
pub struct AppState {
    /// Configuration (upstream location, timeouts)
    pub config: Arc<Config>,

    /// Pipeline coordinator built from the configuration
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    /// Create a new AppState, building the pipeline from `config.pipeline`
    pub fn new(config: Arc<Config>) -> Self {
        let pipeline = Arc::new(Pipeline::from_config(&config.pipeline));
        Self { config, pipeline }
    }
}
