//! Two-stage extraction pipeline
//!
//! A run streams one archive through:
//!
//! ```text
//! ArchiveSource -> reader (blocking pool) -> bounded row queue -> parser (async) -> Vec<RangeRecord>
//! ```
//!
//! Both stages share a per-run [`RunContext`]: a cancellation token, a completion
//! latch and a failure channel. The first failure from either stage cancels the
//! other; the coordinator returns that failure and discards everything parsed so far.

pub mod parser;
pub mod reader;
pub mod signal;


#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

pub use signal::{CompletionSignal, FailureReporter, RunContext, Stage};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::types::{
    ArchiveSource, CountryWhitelist, DEFAULT_QUEUE_CAPACITY, RangeRecord, Row, RunState,
    RunSummary, TARGET_ENTRY,
};
use parser::ParseOutcome;
use reader::ReadEnd;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

/// Per-run tuning
#[derive(Clone, Debug)]
pub struct PipelineOptions {
    /// Capacity of the bounded row queue
    pub queue_capacity: usize,
    /// Name of the container entry to parse
    pub target_entry: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            target_entry: TARGET_ENTRY.to_string(),
        }
    }
}

impl From<&PipelineConfig> for PipelineOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            queue_capacity: config.queue_capacity.max(1),
            target_entry: config.target_entry.clone(),
        }
    }
}

/// Pipeline coordinator
///
/// Holds only immutable settings; every [`run`](Pipeline::run) builds its own
/// token, signal and queue, so concurrent runs never share state.
#[derive(Clone, Debug)]
pub struct Pipeline {
    whitelist: Arc<CountryWhitelist>,
    options: PipelineOptions,
}

/// First terminal event observed by the coordinator
enum Terminal {
    Failed(Error),
    Completed,
    ParserExited(std::result::Result<Option<ParseOutcome>, JoinError>),
}

impl Pipeline {
    /// Create a coordinator with an explicit whitelist and options
    pub fn new(whitelist: Arc<CountryWhitelist>, options: PipelineOptions) -> Self {
        Self { whitelist, options }
    }

    /// Create a coordinator from the pipeline section of the configuration
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(Arc::new(config.whitelist()), PipelineOptions::from(config))
    }

    /// Country whitelist consulted by the parser
    pub fn whitelist(&self) -> &CountryWhitelist {
        &self.whitelist
    }

    /// Extract and parse `source`, returning the records with run statistics.
    ///
    /// Exactly one error is returned for a failed run. Both stages have stopped by
    /// the time this returns, on every path.
    pub async fn run(&self, source: ArchiveSource) -> Result<RunSummary> {
        let started = Instant::now();
        let mut state = RunState::Idle;

        let (ctx, mut failures) = RunContext::new();
        // Dropping the coordinator future (e.g. a disconnected client) stops both stages.
        let _cancel_on_drop = ctx.token.clone().drop_guard();
        let (row_tx, row_rx) = mpsc::channel::<Row>(self.options.queue_capacity);

        info!(
            archive_bytes = source.bytes.len(),
            queue_capacity = self.options.queue_capacity,
            entry = %self.options.target_entry,
            "starting pipeline run"
        );

        let reader: JoinHandle<ReadEnd> = tokio::task::spawn_blocking({
            let ctx = ctx.clone();
            let target_entry = self.options.target_entry.clone();
            move || reader::run(source, &target_entry, row_tx, ctx)
        });
        let mut parser = tokio::spawn(parser::run(row_rx, self.whitelist.clone(), ctx.clone()));
        transition(&mut state, RunState::Running);

        let terminal = tokio::select! {
            biased;
            Some(error) = failures.recv() => Terminal::Failed(error),
            _ = ctx.completion.fired() => Terminal::Completed,
            joined = &mut parser => Terminal::ParserExited(joined),
        };

        let parsed = match terminal {
            Terminal::Failed(error) => {
                transition(&mut state, RunState::Failed);
                return Err(abort(error, &ctx, &mut failures, reader, Some(parser)).await);
            }
            Terminal::Completed => parser.await,
            Terminal::ParserExited(joined) => joined,
        };

        let outcome = match parsed {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                // The parser stopped without completing: its failure (or the reader's)
                // is already queued.
                let error = failures.try_recv().unwrap_or_else(|_| {
                    Error::TaskFailed("parser stopped without signaling".to_string())
                });
                transition(&mut state, RunState::Failed);
                return Err(abort(error, &ctx, &mut failures, reader, None).await);
            }
            Err(e) => {
                transition(&mut state, RunState::Failed);
                let error = Error::TaskFailed(format!("parser task: {}", e));
                return Err(abort(error, &ctx, &mut failures, reader, None).await);
            }
        };

        // A reader that panicked closes the queue without cancelling, which would
        // otherwise look like a clean end-of-entry.
        if let Err(e) = reader.await {
            transition(&mut state, RunState::Failed);
            let error = Error::TaskFailed(format!("reader task: {}", e));
            warn!(kind = error.kind(), error = %error, "pipeline run failed");
            return Err(error);
        }

        transition(&mut state, RunState::Completed);
        let summary = RunSummary {
            records: outcome.records,
            rows_seen: outcome.rows_seen,
            rows_skipped: outcome.rows_skipped,
            elapsed: started.elapsed(),
        };
        info!(
            records = summary.records.len(),
            rows = summary.rows_seen,
            skipped = summary.rows_skipped,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "pipeline run completed"
        );
        Ok(summary)
    }
}

/// Run the pipeline once and return only the records.
pub async fn run_pipeline(
    source: ArchiveSource,
    whitelist: Arc<CountryWhitelist>,
    options: PipelineOptions,
) -> Result<Vec<RangeRecord>> {
    let summary = Pipeline::new(whitelist, options).run(source).await?;
    Ok(summary.records)
}

/// Cancel the run, wait for both stages to stop, and discard late failures.
async fn abort(
    error: Error,
    ctx: &RunContext,
    failures: &mut mpsc::Receiver<Error>,
    reader: JoinHandle<ReadEnd>,
    parser: Option<JoinHandle<Option<ParseOutcome>>>,
) -> Error {
    warn!(kind = error.kind(), error = %error, "pipeline run failed");
    ctx.token.cancel();

    if let Err(e) = reader.await {
        debug!(error = %e, "reader task ended abnormally after failure");
    }
    if let Some(parser) = parser {
        if let Err(e) = parser.await {
            debug!(error = %e, "parser task ended abnormally after failure");
        }
    }

    while let Ok(extra) = failures.try_recv() {
        debug!(kind = extra.kind(), error = %extra, "discarding secondary failure");
    }
    error
}

fn transition(state: &mut RunState, next: RunState) {
    debug_assert!(
        !state.is_terminal(),
        "run already terminated ({state}), cannot enter {next}"
    );
    debug!(from = %state, to = %next, "run state");
    *state = next;
}
