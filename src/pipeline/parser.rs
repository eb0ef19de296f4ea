//! Record parser: turns queued rows into [`RangeRecord`]s.

use super::signal::{RunContext, Stage};
use crate::error::ParseError;
use crate::types::{CountryWhitelist, RangeRecord, Row, SENTINEL_COUNTRY};
use num_bigint::BigUint;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

const UPPER_BOUND_FIELD: usize = 1;
const COUNTRY_FIELD: usize = 2;
const REGION_FIELD: usize = 4;
const CITY_FIELD: usize = 5;

/// Records built by a parser run that drained its queue
#[derive(Debug, Default)]
pub struct ParseOutcome {
    /// Retained records in row order
    pub records: Vec<RangeRecord>,
    /// Rows taken off the queue
    pub rows_seen: u64,
    /// Rows dropped for the sentinel country code
    pub rows_skipped: u64,
}

/// Parser stage entry point.
///
/// Returns `Some` only when the queue closed with the run still live, in which case
/// the completion signal has been fired. On cancellation or a parse failure the
/// partial output is dropped here and `None` is returned.
pub async fn run(
    mut queue: mpsc::Receiver<Row>,
    whitelist: Arc<CountryWhitelist>,
    ctx: RunContext,
) -> Option<ParseOutcome> {
    let mut outcome = ParseOutcome::default();

    loop {
        if ctx.is_cancelled() {
            debug!(rows = outcome.rows_seen, "parser stopped: run cancelled");
            return None;
        }

        let row = tokio::select! {
            biased;
            _ = ctx.token.cancelled() => {
                debug!(rows = outcome.rows_seen, "parser stopped: run cancelled");
                return None;
            }
            row = queue.recv() => row,
        };
        let Some(row) = row else { break };
        outcome.rows_seen += 1;

        match parse_row(row, &whitelist) {
            Ok(Some(record)) => outcome.records.push(record),
            Ok(None) => outcome.rows_skipped += 1,
            Err(e) => {
                ctx.failures.fail(Stage::Parser, e.into());
                return None;
            }
        }
    }

    // The reader cancels before closing the queue when it fails.
    if ctx.is_cancelled() {
        debug!("queue closed after cancellation, not completing");
        return None;
    }

    debug!(
        records = outcome.records.len(),
        skipped = outcome.rows_skipped,
        "parser drained queue"
    );
    ctx.completion.fire();
    Some(outcome)
}

/// Build a record from one row.
///
/// `Ok(None)` means the row carries the sentinel country and is dropped. The upper
/// bound is validated before the sentinel check, so an unparseable bound fails the
/// run even on a sentinel row.
pub fn parse_row(row: Row, whitelist: &CountryWhitelist) -> Result<Option<RangeRecord>, ParseError> {
    let upper_bound = match row.get(UPPER_BOUND_FIELD) {
        Some(field) => parse_upper_bound(field),
        None => {
            return Err(ParseError::MissingField {
                index: UPPER_BOUND_FIELD,
                row,
            });
        }
    };
    let Some(upper_bound) = upper_bound else {
        return Err(ParseError::InvalidUpperBound { row });
    };

    let country_code = match row.get(COUNTRY_FIELD) {
        Some(code) if code == SENTINEL_COUNTRY => return Ok(None),
        Some(code) => code.clone(),
        None => {
            return Err(ParseError::MissingField {
                index: COUNTRY_FIELD,
                row,
            });
        }
    };

    if !whitelist.contains(&country_code) {
        return Ok(Some(RangeRecord::country_only(upper_bound, country_code)));
    }

    let (region, city) = match (row.get(REGION_FIELD), row.get(CITY_FIELD)) {
        (Some(region), Some(city)) => (region.clone(), city.clone()),
        (None, _) => {
            return Err(ParseError::MissingField {
                index: REGION_FIELD,
                row,
            });
        }
        (Some(_), None) => {
            return Err(ParseError::MissingField {
                index: CITY_FIELD,
                row,
            });
        }
    };

    Ok(Some(RangeRecord {
        upper_bound,
        country_code,
        region,
        city,
    }))
}

/// Parse a base-10 non-negative integer of any size (an optional leading `+` is accepted)
pub fn parse_upper_bound(field: &str) -> Option<BigUint> {
    let digits = field.strip_prefix('+').unwrap_or(field);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    BigUint::parse_bytes(digits.as_bytes(), 10)
}
