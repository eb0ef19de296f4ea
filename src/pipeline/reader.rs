//! Archive stream reader: locates the target entry in the container and streams
//! its rows onto the bounded queue.
//!
//! Runs on the blocking pool since ZIP inflation and CSV tokenizing are synchronous.

use super::signal::{RunContext, Stage};
use crate::error::{ArchiveError, Result};
use crate::types::{ArchiveSource, Row};
use bytes::Bytes;
use std::io::Cursor;
use tokio::sync::mpsc;
use tracing::{debug, info};
use zip::result::ZipError;

/// How the reader stage ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadEnd {
    /// The whole entry was streamed
    Finished {
        /// Rows pushed onto the queue
        rows: u64,
    },
    /// The container has no entry with the target name; nothing was emitted
    EntryAbsent,
    /// Stopped early because the run was cancelled or the parser went away
    Cancelled {
        /// Rows pushed before stopping
        rows: u64,
    },
    /// A structural failure was reported through the run context
    Failed,
}

/// Reader stage entry point.
///
/// `queue` is consumed so it is dropped (closing the queue) exactly once on every
/// exit path. A failure is reported, and the run cancelled, before the queue closes,
/// so the parser never mistakes a failed read for end-of-entry.
pub fn run(
    source: ArchiveSource,
    target_entry: &str,
    queue: mpsc::Sender<Row>,
    ctx: RunContext,
) -> ReadEnd {
    let end = match stream_rows(&source, target_entry, &queue, &ctx) {
        Ok(end) => end,
        Err(e) => {
            ctx.failures.fail(Stage::Reader, e);
            ReadEnd::Failed
        }
    };
    drop(queue);

    match end {
        ReadEnd::Finished { rows } => info!(entry = target_entry, rows, "archive entry streamed"),
        ReadEnd::EntryAbsent => {
            info!(entry = target_entry, "target entry not in archive, nothing to parse")
        }
        ReadEnd::Cancelled { rows } => debug!(rows, "reader stopped: run cancelled"),
        ReadEnd::Failed => debug!("reader stopped after failure"),
    }
    end
}

fn stream_rows(
    source: &ArchiveSource,
    target_entry: &str,
    queue: &mpsc::Sender<Row>,
    ctx: &RunContext,
) -> Result<ReadEnd> {
    let container = container_view(source)?;
    debug!(bytes = container.len(), "opening archive");

    let mut archive =
        zip::ZipArchive::new(Cursor::new(container)).map_err(|e| ArchiveError::Open {
            reason: e.to_string(),
        })?;

    let entry = match archive.by_name(target_entry) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(ReadEnd::EntryAbsent),
        Err(e) => {
            return Err(ArchiveError::EntryOpen {
                entry: target_entry.to_string(),
                reason: e.to_string(),
            }
            .into());
        }
    };

    // No header row; rows may carry any number of fields.
    let mut rows_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(entry);

    let mut record = csv::ByteRecord::new();
    let mut rows = 0u64;
    loop {
        if ctx.is_cancelled() {
            return Ok(ReadEnd::Cancelled { rows });
        }

        match rows_reader.read_byte_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                return Err(ArchiveError::Read {
                    entry: target_entry.to_string(),
                    reason: e.to_string(),
                }
                .into());
            }
        }

        let row: Row = record
            .iter()
            .map(|field| String::from_utf8_lossy(field).into_owned())
            .collect();

        // Blocks while the queue is full; errors only once the parser has dropped its end.
        if queue.blocking_send(row).is_err() {
            return Ok(ReadEnd::Cancelled { rows });
        }
        rows += 1;
    }

    Ok(ReadEnd::Finished { rows })
}

/// Bytes of the container as bounded by the declared length
fn container_view(source: &ArchiveSource) -> Result<Bytes> {
    let actual = source.bytes.len() as u64;
    match source.declared_len {
        Some(declared) if declared > actual => {
            Err(ArchiveError::LengthMismatch { declared, actual }.into())
        }
        Some(declared) => Ok(source.bytes.slice(..declared as usize)),
        None => Ok(source.bytes.clone()),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_view_respects_declared_len() {
        let source = ArchiveSource::with_declared_len(vec![1u8, 2, 3, 4], Some(2));
        assert_eq!(container_view(&source).unwrap().as_ref(), &[1, 2]);

        let unknown = ArchiveSource::with_declared_len(vec![1u8, 2, 3, 4], None);
        assert_eq!(container_view(&unknown).unwrap().len(), 4);
    }

    #[test]
    fn test_container_view_rejects_overlong_declared_len() {
        let source = ArchiveSource::with_declared_len(vec![1u8, 2], Some(10));
        let err = container_view(&source).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Archive(ArchiveError::LengthMismatch {
                declared: 10,
                actual: 2
            })
        ));
    }
}
