//! Shared test helpers for building archive fixtures in memory.

use crate::types::{ArchiveSource, TARGET_ENTRY};
use std::io::{Cursor, Write};

/// Build an in-memory ZIP with the given (name, content) entries.
pub(crate) fn zip_archive(entries: &[(&str, &str)], method: zip::CompressionMethod) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default().compression_method(method);
    for (name, content) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Deflated archive holding only the target entry with `rows` as its content.
pub(crate) fn archive_with_rows(rows: &str) -> Vec<u8> {
    zip_archive(&[(TARGET_ENTRY, rows)], zip::CompressionMethod::Deflated)
}

pub(crate) fn source_with_rows(rows: &str) -> ArchiveSource {
    ArchiveSource::new(archive_with_rows(rows))
}

/// Generate `n` contiguous rows alternating US/FR; every `sentinel_every`-th row
/// (when non-zero) carries the unassigned country code.
pub(crate) fn generated_rows(n: u64, sentinel_every: u64) -> String {
    let mut out = String::new();
    for i in 0..n {
        let lower = i * 1000;
        let upper = lower + 999;
        let country = if sentinel_every > 0 && i % sentinel_every == 0 {
            "-"
        } else if i % 2 == 0 {
            "US"
        } else {
            "FR"
        };
        out.push_str(&format!(
            "\"{lower}\",\"{upper}\",\"{country}\",\"Country\",\"Region {i}\",\"City {i}\"\n"
        ));
    }
    out
}
