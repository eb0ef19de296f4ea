//! Archive fixtures and row generators

use std::io::{Cursor, Write};

/// Name of the entry the pipeline parses by default
pub const ENTRY: &str = "IPV6-COUNTRY-REGION-CITY.CSV";

/// A small slice of a real-looking IPv6 database: unassigned, US, FR, GB and unassigned rows
pub const SAMPLE_ROWS: &str = r#""0","281470681743359","-","-","-","-"
"281470681743360","281470681808895","US","United States of America","California","Los Angeles"
"281470681808896","281470681878527","FR","France","Ile-de-France","Paris"
"281470681878528","281470681927679","GB","United Kingdom of Great Britain and Northern Ireland","England","London"
"281470681927680","281474976710655","-","-","-","-"
"#;

/// Upper bound above u64::MAX (last IPv6 address)
pub const LAST_IPV6_ROW: &str = r#""58569107296622255421594597096899477504","340282366920938463463374607431768211455","-","-","-","-"
"#;

/// Build an in-memory ZIP holding `entries`, deflate-compressed
pub fn zip_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// ZIP containing the default entry with `rows` as its content, plus the usual
/// readme and license members the vendor ships alongside it
pub fn vendor_archive(rows: &str) -> Vec<u8> {
    zip_with(&[
        ("README_LITE.TXT", b"IP2Location LITE database readme".as_slice()),
        (ENTRY, rows.as_bytes()),
        ("LICENSE_LITE.TXT", b"Creative Commons Attribution-ShareAlike 4.0".as_slice()),
    ])
}

/// `n` contiguous rows cycling through AU, DE, CA, -; region/city only vary by index
pub fn cycling_rows(n: u64) -> String {
    const COUNTRIES: [&str; 4] = ["AU", "DE", "CA", "-"];
    let mut out = String::with_capacity(n as usize * 64);
    for i in 0..n {
        let lower = i * 256;
        let upper = lower + 255;
        let country = COUNTRIES[(i % 4) as usize];
        out.push_str(&format!(
            "\"{lower}\",\"{upper}\",\"{country}\",\"Name\",\"Region {i}\",\"City {i}\"\n"
        ));
    }
    out
}
