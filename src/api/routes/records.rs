//! Record feed handler

use crate::api::AppState;
use crate::error::Result;
use crate::fetch::fetch_archive;
use crate::types::RangeRecord;
use axum::{
    extract::State,
    http::{HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::io::Write;

/// Response header carrying the number of records in the body
pub const RECS_LENGTH: HeaderName = HeaderName::from_static("recs-length");

const NDJSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// GET / - Fetch the upstream archive and return its records
///
/// The body is newline-delimited JSON, one record per line in archive order.
/// Nothing is written until the run has completed, so a failed run never yields
/// a partial body.
pub async fn records_feed(State(state): State<AppState>) -> Result<Response> {
    let source = fetch_archive(&state.config.upstream)
        .await
        .inspect_err(|e| {
            tracing::error!(error = %e, "Error fetching IP2Location data from upstream server")
        })?;

    let summary = state.pipeline.run(source).await.inspect_err(|e| {
        tracing::error!(kind = e.kind(), error = %e, "Error preparing IP2Location data")
    })?;

    let body = encode_records(&summary.records)
        .inspect_err(|e| tracing::error!(error = %e, "Error marshalling IP2Location data"))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(NDJSON_CONTENT_TYPE)),
            (RECS_LENGTH, HeaderValue::from(summary.records.len())),
        ],
        body,
    )
        .into_response())
}

/// Serialize records as newline-delimited JSON
pub fn encode_records(records: &[RangeRecord]) -> Result<Vec<u8>> {
    // Lines are ~80 bytes for typical records.
    let mut out = Vec::with_capacity(records.len() * 80);
    for record in records {
        serde_json::to_writer(&mut out, record)?;
        out.write_all(b"\n")?;
    }
    Ok(out)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    #[test]
    fn test_encode_records_one_line_each() {
        let records = vec![
            RangeRecord {
                upper_bound: BigUint::from(281_470_681_743_360u64),
                country_code: "US".into(),
                region: "California".into(),
                city: "Los Angeles".into(),
            },
            RangeRecord::country_only(BigUint::from(281_470_681_743_361u64), "FR"),
        ];

        let body = String::from_utf8(encode_records(&records).unwrap()).unwrap();
        let lines: Vec<&str> = body.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(body.ends_with('\n'));

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["toIP"], 281_470_681_743_360u64);
        assert_eq!(first["countryCode"], "US");
        assert_eq!(first["region"], "California");
        assert_eq!(first["city"], "Los Angeles");

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["countryCode"], "FR");
        assert_eq!(second["region"], "");
    }

    #[test]
    fn test_encode_no_records_is_empty_body() {
        assert!(encode_records(&[]).unwrap().is_empty());
    }
}
