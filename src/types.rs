//! Core types for ip2loc-feed

use bytes::Bytes;
use num_bigint::BigUint;
use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::time::Duration;

/// Name of the only container entry the pipeline reads
pub const TARGET_ENTRY: &str = "IPV6-COUNTRY-REGION-CITY.CSV";

/// Country code placeholder for address blocks with no assigned country
pub const SENTINEL_COUNTRY: &str = "-";

/// Default bounded row queue capacity between reader and parser
pub const DEFAULT_QUEUE_CAPACITY: usize = 500_000;

/// One delimited row, fields in source order
pub type Row = Vec<String>;

/// Raw container bytes as handed over by the archive source
#[derive(Clone, Debug)]
pub struct ArchiveSource {
    /// Full container bytes
    pub bytes: Bytes,
    /// Length announced by the source (e.g. Content-Length); `None` when unknown
    pub declared_len: Option<u64>,
}

impl ArchiveSource {
    /// Wrap bytes whose length is known exactly
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let declared_len = Some(bytes.len() as u64);
        Self {
            bytes,
            declared_len,
        }
    }

    /// Wrap bytes with an explicitly declared (possibly absent) length
    pub fn with_declared_len(bytes: impl Into<Bytes>, declared_len: Option<u64>) -> Self {
        Self {
            bytes: bytes.into(),
            declared_len,
        }
    }
}

/// A parsed row: the country/region/city of the IP range ending at `upper_bound`
///
/// Ranges are contiguous in source order, so a record's lower bound is the
/// previous record's `upper_bound + 1`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RangeRecord {
    /// Inclusive upper bound of the range, in numeric address-space form
    #[serde(rename = "toIP", serialize_with = "serialize_upper_bound")]
    pub upper_bound: BigUint,

    /// Two-letter country code (never the sentinel)
    #[serde(rename = "countryCode")]
    pub country_code: String,

    /// Region name, empty unless the country is whitelisted
    pub region: String,

    /// City name, empty unless the country is whitelisted
    pub city: String,
}

impl RangeRecord {
    /// Record with country only; region and city left empty
    pub fn country_only(upper_bound: BigUint, country_code: impl Into<String>) -> Self {
        Self {
            upper_bound,
            country_code: country_code.into(),
            region: String::new(),
            city: String::new(),
        }
    }
}

// IPv6 bounds fit in u128, so they go out as plain JSON numbers. Anything larger
// falls back to a decimal string rather than losing precision.
fn serialize_upper_bound<S>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match u128::try_from(value) {
        Ok(n) => serializer.serialize_u128(n),
        Err(_) => serializer.serialize_str(&value.to_str_radix(10)),
    }
}

/// Immutable set of country codes whose region/city detail is retained
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CountryWhitelist {
    codes: HashSet<String>,
}

impl CountryWhitelist {
    /// Build a whitelist from country codes (stored as given, matched case-sensitively)
    pub fn from_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            codes: codes.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether region/city should be kept for `country_code`
    pub fn contains(&self, country_code: &str) -> bool {
        self.codes.contains(country_code)
    }

    /// Number of whitelisted countries
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// True when no country is whitelisted
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl Default for CountryWhitelist {
    fn default() -> Self {
        Self::from_codes(["AU", "CA", "GB", "US"])
    }
}

/// Lifecycle of a single pipeline run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    /// Primitives built, stages not launched yet
    Idle,
    /// Both stages launched
    Running,
    /// A stage raised an error (terminal)
    Failed,
    /// The parser drained the queue without error (terminal)
    Completed,
}

impl RunState {
    /// Terminal states are never left
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Failed | RunState::Completed)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Failed => "failed",
            RunState::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Outcome of a completed run
#[derive(Clone, Debug)]
pub struct RunSummary {
    /// Retained records in source order
    pub records: Vec<RangeRecord>,
    /// Rows received by the parser
    pub rows_seen: u64,
    /// Rows dropped for carrying the sentinel country code
    pub rows_skipped: u64,
    /// Wall-clock time from launch to completion
    pub elapsed: Duration,
}
