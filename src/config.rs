//! Configuration types for ip2loc-feed

use crate::error::{Error, Result};
use crate::types::{CountryWhitelist, DEFAULT_QUEUE_CAPACITY, TARGET_ENTRY};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, time::Duration};

/// Upstream archive server settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// URL serving the raw archive (default: "http://127.0.0.1:4000")
    #[serde(default = "default_upstream_url")]
    pub url: String,

    /// Wall-clock timeout for the whole fetch (default: 180 seconds)
    #[serde(default = "default_fetch_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Reject archives larger than this many bytes (None = unlimited)
    #[serde(default)]
    pub max_archive_bytes: Option<u64>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: default_upstream_url(),
            timeout: default_fetch_timeout(),
            max_archive_bytes: None,
        }
    }
}

/// Extraction/parsing pipeline settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Bounded row queue capacity between reader and parser (default: 500000)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Container entry to parse (default: "IPV6-COUNTRY-REGION-CITY.CSV")
    #[serde(default = "default_target_entry")]
    pub target_entry: String,

    /// Countries whose region/city detail is kept (default: AU, CA, GB, US)
    #[serde(default = "default_supported_countries")]
    pub supported_countries: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            target_entry: default_target_entry(),
            supported_countries: default_supported_countries(),
        }
    }
}

impl PipelineConfig {
    /// Build the country whitelist from `supported_countries`
    pub fn whitelist(&self) -> CountryWhitelist {
        CountryWhitelist::from_codes(self.supported_countries.iter().cloned())
    }
}

/// HTTP server settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 0.0.0.0:3000)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

/// Main configuration
///
/// Every section and field has a default, so an empty TOML file is a valid
/// configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where the archive comes from
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// How the archive is turned into records
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// HTTP surface
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(|e| Error::Config {
            message: format!("invalid TOML: {}", e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        Self::from_toml_str(&content)
    }

    /// Check cross-field constraints that serde defaults cannot express
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.upstream.url).map_err(|e| Error::Config {
            message: format!("invalid upstream URL '{}': {}", self.upstream.url, e),
            key: Some("upstream.url".to_string()),
        })?;

        if self.upstream.timeout.is_zero() {
            return Err(Error::Config {
                message: "upstream timeout must be greater than zero".to_string(),
                key: Some("upstream.timeout".to_string()),
            });
        }

        if self.pipeline.queue_capacity == 0 {
            return Err(Error::Config {
                message: "queue capacity must be greater than zero".to_string(),
                key: Some("pipeline.queue_capacity".to_string()),
            });
        }

        if self.pipeline.target_entry.is_empty() {
            return Err(Error::Config {
                message: "target entry name must not be empty".to_string(),
                key: Some("pipeline.target_entry".to_string()),
            });
        }

        if let Some(code) = self
            .pipeline
            .supported_countries
            .iter()
            .find(|c| c.len() != 2 || !c.chars().all(|ch| ch.is_ascii_uppercase()))
        {
            return Err(Error::Config {
                message: format!("'{}' is not a two-letter uppercase country code", code),
                key: Some("pipeline.supported_countries".to_string()),
            });
        }

        Ok(())
    }
}

fn default_upstream_url() -> String {
    "http://127.0.0.1:4000".to_string()
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(180)
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_target_entry() -> String {
    TARGET_ENTRY.to_string()
}

fn default_supported_countries() -> Vec<String> {
    ["AU", "CA", "GB", "US"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
