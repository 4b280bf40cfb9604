use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::util;

/// Default Distance Matrix endpoint.
pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api/distancematrix/json";

/// Default travel mode sent with every request.
pub const DEFAULT_MODE: &str = "driving";

/// Default traffic model sent with every request.
pub const DEFAULT_TRAFFIC_MODEL: &str = "best_guess";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

// ------------------------------------------------------------
// Root configuration
// ------------------------------------------------------------
//
// This is the top-level configuration structure loaded from
// `config.json`.
//
// It defines:
// - API credentials and request parameters
// - The request window (UTC bounds, cadence, record cap)
// - Input coordinate list and output naming
// - Optional debug configuration
//
// The configuration is read once at start and never reloaded.
//
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Distance Matrix API settings
    pub api: ApiConfig,

    /// When and how often to poll
    pub window: RequestWindow,

    /// Coordinate pair list
    pub input: InputConfig,

    /// Output file naming / location
    pub output: OutputConfig,

    /// Optional debug configuration
    pub debug: Option<DebugConfig>,
}

// ------------------------------------------------------------
// API configuration
// ------------------------------------------------------------
//
// Notes:
// - The `key` is security-sensitive and must never be committed.
// - It is redacted from every logged request URL.
//
#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Static API credential
    pub key: String,

    /// Endpoint URL, without query parameters
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Travel mode (always "driving" in production)
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Traffic model (always "best_guess" in production)
    #[serde(default = "default_traffic_model")]
    pub traffic_model: String,

    /// Optional per-request timeout. Without it the HTTP stack
    /// default applies.
    pub timeout_secs: Option<u64>,
}

impl ApiConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

// ------------------------------------------------------------
// Request window
// ------------------------------------------------------------
//
// Polling is permitted during the half-open range [start, end).
//
// IMPORTANT:
// - Both bounds are UTC, in the fixed format "YYYY-MM-DD HH-MM-SS".
// - The same strings are reused verbatim in the output file name.
//
#[derive(Debug, Deserialize, Clone)]
pub struct RequestWindow {
    #[serde(deserialize_with = "deserialize_window_timestamp")]
    pub start: DateTime<Utc>,

    #[serde(deserialize_with = "deserialize_window_timestamp")]
    pub end: DateTime<Utc>,

    /// Seconds between two scheduled passes
    pub interval_secs: u64,

    /// Stop once this many records have been collected.
    /// Set to a large number to terminate by time only.
    pub max_records: u64,
}

impl RequestWindow {
    /// `None` when the interval does not fit a `chrono::Duration`.
    pub fn interval(&self) -> Option<chrono::Duration> {
        i64::try_from(self.interval_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    /// CSV file with `ID, origins, destinations[, dep_date, dep_time]`
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    /// Route label, used at the beginning of the output file name
    pub route_name: String,

    /// Directory the output file is written to
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

// ------------------------------------------------------------
// Debug configuration
// ------------------------------------------------------------
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DebugConfig {
    /// Log every outgoing request URL (key redacted) at info level
    pub log_requests: Option<bool>,
}

impl Config {
    /// Reads a JSON configuration file from disk and validates it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: Config = serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Semantic checks serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.key.trim().is_empty() {
            return Err(ConfigError::Invalid("api.key must not be empty".into()));
        }
        if self.output.route_name.trim().is_empty() {
            return Err(ConfigError::Invalid("output.route_name must not be empty".into()));
        }
        if self.window.interval_secs == 0 {
            return Err(ConfigError::Invalid("window.interval_secs must be > 0".into()));
        }
        let one_tick_later = self
            .window
            .interval()
            .and_then(|interval| self.window.start.checked_add_signed(interval));
        if one_tick_later.is_none() {
            return Err(ConfigError::Invalid(format!(
                "window.interval_secs {} is out of range",
                self.window.interval_secs
            )));
        }
        if self.window.end < self.window.start {
            return Err(ConfigError::Invalid(format!(
                "window.end ({}) is before window.start ({})",
                util::format_window_timestamp(&self.window.end),
                util::format_window_timestamp(&self.window.start),
            )));
        }
        Ok(())
    }

    pub fn log_requests(&self) -> bool {
        self.debug
            .as_ref()
            .is_some_and(|d| d.log_requests.unwrap_or(false))
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_mode() -> String {
    DEFAULT_MODE.to_string()
}

fn default_traffic_model() -> String {
    DEFAULT_TRAFFIC_MODEL.to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn deserialize_window_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    util::parse_window_timestamp(&raw).map_err(|e| {
        serde::de::Error::custom(format!(
            "invalid window timestamp {:?} (expected YYYY-MM-DD HH-MM-SS): {}",
            raw, e
        ))
    })
}
